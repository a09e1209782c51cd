//! Working state of one resolution pass.

use std::collections::HashMap;
use std::sync::Arc;

use corelib::aggregator::Aggregator;
use corelib::node::Node;
use corelib::{hrw, Nodes, Selector, MAIN_FILTER_NAME};

use crate::config::{SelectionConfig, DEFAULT_BACKUP_FACTOR};
use crate::filter::Predicate;
use crate::netmap::Netmap;

/// Scratch space of a single `get_container_nodes` call.
///
/// Created fresh per call and dropped at the end; selections cached here
/// depend on the pivot and must never leak into another pass.
#[derive(Debug)]
pub struct Context<'a> {
    pub(crate) netmap: &'a Netmap,
    /// Resolved top-level filters by name. Numeric operands are parsed once
    /// at resolution and live inside the predicates.
    pub(crate) filters: HashMap<String, Arc<Predicate>>,
    pub(crate) selectors: HashMap<String, &'a Selector>,
    pub(crate) selections: HashMap<String, Vec<Nodes>>,
    pub(crate) pivot: Option<&'a [u8]>,
    pub(crate) pivot_hash: u64,
    pub(crate) cbf: u32,
    config: &'a SelectionConfig,
}

impl<'a> Context<'a> {
    pub fn new(netmap: &'a Netmap, config: &'a SelectionConfig) -> Self {
        Self {
            netmap,
            filters: HashMap::new(),
            selectors: HashMap::new(),
            selections: HashMap::new(),
            pivot: None,
            pivot_hash: 0,
            cbf: config_backup_factor(config),
            config,
        }
    }

    /// Seed HRW ranking. An empty pivot leaves the pass unseeded, in which
    /// case buckets are ordered by their attribute value.
    pub fn set_pivot(&mut self, pivot: &'a [u8]) {
        if !pivot.is_empty() {
            self.pivot = Some(pivot);
            self.pivot_hash = hrw::hash(pivot);
        }
    }

    /// Container backup factor; zero falls back to the configured default.
    pub fn set_cbf(&mut self, cbf: u32) {
        self.cbf = if cbf == 0 {
            config_backup_factor(self.config)
        } else {
            cbf
        };
    }

    pub fn cbf(&self) -> u32 {
        self.cbf
    }

    /// Resolved nodes of a selector, one group per bucket.
    pub fn selection(&self, name: &str) -> Option<&[Nodes]> {
        self.selections.get(name).map(Vec::as_slice)
    }

    pub fn selector(&self, name: &str) -> Option<&Selector> {
        self.selectors.get(name).copied()
    }

    pub fn filter(&self, name: &str) -> Option<&Predicate> {
        self.filters.get(name).map(Arc::as_ref)
    }

    /// True when `node` passes the named filter; `*` passes every node.
    pub fn apply_filter(&self, name: &str, node: &Node) -> bool {
        if name == MAIN_FILTER_NAME {
            return true;
        }
        self.filters
            .get(name)
            .map_or(false, |predicate| predicate.matches(node))
    }

    pub(crate) fn new_aggregator(&self) -> Box<dyn Aggregator> {
        self.config.aggregator.build(self.config.iqr_k)
    }
}

fn config_backup_factor(config: &SelectionConfig) -> u32 {
    if config.backup_factor == 0 {
        DEFAULT_BACKUP_FACTOR
    } else {
        config.backup_factor
    }
}
