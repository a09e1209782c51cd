//! Selector resolution.
//!
//! # Algorithm
//!
//! 1. Group the nodes passing the selector filter into buckets by the value
//!    of the selector attribute (one bucket keyed `""` when there is none).
//! 2. With a pivot, HRW-rank the nodes inside every bucket so truncation keeps
//!    a reproducible subset.
//! 3. Truncate buckets to `nodes per bucket`. Buckets too small for the
//!    backup factor but large enough without it are kept as fallbacks.
//! 4. Order buckets: by attribute value without a pivot, by aggregated
//!    weight and HRW rank with one. Full buckets come before fallbacks.
//! 5. Take the first `bucket count` buckets.
//!
//! Weight normalizers are scaled over the candidates of one ranking only
//! (the nodes of a bucket, or the truncated nodes of the buckets being
//! ordered), never over the whole netmap. A node that takes part in neither
//! ranking cannot change the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use corelib::aggregator::bucket_weight;
use corelib::hrw::{self, HrwHash};
use corelib::node::weights;
use corelib::{
    Clause, Error, Nodes, PlacementPolicy, Result, Selector, WeightFunc, MAIN_FILTER_NAME,
};
use tracing::{debug, trace};

use crate::context::Context;

/// Group of selected nodes sharing one attribute value.
#[derive(Debug, Clone)]
struct Bucket {
    attr: String,
    nodes: Nodes,
}

impl HrwHash for Bucket {
    fn hrw_hash(&self) -> u64 {
        hrw::hash(self.attr.as_bytes())
    }
}

/// Number of buckets and nodes per bucket a selector needs.
///
/// SAME takes one bucket of `cbf * count` nodes, anything else takes `count`
/// buckets of `cbf` nodes each.
pub fn nodes_count(selector: &Selector, cbf: u32) -> (usize, usize) {
    let count = selector.count as usize;
    let cbf = cbf as usize;
    match selector.clause {
        Clause::Same => (1, cbf * count),
        _ => (count, cbf),
    }
}

/// Without an attribute there is nothing to be distinct over, so every
/// selector reads as SAME over the single `""` bucket.
fn bucket_shape(selector: &Selector, cbf: u32) -> (usize, usize) {
    if selector.attribute.is_empty() {
        (1, cbf as usize * selector.count as usize)
    } else {
        nodes_count(selector, cbf)
    }
}

impl<'a> Context<'a> {
    /// Resolve every selector in declaration order and cache its buckets.
    pub fn process_selectors(&mut self, policy: &'a PlacementPolicy) -> Result<()> {
        for selector in &policy.selectors {
            let s = selector.as_ref().ok_or(Error::MissingField("SELECT"))?;
            if s.filter != MAIN_FILTER_NAME && !self.filters.contains_key(&s.filter) {
                return Err(Error::FilterNotFound(s.filter.clone()));
            }

            self.selectors.insert(s.name.clone(), s);
            let result = self.get_selection(s)?;
            debug!(
                selector = %s.name,
                buckets = result.len(),
                nodes = result.iter().map(Vec::len).sum::<usize>(),
                "resolved selector"
            );
            self.selections.insert(s.name.clone(), result);
        }
        Ok(())
    }

    /// Select node buckets for one selector.
    pub fn get_selection(&self, selector: &Selector) -> Result<Vec<Nodes>> {
        let (bucket_count, per_bucket) = bucket_shape(selector, self.cbf);
        let (_, min_per_bucket) = bucket_shape(selector, 1);

        let buckets = self.selection_base(selector);
        if buckets.len() < bucket_count {
            return Err(Error::NotEnoughNodes(selector.name.clone()));
        }

        let mut full = Vec::with_capacity(buckets.len());
        let mut fallback = Vec::new();
        for mut bucket in buckets {
            if bucket.nodes.len() >= per_bucket {
                bucket.nodes.truncate(per_bucket);
                full.push(bucket);
            } else if bucket.nodes.len() >= min_per_bucket {
                fallback.push(bucket);
            } else {
                trace!(
                    selector = %selector.name,
                    attr = %bucket.attr,
                    size = bucket.nodes.len(),
                    "bucket too small"
                );
            }
        }

        if self.pivot.is_some() {
            self.rank_buckets(&mut full);
            self.rank_buckets(&mut fallback);
        }

        if full.len() < bucket_count {
            debug!(
                selector = %selector.name,
                full = full.len(),
                fallback = fallback.len(),
                "not enough full buckets, using minimal backup factor"
            );
            full.extend(fallback);
            if full.len() < bucket_count {
                return Err(Error::NotEnoughNodes(selector.name.clone()));
            }
        }

        full.truncate(bucket_count);
        Ok(full.into_iter().map(|b| b.nodes).collect())
    }

    /// Buckets of nodes passing the selector filter, ordered by attribute.
    fn selection_base(&self, selector: &Selector) -> Vec<Bucket> {
        let mut groups: BTreeMap<&str, Nodes> = BTreeMap::new();
        for node in self.netmap.nodes() {
            if !self.apply_filter(&selector.filter, node) {
                continue;
            }
            let key = if selector.attribute.is_empty() {
                ""
            } else {
                node.attribute(&selector.attribute)
            };
            groups.entry(key).or_default().push(Arc::clone(node));
        }

        let mut buckets: Vec<Bucket> = groups
            .into_iter()
            .map(|(attr, nodes)| Bucket {
                attr: attr.to_string(),
                nodes,
            })
            .collect();

        if self.pivot.is_some() {
            for bucket in &mut buckets {
                let wf = WeightFunc::default_for(&bucket.nodes);
                let w = weights(&bucket.nodes, &wf);
                hrw::sort_by_weight(&mut bucket.nodes, &w, self.pivot_hash);
            }
        }
        buckets
    }

    fn rank_buckets(&self, buckets: &mut Vec<Bucket>) {
        let candidates: Nodes = buckets
            .iter()
            .flat_map(|b| b.nodes.iter().cloned())
            .collect();
        let wf = WeightFunc::default_for(&candidates);

        let w: Vec<f64> = buckets
            .iter()
            .map(|b| bucket_weight(&b.nodes, &mut *self.new_aggregator(), &wf))
            .collect();
        hrw::sort_by_weight(buckets, &w, self.pivot_hash);
    }
}
