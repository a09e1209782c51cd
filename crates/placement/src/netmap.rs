//! Public entry points: container node assignment and object placement.

use std::sync::Arc;

use corelib::hrw;
use corelib::node::{nodes_from_info, weights};
use corelib::{
    Error, Node, NodeInfo, Nodes, PlacementPolicy, Result, WeightFunc, MAIN_FILTER_NAME,
};
use tracing::{debug, instrument};

use crate::config::SelectionConfig;
use crate::context::Context;

/// Every storage node known at one epoch.
///
/// Read-only once built; any number of resolutions may share it.
#[derive(Debug, Clone, Default)]
pub struct Netmap {
    nodes: Nodes,
}

/// Nodes chosen for a container, one list per replica.
#[derive(Debug, Clone, Default)]
pub struct ContainerNodes {
    replicas: Vec<Nodes>,
}

impl ContainerNodes {
    pub fn new(replicas: Vec<Nodes>) -> Self {
        Self { replicas }
    }

    pub fn replicas(&self) -> &[Nodes] {
        &self.replicas
    }

    /// All replicas concatenated in replica order.
    pub fn flatten(&self) -> Nodes {
        self.replicas.concat()
    }

    pub fn into_replicas(self) -> Vec<Nodes> {
        self.replicas
    }
}

impl Netmap {
    pub fn new(nodes: Nodes) -> Self {
        Self { nodes }
    }

    /// Build from decoded node descriptors; position in the iterator becomes
    /// the node index.
    pub fn from_infos(infos: impl IntoIterator<Item = NodeInfo>) -> Self {
        Self::new(nodes_from_info(infos))
    }

    /// Decode a JSON array of node descriptors.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_infos(NodeInfo::decode_list(json)?))
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes holding the replicas of a container.
    ///
    /// `pivot` is usually the container identifier; an empty pivot falls back
    /// to attribute order for bucket selection.
    pub fn get_container_nodes(
        &self,
        policy: &PlacementPolicy,
        pivot: &[u8],
    ) -> Result<ContainerNodes> {
        self.get_container_nodes_with(&SelectionConfig::default(), policy, pivot)
    }

    #[instrument(level = "debug", skip_all, fields(nodes = self.nodes.len()))]
    pub fn get_container_nodes_with(
        &self,
        config: &SelectionConfig,
        policy: &PlacementPolicy,
        pivot: &[u8],
    ) -> Result<ContainerNodes> {
        let mut ctx = Context::new(self, config);
        ctx.set_pivot(pivot);
        ctx.set_cbf(policy.container_backup_factor);

        ctx.process_filters(policy)?;
        ctx.process_selectors(policy)?;
        let replicas = ctx.process_replicas(policy)?;

        debug!(
            replicas = replicas.len(),
            cbf = ctx.cbf(),
            "resolved container nodes"
        );
        Ok(ContainerNodes::new(replicas))
    }

    /// Contact order of every replica for one object.
    ///
    /// Membership of each replica is unchanged; only the order depends on
    /// `pivot`. Weights are scaled over the replica's own nodes, so the order
    /// does not move when unrelated nodes join or leave the netmap.
    pub fn get_placement_vectors(&self, container: &ContainerNodes, pivot: &[u8]) -> Vec<Nodes> {
        let pivot_hash = hrw::hash(pivot);

        container
            .replicas()
            .iter()
            .map(|replica| {
                let mut vector = replica.clone();
                let wf = WeightFunc::default_for(&vector);
                let w = weights(&vector, &wf);
                hrw::sort_by_weight(&mut vector, &w, pivot_hash);
                vector
            })
            .collect()
    }
}

/// Check a policy for structural errors without a netmap.
///
/// Filters are compiled, selector filter references and replica selector
/// references are checked. No node selection happens, so a valid policy may
/// still fail with [`Error::NotEnoughNodes`] against a real netmap.
pub fn validate_policy(policy: &PlacementPolicy) -> Result<()> {
    let netmap = Netmap::default();
    let config = SelectionConfig::default();
    let mut ctx = Context::new(&netmap, &config);
    ctx.process_filters(policy)?;

    let mut names = Vec::with_capacity(policy.selectors.len());
    for selector in &policy.selectors {
        let s = selector.as_ref().ok_or(Error::MissingField("SELECT"))?;
        if s.filter != MAIN_FILTER_NAME && ctx.filter(&s.filter).is_none() {
            return Err(Error::FilterNotFound(s.filter.clone()));
        }
        names.push(s.name.as_str());
    }

    for replica in &policy.replicas {
        let r = replica.as_ref().ok_or(Error::MissingField("REPLICA"))?;
        if !r.selector.is_empty() && !names.contains(&r.selector.as_str()) {
            return Err(Error::SelectorNotFound(r.selector.clone()));
        }
    }
    Ok(())
}
