//! Replica resolution on top of resolved selectors.

use corelib::{Error, Nodes, PlacementPolicy, Replica, Result, Selector};
use tracing::debug;

use crate::context::Context;

impl<'a> Context<'a> {
    /// Node lists of every replica, in policy order.
    ///
    /// Must run after [`Context::process_selectors`].
    pub fn process_replicas(&self, policy: &PlacementPolicy) -> Result<Vec<Nodes>> {
        policy
            .replicas
            .iter()
            .map(|replica| {
                let replica = replica.as_ref().ok_or(Error::MissingField("REPLICA"))?;
                self.resolve_replica(policy, replica)
            })
            .collect()
    }

    /// Flattened nodes of a single replica.
    pub fn resolve_replica(&self, policy: &PlacementPolicy, replica: &Replica) -> Result<Nodes> {
        if !replica.selector.is_empty() {
            let selection = self
                .selections
                .get(&replica.selector)
                .ok_or_else(|| Error::SelectorNotFound(replica.selector.clone()))?;
            return Ok(selection.concat());
        }

        if policy.selectors.is_empty() {
            let implicit = Selector::new("", replica.count);
            let nodes = self.get_selection(&implicit)?.concat();
            debug!(count = replica.count, nodes = nodes.len(), "resolved implicit selector");
            return Ok(nodes);
        }

        // Unnamed replica draws from every declared selector.
        let mut nodes = Nodes::new();
        for selector in policy.selectors.iter().flatten() {
            if let Some(selection) = self.selections.get(&selector.name) {
                for bucket in selection {
                    nodes.extend(bucket.iter().cloned());
                }
            }
        }
        Ok(nodes)
    }
}
