//! Placement policy resolution for the NeoFS netmap.
//!
//! Given every storage node known at an epoch and a declarative placement
//! policy, this crate computes which nodes hold the replicas of a container
//! and in which order they are contacted for a given object:
//!
//! - Filters are compiled into predicates and evaluated per node
//! - Selectors group matching nodes into buckets and pick them by HRW rank
//! - Replicas combine selector results into per-replica node lists
//!
//! Resolution is synchronous and pure. Every call builds its own [`Context`],
//! so a [`Netmap`] can be shared read-only between concurrent resolutions.

pub mod config;
pub mod context;
pub mod filter;
pub mod netmap;
pub mod replica;
pub mod selector;

pub use config::SelectionConfig;
pub use context::Context;
pub use filter::{Comparison, Predicate};
pub use netmap::{validate_policy, ContainerNodes, Netmap};
pub use selector::nodes_count;

pub use corelib::{Error, Result};
