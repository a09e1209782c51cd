//! Core library for NeoFS netmap placement.
//!
//! This crate provides the leaf abstractions the placement engine is built on:
//! - Error taxonomy
//! - Rendezvous (HRW) hashing primitives
//! - Node model and attribute extraction
//! - Aggregator, normalizer and weight strategies
//! - Placement policy model and its JSON form

pub mod aggregator;
pub mod error;
pub mod hrw;
pub mod node;
pub mod policy;

pub use aggregator::{Aggregator, AggregatorKind, Normalizer, WeightFunc};
pub use error::{Error, Result};
pub use hrw::HrwHash;
pub use node::{Node, NodeAttribute, NodeInfo, NodeState, Nodes, CAPACITY_ATTR, PRICE_ATTR};
pub use policy::{Clause, Filter, Operation, PlacementPolicy, Replica, Selector, MAIN_FILTER_NAME};
