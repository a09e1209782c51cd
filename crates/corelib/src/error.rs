//! Error types for placement policy resolution.

use thiserror::Error;

use crate::policy::Operation;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving a placement policy against a netmap.
///
/// All of them are synchronous validation failures: resolution is aborted and
/// no partial result is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required policy, filter, selector or replica entry is absent.
    #[error("netmap: nil field: {0}")]
    MissingField(&'static str),

    /// A filter uses the reserved `*` name.
    #[error("netmap: filter name is invalid: '{0}' is reserved")]
    InvalidFilterName(String),

    /// A top-level filter has no name.
    #[error("netmap: all filters on top level must be named")]
    UnnamedTopFilter,

    /// A sub-filter or selector references an undeclared filter.
    #[error("netmap: filter not found: '{0}'")]
    FilterNotFound(String),

    /// A filter mixes a comparison with sub-filters: a leaf declares
    /// sub-filters, or an AND/OR carries a key or value of its own.
    #[error("netmap: filter '{0}' mixes a comparison with sub-filters")]
    NonEmptyFilters(String),

    /// A numeric comparison value is not an unsigned integer.
    #[error("netmap: number value expected: '{0}'")]
    InvalidNumber(String),

    /// A leaf filter operation is not a comparison.
    #[error("netmap: invalid filter operation: {0}")]
    InvalidFilterOp(Operation),

    /// A replica references an undeclared selector.
    #[error("netmap: selector not found: '{0}'")]
    SelectorNotFound(String),

    /// Not enough buckets of the required size exist for a selector.
    #[error("netmap: not enough nodes to SELECT from: '{0}'")]
    NotEnoughNodes(String),

    /// A policy or netmap snapshot could not be decoded.
    #[error("netmap: malformed input: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Decode(err.to_string())
    }
}
