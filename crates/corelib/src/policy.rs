//! Placement policy model.
//!
//! A policy is read-only input decoded from the wire. List entries are
//! optional because the wire form allows null entries; the resolver reports
//! them as missing fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reserved filter name denoting the whole netmap.
pub const MAIN_FILTER_NAME: &str = "*";

/// Filter operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[default]
    #[serde(rename = "OPERATION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "NE")]
    Ne,
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "GE")]
    Ge,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "LE")]
    Le,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Unspecified => "OPERATION_UNSPECIFIED",
            Operation::Eq => "EQ",
            Operation::Ne => "NE",
            Operation::Gt => "GT",
            Operation::Ge => "GE",
            Operation::Lt => "LT",
            Operation::Le => "LE",
            Operation::Or => "OR",
            Operation::And => "AND",
        }
    }

    /// AND/OR: the filter combines sub-filters.
    pub fn is_combinator(&self) -> bool {
        matches!(self, Operation::And | Operation::Or)
    }

    /// GT/GE/LT/LE: the filter value must be an unsigned integer.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Operation::Gt | Operation::Ge | Operation::Lt | Operation::Le)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "OPERATION_UNSPECIFIED" => Operation::Unspecified,
            "EQ" => Operation::Eq,
            "NE" => Operation::Ne,
            "GT" => Operation::Gt,
            "GE" => Operation::Ge,
            "LT" => Operation::Lt,
            "LE" => Operation::Le,
            "OR" => Operation::Or,
            "AND" => Operation::And,
            other => return Err(Error::Decode(format!("unknown filter operation '{other}'"))),
        })
    }
}

/// How a selector groups nodes by its attribute.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clause {
    #[default]
    #[serde(rename = "CLAUSE_UNSPECIFIED")]
    Unspecified,
    /// All selected nodes share one attribute value.
    #[serde(rename = "SAME")]
    Same,
    /// Selected nodes come from distinct attribute values.
    #[serde(rename = "DISTINCT")]
    Distinct,
}

impl Clause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Clause::Unspecified => "CLAUSE_UNSPECIFIED",
            Clause::Same => "SAME",
            Clause::Distinct => "DISTINCT",
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Clause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "CLAUSE_UNSPECIFIED" => Clause::Unspecified,
            "SAME" => Clause::Same,
            "DISTINCT" => Clause::Distinct,
            other => return Err(Error::Decode(format!("unknown selector clause '{other}'"))),
        })
    }
}

/// Named or anonymous node predicate.
///
/// Combinators (AND/OR) carry only sub-filters; comparisons carry only
/// key/op/value. A sub-filter with only a name refers to a top-level filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub name: String,
    pub key: String,
    pub op: Operation,
    pub value: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Option<Filter>>,
}

impl Filter {
    /// Anonymous comparison.
    pub fn leaf(key: impl Into<String>, op: Operation, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(key, Operation::Eq, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(key, Operation::Ne, value)
    }

    pub fn gt(key: impl Into<String>, value: u64) -> Self {
        Self::leaf(key, Operation::Gt, value.to_string())
    }

    pub fn ge(key: impl Into<String>, value: u64) -> Self {
        Self::leaf(key, Operation::Ge, value.to_string())
    }

    pub fn lt(key: impl Into<String>, value: u64) -> Self {
        Self::leaf(key, Operation::Lt, value.to_string())
    }

    pub fn le(key: impl Into<String>, value: u64) -> Self {
        Self::leaf(key, Operation::Le, value.to_string())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::combine(Operation::And, filters)
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::combine(Operation::Or, filters)
    }

    /// Reference to a previously declared top-level filter.
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn combine(op: Operation, filters: impl IntoIterator<Item = Filter>) -> Self {
        Self {
            op,
            filters: filters.into_iter().map(Some).collect(),
            ..Default::default()
        }
    }
}

/// Bucketing and sizing rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selector {
    pub name: String,
    pub count: u32,
    pub clause: Clause,
    /// Bucket key; empty means no grouping.
    pub attribute: String,
    /// Source filter name, or `*` for the whole netmap.
    pub filter: String,
}

impl Selector {
    /// Selector over the whole netmap without grouping.
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
            filter: MAIN_FILTER_NAME.to_string(),
            ..Default::default()
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clause = clause;
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Replication requirement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Replica {
    pub count: u32,
    /// Selector name; empty draws from every declared selector.
    pub selector: String,
}

impl Replica {
    pub fn new(count: u32, selector: impl Into<String>) -> Self {
        Self {
            count,
            selector: selector.into(),
        }
    }
}

/// Declarative placement policy of a container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementPolicy {
    pub replicas: Vec<Option<Replica>>,
    /// Zero means the default factor.
    pub container_backup_factor: u32,
    pub selectors: Vec<Option<Selector>>,
    pub filters: Vec<Option<Filter>>,
}

impl PlacementPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backup_factor(mut self, cbf: u32) -> Self {
        self.container_backup_factor = cbf;
        self
    }

    pub fn with_replica(mut self, replica: Replica) -> Self {
        self.replicas.push(Some(replica));
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selectors.push(Some(selector));
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(Some(filter));
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
