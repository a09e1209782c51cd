//! Filter resolution and evaluation.
//!
//! Policy filters are validated once and compiled into [`Predicate`] trees.
//! Evaluation never fails: a node missing an attribute, or carrying one that
//! does not parse as a number, simply does not match.

use std::sync::Arc;

use corelib::node::Node;
use corelib::{
    Error, Filter, Operation, PlacementPolicy, Result, CAPACITY_ATTR, MAIN_FILTER_NAME, PRICE_ATTR,
};
use tracing::trace;

use crate::context::Context;

/// Numeric comparison against a `u64` operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn from_operation(op: Operation) -> Option<Self> {
        match op {
            Operation::Gt => Some(Comparison::Gt),
            Operation::Ge => Some(Comparison::Ge),
            Operation::Lt => Some(Comparison::Lt),
            Operation::Le => Some(Comparison::Le),
            _ => None,
        }
    }

    pub fn holds(self, attr: u64, operand: u64) -> bool {
        match self {
            Comparison::Gt => attr > operand,
            Comparison::Ge => attr >= operand,
            Comparison::Lt => attr < operand,
            Comparison::Le => attr <= operand,
        }
    }
}

/// Compiled filter.
///
/// References to named filters share the referenced predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// True when every child matches; empty is true.
    And(Vec<Arc<Predicate>>),
    /// True when any child matches; empty is false.
    Or(Vec<Arc<Predicate>>),
    Eq { key: String, value: String },
    Ne { key: String, value: String },
    Compare { key: String, op: Comparison, operand: u64 },
}

impl Predicate {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|c| c.matches(node)),
            Predicate::Or(children) => children.iter().any(|c| c.matches(node)),
            Predicate::Eq { key, value } => node.attribute(key) == value.as_str(),
            Predicate::Ne { key, value } => node.attribute(key) != value.as_str(),
            Predicate::Compare { key, op, operand } => {
                numeric_attribute(node, key).map_or(false, |attr| op.holds(attr, *operand))
            }
        }
    }
}

/// Well-known numeric attributes come from the typed node fields; anything
/// else is parsed from the string attribute.
fn numeric_attribute(node: &Node, key: &str) -> Option<u64> {
    match key {
        PRICE_ATTR => Some(node.price),
        CAPACITY_ATTR => Some(node.capacity),
        _ => node.attribute(key).parse().ok(),
    }
}

impl<'a> Context<'a> {
    /// Validate and index every top-level filter in declaration order.
    ///
    /// Sub-filters may only reference filters declared before them.
    pub fn process_filters(&mut self, policy: &PlacementPolicy) -> Result<()> {
        for filter in &policy.filters {
            let predicate = self.compile_filter(filter.as_ref(), true)?;
            if let Some(f) = filter {
                trace!(filter = %f.name, "resolved filter");
                self.filters.insert(f.name.clone(), predicate);
            }
        }
        Ok(())
    }

    /// Evaluate a resolved predicate against one node.
    pub fn matches(&self, predicate: &Predicate, node: &Node) -> bool {
        predicate.matches(node)
    }

    fn compile_filter(&self, filter: Option<&Filter>, top: bool) -> Result<Arc<Predicate>> {
        let f = filter.ok_or(Error::MissingField("FILTER"))?;

        if f.name == MAIN_FILTER_NAME {
            return Err(Error::InvalidFilterName(f.name.clone()));
        }
        if top && f.name.is_empty() {
            return Err(Error::UnnamedTopFilter);
        }

        let reference = if !top && !f.name.is_empty() {
            let found = self
                .filters
                .get(&f.name)
                .ok_or_else(|| Error::FilterNotFound(f.name.clone()))?;
            Some(Arc::clone(found))
        } else {
            None
        };

        let predicate = match f.op {
            Operation::And | Operation::Or => {
                if !f.key.is_empty() || !f.value.is_empty() {
                    return Err(Error::NonEmptyFilters(f.name.clone()));
                }
                let children = f
                    .filters
                    .iter()
                    .map(|sub| self.compile_filter(sub.as_ref(), false))
                    .collect::<Result<Vec<_>>>()?;
                if f.op == Operation::And {
                    Predicate::And(children)
                } else {
                    Predicate::Or(children)
                }
            }
            op => {
                if !f.filters.is_empty() {
                    return Err(Error::NonEmptyFilters(f.name.clone()));
                }
                if let Some(found) = &reference {
                    return Ok(Arc::clone(found));
                }
                compile_leaf(f, op)?
            }
        };

        Ok(reference.unwrap_or_else(|| Arc::new(predicate)))
    }
}

fn compile_leaf(f: &Filter, op: Operation) -> Result<Predicate> {
    match op {
        Operation::Eq => Ok(Predicate::Eq {
            key: f.key.clone(),
            value: f.value.clone(),
        }),
        Operation::Ne => Ok(Predicate::Ne {
            key: f.key.clone(),
            value: f.value.clone(),
        }),
        _ => {
            let cmp = Comparison::from_operation(op).ok_or(Error::InvalidFilterOp(op))?;
            let operand = f
                .value
                .parse::<u64>()
                .map_err(|_| Error::InvalidNumber(f.value.clone()))?;
            Ok(Predicate::Compare {
                key: f.key.clone(),
                op: cmp,
                operand,
            })
        }
    }
}
