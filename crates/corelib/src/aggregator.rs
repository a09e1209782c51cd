//! Statistics strategies used to weight nodes and buckets.
//!
//! Aggregators fold a series of values into one number (bucket weight from
//! node weights). Normalizers map a raw attribute into a comparable score.
//! `WeightFunc` combines a capacity and a price normalizer into a node weight.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Default outlier scaling factor for [`MeanIqrAgg`].
pub const DEFAULT_IQR_K: f64 = 1.5;

/// Folds a series of values into a single statistic.
pub trait Aggregator {
    fn add(&mut self, value: f64);
    fn compute(&mut self) -> f64;
}

/// Maps a raw attribute value into a comparable score.
pub trait Normalizer: fmt::Debug + Send + Sync {
    fn normalize(&self, value: f64) -> f64;
}

/// Mean computed from a running sum.
#[derive(Debug, Default, Clone)]
pub struct MeanSumAgg {
    sum: f64,
    count: usize,
}

impl Aggregator for MeanSumAgg {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn compute(&mut self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }
}

/// Running mean, updated incrementally to avoid a large intermediate sum.
#[derive(Debug, Default, Clone)]
pub struct MeanAgg {
    mean: f64,
    count: usize,
}

impl Aggregator for MeanAgg {
    fn add(&mut self, value: f64) {
        let next = (self.count + 1) as f64;
        self.mean = self.mean * (self.count as f64 / next) + value / next;
        self.count += 1;
    }

    fn compute(&mut self) -> f64 {
        self.mean
    }
}

#[derive(Debug, Default, Clone)]
pub struct MinAgg {
    min: Option<f64>,
}

impl Aggregator for MinAgg {
    fn add(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }

    fn compute(&mut self) -> f64 {
        self.min.unwrap_or(0.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MaxAgg {
    max: Option<f64>,
}

impl Aggregator for MaxAgg {
    fn add(&mut self, value: f64) {
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn compute(&mut self) -> f64 {
        self.max.unwrap_or(0.0)
    }
}

/// Mean of the values that fall inside the interquartile range widened by `k`.
///
/// With fewer than four values every value is kept.
#[derive(Debug, Clone)]
pub struct MeanIqrAgg {
    k: f64,
    values: Vec<f64>,
}

impl MeanIqrAgg {
    pub fn new(k: f64) -> Self {
        Self {
            k,
            values: Vec::new(),
        }
    }
}

impl Default for MeanIqrAgg {
    fn default() -> Self {
        Self::new(DEFAULT_IQR_K)
    }
}

impl Aggregator for MeanIqrAgg {
    fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    fn compute(&mut self) -> f64 {
        const MIN_LEN: usize = 4;

        let len = self.values.len();
        if len == 0 {
            return 0.0;
        }
        self.values.sort_by(f64::total_cmp);

        let (low, high) = if len < MIN_LEN {
            (self.values[0], self.values[len - 1])
        } else {
            let start = len / MIN_LEN;
            let end = len * 3 / MIN_LEN - 1;
            let iqr = self.k * (self.values[end] - self.values[start]);
            (self.values[start] - iqr, self.values[end] + iqr)
        };

        let (sum, count) = self
            .values
            .iter()
            .filter(|v| **v >= low && **v <= high)
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            return 0.0;
        }
        sum / count as f64
    }
}

/// `min / value`: the cheapest value scores 1, zero scores 0.
#[derive(Debug, Clone, Copy)]
pub struct ReverseMinNorm {
    pub min: f64,
}

impl Normalizer for ReverseMinNorm {
    fn normalize(&self, value: f64) -> f64 {
        if value == 0.0 {
            return 0.0;
        }
        self.min / value
    }
}

/// `value / max`.
#[derive(Debug, Clone, Copy)]
pub struct MaxNorm {
    pub max: f64,
}

impl Normalizer for MaxNorm {
    fn normalize(&self, value: f64) -> f64 {
        if self.max == 0.0 {
            return 0.0;
        }
        value / self.max
    }
}

/// `x / (1 + x)` with `x = value / scale`: grows with diminishing returns.
#[derive(Debug, Clone, Copy)]
pub struct SigmoidNorm {
    pub scale: f64,
}

impl Normalizer for SigmoidNorm {
    fn normalize(&self, value: f64) -> f64 {
        if self.scale == 0.0 {
            return 0.0;
        }
        let x = value / self.scale;
        x / (1.0 + x)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstNorm {
    pub value: f64,
}

impl Normalizer for ConstNorm {
    fn normalize(&self, _value: f64) -> f64 {
        self.value
    }
}

/// Selectable bucket aggregator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    #[default]
    MeanIqr,
    Mean,
    MeanSum,
    Min,
    Max,
}

impl AggregatorKind {
    /// Fresh aggregator of this kind. `iqr_k` only affects `MeanIqr`.
    pub fn build(self, iqr_k: f64) -> Box<dyn Aggregator> {
        match self {
            AggregatorKind::MeanIqr => Box::new(MeanIqrAgg::new(iqr_k)),
            AggregatorKind::Mean => Box::new(MeanAgg::default()),
            AggregatorKind::MeanSum => Box::new(MeanSumAgg::default()),
            AggregatorKind::Min => Box::new(MinAgg::default()),
            AggregatorKind::Max => Box::new(MaxAgg::default()),
        }
    }
}

/// Node weight: normalized capacity times normalized price.
#[derive(Debug, Clone)]
pub struct WeightFunc {
    capacity: Arc<dyn Normalizer>,
    price: Arc<dyn Normalizer>,
}

impl WeightFunc {
    pub fn new(capacity: impl Normalizer + 'static, price: impl Normalizer + 'static) -> Self {
        Self {
            capacity: Arc::new(capacity),
            price: Arc::new(price),
        }
    }

    /// Default weighting for a node population.
    ///
    /// Capacity goes through a sigmoid scaled by the mean capacity, price
    /// through the reverse of the lowest non-zero price, so cheaper nodes with
    /// more capacity rank higher.
    pub fn default_for(nodes: &[Arc<Node>]) -> Self {
        let mut mean = MeanAgg::default();
        let mut min = MinAgg::default();
        for node in nodes {
            mean.add(node.capacity as f64);
            if node.price != 0 {
                min.add(node.price as f64);
            }
        }

        Self::new(
            SigmoidNorm {
                scale: mean.compute(),
            },
            ReverseMinNorm { min: min.compute() },
        )
    }

    pub fn weight(&self, node: &Node) -> f64 {
        self.capacity.normalize(node.capacity as f64) * self.price.normalize(node.price as f64)
    }
}

/// Aggregate weight of a bucket of nodes.
pub fn bucket_weight(nodes: &[Arc<Node>], aggregator: &mut dyn Aggregator, wf: &WeightFunc) -> f64 {
    for node in nodes {
        aggregator.add(wf.weight(node));
    }
    aggregator.compute()
}
