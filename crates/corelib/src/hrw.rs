//! Rendezvous (highest random weight) hashing.
//!
//! Every participant ranks the same candidate set against the same pivot and
//! gets the same order, without coordination. Removing a candidate never
//! changes the relative order of the remaining ones, so membership changes only
//! move the assignments that involved the changed candidate.
//!
//! # Construction
//!
//! - pivot and node identities: xxHash64 with seed 0
//! - distance: `x ^ y` mixed by the MurmurHash3 64-bit finalizer
//! - weighted rank: `(1 - distance / u64::MAX) * weight`, highest first

use std::sync::Arc;

use xxhash_rust::xxh64::xxh64;

/// Items that carry an identity hash for rendezvous ranking.
pub trait HrwHash {
    /// Identity of the item in the 64-bit hash space.
    fn hrw_hash(&self) -> u64;
}

impl HrwHash for u64 {
    fn hrw_hash(&self) -> u64 {
        *self
    }
}

impl<T: HrwHash + ?Sized> HrwHash for &T {
    fn hrw_hash(&self) -> u64 {
        (**self).hrw_hash()
    }
}

impl<T: HrwHash + ?Sized> HrwHash for Arc<T> {
    fn hrw_hash(&self) -> u64 {
        (**self).hrw_hash()
    }
}

/// Hash an opaque byte string (public key, container ID, object ID).
#[inline]
#[must_use]
pub fn hash(key: &[u8]) -> u64 {
    xxh64(key, 0)
}

/// Mixed distance between an item identity and a pivot hash.
#[inline]
#[must_use]
pub fn distance(x: u64, y: u64) -> u64 {
    let mut acc = x ^ y;
    acc ^= acc >> 33;
    acc = acc.wrapping_mul(0xff51_afd7_ed55_8ccd);
    acc ^= acc >> 33;
    acc = acc.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    acc ^= acc >> 33;
    acc
}

/// Order items by ascending distance to the pivot.
///
/// The sort is stable, so items with equal identities keep their input order.
pub fn sort_by_value<T: HrwHash>(items: &mut [T], pivot: u64) {
    items.sort_by_cached_key(|item| distance(item.hrw_hash(), pivot));
}

/// Order items by weighted rendezvous rank, highest first.
///
/// `weights[i]` belongs to `items[i]`. Uniform weights carry no information,
/// so the plain distance order is used instead; the same happens when the
/// lengths disagree.
pub fn sort_by_weight<T: HrwHash>(items: &mut Vec<T>, weights: &[f64], pivot: u64) {
    if items.len() != weights.len() || is_uniform(weights) {
        sort_by_value(items, pivot);
        return;
    }

    let mut ranked: Vec<(f64, T)> = items
        .drain(..)
        .zip(weights.iter().copied())
        .map(|(item, weight)| (rank(distance(item.hrw_hash(), pivot), weight), item))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    items.extend(ranked.into_iter().map(|(_, item)| item));
}

fn rank(distance: u64, weight: f64) -> f64 {
    (1.0 - distance as f64 / u64::MAX as f64) * weight
}

fn is_uniform(weights: &[f64]) -> bool {
    weights.windows(2).all(|pair| pair[0] == pair[1])
}
