//! Distance functions for vector search
//!
//! Distances are "lower = closer". Functions are single-threaded so the
//! same inputs always produce the same bits.

use std::cmp::Ordering;

/// Squared Euclidean distance: sum((a_i - b_i)^2)
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in distance computation");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Total order on distances
///
/// NaN sorts after every number so a poisoned vector can never outrank a
/// real match.
pub fn cmp_distance(a: f32, b: f32) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None => a.is_nan().cmp(&b.is_nan()),
    }
}
