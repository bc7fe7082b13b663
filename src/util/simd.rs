//! Distance kernels vectorized with the `wide` crate.
//!
//! Slices are processed eight lanes at a time with `f32x8`; the remainder falls
//! back to scalar arithmetic. Both operands must have the same length.

use wide::f32x8;

#[inline]
fn lanes(chunk: &[f32]) -> f32x8 {
    let mut buf = [0.0f32; 8];
    buf.copy_from_slice(chunk);
    f32x8::new(buf)
}

/// Squared Euclidean distance.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let rem_a = chunks_a.remainder();
    let rem_b = chunks_b.remainder();

    let mut acc = f32x8::splat(0.0);
    for (ca, cb) in chunks_a.zip(chunks_b) {
        let diff = lanes(ca) - lanes(cb);
        acc = acc + diff * diff;
    }

    let tail: f32 = rem_a
        .iter()
        .zip(rem_b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    acc.reduce_add() + tail
}

/// Inner (dot) product.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let rem_a = chunks_a.remainder();
    let rem_b = chunks_b.remainder();

    let mut acc = f32x8::splat(0.0);
    for (ca, cb) in chunks_a.zip(chunks_b) {
        acc = acc + lanes(ca) * lanes(cb);
    }

    let tail: f32 = rem_a.iter().zip(rem_b).map(|(x, y)| x * y).sum();
    acc.reduce_add() + tail
}

/// L2 norm.
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}
