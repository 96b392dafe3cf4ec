//! Vector math shared by the reranker and the embedding adapters.

/// L2-normalize a vector in place so its magnitude is 1.
///
/// The norm is accumulated in f64, so magnitudes that would overflow or
/// underflow an f32 sum of squares still normalize. Only an exact zero
/// vector is left untouched; its dot product with anything is 0.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (f64::from(*x) / norm) as f32;
        }
    }
}

/// L2-normalize a slice, returning a new vector with unit magnitude.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let mut result = v.to_vec();
    l2_normalize_in_place(&mut result);
    result
}

/// Dot product of two equally sized slices.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two unit vectors, clamped to [-1, 1].
///
/// Rounding can push the dot product of unit vectors marginally past ±1.
pub fn cosine_of_unit(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b).clamp(-1.0, 1.0)
}
