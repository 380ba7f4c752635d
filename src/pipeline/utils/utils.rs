use ndarray::{Array1, ArrayView1};

pub fn l2_normalize(v: ArrayView1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm <= f32::EPSILON {
        return v.to_owned();
    }
    &v / norm
}

/// Rounds to `digits` decimal places, half away from zero.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
