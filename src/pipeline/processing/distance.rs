use ndarray::ArrayView1;

use crate::config::settings::DistanceMetric;

fn has_zero_norm(v: ArrayView1<f32>) -> bool {
    v.dot(&v) as f64 <= f64::EPSILON
}

pub fn find_cosine_distance(source: ArrayView1<f32>, test: ArrayView1<f32>) -> f64 {
    if has_zero_norm(source) || has_zero_norm(test) {
        return 1.0;
    }
    let a = source.dot(&source) as f64;
    let b = test.dot(&test) as f64;
    1.0 - source.dot(&test) as f64 / (a.sqrt() * b.sqrt())
}

pub fn find_euclidean_distance(source: ArrayView1<f32>, test: ArrayView1<f32>) -> f64 {
    source
        .iter()
        .zip(test.iter())
        .map(|(s, t)| {
            let d = (*s - *t) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// A zero-norm embedding carries no features, so it is never within any
/// threshold: infinite for the euclidean metrics, 1.0 for cosine.
pub fn find_distance(source: ArrayView1<f32>, test: ArrayView1<f32>, metric: DistanceMetric) -> f64 {
    if metric != DistanceMetric::Cosine && (has_zero_norm(source) || has_zero_norm(test)) {
        return f64::INFINITY;
    }
    match metric {
        DistanceMetric::Cosine => find_cosine_distance(source, test),
        DistanceMetric::Euclidean => find_euclidean_distance(source, test),
        DistanceMetric::EuclideanL2 => {
            let source = crate::pipeline::utils::utils::l2_normalize(source);
            let test = crate::pipeline::utils::utils::l2_normalize(test);
            find_euclidean_distance(source.view(), test.view())
        }
    }
}
