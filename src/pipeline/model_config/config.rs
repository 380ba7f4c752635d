use std::path::Path;

use crate::config::settings::{DistanceMetric, PixelNormalization, TensorLayout, Verifier};

pub const ALLOWED_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

#[derive(Debug, Clone)]
pub struct FaceVerificationConfig {
    pub model_name: String,
    pub image_size: (u32, u32),
    pub distance_metric: DistanceMetric,
    pub threshold: f64,
    pub layout: TensorLayout,
    pub normalization: PixelNormalization,
}

impl FaceVerificationConfig {
    pub fn new() -> Self {
        FaceVerificationConfig {
            model_name: "VGG-Face".to_string(),
            image_size: (224, 224),
            distance_metric: DistanceMetric::Cosine,
            threshold: find_threshold("VGG-Face", DistanceMetric::Cosine),
            layout: TensorLayout::Nhwc,
            normalization: PixelNormalization::Base,
        }
    }

    pub fn from_settings(verifier: &Verifier) -> Self {
        FaceVerificationConfig {
            model_name: verifier.model_name.clone(),
            image_size: verifier.image_size,
            distance_metric: verifier.distance_metric,
            threshold: verifier
                .threshold
                .unwrap_or_else(|| find_threshold(&verifier.model_name, verifier.distance_metric)),
            layout: verifier.layout,
            normalization: verifier.normalization,
        }
    }
}

impl Default for FaceVerificationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Distance below which two embeddings of the given model are the same person.
pub fn find_threshold(model_name: &str, metric: DistanceMetric) -> f64 {
    let (cosine, euclidean, euclidean_l2) = match model_name {
        "VGG-Face" => (0.68, 1.17, 1.17),
        "Facenet" => (0.40, 10.0, 0.80),
        "Facenet512" => (0.30, 23.56, 1.04),
        "ArcFace" => (0.68, 4.15, 1.13),
        "Dlib" => (0.07, 0.6, 0.4),
        "SFace" => (0.593, 10.734, 1.055),
        "OpenFace" => (0.10, 0.55, 0.55),
        "DeepFace" => (0.23, 64.0, 0.64),
        "DeepID" => (0.015, 45.0, 0.17),
        _ => (0.40, 0.55, 0.75),
    };

    match metric {
        DistanceMetric::Cosine => cosine,
        DistanceMetric::Euclidean => euclidean,
        DistanceMetric::EuclideanL2 => euclidean_l2,
    }
}

pub fn is_allowed_extension(name: &str) -> bool {
    let extension = match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(extension) => format!(".{}", extension.to_ascii_lowercase()),
        None => return false,
    };
    ALLOWED_EXTENSIONS.contains(&extension.as_str())
}
