use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResultOutput {
    #[serde(rename = "match")]
    pub is_match: bool,
    pub confidence: f64,
    pub matched_image: String,
}

impl Default for VerificationResultOutput {
    fn default() -> Self {
        VerificationResultOutput {
            is_match: false,
            confidence: 0.0,
            matched_image: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct VerificationInput {
    pub filename: String,
    pub im_bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthOutput {
    pub embedder: String,
    pub embedder_ready: bool,
    pub database_dir: String,
    pub database_available: bool,
    pub cached_embeddings: usize,
}
