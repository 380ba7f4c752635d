use anyhow::Error;
use async_trait::async_trait;
use image::RgbImage;
use ndarray::Array1;

/// Turns a face image, already resized to the model input size, into an
/// embedding vector.
#[async_trait]
pub trait FaceEmbedder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, face: &RgbImage) -> Result<Array1<f32>, Error>;

    async fn ready(&self) -> bool {
        true
    }
}
