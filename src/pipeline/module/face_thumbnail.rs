use anyhow::Error;
use async_trait::async_trait;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use ndarray::Array1;
use tokio::task::spawn_blocking;

use crate::pipeline::module::face_embedding::FaceEmbedder;
use crate::pipeline::utils::utils::l2_normalize;

const THUMBNAIL_SIDE: u32 = 8;
// Centred thumbnails with less energy than this are treated as blank.
const MIN_CENTRED_NORM: f32 = 1e-4;

/// Model-free embedding: an 8x8 RGB thumbnail, mean-centred and L2-normalised.
/// Only recognises near-identical images, which is enough to run the service
/// without an inference server.
#[derive(Debug, Clone, Default)]
pub struct FaceThumbnail;

impl FaceThumbnail {
    pub fn new() -> Self {
        FaceThumbnail
    }

    fn compute(face: &RgbImage) -> Array1<f32> {
        let thumbnail = resize(face, THUMBNAIL_SIDE, THUMBNAIL_SIDE, FilterType::Triangle);
        let values: Array1<f32> = thumbnail
            .pixels()
            .flat_map(|p| p.0)
            .map(|v| v as f32 / 255.0)
            .collect();

        let mean = values.mean().unwrap_or(0.0);
        let centred = values - mean;
        if centred.dot(&centred).sqrt() < MIN_CENTRED_NORM {
            return Array1::zeros(centred.len());
        }
        l2_normalize(centred.view())
    }
}

#[async_trait]
impl FaceEmbedder for FaceThumbnail {
    fn name(&self) -> &'static str {
        "thumbnail"
    }

    async fn embed(&self, face: &RgbImage) -> Result<Array1<f32>, Error> {
        if face.width() == 0 || face.height() == 0 {
            return Err(Error::msg("face_thumbnail - image has no pixels"));
        }
        let face = face.clone();
        Ok(spawn_blocking(move || Self::compute(&face)).await?)
    }
}
