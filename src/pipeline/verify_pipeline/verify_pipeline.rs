use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use bytes::Bytes;
use image::RgbImage;
use log::{debug, info, warn};
use ndarray::Array1;
use serde::Serialize;
use tokio::task::{spawn_blocking, JoinError};

use crate::config::settings::{EmbedderBackend, Settings};
use crate::pipeline::model_config::config::FaceVerificationConfig;
use crate::pipeline::module::face_embedding::FaceEmbedder;
use crate::pipeline::module::face_extraction::FaceExtraction;
use crate::pipeline::module::face_thumbnail::FaceThumbnail;
use crate::pipeline::module::reference_database::{ReferenceDatabase, ReferenceImage};
use crate::pipeline::processing::distance::find_distance;
use crate::pipeline::triton_client::client::{is_timeout, TritonInferenceClient};
use crate::pipeline::utils::image::{byte_data_to_rgb, load_rgb, resize_rgb};
use crate::pipeline::utils::utils::round_to;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Image decoding failed: {0}")]
    InvalidImage(String),

    #[error("Verification failed: {0}")]
    DatabaseUnavailable(String),

    #[error("face embedding failed: {0}")]
    Embedding(Error),

    #[error("inference server timed out: {0}")]
    UpstreamTimeout(Error),

    #[error("background task failed: {0}")]
    Join(#[from] JoinError),
}

impl PipelineError {
    fn from_embedding(e: Error) -> Self {
        if is_timeout(&e) {
            PipelineError::UpstreamTimeout(e)
        } else {
            PipelineError::Embedding(e)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceVerificationResult {
    pub is_match: bool,
    /// Percentage, two decimals. Zero when nothing matched.
    pub confidence: f64,
    pub matched_image: String,
    pub distance: Option<f64>,
    pub compared: usize,
}

impl FaceVerificationResult {
    fn new() -> FaceVerificationResult {
        FaceVerificationResult {
            is_match: false,
            confidence: 0.0,
            matched_image: String::new(),
            distance: None,
            compared: 0,
        }
    }
}

pub struct VerifyPipeline {
    embedder: Arc<dyn FaceEmbedder>,
    reference_database: ReferenceDatabase,
    config: FaceVerificationConfig,
}

impl VerifyPipeline {
    pub async fn new(settings: &Settings) -> Result<Self, Error> {
        let config = FaceVerificationConfig::from_settings(&settings.verifier);

        let embedder: Arc<dyn FaceEmbedder> = match settings.verifier.backend {
            EmbedderBackend::Thumbnail => Arc::new(FaceThumbnail::new()),
            EmbedderBackend::Triton => {
                let triton = match &settings.triton {
                    Some(triton) => triton,
                    None => return Err(Error::msg("triton backend selected but [triton] is not configured")),
                };
                let timeout = Duration::from_secs(triton.timeout.unwrap_or(20));
                let triton_infer_client = TritonInferenceClient::new(&triton.base_url(), timeout)?;

                // Query face embedding model config
                let model_config = triton_infer_client.model_config(&config.model_name).await?;
                Arc::new(FaceExtraction::new(triton_infer_client, model_config, config.clone())?)
            }
        };

        info!(
            "face verification uses {} embedder, model {}, metric {:?}, threshold {}",
            embedder.name(),
            config.model_name,
            config.distance_metric,
            config.threshold
        );

        Ok(Self::with_embedder(embedder, config, &settings.database_dir))
    }

    pub fn with_embedder(
        embedder: Arc<dyn FaceEmbedder>,
        config: FaceVerificationConfig,
        database_dir: impl Into<PathBuf>,
    ) -> Self {
        VerifyPipeline {
            embedder,
            reference_database: ReferenceDatabase::new(database_dir),
            config,
        }
    }

    pub fn embedder_name(&self) -> &'static str {
        self.embedder.name()
    }

    pub async fn embedder_ready(&self) -> bool {
        self.embedder.ready().await
    }

    pub fn reference_database(&self) -> &ReferenceDatabase {
        &self.reference_database
    }

    async fn prepare_upload(&self, im_bytes: Bytes) -> Result<RgbImage, PipelineError> {
        let image_size = self.config.image_size;
        let decoded = spawn_blocking(move || {
            byte_data_to_rgb(&im_bytes).map(|img| resize_rgb(&img, image_size))
        })
        .await?;

        decoded.map_err(|e| PipelineError::InvalidImage(e.to_string()))
    }

    async fn reference_embedding(&self, image: &ReferenceImage) -> Result<Arc<Array1<f32>>, Error> {
        if let Some(embedding) = self.reference_database.cached_embedding(image).await {
            return Ok(embedding);
        }

        let path = image.path.clone();
        let image_size = self.config.image_size;
        let face = spawn_blocking(move || load_rgb(&path).map(|img| resize_rgb(&img, image_size))).await??;

        let embedding = Arc::new(self.embedder.embed(&face).await?);
        self.reference_database.store_embedding(image, Arc::clone(&embedding)).await;
        Ok(embedding)
    }

    /// Compares the uploaded image with every reference image and reports the
    /// most confident verified match.
    pub async fn verify(&self, im_bytes: Bytes) -> Result<FaceVerificationResult, PipelineError> {
        let face = self.prepare_upload(im_bytes).await?;
        let source = self.embedder.embed(&face).await.map_err(PipelineError::from_embedding)?;
        drop(face);

        let images = self.reference_database.list_images().await?;
        self.reference_database.retain(&images).await;

        let mut result = FaceVerificationResult::new();
        let mut highest_confidence = 0.0;

        for image in &images {
            let target = match self.reference_embedding(image).await {
                Ok(target) => target,
                Err(e) => {
                    warn!("error comparing with {}: {e:#}", image.path.display());
                    continue;
                }
            };

            if target.len() != source.len() {
                warn!(
                    "error comparing with {}: embedding length {} does not match {}",
                    image.path.display(),
                    target.len(),
                    source.len()
                );
                continue;
            }
            result.compared += 1;

            let distance = find_distance(source.view(), target.view(), self.config.distance_metric);
            let confidence = 1.0 - distance;
            debug!("distance to {} is {distance:.4}", image.name);

            if distance <= self.config.threshold && confidence > highest_confidence {
                highest_confidence = confidence;
                result.is_match = true;
                result.confidence = round_to(confidence * 100.0, 2);
                result.matched_image = image.name.clone();
                result.distance = Some(distance);
            }
        }

        Ok(result)
    }
}
