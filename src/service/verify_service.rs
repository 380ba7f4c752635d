use std::sync::Arc;
use log::{error, info};
use opentelemetry::global;
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry::KeyValue;

use crate::models::verify_model::{HealthOutput, VerificationInput, VerificationResultOutput};
use crate::pipeline::verify_pipeline::verify_pipeline::{PipelineError, VerifyPipeline};
use crate::tracer::tracer::TRACER_NAME;

#[derive(Clone)]
pub struct VerifyService {
    verify_pipeline: Arc<VerifyPipeline>,
}

impl VerifyService {
    pub fn new(verify_pipeline: &Arc<VerifyPipeline>) -> Self {
        VerifyService {
            verify_pipeline: Arc::clone(verify_pipeline),
        }
    }

    pub async fn verify_image(&self, input: VerificationInput) -> Result<VerificationResultOutput, PipelineError> {
        let tracer = global::tracer(TRACER_NAME);
        let mut span = tracer.start("verify_image");
        span.set_attribute(KeyValue::new("upload.filename", input.filename.clone()));
        span.set_attribute(KeyValue::new("upload.size", input.im_bytes.len() as i64));

        let result = match self.verify_pipeline.verify(input.im_bytes).await {
            Ok(result) => result,
            Err(e) => {
                error!("failed to verify {}: {e}", input.filename);
                span.set_status(Status::error(e.to_string()));
                span.end();
                return Err(e)
            }
        };

        span.set_attribute(KeyValue::new("verification.match", result.is_match));
        span.set_attribute(KeyValue::new("verification.compared", result.compared as i64));
        if let Some(distance) = result.distance {
            span.set_attribute(KeyValue::new("verification.distance", distance));
        }
        span.end();

        info!(
            "verified {} against {} references: match={} confidence={} matched_image={} distance={:?}",
            input.filename, result.compared, result.is_match, result.confidence, result.matched_image, result.distance
        );

        Ok(VerificationResultOutput {
            is_match: result.is_match,
            confidence: result.confidence,
            matched_image: result.matched_image,
        })
    }

    pub async fn health(&self) -> HealthOutput {
        let reference_database = self.verify_pipeline.reference_database();
        HealthOutput {
            embedder: self.verify_pipeline.embedder_name().to_string(),
            embedder_ready: self.verify_pipeline.embedder_ready().await,
            database_dir: reference_database.database_dir().display().to_string(),
            database_available: reference_database.is_available().await,
            cached_embeddings: reference_database.cached_count().await,
        }
    }
}
