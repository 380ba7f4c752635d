use std::sync::Arc;
use crate::pipeline::verify_pipeline::verify_pipeline::VerifyPipeline;
use crate::service::verify_service::VerifyService;

#[derive(Clone)]
pub struct VerifyState {
    pub verify_service: VerifyService,
}

impl VerifyState {
    pub fn new(pipeline: &Arc<VerifyPipeline>) -> Self {
        Self {
            verify_service: VerifyService::new(pipeline),
        }
    }
}
