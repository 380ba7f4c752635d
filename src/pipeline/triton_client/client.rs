use std::time::Duration;

use anyhow::{Context, Error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Model metadata as returned by `GET /v2/models/{name}/config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfigResponse {
    pub name: String,
    #[serde(default)]
    pub max_batch_size: i64,
    #[serde(default)]
    pub input: Vec<ModelTensorConfig>,
    #[serde(default)]
    pub output: Vec<ModelTensorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTensorConfig {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub dims: Vec<i64>,
}

impl ModelTensorConfig {
    /// `TYPE_FP32` -> `FP32`, the spelling the inference protocol expects.
    pub fn datatype(&self) -> &str {
        self.data_type.strip_prefix("TYPE_").unwrap_or(&self.data_type)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInferRequest {
    pub inputs: Vec<InferInputTensor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<InferRequestedOutputTensor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferInputTensor {
    pub name: String,
    pub shape: Vec<i64>,
    pub datatype: String,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferRequestedOutputTensor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInferResponse {
    pub outputs: Vec<InferOutputTensor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferOutputTensor {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<i64>,
    pub data: Vec<f32>,
}

/// Client for a Triton server's KServe v2 HTTP/JSON endpoint.
#[derive(Debug, Clone)]
pub struct TritonInferenceClient {
    client: Client,
    base_url: String,
}

impl TritonInferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build triton http client")?;

        Ok(TritonInferenceClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn server_ready(&self) -> bool {
        let url = format!("{}/v2/health/ready", self.base_url);
        match self.client.get(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn model_config(&self, model_name: &str) -> Result<ModelConfigResponse, Error> {
        let url = format!("{}/v2/models/{}/config", self.base_url, model_name);
        let config = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<ModelConfigResponse>()
            .await?;
        Ok(config)
    }

    pub async fn model_infer(&self, model_name: &str, request: &ModelInferRequest) -> Result<ModelInferResponse, Error> {
        let url = format!("{}/v2/models/{}/infer", self.base_url, model_name);
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<ModelInferResponse>()
            .await?;
        Ok(response)
    }
}

/// Whether an error chain bottoms out in an HTTP timeout.
pub fn is_timeout(e: &Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(reqwest::Error::is_timeout)
}
