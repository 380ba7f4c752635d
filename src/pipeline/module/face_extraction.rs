use anyhow::Error;
use async_trait::async_trait;
use image::RgbImage;
use ndarray::Array1;

use crate::pipeline::model_config::config::FaceVerificationConfig;
use crate::pipeline::module::face_embedding::FaceEmbedder;
use crate::pipeline::triton_client::client::{
    InferInputTensor, InferRequestedOutputTensor, ModelConfigResponse, ModelInferRequest, ModelInferResponse,
    TritonInferenceClient,
};
use crate::pipeline::utils::image::{rgb_to_tensor, tensor_shape};

/// Face embedding served by a Triton model.
#[derive(Debug, Clone)]
pub struct FaceExtraction {
    triton_infer_client: TritonInferenceClient,
    model_name: String,
    input_name: String,
    input_datatype: String,
    output_name: Option<String>,
    batched: bool,
    config: FaceVerificationConfig,
}

impl FaceExtraction {
    pub fn new(
        triton_infer_client: TritonInferenceClient,
        triton_model_config: ModelConfigResponse,
        config: FaceVerificationConfig,
    ) -> Result<Self, Error> {
        let input = match triton_model_config.input.first() {
            None => {
                return Err(Error::msg("face_extraction - face extraction model config has no input"))
            }
            Some(input) => input,
        };

        if input.datatype() != "FP32" {
            return Err(Error::msg(format!(
                "face_extraction - unsupported input datatype {}",
                input.data_type
            )));
        }

        // Models without dynamic batching declare the batch dimension explicitly.
        let batched = triton_model_config.max_batch_size > 0 || input.dims.len() == 4;

        Ok(FaceExtraction {
            triton_infer_client,
            model_name: triton_model_config.name.clone(),
            input_name: input.name.clone(),
            input_datatype: input.datatype().to_string(),
            output_name: triton_model_config.output.first().map(|o| o.name.clone()),
            batched,
            config,
        })
    }

    fn _preprocess(&self, face: &RgbImage) -> ModelInferRequest {
        let tensor = rgb_to_tensor(face, self.config.layout, self.config.normalization);
        let mut shape = tensor_shape(&tensor);
        if !self.batched {
            shape.remove(0);
        }

        ModelInferRequest {
            inputs: vec![InferInputTensor {
                name: self.input_name.clone(),
                shape,
                datatype: self.input_datatype.clone(),
                data: tensor.iter().copied().collect(),
            }],
            outputs: self
                .output_name
                .iter()
                .map(|name| InferRequestedOutputTensor { name: name.clone() })
                .collect(),
        }
    }

    fn _postprocess(&self, response: ModelInferResponse) -> Result<Array1<f32>, Error> {
        let output = match self.output_name.as_deref() {
            Some(name) => response.outputs.into_iter().find(|o| o.name == name),
            None => response.outputs.into_iter().next(),
        };

        match output {
            None => Err(Error::msg("face_extraction - model returned no output tensor")),
            Some(output) if output.data.is_empty() => {
                Err(Error::msg("face_extraction - model returned an empty embedding"))
            }
            Some(output) if !output.shape.is_empty() && output.shape.iter().product::<i64>() != output.data.len() as i64 => {
                Err(Error::msg(format!(
                    "face_extraction - output shape {:?} does not match {} values",
                    output.shape,
                    output.data.len()
                )))
            }
            Some(output) => Ok(Array1::from_vec(output.data)),
        }
    }
}

#[async_trait]
impl FaceEmbedder for FaceExtraction {
    fn name(&self) -> &'static str {
        "triton"
    }

    async fn embed(&self, face: &RgbImage) -> Result<Array1<f32>, Error> {
        let request = self._preprocess(face);
        let response = self.triton_infer_client.model_infer(&self.model_name, &request).await?;
        self._postprocess(response)
    }

    async fn ready(&self) -> bool {
        self.triton_infer_client.server_ready().await
    }
}
