use axum::debug_handler;
use axum::extract::{Multipart, State};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use log::{error, info};

use crate::error::errors::Error;
use crate::logger::logger::set_request_fields;
use crate::middleware::request_id_mw::request_id;
use crate::models::verify_model::{HealthOutput, VerificationInput, VerificationResultOutput};
use crate::pipeline::model_config::config::{is_allowed_extension, ALLOWED_EXTENSIONS};
use crate::response::common_response::{BaseResponse, GeneralResponseBuilder, GeneralResponseResult};
use crate::state::verify_state::VerifyState;

pub const FILE_FIELD: &str = "file";

#[debug_handler(state = VerifyState)]
pub async fn verify_image(headers: HeaderMap, State(state): State<VerifyState>, mut payload: Multipart) -> GeneralResponseResult<VerificationResultOutput> {
    let request_id = request_id(&headers);
    let _log_fields = set_request_fields(&request_id);

    info!("received verification request");

    let mut filename: Option<String> = None;
    let mut im_bytes: Option<Bytes> = None;

    loop {
        let field = match payload.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!("failed to read multipart body: {e}");
                return Err(Error::bad_request(e.body_text()))
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        filename = field.file_name().map(str::to_string);
        match field.bytes().await {
            Ok(data) => {
                im_bytes = Some(data);
            }
            Err(e) => {
                error!("failed to retrieve image from request: {e}");
                return Err(Error::bad_request(e.body_text()))
            }
        };
    }

    let filename = match filename {
        Some(filename) if !filename.is_empty() => filename,
        _ => return Err(Error::bad_request("No filename provided")),
    };

    if !is_allowed_extension(&filename) {
        return Err(Error::bad_request(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let input = VerificationInput {
        filename,
        im_bytes: im_bytes.unwrap_or_default(),
    };

    let result = state.verify_service.verify_image(input).await?;
    info!("completed verification request");

    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(result)
        .build()
    )
}

#[debug_handler(state = VerifyState)]
pub async fn healthcheck(headers: HeaderMap, State(state): State<VerifyState>) -> GeneralResponseResult<BaseResponse<HealthOutput>> {
    let request_id = request_id(&headers);
    let health = state.verify_service.health().await;

    Ok(GeneralResponseBuilder::new()
        .status_code(StatusCode::OK)
        .body(BaseResponse::ok(health, request_id))
        .build())
}
