use std::sync::Arc;
use std::time::Duration;

use axum::{Json, middleware, Router};
use axum::http::header;
use http::{Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use crate::config::settings::Settings;
use crate::middleware::api_key_mw::{validate_api_key_mw, API_KEY_HEADER};
use crate::middleware::request_id_mw::{generate_request_id_mw, REQUEST_ID_HEADER};
use crate::pipeline::verify_pipeline::verify_pipeline::VerifyPipeline;
use crate::routes::verify::new_verify_route;
use crate::state::verify_state::VerifyState;

#[derive(Clone, Serialize, Deserialize)]
struct FallbackResponse {
    message: String,
}

#[derive(Clone)]
pub struct RouterState {
    verify_pipeline: Arc<VerifyPipeline>,
    api_key: Option<Arc<str>>,
    request_timeout: Duration,
    max_upload_size: usize,
}

impl RouterState {
    pub fn new(verify_pipeline: VerifyPipeline, settings: &Settings) -> Self {
        RouterState {
            verify_pipeline: Arc::new(verify_pipeline),
            api_key: settings.api_key().map(Arc::from),
            request_timeout: Duration::from_secs(settings.request_timeout()),
            max_upload_size: settings.max_upload_size(),
        }
    }
}

pub fn root_routes(router_state: RouterState) -> Router {

    let verify_state = VerifyState::new(&router_state.verify_pipeline);
    let verify_route = new_verify_route(router_state.max_upload_size)
        .with_state(verify_state);

    // Layers wrap only what is already registered, and the request id layers
    // sit outside the timeout so a 408 still carries the header.
    Router::new()
        .merge(verify_route)
        .fallback(fallback)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn_with_state(router_state.api_key.clone(), validate_api_key_mw))
        .layer(TimeoutLayer::new(router_state.request_timeout))
        .layer(CorsLayer::permissive().allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS]))
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(middleware::from_fn(generate_request_id_mw))
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::HeaderName::from_static(API_KEY_HEADER),
        ]))
}

async fn fallback(uri: Uri) -> (StatusCode, Json<FallbackResponse>) {
    (StatusCode::NOT_FOUND, Json(FallbackResponse {
        message: format!("No route for {uri}"),
    }))
}

#[cfg(test)]
mod tests {
    use std::fs::write;
    use async_trait::async_trait;
    use image::RgbImage;
    use ndarray::Array1;
    use crate::pipeline::module::face_embedding::FaceEmbedder;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use image::ImageFormat;
    use serde_json::Value;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;
    use crate::pipeline::model_config::config::FaceVerificationConfig;
    use crate::pipeline::module::face_thumbnail::FaceThumbnail;
    use crate::pipeline::utils::image::test_images::{encode, gradient, inverted};
    use crate::pipeline::verify_pipeline::verify_pipeline::tests::{reference_dir, FailOnCallEmbedder};
    use super::*;

    const BOUNDARY: &str = "verify-test-boundary";

    struct SlowEmbedder;

    #[async_trait]
    impl FaceEmbedder for SlowEmbedder {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn embed(&self, _face: &RgbImage) -> Result<Array1<f32>, anyhow::Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Array1::zeros(192))
        }
    }

    fn app(dir: &TempDir, api_key: Option<&str>, max_upload_size: Option<usize>) -> Router {
        let mut settings = Settings::new().unwrap();
        settings.server.api_key = api_key.map(str::to_string);
        settings.server.max_upload_size = max_upload_size;

        let pipeline = VerifyPipeline::with_embedder(
            Arc::new(FaceThumbnail::new()),
            FaceVerificationConfig::new(),
            dir.path(),
        );
        root_routes(RouterState::new(pipeline, &settings))
    }

    fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{field}\"; filename=\"{filename}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn verify_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/verify")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_verify_known_reference() {
        let dir = reference_dir();
        let upload = encode(&gradient(120, 120), ImageFormat::Png);

        let response = app(&dir, None, None)
            .oneshot(verify_request(multipart_body("file", Some("upload.png"), &upload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let body = json_body(response).await;
        assert_eq!(body["match"], true);
        assert_eq!(body["matched_image"], "alice.png");
        let confidence = body["confidence"].as_f64().unwrap();
        assert!(confidence > 0.0 && confidence <= 100.0);
    }

    #[tokio::test]
    async fn test_verify_no_match() {
        let dir = tempdir().unwrap();
        write(dir.path().join("alice.png"), encode(&gradient(120, 120), ImageFormat::Png)).unwrap();
        let upload = encode(&inverted(120, 120), ImageFormat::Jpeg);

        let response = app(&dir, None, None)
            .oneshot(verify_request(multipart_body("file", Some("upload.JPG"), &upload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body, serde_json::json!({"match": false, "confidence": 0.0, "matched_image": ""}));
    }

    #[tokio::test]
    async fn test_verify_rejects_unsupported_extension() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(verify_request(multipart_body("file", Some("notes.txt"), b"hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Invalid file type. Allowed types: .png, .jpg, .jpeg");
    }

    #[tokio::test]
    async fn test_verify_requires_file_field() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(verify_request(multipart_body("image", Some("upload.png"), b"hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "No filename provided");
    }

    #[tokio::test]
    async fn test_verify_rejects_undecodable_image() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(verify_request(multipart_body("file", Some("upload.png"), b"not an image")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().starts_with("Image decoding failed:"));
    }

    #[tokio::test]
    async fn test_verify_missing_database() {
        let dir = tempdir().unwrap();
        let missing_path = dir.path().join("missing");

        let pipeline = VerifyPipeline::with_embedder(
            Arc::new(FaceThumbnail::new()),
            FaceVerificationConfig::new(),
            &missing_path,
        );
        let app = root_routes(RouterState::new(pipeline, &Settings::new().unwrap()));
        let upload = encode(&gradient(64, 64), ImageFormat::Png);

        let response = app
            .oneshot(verify_request(multipart_body("file", Some("upload.png"), &upload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            format!("Verification failed: Database directory {} does not exist", missing_path.display())
        );
    }

    #[tokio::test]
    async fn test_verify_rejects_oversized_upload() {
        let dir = reference_dir();
        let response = app(&dir, None, Some(1024))
            .oneshot(verify_request(multipart_body("file", Some("upload.png"), &[0u8; 4096])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_api_key() {
        let dir = reference_dir();
        let app = app(&dir, Some("secret"), None);

        let missing = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(Request::builder().uri("/health").header(API_KEY_HEADER, "nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        let ok = app
            .oneshot(Request::builder().uri("/health").header(API_KEY_HEADER, "secret").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(REQUEST_ID_HEADER, "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-7");

        let body = json_body(response).await;
        assert_eq!(body["request_id"], "req-7");
        assert_eq!(body["data"]["embedder"], "thumbnail");
        assert_eq!(body["data"]["database_available"], true);
    }

    #[tokio::test]
    async fn test_fallback() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["message"], "No route for /nowhere");
    }

    #[tokio::test]
    async fn test_fallback_carries_request_id() {
        let dir = reference_dir();
        let response = app(&dir, None, None)
            .oneshot(
                Request::builder()
                    .uri("/nowhere")
                    .header(REQUEST_ID_HEADER, "req-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-9");
    }

    #[tokio::test]
    async fn test_verify_request_timeout() {
        let dir = reference_dir();
        let pipeline = VerifyPipeline::with_embedder(
            Arc::new(SlowEmbedder),
            FaceVerificationConfig::new(),
            dir.path(),
        );
        let mut state = RouterState::new(pipeline, &Settings::new().unwrap());
        state.request_timeout = Duration::from_millis(50);

        let mut request = verify_request(multipart_body(
            "file",
            Some("upload.png"),
            &encode(&gradient(64, 64), ImageFormat::Png),
        ));
        request.headers_mut().insert(REQUEST_ID_HEADER, http::HeaderValue::from_static("req-slow"));

        let response = root_routes(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-slow");
    }

    #[tokio::test]
    async fn test_verify_skips_reference_that_fails_to_embed() {
        let dir = reference_dir();
        let pipeline = VerifyPipeline::with_embedder(
            Arc::new(FailOnCallEmbedder::new(2)),
            FaceVerificationConfig::new(),
            dir.path(),
        );
        let app = root_routes(RouterState::new(pipeline, &Settings::new().unwrap()));
        let upload = encode(&inverted(120, 120), ImageFormat::Png);

        let response = app
            .oneshot(verify_request(multipart_body("file", Some("upload.png"), &upload)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["match"], true);
        assert_eq!(body["matched_image"], "bob.jpg");
    }
}
