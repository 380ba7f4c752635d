use axum::extract::DefaultBodyLimit;
use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use crate::handler::verify_handler::{healthcheck, verify_image};
use crate::state::verify_state::VerifyState;

pub fn new_verify_route(max_upload_size: usize) -> Router<VerifyState> {

    let router = Router::new()
        .route("/verify", post(verify_image))
        .route("/health", get(healthcheck))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size));
    router
}
