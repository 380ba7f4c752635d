use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assigns a fresh request id unless the caller already supplied a usable one.
pub async fn generate_request_id_mw(mut req: Request, next: Next) -> impl IntoResponse {
    let has_request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .is_some_and(|value| value.to_str().is_ok_and(|v| !v.is_empty()));

    if !has_request_id {
        let request_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            req.headers_mut().insert(header::HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
    }

    next.run(req).await
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
