//! Tags each request with an id that shows up in logs, Sentry and the
//! `x-request-id` response header.
//!
//! An id forwarded by a proxy in front of the shop is reused when it looks
//! sane, so one id follows the request across hops.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Forwarded ids longer than this are replaced.
const MAX_FORWARDED_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// The forwarded id, or a new one.
    #[must_use]
    pub fn for_request(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|id| Self::acceptable(id))
            .map_or_else(
                || Self(Uuid::new_v4().simple().to_string()),
                |id| Self(id.to_string()),
            )
    }

    fn acceptable(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= MAX_FORWARDED_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Run the rest of the stack inside a span carrying the request id.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let id = RequestId::for_request(request.headers());
    sentry::configure_scope(|scope| scope.set_tag("request_id", id.as_str()));

    let span = tracing::info_span!("request", request_id = %id.as_str());
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
