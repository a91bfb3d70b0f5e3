//! Response headers that lock pages down to the origins the shop uses.
//!
//! Pages load from this server plus two outside hosts, the htmx script on
//! unpkg and the product photos on Unsplash. Everything else is refused.

use std::sync::LazyLock;

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Where the htmx bundle in `base.html` is served from.
const SCRIPT_HOST: &str = "https://unpkg.com";

/// Product photos in the bundled catalog.
const IMAGE_HOST: &str = "https://images.unsplash.com";

/// `Content-Security-Policy`, assembled once.
static CONTENT_POLICY: LazyLock<HeaderValue> = LazyLock::new(|| {
    let images = format!("'self' {IMAGE_HOST}");
    let scripts = format!("'self' {SCRIPT_HOST}");
    let directives = [
        ("default-src", "'none'"),
        ("script-src", scripts.as_str()),
        ("style-src", "'self'"),
        ("img-src", images.as_str()),
        // htmx requests and the identifier upload
        ("connect-src", "'self'"),
        ("form-action", "'self'"),
        ("base-uri", "'self'"),
        ("frame-ancestors", "'none'"),
    ];
    let policy = directives
        .iter()
        .map(|(name, sources)| format!("{name} {sources}"))
        .collect::<Vec<_>>()
        .join("; ");
    HeaderValue::from_str(&policy).unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"))
});

/// Headers with fixed values.
const FIXED: [(HeaderName, &str); 5] = [
    (X_FRAME_OPTIONS, "DENY"),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        HeaderName::from_static("permissions-policy"),
        "camera=(), microphone=(), geolocation=(), payment=(), usb=()",
    ),
    (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
];

/// Apply the shop's header policy to every response.
///
/// Responses that set their own `Cache-Control` keep it; everything else
/// is marked `no-store`, since pages carry the signed-in user and cart.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in FIXED {
        headers.insert(name, HeaderValue::from_static(value));
    }
    headers.insert(CONTENT_SECURITY_POLICY, CONTENT_POLICY.clone());
    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}
