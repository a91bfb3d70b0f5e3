//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (oracle form, featured products)
//! GET  /health                 - Health check
//!
//! # Catalog
//! GET  /inventory              - Inventory (category, q, sort, visible)
//! GET  /products/{id}          - Product detail (?size= preselects a variant)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove line (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /checkout               - Checkout placeholder
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Account
//! GET  /account                - Profile and order history
//! POST /account/profile        - Save first and last name (requires auth)
//!
//! # Oracle (rate limited)
//! POST /oracle/suggest         - Text suggestion (fragment)
//! GET  /identify               - Stone identifier page
//! POST /identify               - Identify an uploaded photo (requires auth)
//!
//! # JSON
//! GET  /api/cart               - Session cart snapshot
//! GET  /api/products           - Catalog
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod home;
pub mod identify;
pub mod inventory;
pub mod layout;
pub mod oracle;
pub mod products;

use std::convert::Infallible;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    auth_rate_limiter, create_session_layer, oracle_rate_limiter, request_id_middleware,
    security_headers_middleware,
};
use crate::services::oracle::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Upload body limit: the image plus room for the multipart framing.
const IDENTIFY_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
}

/// Create the JSON API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(api::cart))
        .route("/products", get(api::products))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let oracle_limiter = oracle_rate_limiter();

    Router::new()
        // Home page
        .route("/", get(home::home))
        // Catalog
        .route("/inventory", get(inventory::index))
        .route("/products/{id}", get(products::show))
        // Cart routes
        .nest("/cart", cart_routes())
        .route("/checkout", post(cart::checkout))
        // Auth routes
        .nest("/auth", auth_routes())
        // Account routes
        .nest("/account", account_routes())
        // Oracle
        .route(
            "/oracle/suggest",
            post(oracle::suggest).layer(oracle_limiter.clone()),
        )
        .route(
            "/identify",
            get(identify::page).merge(
                post(identify::identify)
                    .layer::<_, Infallible>(DefaultBodyLimit::max(IDENTIFY_BODY_LIMIT))
                    .layer(oracle_limiter),
            ),
        )
        // JSON API
        .nest("/api", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Build the complete application: routes, static files and middleware.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// the rate limiters can fall back to the peer address.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
