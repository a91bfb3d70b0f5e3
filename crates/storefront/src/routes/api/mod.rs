//! JSON API routes.
//!
//! Read-only views of the session cart and the catalog for scripts and
//! debugging. Pages never depend on them.

use axum::{Json, extract::State};
use serde::Serialize;
use tower_sessions::Session;

use luna_moth_core::{CartLine, Price, Product};

use crate::error::Result;
use crate::services::session::load_cart;
use crate::state::AppState;

/// Cart snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: Price,
}

/// `GET /api/cart`
pub async fn cart(session: Session) -> Result<Json<CartResponse>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartResponse {
        item_count: cart.item_count(),
        subtotal: cart.subtotal(),
        lines: cart.into_lines(),
    }))
}

/// `GET /api/products`
pub async fn products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog().all().to_vec())
}
