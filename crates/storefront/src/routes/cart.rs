//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! The cart lives in the session; when a user is signed in every edit also
//! schedules a debounced write of the whole cart to the document store.
//!
//! Requests without an `HX-Request` header (plain form posts) are answered
//! with a redirect to the cart page instead of a fragment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use luna_moth_core::{Cart, CartLine, LineKey, ProductId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::models::Notice;
use crate::routes::layout::Shell;
use crate::services::session::{load_cart, push_notice, save_cart};
use crate::state::AppState;

/// Variant size that is not worth showing next to the product name.
const STANDARD_SIZE: &str = "Standard";

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: String,
    pub size: String,
    pub name: String,
    /// Size label, omitted for single-size products.
    pub size_label: Option<String>,
    pub image_url: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        let size = line.selected_variant.size.clone();
        Self {
            product_id: line.product.id.to_string(),
            size_label: (size != STANDARD_SIZE).then(|| size.clone()),
            size,
            name: line.product.name.clone(),
            image_url: line.product.primary_image().unwrap_or_default().to_string(),
            quantity: line.quantity,
            price: line.selected_variant.price.to_string(),
            line_price: line.line_total().to_string(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().iter().map(CartItemView::from).collect(),
            subtotal: cart.subtotal().to_string(),
            item_count: cart.item_count(),
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    /// Variant size; the first variant when omitted.
    #[serde(default)]
    pub size: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub size: String,
    /// Zero or below removes the line.
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
    pub size: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub shell: Shell,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Fragment with the updated cart, or a redirect for plain form posts.
fn cart_items_response(headers: &HeaderMap, cart: &Cart) -> Response {
    if is_htmx(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate {
                cart: CartView::from(cart),
            },
        )
            .into_response()
    } else {
        Redirect::to("/cart").into_response()
    }
}

/// Display cart page.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<CartShowTemplate> {
    let cart = load_cart(&session).await?;
    Ok(CartShowTemplate {
        shell: Shell::load(&session).await?,
        cart: CartView::from(&cart),
    })
}

/// Add one unit of a product variant to the cart.
///
/// Returns the count badge with an HTMX trigger so other cart widgets
/// refresh themselves.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = state
        .catalog()
        .find(&form.product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    let variant = match form.size.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(size) => product
            .variant(size)
            .ok_or_else(|| AppError::BadRequest(format!("unknown size {size}")))?,
        None => product
            .default_variant()
            .ok_or_else(|| AppError::BadRequest("product has no variants".to_string()))?,
    };

    let mut cart = load_cart(&session).await?;
    let quantity = cart.add(product, variant);
    save_cart(&state, &session, &cart).await?;
    tracing::debug!(product = %product.id, size = %variant.size, quantity, "added to cart");

    if is_htmx(&headers) {
        return Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response());
    }

    push_notice(&session, Notice::success(format!("{} added to cart.", product.name))).await?;
    Ok(Redirect::to("/cart").into_response())
}

/// Set the quantity of a cart line.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let key = LineKey::new(ProductId::new(form.product_id), form.size);
    let mut cart = load_cart(&session).await?;
    if cart.set_quantity(&key, form.quantity) {
        save_cart(&state, &session, &cart).await?;
    }
    Ok(cart_items_response(&headers, &cart))
}

/// Remove a cart line.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let key = LineKey::new(ProductId::new(form.product_id), form.size);
    let mut cart = load_cart(&session).await?;
    if cart.remove(&key) {
        save_cart(&state, &session, &cart).await?;
    }
    Ok(cart_items_response(&headers, &cart))
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<CartCountTemplate> {
    let cart = load_cart(&session).await?;
    Ok(CartCountTemplate {
        count: cart.item_count(),
    })
}

/// Checkout placeholder. The cart is kept as is.
#[instrument(skip(session))]
pub async fn checkout(session: Session) -> Result<Redirect> {
    push_notice(&session, Notice::info("Checkout is not yet implemented.")).await?;
    Ok(Redirect::to("/"))
}
