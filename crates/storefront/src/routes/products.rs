//! Product detail route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use luna_moth_core::Product;

use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::layout::{ProductCardView, Shell, price_range};
use crate::state::AppState;

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
    pub price: String,
    pub variants: Vec<VariantView>,
}

/// Variant display data for templates.
#[derive(Clone)]
pub struct VariantView {
    pub size: String,
    pub price: String,
    pub description: Option<String>,
    pub selected: bool,
}

impl ProductView {
    /// Build the view with `size` preselected, falling back to the first
    /// variant when the size is unknown.
    fn new(product: &Product, size: Option<&str>) -> Self {
        let selected = size
            .and_then(|s| product.variant(s))
            .or_else(|| product.default_variant())
            .map(|v| v.size.as_str());

        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            images: product.image_urls.clone(),
            price: price_range(&product.variants),
            variants: product
                .variants
                .iter()
                .map(|v| VariantView {
                    size: v.size.clone(),
                    price: v.price.to_string(),
                    description: v.description.clone(),
                    selected: Some(v.size.as_str()) == selected,
                })
                .collect(),
        }
    }

    /// Whether the size picker is worth showing.
    #[must_use]
    pub fn has_sizes(&self) -> bool {
        self.variants.len() > 1
    }

    /// The preselected variant.
    #[must_use]
    pub fn selected(&self) -> Option<&VariantView> {
        self.variants.iter().find(|v| v.selected)
    }
}

/// Product page query.
#[derive(Debug, Deserialize)]
pub struct ShowQuery {
    pub size: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub shell: Shell,
    pub product: ProductView,
    pub related_products: Vec<ProductCardView>,
}

/// Display product detail page.
#[instrument(skip(state, session, query))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Query(query): Query<ShowQuery>,
) -> Result<ProductShowTemplate> {
    let catalog = state.catalog();
    let product = catalog
        .find(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductShowTemplate {
        shell: Shell::load(&session).await?,
        product: ProductView::new(product, query.size.as_deref()),
        related_products: catalog
            .related(product)
            .into_iter()
            .map(ProductCardView::from)
            .collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_first_variant_selected_by_default() {
        let catalog = Catalog::bundled();
        let view = ProductView::new(catalog.find("7").unwrap(), None);
        assert!(view.has_sizes());
        assert_eq!(view.selected().unwrap().size, "Small");
        assert_eq!(view.price, "$25.00 - $35.00");
    }

    #[test]
    fn test_requested_size_selected() {
        let catalog = Catalog::bundled();
        let view = ProductView::new(catalog.find("7").unwrap(), Some("Large"));
        assert_eq!(view.selected().unwrap().price, "$35.00");
        assert_eq!(view.variants.iter().filter(|v| v.selected).count(), 1);

        let fallback = ProductView::new(catalog.find("7").unwrap(), Some("Huge"));
        assert_eq!(fallback.selected().unwrap().size, "Small");
    }

    #[test]
    fn test_single_variant_has_no_picker() {
        let catalog = Catalog::bundled();
        let view = ProductView::new(catalog.find("2").unwrap(), None);
        assert!(!view.has_sizes());
    }
}
