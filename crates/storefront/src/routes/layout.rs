//! Data shared by every full page: header, cart badge and toast.

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;

use luna_moth_core::{Product, ProductVariant};

use crate::models::Notice;
use crate::services::session::{current_user, load_cart, take_notice};

/// Layout data for `base.html`.
#[derive(Clone)]
pub struct Shell {
    /// Greeting name of the signed-in user.
    pub user_name: Option<String>,
    pub cart_count: u32,
    /// One-shot toast, consumed by this render.
    pub notice: Option<Notice>,
}

impl Shell {
    /// Read the layout data from the session, consuming any pending notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read.
    pub async fn load(session: &Session) -> Result<Self, SessionError> {
        let user = current_user(session).await?;
        let cart = load_cart(session).await?;
        Ok(Self {
            user_name: user.map(|u| u.greeting_name().to_string()),
            cart_count: cart.item_count(),
            notice: take_notice(session).await?,
        })
    }
}

/// A product tile in a grid.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub price: String,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image_url: product.primary_image().unwrap_or_default().to_string(),
            price: price_range(&product.variants),
        }
    }
}

/// `$25.00` for one variant, `$25.00 - $35.00` for several.
#[must_use]
pub fn price_range(variants: &[ProductVariant]) -> String {
    let min = variants.iter().map(|v| v.price).min();
    let max = variants.iter().map(|v| v.price).max();
    match (min, max) {
        (Some(min), Some(max)) if variants.len() > 1 => format!("{min} - {max}"),
        (Some(min), _) => min.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_price_range() {
        let catalog = Catalog::bundled();
        assert_eq!(price_range(&catalog.find("2").unwrap().variants), "$25.00");
        assert_eq!(
            price_range(&catalog.find("7").unwrap().variants),
            "$25.00 - $35.00"
        );
        assert_eq!(price_range(&[]), "");
    }

    #[test]
    fn test_card_uses_first_image() {
        let catalog = Catalog::bundled();
        let product = catalog.find("1").unwrap();
        let card = ProductCardView::from(product);
        assert_eq!(card.image_url, product.image_urls[0]);
        assert_eq!(card.id, "1");
    }
}
