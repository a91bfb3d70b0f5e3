//! Catalog records.
//!
//! Products are bundled with the storefront binary and never change at
//! runtime. They are also embedded in cart lines, so the serde layout here is
//! the layout of the persisted cart document (camelCase field names).

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// A purchasable size/price option of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Size label, e.g. "Standard" or "Medium".
    pub size: String,
    pub price: Price,
    /// Optional size hint shown under the variant picker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Priced variants; the catalog guarantees at least one.
    pub variants: Vec<ProductVariant>,
    pub description: String,
    pub image_urls: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub is_featured: bool,
}

impl Product {
    /// The cheapest variant price, used for "from $X" labels and price sorting.
    ///
    /// Returns `None` only for a product without variants.
    #[must_use]
    pub fn min_price(&self) -> Option<Price> {
        self.variants.iter().map(|v| v.price).min()
    }

    /// The variant shown preselected on the product page.
    #[must_use]
    pub fn default_variant(&self) -> Option<&ProductVariant> {
        self.variants.first()
    }

    /// Look up a variant by its size label.
    #[must_use]
    pub fn variant(&self, size: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.size == size)
    }

    /// First image, used for thumbnails.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}
