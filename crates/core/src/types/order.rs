//! Historical order records (read only).

use serde::{Deserialize, Serialize};

use super::{OrderId, Price, ProductId};

/// One purchased line of a past order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub price: Price,
    pub image_url: String,
}

/// A past purchase shown on the account page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// ISO date (`YYYY-MM-DD`) as stored in the profile document.
    pub date: String,
    pub total: Price,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Number of units across all items.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}
