//! Cart lines and the rules for editing them.
//!
//! A line is identified by `(product id, variant size)`. Adding a selection
//! that matches an existing line bumps its quantity; a different size of the
//! same product is a separate line. Setting a quantity to zero or below
//! removes the line, there is no "saved for later" state.
//!
//! The serde layout of [`CartLine`] is the layout of the remote cart
//! document: the product fields flattened, plus `quantity`,
//! `selectedVariant` and the composite `cartId`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Price, Product, ProductId, ProductVariant};

/// Identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: String,
}

impl LineKey {
    #[must_use]
    pub fn new(product_id: ProductId, size: impl Into<String>) -> Self {
        Self {
            product_id,
            size: size.into(),
        }
    }
}

/// Renders the persisted `cartId`, e.g. `7-Medium`.
impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.product_id, self.size)
    }
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub selected_variant: ProductVariant,
    pub cart_id: String,
}

impl CartLine {
    fn new(product: &Product, variant: &ProductVariant) -> Self {
        let key = LineKey::new(product.id.clone(), variant.size.clone());
        Self {
            product: product.clone(),
            quantity: 1,
            selected_variant: variant.clone(),
            cart_id: key.to_string(),
        }
    }

    /// The line's identity.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.selected_variant.size.clone())
    }

    /// Variant price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.selected_variant.price.times(self.quantity)
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.product.id == key.product_id && self.selected_variant.size == key.size
    }
}

/// The shopping cart. Lines keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from persisted lines.
    ///
    /// Lines with a zero quantity are dropped and lines sharing an identity are
    /// merged, so a hand-edited or stale document still yields a valid cart.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            let key = line.key();
            if let Some(existing) = cart.lines.iter_mut().find(|l| l.matches(&key)) {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            } else {
                cart.lines.push(CartLine {
                    cart_id: key.to_string(),
                    ..line
                });
            }
        }
        cart
    }

    /// Add one unit of `variant` of `product`.
    ///
    /// Returns the quantity of the affected line after the edit.
    pub fn add(&mut self, product: &Product, variant: &ProductVariant) -> u32 {
        let key = LineKey::new(product.id.clone(), variant.size.clone());
        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(&key)) {
            line.quantity = line.quantity.saturating_add(1);
            return line.quantity;
        }
        self.lines.push(CartLine::new(product, variant));
        1
    }

    /// Set a line's quantity; zero or below removes the line.
    ///
    /// Returns `false` when no line has this key.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(key);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|l| l.matches(key)) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns `false` when no line has this key.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(key));
        self.lines.len() != before
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Replace the whole cart (remote state wins on sign-in).
    pub fn replace_with(&mut self, other: Self) {
        *self = other;
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(key))
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total units across all lines (the header badge).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of variant price times quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}
