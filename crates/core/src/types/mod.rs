//! Core types for Luna Moth.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use order::{Order, OrderItem};
pub use price::Price;
pub use product::{Product, ProductVariant};
pub use user::{ProfileUpdate, Role, UserProfile};
