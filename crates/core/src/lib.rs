//! Luna Moth Core - Shared domain types and rules.
//!
//! This crate provides the types used by the storefront and its tests:
//! - [`types`] - Newtype IDs, email, prices, catalog records and orders
//! - [`cart`] - Cart lines, line identity and the cart mutation rules
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async. Remote persistence of the cart is the storefront's job;
//! this crate only decides what the cart looks like after each edit.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartLine, LineKey};
pub use types::*;
