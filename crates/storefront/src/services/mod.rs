//! Business logic services for storefront.
//!
//! # Services
//!
//! - `identity` - Email/password accounts with the hosted identity provider
//! - `documents` - Profiles, remote carts and the visual search log
//! - `oracle` - Generative AI crystal suggestions and identification
//! - `cart_sync` - Debounced write-behind of session carts
//! - `account` - Profile and cart loading at sign-in
//! - `session` - Auth state transitions and the session cart
//! - `tokens` - ID token refresh for long-lived sessions
//! - `visual_search` - Daily image identification quota

pub mod account;
pub mod cart_sync;
pub mod documents;
pub mod identity;
pub mod oracle;
pub mod session;
pub mod tokens;
pub mod visual_search;
