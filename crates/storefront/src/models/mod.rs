//! Domain models for storefront.
//!
//! Catalog, cart and profile types live in `luna-moth-core`; this module
//! holds the types that only make sense inside an HTTP session.

pub mod session;

pub use session::{CurrentUser, Notice, NoticeKind, keys as session_keys};
