//! Per-user document storage.
//!
//! Three kinds of documents are kept per user:
//!
//! - `users/{uid}` - the [`UserProfile`]
//! - `carts/{uid}` - the remote cart, `{ items: [CartLine, ...] }`
//! - `users/{uid}/visualSearches/*` - one entry per image identification
//!
//! Every call is made on behalf of a signed-in [`Identity`], whose token
//! authorizes access to that user's documents only. Handlers go through
//! [`AuthorizedDocuments`], which refreshes tokens as they expire.

mod authorized;
mod firestore;
mod memory;
pub mod value;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use luna_moth_core::{Cart, ProfileUpdate, UserProfile};

use crate::services::identity::Identity;

pub use authorized::AuthorizedDocuments;
pub use firestore::FirestoreClient;
pub use memory::MemoryDocumentStore;

/// Errors that can occur when reading or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No document store is configured for this deployment.
    #[error("document store is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The token was rejected or lacks access to the document.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the store.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A document did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Storage for profiles, carts and visual search logs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the profile; `None` when it does not exist yet.
    async fn get_profile(&self, who: &Identity) -> Result<Option<UserProfile>, DocumentError>;

    /// Create (or overwrite) the profile.
    async fn create_profile(
        &self,
        who: &Identity,
        profile: &UserProfile,
    ) -> Result<(), DocumentError>;

    /// Apply a partial update to an existing profile.
    async fn update_profile(
        &self,
        who: &Identity,
        update: &ProfileUpdate,
    ) -> Result<(), DocumentError>;

    /// Fetch the remote cart; empty when missing.
    async fn get_cart(&self, who: &Identity) -> Result<Cart, DocumentError>;

    /// Replace the remote cart.
    async fn set_cart(&self, who: &Identity, cart: &Cart) -> Result<(), DocumentError>;

    /// Number of visual searches logged at or after `since`.
    async fn count_visual_searches_since(
        &self,
        who: &Identity,
        since: DateTime<Utc>,
    ) -> Result<u32, DocumentError>;

    /// Record one visual search.
    async fn log_visual_search(&self, who: &Identity, at: DateTime<Utc>)
    -> Result<(), DocumentError>;
}

/// Store used when no backend is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredDocumentStore;

#[async_trait]
impl DocumentStore for UnconfiguredDocumentStore {
    async fn get_profile(&self, _who: &Identity) -> Result<Option<UserProfile>, DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn create_profile(
        &self,
        _who: &Identity,
        _profile: &UserProfile,
    ) -> Result<(), DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn update_profile(
        &self,
        _who: &Identity,
        _update: &ProfileUpdate,
    ) -> Result<(), DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn get_cart(&self, _who: &Identity) -> Result<Cart, DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn set_cart(&self, _who: &Identity, _cart: &Cart) -> Result<(), DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn count_visual_searches_since(
        &self,
        _who: &Identity,
        _since: DateTime<Utc>,
    ) -> Result<u32, DocumentError> {
        Err(DocumentError::NotConfigured)
    }

    async fn log_visual_search(
        &self,
        _who: &Identity,
        _at: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        Err(DocumentError::NotConfigured)
    }
}
