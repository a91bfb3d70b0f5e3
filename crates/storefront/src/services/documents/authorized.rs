//! Store wrapper that keeps the caller's ID token valid.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use luna_moth_core::{Cart, ProfileUpdate, UserProfile};

use super::{DocumentError, DocumentStore};
use crate::services::identity::Identity;
use crate::services::tokens::TokenKeeper;

/// Calls the inner store with the freshest token for each sign-in.
///
/// A call rejected as unauthorized is retried once after a forced refresh.
pub struct AuthorizedDocuments {
    inner: Arc<dyn DocumentStore>,
    tokens: TokenKeeper,
}

impl AuthorizedDocuments {
    #[must_use]
    pub fn new(inner: Arc<dyn DocumentStore>, tokens: TokenKeeper) -> Self {
        Self { inner, tokens }
    }

    async fn renewed(&self, who: &Identity) -> Result<Identity, DocumentError> {
        tracing::debug!(uid = %who.uid, "token rejected, refreshing");
        self.tokens
            .renew(who)
            .await
            .map_err(|e| DocumentError::Unauthorized(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for AuthorizedDocuments {
    async fn get_profile(&self, who: &Identity) -> Result<Option<UserProfile>, DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.get_profile(&who).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.get_profile(&who).await
            }
            other => other,
        }
    }

    async fn create_profile(
        &self,
        who: &Identity,
        profile: &UserProfile,
    ) -> Result<(), DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.create_profile(&who, profile).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.create_profile(&who, profile).await
            }
            other => other,
        }
    }

    async fn update_profile(
        &self,
        who: &Identity,
        update: &ProfileUpdate,
    ) -> Result<(), DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.update_profile(&who, update).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.update_profile(&who, update).await
            }
            other => other,
        }
    }

    async fn get_cart(&self, who: &Identity) -> Result<Cart, DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.get_cart(&who).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.get_cart(&who).await
            }
            other => other,
        }
    }

    async fn set_cart(&self, who: &Identity, cart: &Cart) -> Result<(), DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.set_cart(&who, cart).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.set_cart(&who, cart).await
            }
            other => other,
        }
    }

    async fn count_visual_searches_since(
        &self,
        who: &Identity,
        since: DateTime<Utc>,
    ) -> Result<u32, DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.count_visual_searches_since(&who, since).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.count_visual_searches_since(&who, since).await
            }
            other => other,
        }
    }

    async fn log_visual_search(
        &self,
        who: &Identity,
        at: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        let who = self.tokens.current(who).await;
        match self.inner.log_visual_search(&who, at).await {
            Err(DocumentError::Unauthorized(_)) => {
                let who = self.renewed(&who).await?;
                self.inner.log_visual_search(&who, at).await
            }
            other => other,
        }
    }
}
