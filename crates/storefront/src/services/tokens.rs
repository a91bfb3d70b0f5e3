//! Keeps signed-in identities' ID tokens fresh.
//!
//! ID tokens expire an hour after sign-in, while a browser session lasts
//! much longer. The session keeps the identity it was given at sign-in;
//! this keeper holds the latest refreshed copy, keyed by the sign-in's
//! refresh token, and hands that out to document calls instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use moka::future::Cache;
use tracing::instrument;

use crate::services::identity::{Identity, IdentityError, IdentityProvider};

/// Refresh tokens this close to expiry before using them.
const REFRESH_MARGIN: TimeDelta = TimeDelta::minutes(5);

/// Forget identities not used for this long; the session copy takes over.
const IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Latest ID token per sign-in.
#[derive(Clone)]
pub struct TokenKeeper {
    identity: Arc<dyn IdentityProvider>,
    fresh: Cache<String, Identity>,
}

impl TokenKeeper {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            fresh: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(IDLE_TIMEOUT)
                .build(),
        }
    }

    /// The identity to call the store with for `who`.
    ///
    /// Refreshes when the token is about to expire. A failed refresh is
    /// logged and the current token is used anyway; the store decides.
    pub async fn current(&self, who: &Identity) -> Identity {
        let latest = self.latest(who).await;
        if !latest.expires_within(REFRESH_MARGIN, Utc::now()) {
            return latest;
        }
        match self.refresh(who.sign_in_key(), &latest).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::warn!(uid = %who.uid, error = %e, "proactive token refresh failed");
                latest
            }
        }
    }

    /// Refresh `who` now, e.g. after the store rejected its token.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, `SessionExpired` when the refresh
    /// token was revoked.
    pub async fn renew(&self, who: &Identity) -> Result<Identity, IdentityError> {
        let latest = self.latest(who).await;
        self.refresh(who.sign_in_key(), &latest).await
    }

    /// Stop tracking `who` and return its freshest identity. Used at sign-out.
    pub async fn release(&self, who: &Identity) -> Identity {
        self.fresh
            .remove(who.sign_in_key())
            .await
            .unwrap_or_else(|| who.clone())
    }

    async fn latest(&self, who: &Identity) -> Identity {
        match self.fresh.get(who.sign_in_key()).await {
            Some(cached) if cached.expires_at >= who.expires_at => cached,
            _ => who.clone(),
        }
    }

    /// Refresh `who` and remember the result under the session's `key`.
    /// The provider may hand out a new refresh token; the key stays put.
    #[instrument(skip_all, fields(uid = %who.uid))]
    async fn refresh(&self, key: &str, who: &Identity) -> Result<Identity, IdentityError> {
        let refreshed = self.identity.refresh(who).await?;
        self.fresh.insert(key.to_string(), refreshed.clone()).await;
        tracing::debug!(expires_at = %refreshed.expires_at, "ID token refreshed");
        Ok(refreshed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use luna_moth_core::Email;

    use super::*;
    use crate::services::identity::MemoryIdentityProvider;

    async fn setup() -> (Arc<MemoryIdentityProvider>, TokenKeeper, Identity) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let keeper = TokenKeeper::new(provider.clone());
        let who = provider
            .sign_up(&Email::parse("jade@example.com").unwrap(), "moonstone")
            .await
            .unwrap();
        (provider, keeper, who)
    }

    #[tokio::test]
    async fn test_fresh_token_is_used_as_is() {
        let (_provider, keeper, who) = setup().await;
        let current = keeper.current(&who).await;
        assert_eq!(current.id_token, who.id_token);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_and_remembered() {
        let (provider, keeper, mut who) = setup().await;
        who.expires_at = Utc::now() + TimeDelta::minutes(1);

        let first = keeper.current(&who).await;
        assert_ne!(first.id_token, who.id_token);
        assert!(provider.token_valid(&first.id_token).await);

        // The stale session copy maps to the refreshed token.
        let second = keeper.current(&who).await;
        assert_eq!(second.id_token, first.id_token);
    }

    #[tokio::test]
    async fn test_renew_after_rejection() {
        let (provider, keeper, who) = setup().await;
        provider.expire_id_tokens().await;

        let renewed = keeper.renew(&who).await.unwrap();
        assert!(provider.token_valid(&renewed.id_token).await);
        assert_eq!(keeper.release(&who).await.id_token, renewed.id_token);
        assert_eq!(keeper.release(&who).await.id_token, who.id_token);
    }

    #[tokio::test]
    async fn test_renew_after_sign_out_expires_session() {
        let (provider, keeper, who) = setup().await;
        provider.sign_out(&who).await.unwrap();

        let err = keeper.renew(&who).await.unwrap_err();
        assert!(matches!(err, IdentityError::SessionExpired));
    }
}
