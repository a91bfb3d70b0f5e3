//! Email/password identity.
//!
//! The storefront never stores passwords. Accounts live with a hosted
//! identity provider; a successful sign-in yields an [`Identity`] whose ID
//! token authorizes document store calls for that user.
//!
//! ID tokens are short-lived. The refresh token obtained at sign-in stays
//! valid until sign-out and is exchanged for new ID tokens through
//! [`IdentityProvider::refresh`].

mod error;
mod firebase;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use luna_moth_core::{Email, UserId};

pub use error::IdentityError;
pub use firebase::FirebaseAuthClient;
pub use memory::MemoryIdentityProvider;

/// Minimum password length accepted by the provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A signed-in user as reported by the identity provider.
///
/// Stored in the session; `Debug` redacts both tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned user id.
    pub uid: UserId,
    /// Account email.
    pub email: Email,
    /// Short-lived bearer token for the document store.
    pub id_token: String,
    /// Long-lived token for obtaining new ID tokens. One per sign-in.
    pub refresh_token: String,
    /// When `id_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Whether the ID token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, margin: TimeDelta, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + margin
    }

    /// Key identifying the sign-in this identity came from.
    ///
    /// The session copy of an identity keeps its key for the life of the
    /// sign-in, even if a refresh hands out a new refresh token. Secret;
    /// never log it.
    #[must_use]
    pub fn sign_in_key(&self) -> &str {
        &self.refresh_token
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Hosted email/password authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError>;

    /// Sign in to an existing account.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError>;

    /// Exchange the refresh token for a new ID token.
    ///
    /// The returned identity keeps the uid and email of `identity`.
    async fn refresh(&self, identity: &Identity) -> Result<Identity, IdentityError>;

    /// End the provider-side session, if the provider keeps one.
    async fn sign_out(&self, identity: &Identity) -> Result<(), IdentityError>;
}

/// Provider used when no identity backend is configured.
///
/// Every call fails with [`IdentityError::NotConfigured`], so the pages still
/// render and explain that sign-in is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredIdentityProvider;

#[async_trait]
impl IdentityProvider for UnconfiguredIdentityProvider {
    async fn sign_up(&self, _email: &Email, _password: &str) -> Result<Identity, IdentityError> {
        Err(IdentityError::NotConfigured)
    }

    async fn sign_in(&self, _email: &Email, _password: &str) -> Result<Identity, IdentityError> {
        Err(IdentityError::NotConfigured)
    }

    async fn refresh(&self, _identity: &Identity) -> Result<Identity, IdentityError> {
        Err(IdentityError::NotConfigured)
    }

    async fn sign_out(&self, _identity: &Identity) -> Result<(), IdentityError> {
        Ok(())
    }
}
