//! In-process document store for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use luna_moth_core::{Cart, ProfileUpdate, Role, UserId, UserProfile};

use super::{DocumentError, DocumentStore};
use crate::services::identity::{Identity, MemoryIdentityProvider};

#[derive(Default)]
struct UserDocuments {
    profile: Option<UserProfile>,
    cart: Option<Cart>,
    visual_searches: Vec<DateTime<Utc>>,
    cart_writes: usize,
}

/// Document store that keeps everything in memory.
///
/// Can be switched into a failing state to exercise the paths where the
/// remote store is unreachable. Expired tokens are refused, and with a
/// verifier so are tokens the identity provider no longer recognizes.
#[derive(Default)]
pub struct MemoryDocumentStore {
    users: Mutex<HashMap<UserId, UserDocuments>>,
    unavailable: AtomicBool,
    rejecting: AtomicBool,
    verifier: Option<Arc<MemoryIdentityProvider>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only accepts ID tokens currently valid at `provider`.
    #[must_use]
    pub fn verified_by(provider: Arc<MemoryIdentityProvider>) -> Self {
        Self {
            verifier: Some(provider),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Refuse every token as unauthorized (or stop refusing).
    pub fn set_rejecting_tokens(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Number of times the cart of `uid` has been written.
    pub async fn cart_writes(&self, uid: &UserId) -> usize {
        self.users
            .lock()
            .await
            .get(uid)
            .map_or(0, |docs| docs.cart_writes)
    }

    /// The stored cart of `uid`, bypassing the token check.
    pub async fn stored_cart(&self, uid: &UserId) -> Option<Cart> {
        self.users
            .lock()
            .await
            .get(uid)
            .and_then(|docs| docs.cart.clone())
    }

    /// The stored profile of `uid`.
    pub async fn stored_profile(&self, uid: &UserId) -> Option<UserProfile> {
        self.users
            .lock()
            .await
            .get(uid)
            .and_then(|docs| docs.profile.clone())
    }

    /// Seed or overwrite a profile, e.g. to grant the admin role.
    pub async fn put_profile(&self, profile: UserProfile) {
        let uid = profile.uid.clone();
        self.users.lock().await.entry(uid).or_default().profile = Some(profile);
    }

    /// Change the role of an existing profile. Returns false if there is none.
    pub async fn set_role(&self, uid: &UserId, role: Role) -> bool {
        self.users
            .lock()
            .await
            .get_mut(uid)
            .and_then(|docs| docs.profile.as_mut())
            .map(|profile| profile.role = role)
            .is_some()
    }

    /// Seed the remote cart of `uid`.
    pub async fn put_cart(&self, uid: &UserId, cart: Cart) {
        self.users.lock().await.entry(uid.clone()).or_default().cart = Some(cart);
    }

    async fn check(&self, who: &Identity) -> Result<(), DocumentError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DocumentError::Api {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(DocumentError::Unauthorized("permission denied".to_string()));
        }
        if who.expires_at <= Utc::now() {
            return Err(DocumentError::Unauthorized("ID token expired".to_string()));
        }
        if let Some(provider) = &self.verifier
            && !provider.token_valid(&who.id_token).await
        {
            return Err(DocumentError::Unauthorized("ID token not recognized".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_profile(&self, who: &Identity) -> Result<Option<UserProfile>, DocumentError> {
        self.check(who).await?;
        Ok(self.stored_profile(&who.uid).await)
    }

    async fn create_profile(
        &self,
        who: &Identity,
        profile: &UserProfile,
    ) -> Result<(), DocumentError> {
        self.check(who).await?;
        self.users
            .lock()
            .await
            .entry(who.uid.clone())
            .or_default()
            .profile = Some(profile.clone());
        Ok(())
    }

    async fn update_profile(
        &self,
        who: &Identity,
        update: &ProfileUpdate,
    ) -> Result<(), DocumentError> {
        self.check(who).await?;
        let mut users = self.users.lock().await;
        let profile = users
            .get_mut(&who.uid)
            .and_then(|docs| docs.profile.as_mut())
            .ok_or_else(|| DocumentError::Api {
                status: 404,
                message: format!("no profile for {}", who.uid),
            })?;
        profile.apply(update);
        Ok(())
    }

    async fn get_cart(&self, who: &Identity) -> Result<Cart, DocumentError> {
        self.check(who).await?;
        Ok(self.stored_cart(&who.uid).await.unwrap_or_default())
    }

    async fn set_cart(&self, who: &Identity, cart: &Cart) -> Result<(), DocumentError> {
        self.check(who).await?;
        let mut users = self.users.lock().await;
        let docs = users.entry(who.uid.clone()).or_default();
        docs.cart = Some(cart.clone());
        docs.cart_writes += 1;
        Ok(())
    }

    async fn count_visual_searches_since(
        &self,
        who: &Identity,
        since: DateTime<Utc>,
    ) -> Result<u32, DocumentError> {
        self.check(who).await?;
        let users = self.users.lock().await;
        let count = users.get(&who.uid).map_or(0, |docs| {
            docs.visual_searches.iter().filter(|at| **at >= since).count()
        });
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn log_visual_search(
        &self,
        who: &Identity,
        at: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        self.check(who).await?;
        self.users
            .lock()
            .await
            .entry(who.uid.clone())
            .or_default()
            .visual_searches
            .push(at);
        Ok(())
    }
}
