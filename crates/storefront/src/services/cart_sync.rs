//! Debounced write-behind of session carts to the document store.
//!
//! The session cart is authoritative while the user browses; the remote cart
//! only has to catch up. Each edit schedules a write carrying the full cart
//! snapshot after a quiet period. An edit that arrives before the period
//! ends supersedes the scheduled write, so a burst of edits produces one
//! write with the final state.
//!
//! Writes from a sign-in are refused until [`CartSynchronizer::mark_loaded`]
//! has recorded that the remote cart was read for it. Otherwise an edit made
//! while the initial load is in flight could overwrite the stored cart with
//! an empty one.
//!
//! One user can be signed in from several browsers at once. Each sign-in is
//! tracked separately (by its refresh token), so signing out of one leaves
//! the others syncing. All of them share the user's remote cart and its
//! single pending write.
//!
//! Supersession is tracked with a generation number per scheduled write. A
//! timer that wakes up with a stale generation does nothing. Writes already
//! in flight are not cancelled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::instrument;

use luna_moth_core::{Cart, UserId};

use crate::services::documents::DocumentStore;
use crate::services::identity::Identity;

/// Schedules remote cart writes per user.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartSynchronizerInner>,
}

struct CartSynchronizerInner {
    documents: Arc<dyn DocumentStore>,
    debounce: Duration,
    state: Mutex<SyncState>,
}

#[derive(Default)]
struct SyncState {
    /// Monotonic across users, so a user who signs out and back in never
    /// reuses a generation an old timer is still holding.
    next_generation: u64,
    users: HashMap<UserId, UserSync>,
}

#[derive(Default)]
struct UserSync {
    /// Sign-ins whose remote cart has been loaded.
    sessions: HashSet<String>,
    generation: u64,
    pending: Option<(Identity, Cart)>,
}

impl CartSynchronizer {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(CartSynchronizerInner {
                documents,
                debounce,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// The quiet period before a scheduled write fires.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Record that the initial remote load for this sign-in has completed.
    pub async fn mark_loaded(&self, identity: &Identity) {
        let mut state = self.inner.state.lock().await;
        state
            .users
            .entry(identity.uid.clone())
            .or_default()
            .sessions
            .insert(identity.sign_in_key().to_string());
    }

    /// Whether writes are currently accepted from this sign-in.
    pub async fn is_loaded(&self, identity: &Identity) -> bool {
        self.inner
            .state
            .lock()
            .await
            .users
            .get(&identity.uid)
            .is_some_and(|user| user.sessions.contains(identity.sign_in_key()))
    }

    /// Schedule a write of `cart` for the signed-in user.
    ///
    /// Returns `false` (and schedules nothing) before the initial load of
    /// this sign-in.
    #[instrument(skip(self, identity, cart), fields(uid = %identity.uid, lines = cart.len()))]
    pub async fn schedule(&self, identity: &Identity, cart: Cart) -> bool {
        let generation = {
            let mut state = self.inner.state.lock().await;
            state.next_generation += 1;
            let generation = state.next_generation;
            let Some(user) = state
                .users
                .get_mut(&identity.uid)
                .filter(|user| user.sessions.contains(identity.sign_in_key()))
            else {
                tracing::debug!("cart write skipped, remote cart not loaded yet");
                return false;
            };
            user.generation = generation;
            user.pending = Some((identity.clone(), cart));
            generation
        };

        let this = self.clone();
        let uid = identity.uid.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.debounce).await;
            this.fire(&uid, generation).await;
        });
        true
    }

    /// Sign-out: stop accepting writes from this sign-in and drop a pending
    /// write it made. Other sign-ins of the same user are unaffected.
    pub async fn forget(&self, identity: &Identity) {
        let mut state = self.inner.state.lock().await;
        let Some(user) = state.users.get_mut(&identity.uid) else {
            return;
        };
        user.sessions.remove(identity.sign_in_key());

        let own_pending = user
            .pending
            .as_ref()
            .is_some_and(|(from, _)| from.sign_in_key() == identity.sign_in_key());
        if own_pending {
            user.pending = None;
            tracing::debug!(uid = %identity.uid, "dropped pending cart write on sign-out");
        }

        if user.sessions.is_empty() {
            state.users.remove(&identity.uid);
        }
    }

    /// Write every pending snapshot now. Used on shutdown.
    pub async fn flush_all(&self) {
        let jobs: Vec<(Identity, Cart)> = {
            let mut state = self.inner.state.lock().await;
            state
                .users
                .values_mut()
                .filter_map(|user| user.pending.take())
                .collect()
        };
        if !jobs.is_empty() {
            tracing::info!(count = jobs.len(), "flushing pending cart writes");
        }
        for (identity, cart) in jobs {
            self.write(&identity, &cart).await;
        }
    }

    async fn fire(&self, uid: &UserId, generation: u64) {
        let job = {
            let mut state = self.inner.state.lock().await;
            match state.users.get_mut(uid) {
                Some(user) if user.generation == generation => user.pending.take(),
                _ => None,
            }
        };
        if let Some((identity, cart)) = job {
            self.write(&identity, &cart).await;
        }
    }

    async fn write(&self, identity: &Identity, cart: &Cart) {
        match self.inner.documents.set_cart(identity, cart).await {
            Ok(()) => tracing::debug!(uid = %identity.uid, lines = cart.len(), "cart synced"),
            Err(e) => {
                // The session still holds the cart; the next edit retries.
                tracing::error!(uid = %identity.uid, error = %e, "failed to sync cart");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use luna_moth_core::Email;

    use super::*;
    use crate::catalog::Catalog;
    use crate::services::documents::{AuthorizedDocuments, MemoryDocumentStore};
    use crate::services::identity::{IdentityProvider, MemoryIdentityProvider};
    use crate::services::tokens::TokenKeeper;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    /// A sign-in of user `u1`; `device` tells sign-ins apart.
    fn signed_in_on(device: &str) -> Identity {
        Identity {
            uid: UserId::new("u1"),
            email: Email::parse("jade@example.com").unwrap(),
            id_token: format!("token-{device}"),
            refresh_token: format!("refresh-{device}"),
            expires_at: Utc::now() + TimeDelta::hours(1),
        }
    }

    fn identity() -> Identity {
        signed_in_on("laptop")
    }

    fn setup() -> (Arc<MemoryDocumentStore>, CartSynchronizer) {
        let store = Arc::new(MemoryDocumentStore::new());
        let sync = CartSynchronizer::new(store.clone(), DEBOUNCE);
        (store, sync)
    }

    fn cart_with(ids: &[&str]) -> Cart {
        let catalog = Catalog::bundled();
        let mut cart = Cart::new();
        for id in ids {
            let product = catalog.find(id).unwrap();
            cart.add(product, product.default_variant().unwrap());
        }
        cart
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_writes_once_with_final_state() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;

        assert!(sync.schedule(&who, cart_with(&["1"])).await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(sync.schedule(&who, cart_with(&["1", "2"])).await);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.cart_writes(&who.uid).await, 0);

        tokio::time::sleep(DEBOUNCE).await;
        assert_eq!(store.cart_writes(&who.uid).await, 1);
        assert_eq!(store.stored_cart(&who.uid).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_apart_write_separately() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;

        sync.schedule(&who, cart_with(&["1"])).await;
        tokio::time::sleep(DEBOUNCE * 2).await;
        sync.schedule(&who, cart_with(&["3"])).await;
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(store.cart_writes(&who.uid).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_skipped_before_initial_load() {
        let (store, sync) = setup();
        let who = identity();

        assert!(!sync.schedule(&who, cart_with(&["1"])).await);
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(store.cart_writes(&who.uid).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_drops_pending_write() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;

        sync.schedule(&who, cart_with(&["1"])).await;
        sync.forget(&who).await;
        assert!(!sync.is_loaded(&who).await);

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(store.cart_writes(&who.uid).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_after_sign_in_again_does_nothing() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;
        sync.schedule(&who, cart_with(&["1"])).await;
        sync.forget(&who).await;

        // Signed back in with a different cart before the old timer fires.
        let again = signed_in_on("laptop-again");
        sync.mark_loaded(&again).await;
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(store.cart_writes(&who.uid).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_sign_in_keeps_syncing_after_one_signs_out() {
        let (store, sync) = setup();
        let laptop = signed_in_on("laptop");
        let phone = signed_in_on("phone");
        sync.mark_loaded(&laptop).await;
        sync.mark_loaded(&phone).await;

        sync.forget(&laptop).await;
        assert!(!sync.is_loaded(&laptop).await);
        assert!(sync.is_loaded(&phone).await);

        assert!(sync.schedule(&phone, cart_with(&["2"])).await);
        assert!(!sync.schedule(&laptop, cart_with(&["5"])).await);
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(store.cart_writes(&phone.uid).await, 1);
        assert_eq!(store.stored_cart(&phone.uid).await, Some(cart_with(&["2"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_keeps_pending_write_of_other_sign_in() {
        let (store, sync) = setup();
        let laptop = signed_in_on("laptop");
        let phone = signed_in_on("phone");
        sync.mark_loaded(&laptop).await;
        sync.mark_loaded(&phone).await;

        sync.schedule(&phone, cart_with(&["3"])).await;
        sync.forget(&laptop).await;
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(store.cart_writes(&phone.uid).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_writes_pending_immediately() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;
        sync.schedule(&who, cart_with(&["4"])).await;

        sync.flush_all().await;
        assert_eq!(store.cart_writes(&who.uid).await, 1);

        // The timer finds nothing left to write.
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(store.cart_writes(&who.uid).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_logged_not_retried() {
        let (store, sync) = setup();
        let who = identity();
        sync.mark_loaded(&who).await;
        store.set_unavailable(true);

        sync.schedule(&who, cart_with(&["1"])).await;
        tokio::time::sleep(DEBOUNCE * 2).await;

        store.set_unavailable(false);
        assert_eq!(store.cart_writes(&who.uid).await, 0);
        assert!(sync.is_loaded(&who).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_write_then_later_edit_is_written() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let store = Arc::new(MemoryDocumentStore::verified_by(provider.clone()));
        let documents = AuthorizedDocuments::new(store.clone(), TokenKeeper::new(provider.clone()));
        let sync = CartSynchronizer::new(Arc::new(documents), DEBOUNCE);
        let who = provider
            .sign_up(&Email::parse("jade@example.com").unwrap(), "moonstone")
            .await
            .unwrap();
        sync.mark_loaded(&who).await;

        store.set_rejecting_tokens(true);
        sync.schedule(&who, cart_with(&["1"])).await;
        tokio::time::sleep(DEBOUNCE * 2).await;
        assert_eq!(store.cart_writes(&who.uid).await, 0);
        assert!(sync.is_loaded(&who).await);

        // An hour later the session's token has expired too.
        store.set_rejecting_tokens(false);
        provider.expire_id_tokens().await;
        sync.schedule(&who, cart_with(&["1", "6"])).await;
        tokio::time::sleep(DEBOUNCE * 2).await;

        assert_eq!(store.cart_writes(&who.uid).await, 1);
        assert_eq!(store.stored_cart(&who.uid).await.unwrap().len(), 2);
    }
}
