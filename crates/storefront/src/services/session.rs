//! Session bootstrap and the session cart.
//!
//! The browser session holds the signed-in user and the cart. Sign-in and
//! sign-out go through [`on_auth_state_changed`], which keeps the session,
//! the cart synchronizer and error tracking consistent with each other.

use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;
use tracing::instrument;

use luna_moth_core::Cart;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, Notice, session_keys};
use crate::services::account::{LoadedAccount, load_account};
use crate::services::identity::Identity;
use crate::state::AppState;

/// Shown when the account could not be loaded after a successful sign-in.
pub const ACCOUNT_LOAD_FAILED: &str =
    "We couldn't load your account right now. Please try signing in again.";

/// Outcome of an auth state change.
#[derive(Debug)]
pub enum AuthTransition {
    /// Profile and remote cart loaded; the session now holds both.
    SignedIn(Box<CurrentUser>),
    /// Session cleared.
    SignedOut,
    /// Loading the account failed; the session was left signed out.
    FailedOpen { message: &'static str },
}

/// Apply a sign-in (`Some`) or sign-out (`None`) to the session.
///
/// On sign-in the remote cart replaces the session cart and the user is
/// marked loaded so later edits are synced. A failure while loading leaves
/// the session signed out with an empty cart instead of failing the request.
///
/// # Errors
///
/// Returns an error only if the session itself cannot be updated.
#[instrument(skip_all, fields(signing_in = identity.is_some()))]
pub async fn on_auth_state_changed(
    state: &AppState,
    session: &Session,
    identity: Option<Identity>,
) -> Result<AuthTransition, SessionError> {
    let Some(identity) = identity else {
        sign_out_session(state, session).await?;
        return Ok(AuthTransition::SignedOut);
    };

    match load_account(state.documents(), &identity).await {
        Ok(LoadedAccount { profile, cart }) => {
            // New privilege level, new session id.
            session.cycle_id().await?;
            let user = CurrentUser { identity, profile };
            session.insert(session_keys::CURRENT_USER, &user).await?;
            session.insert(session_keys::CART, &cart).await?;
            state.cart_sync().mark_loaded(&user.identity).await;

            set_sentry_user(&user.identity.uid, Some(user.identity.email.as_str()));
            tracing::info!(lines = cart.len(), "signed in, remote cart loaded");
            Ok(AuthTransition::SignedIn(Box::new(user)))
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "failed to load account");
            state.cart_sync().forget(&identity).await;
            session.remove_value(session_keys::CURRENT_USER).await?;
            session.insert(session_keys::CART, Cart::new()).await?;
            Ok(AuthTransition::FailedOpen {
                message: ACCOUNT_LOAD_FAILED,
            })
        }
    }
}

/// Clear the user and the cart. No remote write is made for the cleared
/// cart, and a pending write from this session is dropped. The user's
/// other sessions keep syncing.
async fn sign_out_session(state: &AppState, session: &Session) -> Result<(), SessionError> {
    let previous: Option<CurrentUser> = session.remove(session_keys::CURRENT_USER).await?;
    session.remove_value(session_keys::CART).await?;
    if let Some(user) = previous {
        state.cart_sync().forget(&user.identity).await;
        let identity = state.tokens().release(&user.identity).await;
        if let Err(e) = state.identity().sign_out(&identity).await {
            tracing::warn!(error = %e, "identity provider sign-out failed");
        }
        tracing::info!(uid = %user.identity.uid, "signed out");
    }
    clear_sentry_user();
    Ok(())
}

/// The signed-in user, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn current_user(session: &Session) -> Result<Option<CurrentUser>, SessionError> {
    session.get(session_keys::CURRENT_USER).await
}

/// Replace the session copy of the user, e.g. after a profile edit.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn store_user(session: &Session, user: &CurrentUser) -> Result<(), SessionError> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// The session cart; empty when none has been stored.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart, SessionError> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the edited cart and, when signed in, schedule a remote write.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn save_cart(state: &AppState, session: &Session, cart: &Cart) -> Result<(), SessionError> {
    session.insert(session_keys::CART, cart).await?;
    if let Some(user) = current_user(session).await? {
        state.cart_sync().schedule(&user.identity, cart.clone()).await;
    }
    Ok(())
}

/// Queue a notice for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn push_notice(session: &Session, notice: Notice) -> Result<(), SessionError> {
    session.insert(session_keys::NOTICE, notice).await
}

/// Take the queued notice, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_notice(session: &Session) -> Result<Option<Notice>, SessionError> {
    session.remove(session_keys::NOTICE).await
}
