//! In-process identity provider for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use luna_moth_core::{Email, UserId};

use super::{Identity, IdentityError, IdentityProvider, MIN_PASSWORD_LENGTH};

struct Account {
    uid: UserId,
    email: Email,
    password: String,
    disabled: bool,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    /// ID token -> expiry.
    id_tokens: HashMap<String, DateTime<Utc>>,
    /// Refresh token -> account email.
    refresh_tokens: HashMap<String, String>,
}

/// Identity provider that keeps accounts in memory.
///
/// Follows the same rules as the hosted provider: unique emails, a minimum
/// password length, a generic error for unknown email or wrong password and
/// short-lived ID tokens renewed with a refresh token.
pub struct MemoryIdentityProvider {
    accounts: Mutex<Accounts>,
    token_lifetime: TimeDelta,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self {
            accounts: Mutex::default(),
            token_lifetime: TimeDelta::hours(1),
        }
    }
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an ID token was issued here and has not expired or been
    /// signed out.
    pub async fn token_valid(&self, id_token: &str) -> bool {
        self.accounts
            .lock()
            .await
            .id_tokens
            .get(id_token)
            .is_some_and(|expires_at| *expires_at > Utc::now())
    }

    /// Expire every ID token issued so far. Refresh tokens stay usable.
    pub async fn expire_id_tokens(&self) {
        let past = Utc::now() - TimeDelta::seconds(1);
        for expires_at in self.accounts.lock().await.id_tokens.values_mut() {
            *expires_at = past;
        }
    }

    /// Disable an account so further sign-ins fail.
    pub async fn disable(&self, email: &Email) -> bool {
        let mut accounts = self.accounts.lock().await;
        accounts
            .by_email
            .get_mut(email.as_str())
            .map(|account| account.disabled = true)
            .is_some()
    }

    /// The uid assigned to an account.
    pub async fn uid(&self, email: &Email) -> Option<UserId> {
        self.accounts
            .lock()
            .await
            .by_email
            .get(email.as_str())
            .map(|account| account.uid.clone())
    }

    /// Number of sign-ins not yet signed out.
    pub async fn active_sessions(&self) -> usize {
        self.accounts.lock().await.refresh_tokens.len()
    }

    fn issue(
        &self,
        accounts: &mut Accounts,
        uid: UserId,
        email: Email,
        refresh_token: Option<String>,
    ) -> Identity {
        let id_token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + self.token_lifetime;
        accounts.id_tokens.insert(id_token.clone(), expires_at);

        let refresh_token = refresh_token.unwrap_or_else(|| {
            let token = Uuid::new_v4().simple().to_string();
            accounts
                .refresh_tokens
                .insert(token.clone(), email.as_str().to_string());
            token
        });

        Identity {
            uid,
            email,
            id_token,
            refresh_token,
            expires_at,
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword);
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.by_email.contains_key(email.as_str()) {
            return Err(IdentityError::EmailExists);
        }

        let uid = UserId::new(Uuid::new_v4().simple().to_string());
        accounts.by_email.insert(
            email.as_str().to_string(),
            Account {
                uid: uid.clone(),
                email: email.clone(),
                password: password.to_string(),
                disabled: false,
            },
        );
        Ok(self.issue(&mut accounts, uid, email.clone(), None))
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        let mut accounts = self.accounts.lock().await;
        let (uid, email) = match accounts.by_email.get(email.as_str()) {
            Some(account) if account.disabled => return Err(IdentityError::UserDisabled),
            Some(account) if account.password == password => {
                (account.uid.clone(), account.email.clone())
            }
            _ => return Err(IdentityError::InvalidCredentials),
        };
        Ok(self.issue(&mut accounts, uid, email, None))
    }

    async fn refresh(&self, identity: &Identity) -> Result<Identity, IdentityError> {
        let mut accounts = self.accounts.lock().await;
        let Some(key) = accounts.refresh_tokens.get(&identity.refresh_token) else {
            return Err(IdentityError::SessionExpired);
        };
        let (uid, email) = match accounts.by_email.get(key) {
            Some(account) if account.disabled => return Err(IdentityError::UserDisabled),
            Some(account) => (account.uid.clone(), account.email.clone()),
            None => return Err(IdentityError::SessionExpired),
        };

        accounts.id_tokens.remove(&identity.id_token);
        Ok(self.issue(
            &mut accounts,
            uid,
            email,
            Some(identity.refresh_token.clone()),
        ))
    }

    async fn sign_out(&self, identity: &Identity) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.lock().await;
        accounts.id_tokens.remove(&identity.id_token);
        accounts.refresh_tokens.remove(&identity.refresh_token);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::parse("jade@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryIdentityProvider::new();
        let created = provider.sign_up(&email(), "moonstone").await.unwrap();
        let signed_in = provider.sign_in(&email(), "moonstone").await.unwrap();

        assert_eq!(created.uid, signed_in.uid);
        assert_ne!(created.id_token, signed_in.id_token);
        assert_eq!(provider.active_sessions().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up(&email(), "moonstone").await.unwrap();
        let err = provider.sign_up(&email(), "another1").await.unwrap_err();
        assert!(matches!(err, IdentityError::EmailExists));
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let provider = MemoryIdentityProvider::new();
        let err = provider.sign_up(&email(), "12345").await.unwrap_err();
        assert!(matches!(err, IdentityError::WeakPassword));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up(&email(), "moonstone").await.unwrap();

        let wrong = provider.sign_in(&email(), "sunstone").await.unwrap_err();
        let unknown = provider
            .sign_in(&Email::parse("nobody@example.com").unwrap(), "moonstone")
            .await
            .unwrap_err();
        assert!(matches!(wrong, IdentityError::InvalidCredentials));
        assert!(matches!(unknown, IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_disabled_account_and_sign_out() {
        let provider = MemoryIdentityProvider::new();
        let identity = provider.sign_up(&email(), "moonstone").await.unwrap();
        provider.sign_out(&identity).await.unwrap();
        assert_eq!(provider.active_sessions().await, 0);

        assert!(provider.disable(&email()).await);
        let err = provider.sign_in(&email(), "moonstone").await.unwrap_err();
        assert!(matches!(err, IdentityError::UserDisabled));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_id_token() {
        let provider = MemoryIdentityProvider::new();
        let identity = provider.sign_up(&email(), "moonstone").await.unwrap();
        provider.expire_id_tokens().await;
        assert!(!provider.token_valid(&identity.id_token).await);

        let refreshed = provider.refresh(&identity).await.unwrap();
        assert_eq!(refreshed.uid, identity.uid);
        assert_eq!(refreshed.sign_in_key(), identity.sign_in_key());
        assert_ne!(refreshed.id_token, identity.id_token);
        assert!(provider.token_valid(&refreshed.id_token).await);
        assert!(refreshed.expires_at > Utc::now());
        assert_eq!(provider.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_after_sign_out_or_disable_fails() {
        let provider = MemoryIdentityProvider::new();
        let first = provider.sign_up(&email(), "moonstone").await.unwrap();
        let second = provider.sign_in(&email(), "moonstone").await.unwrap();

        provider.sign_out(&first).await.unwrap();
        let err = provider.refresh(&first).await.unwrap_err();
        assert!(matches!(err, IdentityError::SessionExpired));

        provider.disable(&email()).await;
        let err = provider.refresh(&second).await.unwrap_err();
        assert!(matches!(err, IdentityError::UserDisabled));
    }
}
