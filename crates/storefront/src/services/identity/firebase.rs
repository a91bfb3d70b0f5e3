//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! # Endpoints
//!
//! - `POST /v1/accounts:signUp?key=...` - create an account
//! - `POST /v1/accounts:signInWithPassword?key=...` - password sign-in
//! - `POST securetoken.googleapis.com/v1/token?key=...` - refresh an ID token
//!
//! The first two return the user's `localId` (our `UserId`), an `idToken`
//! used as the bearer token for Firestore and a `refreshToken`. ID tokens
//! last an hour.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use luna_moth_core::{Email, UserId};

use super::{Identity, IdentityError, IdentityProvider};
use crate::config::FirebaseConfig;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Lifetime assumed when the provider omits `expiresIn`.
const DEFAULT_TOKEN_SECONDS: i64 = 3600;

/// Identity Toolkit client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    inner: Arc<FirebaseAuthClientInner>,
}

struct FirebaseAuthClientInner {
    client: reqwest::Client,
    base_url: String,
    secure_token_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

/// Secure Token response; note the snake case.
#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuthClient {
    /// Create a client for the configured project.
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        Self::with_base_urls(config, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL)
    }

    /// Create a client against different endpoints (e.g. the auth emulator).
    #[must_use]
    pub fn with_base_urls(
        config: &FirebaseConfig,
        identity_toolkit_url: &str,
        secure_token_url: &str,
    ) -> Self {
        Self {
            inner: Arc::new(FirebaseAuthClientInner {
                client: reqwest::Client::new(),
                base_url: identity_toolkit_url.trim_end_matches('/').to_string(),
                secure_token_url: secure_token_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
            }),
        }
    }

    #[instrument(skip(self, email, password), fields(email = %email))]
    async fn password_call(
        &self,
        method: &str,
        email: &Email,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        let url = format!(
            "{}/accounts:{method}?key={}",
            self.inner.base_url,
            urlencoding::encode(self.inner.api_key.expose_secret())
        );
        let response = self
            .inner
            .client
            .post(&url)
            .json(&PasswordRequest {
                email: email.as_str(),
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(IdentityError::TooManyAttempts);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_error_body(&body));
        }

        let parsed: PasswordResponse = serde_json::from_str(&body)
            .map_err(|e| IdentityError::Provider(format!("unexpected response: {e}")))?;

        let email = parsed
            .email
            .as_deref()
            .and_then(|e| Email::parse(e).ok())
            .unwrap_or_else(|| email.clone());

        Ok(Identity {
            uid: UserId::new(parsed.local_id),
            email,
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            expires_at: Utc::now() + token_lifetime(parsed.expires_in.as_deref()),
        })
    }
}

/// Parse `expiresIn` (seconds, as a string).
fn token_lifetime(expires_in: Option<&str>) -> TimeDelta {
    let seconds = expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_SECONDS);
    TimeDelta::seconds(seconds)
}

/// Turn an Identity Toolkit error body into an [`IdentityError`].
fn parse_error_body(body: &str) -> IdentityError {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| IdentityError::Provider(body.chars().take(200).collect()),
        |envelope| IdentityError::from_provider_code(&envelope.error.message),
    )
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, IdentityError> {
        self.password_call("signInWithPassword", email, password)
            .await
    }

    #[instrument(skip(self, identity), fields(uid = %identity.uid))]
    async fn refresh(&self, identity: &Identity) -> Result<Identity, IdentityError> {
        let url = format!(
            "{}/token?key={}",
            self.inner.secure_token_url,
            urlencoding::encode(self.inner.api_key.expose_secret())
        );
        let response = self
            .inner
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", identity.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_error_body(&body));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| IdentityError::Provider(format!("unexpected response: {e}")))?;
        if parsed.user_id != identity.uid.as_str() {
            return Err(IdentityError::Provider(
                "refreshed token belongs to another user".to_string(),
            ));
        }

        tracing::debug!("ID token refreshed");
        Ok(Identity {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            id_token: parsed.id_token,
            refresh_token: parsed.refresh_token,
            expires_at: Utc::now() + token_lifetime(parsed.expires_in.as_deref()),
        })
    }

    async fn sign_out(&self, identity: &Identity) -> Result<(), IdentityError> {
        // ID tokens are stateless; dropping the session is the sign-out.
        tracing::debug!(uid = %identity.uid, "signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_body() {
        let body = r#"{
            "error": {
                "code": 400,
                "message": "EMAIL_EXISTS",
                "errors": [{"message": "EMAIL_EXISTS", "domain": "global", "reason": "invalid"}]
            }
        }"#;
        assert!(matches!(parse_error_body(body), IdentityError::EmailExists));
    }

    #[test]
    fn test_parse_error_body_not_json() {
        assert!(matches!(
            parse_error_body("<html>bad gateway</html>"),
            IdentityError::Provider(_)
        ));
    }

    #[test]
    fn test_password_response_deserialization() {
        let json = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "abc123",
            "email": "jade@example.com",
            "idToken": "token",
            "refreshToken": "refresh",
            "expiresIn": "3600",
            "registered": true
        }"#;
        let parsed: PasswordResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.local_id, "abc123");
        assert_eq!(parsed.id_token, "token");
        assert_eq!(parsed.refresh_token, "refresh");
        assert_eq!(token_lifetime(parsed.expires_in.as_deref()), TimeDelta::hours(1));
    }

    #[test]
    fn test_refresh_response_deserialization() {
        let json = r#"{
            "access_token": "access",
            "expires_in": "1800",
            "token_type": "Bearer",
            "refresh_token": "refresh-2",
            "id_token": "token-2",
            "user_id": "abc123",
            "project_id": "1234"
        }"#;
        let parsed: RefreshResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(parsed.id_token, "token-2");
        assert_eq!(parsed.user_id, "abc123");
        assert_eq!(token_lifetime(parsed.expires_in.as_deref()), TimeDelta::minutes(30));
        assert_eq!(token_lifetime(None), TimeDelta::hours(1));
    }

    #[test]
    fn test_refresh_errors_expire_session() {
        let body = r#"{"error": {"code": 400, "message": "INVALID_REFRESH_TOKEN"}}"#;
        assert!(matches!(parse_error_body(body), IdentityError::SessionExpired));
    }
}
