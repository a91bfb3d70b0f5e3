//! Cloud Firestore over the REST API (v1).
//!
//! Documents are addressed as
//! `projects/{project}/databases/(default)/documents/{collection}/{uid}` and
//! authorized with the signed-in user's ID token, so security rules on the
//! project limit each user to their own documents.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use luna_moth_core::{Cart, CartLine, ProfileUpdate, UserProfile};

use super::value::{decode_fields, encode, encode_fields};
use super::{DocumentError, DocumentStore};
use crate::config::FirebaseConfig;
use crate::services::identity::Identity;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

const USERS: &str = "users";
const CARTS: &str = "carts";
const VISUAL_SEARCHES: &str = "visualSearches";

/// Firestore REST client.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    /// `.../projects/{p}/databases/(default)/documents`
    documents_url: String,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    fields: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirestoreClient {
    /// Create a client for the configured project.
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        Self::with_base_url(config, FIRESTORE_URL)
    }

    /// Create a client against a different endpoint (e.g. the emulator).
    #[must_use]
    pub fn with_base_url(config: &FirebaseConfig, base_url: &str) -> Self {
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            base_url.trim_end_matches('/'),
            config.project_id
        );
        Self {
            inner: Arc::new(FirestoreClientInner {
                client: reqwest::Client::new(),
                documents_url,
            }),
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{collection}/{}",
            self.inner.documents_url,
            urlencoding::encode(id)
        )
    }

    /// GET a document; `Ok(None)` on 404.
    async fn get_document(
        &self,
        who: &Identity,
        url: &str,
    ) -> Result<Option<Value>, DocumentError> {
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(&who.id_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::check(response).await?;
        let document: Document = serde_json::from_str(&body)
            .map_err(|e| DocumentError::Parse(format!("Failed to parse document: {e}")))?;

        document
            .fields
            .map_or_else(|| Ok(json!({})), |fields| decode_fields(&fields))
            .map(Some)
    }

    /// PATCH a document. Without a mask the document is replaced.
    async fn patch_document(
        &self,
        who: &Identity,
        url: &str,
        fields: Value,
        mask: &[&str],
    ) -> Result<(), DocumentError> {
        let mut url = url.to_string();
        for (i, path) in mask.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str("updateMask.fieldPaths=");
            url.push_str(path);
        }
        if !mask.is_empty() {
            // Fail instead of creating a bare document on update.
            url.push_str("&currentDocument.exists=true");
        }

        let response = self
            .inner
            .client
            .patch(&url)
            .bearer_auth(&who.id_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    /// Return the body of a successful response or map the error status.
    async fn check(response: reqwest::Response) -> Result<String, DocumentError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(DocumentError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map_or_else(|_| body.chars().take(200).collect(), |e| e.error.message);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DocumentError::Unauthorized(message));
        }
        Err(DocumentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Timestamp in the RFC 3339 form Firestore expects.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Build the `runQuery` body counting visual searches since `since`.
fn visual_search_query(since: DateTime<Utc>) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": VISUAL_SEARCHES }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "timestamp" },
                    "op": "GREATER_THAN_OR_EQUAL",
                    "value": { "timestampValue": timestamp(since) }
                }
            },
            "select": { "fields": [] }
        }
    })
}

/// Pull the cart lines out of a decoded `carts/{uid}` document.
fn cart_from_document(document: Value) -> Result<Cart, DocumentError> {
    let Some(items) = document.get("items").filter(|v| !v.is_null()) else {
        return Ok(Cart::new());
    };
    let lines: Vec<CartLine> = serde_json::from_value(items.clone())
        .map_err(|e| DocumentError::Parse(format!("Failed to parse cart items: {e}")))?;
    Ok(Cart::from_lines(lines))
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, who), fields(uid = %who.uid))]
    async fn get_profile(&self, who: &Identity) -> Result<Option<UserProfile>, DocumentError> {
        let url = self.document_url(USERS, who.uid.as_str());
        let Some(document) = self.get_document(who, &url).await? else {
            return Ok(None);
        };
        serde_json::from_value(document)
            .map(Some)
            .map_err(|e| DocumentError::Parse(format!("Failed to parse profile: {e}")))
    }

    #[instrument(skip(self, who, profile), fields(uid = %who.uid))]
    async fn create_profile(
        &self,
        who: &Identity,
        profile: &UserProfile,
    ) -> Result<(), DocumentError> {
        let url = self.document_url(USERS, who.uid.as_str());
        let value = serde_json::to_value(profile)
            .map_err(|e| DocumentError::Parse(format!("Failed to encode profile: {e}")))?;
        self.patch_document(who, &url, encode_fields(&value)?, &[])
            .await
    }

    #[instrument(skip(self, who, update), fields(uid = %who.uid))]
    async fn update_profile(
        &self,
        who: &Identity,
        update: &ProfileUpdate,
    ) -> Result<(), DocumentError> {
        if update.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(update)
            .map_err(|e| DocumentError::Parse(format!("Failed to encode update: {e}")))?;
        let mask: Vec<&str> = [
            update.first_name.as_ref().map(|_| "firstName"),
            update.last_name.as_ref().map(|_| "lastName"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let url = self.document_url(USERS, who.uid.as_str());
        self.patch_document(who, &url, encode_fields(&value)?, &mask)
            .await
    }

    #[instrument(skip(self, who), fields(uid = %who.uid))]
    async fn get_cart(&self, who: &Identity) -> Result<Cart, DocumentError> {
        let url = self.document_url(CARTS, who.uid.as_str());
        match self.get_document(who, &url).await? {
            Some(document) => cart_from_document(document),
            None => Ok(Cart::new()),
        }
    }

    #[instrument(skip(self, who, cart), fields(uid = %who.uid, lines = cart.len()))]
    async fn set_cart(&self, who: &Identity, cart: &Cart) -> Result<(), DocumentError> {
        let items = serde_json::to_value(cart)
            .map_err(|e| DocumentError::Parse(format!("Failed to encode cart: {e}")))?;
        let url = self.document_url(CARTS, who.uid.as_str());
        self.patch_document(who, &url, json!({ "items": encode(&items) }), &[])
            .await
    }

    #[instrument(skip(self, who), fields(uid = %who.uid))]
    async fn count_visual_searches_since(
        &self,
        who: &Identity,
        since: DateTime<Utc>,
    ) -> Result<u32, DocumentError> {
        let url = format!("{}:runQuery", self.document_url(USERS, who.uid.as_str()));
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(&who.id_token)
            .json(&visual_search_query(since))
            .send()
            .await?;
        let body = Self::check(response).await?;

        // One element per match; an empty result is `[{"readTime": ...}]`.
        let rows: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| DocumentError::Parse(format!("Failed to parse query result: {e}")))?;
        let count = rows.iter().filter(|row| row.get("document").is_some()).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    #[instrument(skip(self, who), fields(uid = %who.uid))]
    async fn log_visual_search(
        &self,
        who: &Identity,
        at: DateTime<Utc>,
    ) -> Result<(), DocumentError> {
        let url = format!(
            "{}/{VISUAL_SEARCHES}",
            self.document_url(USERS, who.uid.as_str())
        );
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(&who.id_token)
            .json(&json!({
                "fields": { "timestamp": { "timestampValue": timestamp(at) } }
            }))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }
}
