//! Integration tests for the Luna Moth Gifts storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p luna-moth-integration-tests
//! ```
//!
//! Every test boots its own storefront on an ephemeral port with in-memory
//! identity and document backends and a canned oracle, then drives it with a
//! cookie-holding HTTP client the way a browser would.
//!
//! # Test Categories
//!
//! - `pages` - catalog pages and JSON API
//! - `cart` - cart edits and checkout
//! - `cart_sync` - sign-in, sign-out and debounced remote writes
//! - `account` - registration, login and profile editing
//! - `oracle` - crystal suggestions and the stone identifier quota

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, redirect};

use luna_moth_core::{Email, UserId};
use luna_moth_storefront::catalog::Catalog;
use luna_moth_storefront::config::StorefrontConfig;
use luna_moth_storefront::routes;
use luna_moth_storefront::services::documents::MemoryDocumentStore;
use luna_moth_storefront::services::identity::MemoryIdentityProvider;
use luna_moth_storefront::services::oracle::CannedOracle;
use luna_moth_storefront::state::{AppState, Services};

/// Cart write debounce used by the test servers.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(50);

/// Password accepted by the in-memory provider.
pub const PASSWORD: &str = "moonstone42";

/// A running storefront plus handles on its backends.
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub identity: Arc<MemoryIdentityProvider>,
    pub documents: Arc<MemoryDocumentStore>,
    pub oracle: Arc<CannedOracle>,
}

impl TestApp {
    /// Start a storefront with the default test configuration.
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Start a storefront after adjusting its configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let mut config = StorefrontConfig::local(base_url.clone());
        config.cart_sync_debounce = TEST_DEBOUNCE;
        configure(&mut config);

        let identity = Arc::new(MemoryIdentityProvider::new());
        let documents = Arc::new(MemoryDocumentStore::verified_by(identity.clone()));
        let oracle = Arc::new(CannedOracle::sample());
        let services = Services {
            identity: identity.clone(),
            documents: documents.clone(),
            oracle: oracle.clone(),
        };
        let state = AppState::with_services(config, Catalog::bundled(), services);

        let app = routes::app(state.clone());
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base_url,
            state,
            identity,
            documents,
            oracle,
        }
    }

    /// A fresh browser: its own cookie jar, following redirects.
    #[must_use]
    pub fn browser(&self) -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    /// A browser that reports redirects instead of following them.
    #[must_use]
    pub fn browser_without_redirects(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()
            .unwrap()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get_html(&self, client: &Client, path: &str) -> String {
        let response = client.get(self.url(path)).send().await.unwrap();
        assert!(
            response.status().is_success(),
            "GET {path} returned {}",
            response.status()
        );
        response.text().await.unwrap()
    }

    pub async fn sign_up(&self, client: &Client, email: &str) -> String {
        self.register(client, email, PASSWORD, PASSWORD).await
    }

    pub async fn register(
        &self,
        client: &Client,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> String {
        client
            .post(self.url("/auth/register"))
            .form(&[
                ("email", email),
                ("password", password),
                ("password_confirm", confirm),
            ])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    pub async fn sign_in(&self, client: &Client, email: &str, password: &str) -> String {
        client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    pub async fn sign_out(&self, client: &Client) -> String {
        client
            .post(self.url("/auth/logout"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Add a product the way the product page's HTMX form does.
    pub async fn add_to_cart(&self, client: &Client, product_id: &str, size: Option<&str>) -> Response {
        let mut form = vec![("product_id", product_id)];
        if let Some(size) = size {
            form.push(("size", size));
        }
        client
            .post(self.url("/cart/add"))
            .header("HX-Request", "true")
            .form(&form)
            .send()
            .await
            .unwrap()
    }

    pub async fn set_quantity(&self, client: &Client, product_id: &str, size: &str, quantity: i64) -> Response {
        let quantity = quantity.to_string();
        client
            .post(self.url("/cart/update"))
            .header("HX-Request", "true")
            .form(&[
                ("product_id", product_id),
                ("size", size),
                ("quantity", quantity.as_str()),
            ])
            .send()
            .await
            .unwrap()
    }

    /// The session cart as JSON.
    pub async fn cart_json(&self, client: &Client) -> serde_json::Value {
        client
            .get(self.url("/api/cart"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// The uid the identity provider assigned to `email`.
    pub async fn uid(&self, email: &str) -> UserId {
        self.identity
            .uid(&Email::parse(email).unwrap())
            .await
            .unwrap()
    }

    /// Wait until every debounced cart write has had time to fire.
    pub async fn settle(&self) {
        let debounce = self.state.config().cart_sync_debounce;
        tokio::time::sleep(debounce * 3 + Duration::from_millis(100)).await;
    }
}

/// `(product id, size, quantity)` for each line of a cart JSON snapshot.
#[must_use]
pub fn cart_lines(cart: &serde_json::Value) -> Vec<(String, String, u64)> {
    cart["lines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| {
            (
                line["id"].as_str().unwrap().to_string(),
                line["selectedVariant"]["size"].as_str().unwrap().to_string(),
                line["quantity"].as_u64().unwrap(),
            )
        })
        .collect()
}
