//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::{Backend, StorefrontConfig};
use crate::services::cart_sync::CartSynchronizer;
use crate::services::documents::{
    AuthorizedDocuments, DocumentStore, FirestoreClient, MemoryDocumentStore,
    UnconfiguredDocumentStore,
};
use crate::services::identity::{
    FirebaseAuthClient, IdentityProvider, MemoryIdentityProvider, UnconfiguredIdentityProvider,
};
use crate::services::oracle::{CrystalOracle, GeminiClient, SuggestionCache, UnconfiguredOracle};
use crate::services::tokens::TokenKeeper;

/// The external services the storefront talks to.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub oracle: Arc<dyn CrystalOracle>,
}

impl Services {
    /// Pick implementations for the configured backend.
    ///
    /// A missing Firebase configuration yields providers that report "not
    /// configured" rather than a startup failure, so the catalog can still
    /// be browsed.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        let oracle: Arc<dyn CrystalOracle> = match GeminiClient::new(&config.gemini) {
            Some(client) => Arc::new(client),
            None => {
                tracing::warn!("GEMINI_API_KEY not set; the crystal oracle is unavailable");
                Arc::new(UnconfiguredOracle)
            }
        };

        match (config.backend, &config.firebase) {
            (Backend::Memory, _) => {
                tracing::info!("using in-memory identity and document backends");
                let identity = Arc::new(MemoryIdentityProvider::new());
                Self {
                    documents: Arc::new(MemoryDocumentStore::verified_by(identity.clone())),
                    identity,
                    oracle,
                }
            }
            (Backend::Firebase, Some(firebase)) => Self {
                identity: Arc::new(FirebaseAuthClient::new(firebase)),
                documents: Arc::new(FirestoreClient::new(firebase)),
                oracle,
            },
            (Backend::Firebase, None) => Self {
                identity: Arc::new(UnconfiguredIdentityProvider),
                documents: Arc::new(UnconfiguredDocumentStore),
                oracle,
            },
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Catalog,
    services: Services,
    /// `services.documents` behind token refresh.
    documents: Arc<dyn DocumentStore>,
    tokens: TokenKeeper,
    cart_sync: CartSynchronizer,
    suggestions: SuggestionCache,
}

impl AppState {
    /// Create the state with services chosen from the configuration.
    #[must_use]
    pub fn new(config: StorefrontConfig) -> Self {
        let services = Services::from_config(&config);
        Self::with_services(config, Catalog::bundled(), services)
    }

    /// Create the state with explicit services and catalog.
    #[must_use]
    pub fn with_services(config: StorefrontConfig, catalog: Catalog, services: Services) -> Self {
        let tokens = TokenKeeper::new(services.identity.clone());
        let documents: Arc<dyn DocumentStore> = Arc::new(AuthorizedDocuments::new(
            services.documents.clone(),
            tokens.clone(),
        ));
        let cart_sync = CartSynchronizer::new(documents.clone(), config.cart_sync_debounce);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                services,
                documents,
                tokens,
                cart_sync,
                suggestions: SuggestionCache::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.services.identity.as_ref()
    }

    #[must_use]
    pub fn documents(&self) -> &dyn DocumentStore {
        self.inner.documents.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenKeeper {
        &self.inner.tokens
    }

    #[must_use]
    pub fn oracle(&self) -> &dyn CrystalOracle {
        self.inner.services.oracle.as_ref()
    }

    #[must_use]
    pub fn cart_sync(&self) -> &CartSynchronizer {
        &self.inner.cart_sync
    }

    #[must_use]
    pub fn suggestions(&self) -> &SuggestionCache {
        &self.inner.suggestions
    }
}
