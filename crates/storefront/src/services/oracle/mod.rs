//! The crystal oracle: generative AI recommendations.
//!
//! Two questions can be asked:
//!
//! - [`CrystalOracle::suggest`] - which crystal fits a free-text need
//! - [`CrystalOracle::identify`] - which crystal is in a photo
//!
//! Both receive the catalog so the model can answer with one of our product
//! ids. The id is never trusted as-is: [`CrystalSuggestion::resolve`] drops
//! ids that are not in the catalog.

mod cache;
mod gemini;

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use luna_moth_core::{Product, ProductId};

use crate::catalog::Catalog;

pub use cache::SuggestionCache;
pub use gemini::GeminiClient;

/// Largest accepted upload for image identification.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image formats the model accepts inline.
pub const SUPPORTED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// The oracle's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystalSuggestion {
    pub crystal_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    /// Best matching store category; image identification only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CrystalSuggestion {
    /// Keep `product_id` only if it names a product in `catalog`, and
    /// `category` only if it is one of the catalog's categories.
    #[must_use]
    pub fn resolve(mut self, catalog: &Catalog) -> Self {
        if let Some(id) = &self.product_id
            && catalog.find(id.as_str()).is_none()
        {
            tracing::debug!(product_id = %id, "oracle suggested an unknown product");
            self.product_id = None;
        }
        if let Some(category) = &self.category
            && !catalog.category_names().contains(&category.as_str())
        {
            self.category = None;
        }
        self
    }
}

/// An uploaded image.
#[derive(Clone)]
pub struct ImageInput {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageInput {
    /// Validate an upload.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::UnsupportedImage`] for an empty upload or an
    /// unsupported type and [`OracleError::ImageTooLarge`] above
    /// [`MAX_IMAGE_BYTES`].
    pub fn new(mime_type: &str, data: Vec<u8>) -> Result<Self, OracleError> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if data.is_empty() || !SUPPORTED_IMAGE_TYPES.contains(&mime_type.as_str()) {
            return Err(OracleError::UnsupportedImage);
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(OracleError::ImageTooLarge);
        }
        Ok(Self { mime_type, data })
    }
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInput")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Errors returned by the oracle. The `Display` text is shown to the user.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("AI Oracle is not configured. This feature is unavailable in the current environment.")]
    NotConfigured,

    #[error("The Oracle could not provide a suggestion. (Key used: {key}) (Details: {details})")]
    SuggestFailed { key: String, details: String },

    #[error("The Oracle could not identify the stone. (Key used: {key}) (Details: {details})")]
    IdentifyFailed { key: String, details: String },

    #[error("Please upload a JPEG, PNG or WebP image.")]
    UnsupportedImage,

    #[error("That image is too large. Please upload one under 5 MB.")]
    ImageTooLarge,
}

impl OracleError {
    /// Whether the failure is worth reporting to error tracking.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::SuggestFailed { .. } | Self::IdentifyFailed { .. }
        )
    }
}

/// Generative AI crystal recommendations.
#[async_trait]
pub trait CrystalOracle: Send + Sync {
    /// Recommend one crystal for the user's stated need.
    async fn suggest(
        &self,
        user_input: &str,
        products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError>;

    /// Identify the crystal in an image.
    async fn identify(
        &self,
        image: &ImageInput,
        products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError>;
}

/// Oracle used when no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredOracle;

#[async_trait]
impl CrystalOracle for UnconfiguredOracle {
    async fn suggest(
        &self,
        _user_input: &str,
        _products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        Err(OracleError::NotConfigured)
    }

    async fn identify(
        &self,
        _image: &ImageInput,
        _products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        Err(OracleError::NotConfigured)
    }
}

/// Oracle that returns fixed answers, for local development and tests.
pub struct CannedOracle {
    suggestion: Mutex<Result<CrystalSuggestion, OracleError>>,
    identification: Mutex<Result<CrystalSuggestion, OracleError>>,
    suggest_calls: AtomicUsize,
    identify_calls: AtomicUsize,
}

impl CannedOracle {
    #[must_use]
    pub fn new(suggestion: CrystalSuggestion, identification: CrystalSuggestion) -> Self {
        Self {
            suggestion: Mutex::new(Ok(suggestion)),
            identification: Mutex::new(Ok(identification)),
            suggest_calls: AtomicUsize::new(0),
            identify_calls: AtomicUsize::new(0),
        }
    }

    /// Answers Rose Quartz (id 2) for text and Amethyst with no product for
    /// images.
    #[must_use]
    pub fn sample() -> Self {
        Self::new(
            CrystalSuggestion {
                crystal_name: "Rose Quartz".to_string(),
                description: "The stone of unconditional love, it opens the heart to all types of love.".to_string(),
                product_id: Some(ProductId::new("2")),
                category: None,
            },
            CrystalSuggestion {
                crystal_name: "Amethyst".to_string(),
                description: "A calming violet quartz associated with intuition and restful sleep.".to_string(),
                product_id: None,
                category: Some("Clusters".to_string()),
            },
        )
    }

    /// Make the next identifications return `result`.
    pub fn set_identification(&self, result: Result<CrystalSuggestion, OracleError>) {
        if let Ok(mut slot) = self.identification.lock() {
            *slot = result;
        }
    }

    /// Make the next suggestions return `result`.
    pub fn set_suggestion(&self, result: Result<CrystalSuggestion, OracleError>) {
        if let Ok(mut slot) = self.suggestion.lock() {
            *slot = result;
        }
    }

    pub fn suggest_calls(&self) -> usize {
        self.suggest_calls.load(Ordering::SeqCst)
    }

    pub fn identify_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }

    fn answer(
        slot: &Mutex<Result<CrystalSuggestion, OracleError>>,
    ) -> Result<CrystalSuggestion, OracleError> {
        slot.lock()
            .map_or(Err(OracleError::NotConfigured), |answer| answer.clone())
    }
}

#[async_trait]
impl CrystalOracle for CannedOracle {
    async fn suggest(
        &self,
        _user_input: &str,
        _products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        self.suggest_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.suggestion)
    }

    async fn identify(
        &self,
        _image: &ImageInput,
        _products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.identification)
    }
}
