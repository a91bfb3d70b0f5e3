//! Crystal oracle route handlers.
//!
//! The suggestion form on the home page posts here with HTMX and swaps the
//! returned fragment in below the form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::services::oracle::CrystalSuggestion;
use crate::state::AppState;

/// Longest question forwarded to the model.
const MAX_QUERY_CHARS: usize = 500;

/// Suggestion form data.
#[derive(Debug, Deserialize)]
pub struct SuggestForm {
    #[serde(default)]
    pub query: String,
}

/// An oracle answer ready for display.
#[derive(Clone)]
pub struct SuggestionView {
    pub crystal_name: String,
    pub description: String,
    /// Product page of the matching product.
    pub product_url: Option<String>,
    /// Inventory filtered to the suggested category.
    pub similar_url: Option<String>,
}

impl From<&CrystalSuggestion> for SuggestionView {
    fn from(suggestion: &CrystalSuggestion) -> Self {
        Self {
            crystal_name: suggestion.crystal_name.clone(),
            description: suggestion.description.clone(),
            product_url: suggestion
                .product_id
                .as_ref()
                .map(|id| format!("/products/{}", urlencoding::encode(id.as_str()))),
            similar_url: suggestion
                .category
                .as_ref()
                .map(|c| format!("/inventory?category={}", urlencoding::encode(c))),
        }
    }
}

/// Suggestion fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/suggestion.html")]
pub struct SuggestionTemplate {
    pub suggestion: Option<SuggestionView>,
    pub error: Option<String>,
}

/// Ask the oracle for a crystal matching a free-text need.
///
/// Answers are cached per normalized question; failures are shown inline.
#[instrument(skip(state, form), fields(query_len = form.query.len()))]
pub async fn suggest(
    State(state): State<AppState>,
    Form(form): Form<SuggestForm>,
) -> SuggestionTemplate {
    let query: String = form.query.trim().chars().take(MAX_QUERY_CHARS).collect();
    if query.is_empty() {
        return SuggestionTemplate {
            suggestion: None,
            error: Some("Please describe a feeling, intention, or need.".to_string()),
        };
    }

    if let Some(cached) = state.suggestions().get(&query).await {
        tracing::debug!("suggestion served from cache");
        return SuggestionTemplate {
            suggestion: Some(SuggestionView::from(&cached)),
            error: None,
        };
    }

    match state.oracle().suggest(&query, state.catalog().all()).await {
        Ok(suggestion) => {
            let suggestion = suggestion.resolve(state.catalog());
            state.suggestions().insert(&query, suggestion.clone()).await;
            SuggestionTemplate {
                suggestion: Some(SuggestionView::from(&suggestion)),
                error: None,
            }
        }
        Err(e) => {
            if e.is_server_error() {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "oracle suggestion failed");
            }
            SuggestionTemplate {
                suggestion: None,
                error: Some(e.to_string()),
            }
        }
    }
}
