//! Short-lived cache of text suggestions.

use std::time::Duration;

use moka::future::Cache;

use super::CrystalSuggestion;

const SUGGESTION_TTL: Duration = Duration::from_secs(600);

/// Suggestions keyed by the normalized question.
///
/// Only successful answers are cached, so a transient failure is retried on
/// the next ask.
#[derive(Clone)]
pub struct SuggestionCache {
    cache: Cache<String, CrystalSuggestion>,
}

impl SuggestionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(SUGGESTION_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1000).time_to_live(ttl).build(),
        }
    }

    /// Lowercase, trimmed, inner whitespace collapsed.
    #[must_use]
    pub fn normalize(input: &str) -> String {
        input
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn get(&self, input: &str) -> Option<CrystalSuggestion> {
        self.cache.get(&Self::normalize(input)).await
    }

    pub async fn insert(&self, input: &str, suggestion: CrystalSuggestion) {
        self.cache.insert(Self::normalize(input), suggestion).await;
    }
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new()
    }
}
