//! Gemini `generateContent` client.
//!
//! Both questions use JSON response mode with a response schema, so the
//! first candidate's text is expected to be a [`CrystalSuggestion`] object.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use luna_moth_core::Product;

use super::{CrystalOracle, CrystalSuggestion, ImageInput, OracleError};
use crate::config::GeminiConfig;

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const SUGGEST_TEMPERATURE: f64 = 0.7;
const IDENTIFY_TEMPERATURE: f64 = 0.2;

const IDENTIFY_PROMPT: &str =
    "Please identify the crystal in this image and then check if it matches a product from the provided list.";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    key_snippet: String,
}

/// Failure of a single call, reported inside the user-facing wrapper.
#[derive(Debug, Error)]
enum CallError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Received an empty response from the AI oracle.")]
    Empty,

    #[error("Invalid response format from API.")]
    InvalidFormat,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiClient {
    /// Create a client, or `None` when no API key is configured.
    #[must_use]
    pub fn new(config: &GeminiConfig) -> Option<Self> {
        Self::with_base_url(config, GEMINI_URL)
    }

    /// Create a client against a different endpoint.
    #[must_use]
    pub fn with_base_url(config: &GeminiConfig, base_url: &str) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            inner: Arc::new(GeminiClientInner {
                client: reqwest::Client::new(),
                endpoint: format!(
                    "{}/models/{}:generateContent",
                    base_url.trim_end_matches('/'),
                    config.model
                ),
                api_key,
                key_snippet: config.key_snippet(),
            }),
        })
    }

    async fn generate(&self, body: &Value) -> Result<CrystalSuggestion, CallError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("x-goog-api-key", self.inner.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |e| e.error.message);
            tracing::error!(status = %status, message = %message, "Gemini returned an error");
            return Err(CallError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let response: GenerateResponse =
            serde_json::from_str(&text).map_err(|_| CallError::InvalidFormat)?;
        parse_suggestion(&response_text(&response))
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Validate the model's JSON answer.
fn parse_suggestion(text: &str) -> Result<CrystalSuggestion, CallError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CallError::Empty);
    }
    let suggestion: CrystalSuggestion =
        serde_json::from_str(text).map_err(|_| CallError::InvalidFormat)?;
    if suggestion.crystal_name.trim().is_empty() || suggestion.description.trim().is_empty() {
        return Err(CallError::InvalidFormat);
    }
    Ok(suggestion)
}

/// `id: 1, name: Amethyst Cluster; id: 2, name: Rose Quartz; ...`
fn product_list(products: &[Product]) -> String {
    products
        .iter()
        .map(|p| format!("id: {}, name: {}", p.id, p.name))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Distinct categories in catalog order, comma separated.
fn category_list(products: &[Product]) -> String {
    let mut seen = HashSet::new();
    products
        .iter()
        .map(|p| p.category.as_str())
        .filter(|c| seen.insert(*c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn suggest_instruction(products: &[Product]) -> String {
    format!(
        "You are a knowledgeable gemologist specializing in the metaphysical properties of crystals. \
Your goal is to recommend a single, specific crystal, gemstone, or stone that best matches the user's stated need or desire.\n\n\
We have the following crystals for sale, provided with their IDs: [{}].\n\n\
Please prioritize recommending a crystal from this list if it's a good match for the user's query.\n\n\
Provide the name of the crystal, a brief one-to-two sentence description of its key properties relevant to the user's query, \
and if you recommended a crystal from our list, you MUST provide its corresponding ID in the 'productId' field.",
        product_list(products)
    )
}

fn identify_instruction(products: &[Product]) -> String {
    format!(
        "You are an expert gemologist. Your primary and most important goal is to accurately identify the main crystal or stone in the provided image.\n\n\
First, identify the stone with the highest possible accuracy, based only on its visual characteristics.\n\n\
Second, after you have made your identification, look at the following list of crystals we have for sale: [{}]. \
If your identification matches a product in our list, provide its corresponding ID in the 'productId' field. \
If it does not match anything in our list, do not provide a 'productId'.\n\n\
Third, determine which of our store's product categories is the most appropriate for the identified stone. \
Here are our available categories: [{}]. You MUST provide the best matching category name in the 'category' field.\n\n\
Finally, provide the identified crystal's name and a brief one-to-two sentence description of its key properties.",
        product_list(products),
        category_list(products)
    )
}

fn response_schema(with_category: bool) -> Value {
    let verb = if with_category { "identified" } else { "recommended" };
    let mut properties = json!({
        "crystalName": {
            "type": "STRING",
            "description": format!("The name of the {verb} crystal or stone.")
        },
        "description": {
            "type": "STRING",
            "description": "A short, one-to-two sentence description of its relevant metaphysical properties."
        },
        "productId": {
            "type": "STRING",
            "description": format!("If the {verb} crystal is from our product list, this is its ID. Otherwise, this field should be omitted or null.")
        }
    });
    if with_category && let Some(map) = properties.as_object_mut() {
        map.insert(
            "category".to_string(),
            json!({
                "type": "STRING",
                "description": "The most relevant product category from the provided list for the identified stone (e.g., 'Raw Stones', 'Jewelry', 'Clusters'). This should be provided even if no specific product matches."
            }),
        );
    }
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["crystalName", "description"]
    })
}

fn suggest_request(user_input: &str, products: &[Product]) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": suggest_instruction(products) }] },
        "contents": [{
            "role": "user",
            "parts": [{ "text": format!("User's need: \"{user_input}\"") }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(false),
            "temperature": SUGGEST_TEMPERATURE
        }
    })
}

fn identify_request(image: &ImageInput, products: &[Product]) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": identify_instruction(products) }] },
        "contents": [{
            "role": "user",
            "parts": [
                { "inlineData": { "mimeType": image.mime_type, "data": BASE64.encode(&image.data) } },
                { "text": IDENTIFY_PROMPT }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(true),
            "temperature": IDENTIFY_TEMPERATURE
        }
    })
}

#[async_trait]
impl CrystalOracle for GeminiClient {
    #[instrument(skip(self, products), fields(input_len = user_input.len()))]
    async fn suggest(
        &self,
        user_input: &str,
        products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        self.generate(&suggest_request(user_input, products))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "crystal suggestion failed");
                OracleError::SuggestFailed {
                    key: self.inner.key_snippet.clone(),
                    details: e.to_string(),
                }
            })
    }

    #[instrument(skip(self, image, products), fields(mime = %image.mime_type, bytes = image.data.len()))]
    async fn identify(
        &self,
        image: &ImageInput,
        products: &[Product],
    ) -> Result<CrystalSuggestion, OracleError> {
        self.generate(&identify_request(image, products))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "stone identification failed");
                OracleError::IdentifyFailed {
                    key: self.inner.key_snippet.clone(),
                    details: e.to_string(),
                }
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::catalog::Catalog;

    use super::*;

    #[test]
    fn test_no_client_without_key() {
        let config = GeminiConfig {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
        };
        assert!(GeminiClient::new(&config).is_none());
    }

    #[test]
    fn test_endpoint_uses_model() {
        let config = GeminiConfig {
            api_key: Some(SecretString::from("AIzaSyExampleKeykg_U")),
            model: "gemini-2.5-flash".to_string(),
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.inner.endpoint,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(client.inner.key_snippet, "AIza...kg_U");
    }

    #[test]
    fn test_parse_suggestion() {
        let parsed =
            parse_suggestion(r#" {"crystalName":"Amethyst","description":"Calm.","productId":"1"} "#)
                .unwrap();
        assert_eq!(parsed.crystal_name, "Amethyst");
        assert_eq!(parsed.product_id.unwrap().as_str(), "1");
    }

    #[test]
    fn test_parse_suggestion_rejects_bad_answers() {
        assert!(matches!(parse_suggestion("  "), Err(CallError::Empty)));
        assert!(matches!(
            parse_suggestion("not json"),
            Err(CallError::InvalidFormat)
        ));
        assert!(matches!(
            parse_suggestion(r#"{"crystalName":"","description":"x"}"#),
            Err(CallError::InvalidFormat)
        ));
        assert_eq!(
            CallError::Empty.to_string(),
            "Received an empty response from the AI oracle."
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"crystalName\":"},{"text":"\"Pyrite\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(&response), r#"{"crystalName":"Pyrite"}"#);

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response_text(&empty), "");
    }

    #[test]
    fn test_suggest_request_shape() {
        let catalog = Catalog::bundled();
        let body = suggest_request("better sleep", catalog.all());
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "User's need: \"better sleep\""
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.7);
        assert!(body["generationConfig"]["responseSchema"]["properties"]["category"].is_null());

        let instruction = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("id: 2, name: Rose Quartz; "));
    }

    #[test]
    fn test_identify_request_inlines_image_and_categories() {
        let catalog = Catalog::bundled();
        let image = ImageInput::new("image/png", vec![0xde, 0xad]).unwrap();
        let body = identify_request(&image, catalog.all());

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "3q0=");
        assert_eq!(parts[1]["text"], IDENTIFY_PROMPT);
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["category"]["type"],
            "STRING"
        );

        let instruction = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instruction.contains("[Clusters, Tumbled Stones"));
    }
}
