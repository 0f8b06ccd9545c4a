/*!
 * Gemini provider.
 *
 * Talks to the Google `generateContent` endpoint. One request carries one
 * user prompt; the answer is read from the first candidate.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Public Gemini API endpoint
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Gemini client for interacting with the generateContent API
#[derive(Debug)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
    /// Sampling parameters sent with every request
    generation_config: GenerationConfig,
    /// Request timeout, reported in timeout errors
    timeout_secs: u64,
}

/// Sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens to generate
    pub max_output_tokens: u32,
    /// Nucleus sampling mass
    pub top_p: f32,
    /// Top k tokens to consider
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_output_tokens: 8192,
            top_p: 0.8,
            top_k: 10,
        }
    }
}

/// generateContent request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation contents
    pub contents: Vec<GeminiContent>,
    /// Sampling parameters
    pub generation_config: GenerationConfig,
}

/// One content turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Role of the turn author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A text part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    /// Part text
    #[serde(default)]
    pub text: String,
}

/// generateContent response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Token usage information
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

/// A generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Candidate content
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GeminiRequest {
    /// Create a request holding a single user prompt
    pub fn new(prompt: impl Into<String>, generation_config: GenerationConfig) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: prompt.into() }],
            }],
            generation_config,
        }
    }
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let endpoint = endpoint.into();
        let model = model.into();

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: if endpoint.is_empty() { DEFAULT_GEMINI_ENDPOINT.to_string() } else { endpoint },
            model: if model.is_empty() { DEFAULT_GEMINI_MODEL.to_string() } else { model },
            generation_config: GenerationConfig::default(),
            timeout_secs,
        }
    }

    /// Override the sampling parameters
    pub fn with_generation_config(mut self, generation_config: GenerationConfig) -> Self {
        self.generation_config = generation_config;
        self
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full generateContent URL for the configured model
    pub fn api_url(&self) -> Result<Url, ProviderError> {
        let base = format!("{}/", self.endpoint.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|url| url.join(&format!("v1beta/models/{}:generateContent", self.model)))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid Gemini endpoint {}: {}", self.endpoint, e)))
    }
}

/// Pull the human-readable message out of a Gemini error body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| if body.is_empty() { "Unknown error".to_string() } else { body.to_string() })
}

#[async_trait]
impl Provider for Gemini {
    type Request = GeminiRequest;
    type Response = GeminiResponse;

    fn prompt_request(&self, prompt: &str) -> Self::Request {
        GeminiRequest::new(prompt, self.generation_config.clone())
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let url = self.api_url()?;
        debug!("Sending Gemini request to model {}", self.model);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            error!("Gemini API error ({}): {}", status, message);
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        response.json::<GeminiResponse>().await.map_err(|e| {
            if e.is_decode() {
                ProviderError::ParseError(format!("Failed to parse Gemini API response: {}", e))
            } else {
                ProviderError::from_transport(e, self.timeout_secs)
            }
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let config = GenerationConfig {
            max_output_tokens: 10,
            ..self.generation_config.clone()
        };
        self.complete(GeminiRequest::new("Hello", config)).await?;
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }
}
