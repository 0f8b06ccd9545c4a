/*!
 * Remote translation client.
 *
 * Wraps a `Provider` with batching, request retry and response recovery.
 * The infallible `translate_batch` always returns one string per input, in
 * order; `try_translate_batch` is the same pipeline but lets an exhausted
 * request fail so callers can layer their own retry policy on top.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::translation::prompt::build_batch_prompt;
use crate::translation::recovery::{recover_translations, ParseStatus};

/// Text used by the health check
const HEALTH_CHECK_TEXT: &str = "Hello";

/// Expected fragment of the health check answer
const HEALTH_CHECK_EXPECTED: &str = "Привет";

/// Batching and retry settings for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum number of texts per request
    pub max_batch_size: usize,
    /// Retries after the first failed attempt of a request
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n`
    pub retry_delay: Duration,
    /// Pause between consecutive requests of one batch
    pub request_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 25,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            request_delay: Duration::from_millis(500),
        }
    }
}

/// Batch translation with a fallible contract
///
/// This is the seam the scheduler translates through; it lets the scheduler
/// apply per-batch retries and lets tests substitute scripted translators.
#[async_trait]
pub trait BatchTranslator: Send + Sync {
    /// Translate `texts`, returning one translation per input in order
    async fn try_translate_batch(&self, texts: &[String]) -> Result<Vec<String>, ProviderError>;
}

/// Client translating subtitle texts through a text-generation provider
#[derive(Debug)]
pub struct RemoteTranslationClient<P: Provider> {
    provider: P,
    config: ClientConfig,
}

impl<P: Provider> RemoteTranslationClient<P> {
    /// Create a new client
    pub fn new(provider: P, config: ClientConfig) -> Self {
        Self { provider, config }
    }

    /// Underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Client settings
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Translate a batch; a failed request yields its inputs unchanged
    pub async fn translate_batch(&self, texts: &[String]) -> Vec<String> {
        match self.run_batch(texts, true).await {
            Ok(translations) => translations,
            // The fallback path never returns an error
            Err(_) => texts.to_vec(),
        }
    }

    /// Translate a batch, propagating the first request that fails after retries
    pub async fn try_translate_batch(&self, texts: &[String]) -> Result<Vec<String>, ProviderError> {
        self.run_batch(texts, false).await
    }

    /// Translate one text
    pub async fn translate_single(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        self.translate_batch(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Translate a known phrase and check the answer looks Russian
    pub async fn health_check(&self) -> bool {
        let result = self.translate_single(HEALTH_CHECK_TEXT).await;
        info!("Health check answer: {}", result);
        result.contains(HEALTH_CHECK_EXPECTED)
    }

    async fn run_batch(&self, texts: &[String], identity_fallback: bool) -> Result<Vec<String>, ProviderError> {
        let mut results = vec![String::new(); texts.len()];

        // Blank slots are never sent and come back empty
        let positions: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        if positions.is_empty() {
            return Ok(results);
        }

        let chunks: Vec<&[usize]> = positions.chunks(self.config.max_batch_size.max(1)).collect();
        if chunks.len() > 1 {
            debug!("Translating {} texts in {} requests", positions.len(), chunks.len());
        }

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if chunk_index > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            let chunk_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();

            let translated = match self.translate_chunk(&chunk_texts).await {
                Ok(translated) => translated,
                Err(e) if identity_fallback => {
                    warn!("Translation request failed, keeping {} original texts: {}", chunk_texts.len(), e);
                    chunk_texts
                }
                Err(e) => return Err(e),
            };

            for (&position, translation) in chunk.iter().zip(translated) {
                results[position] = translation;
            }
        }

        Ok(results)
    }

    /// One request: prompt, retry, recover
    async fn translate_chunk(&self, texts: &[String]) -> Result<Vec<String>, ProviderError> {
        let prompt = build_batch_prompt(texts);
        let response_text = self.request_with_retry(&prompt).await?;

        let outcome = recover_translations(&response_text, texts.len());
        match outcome.status {
            ParseStatus::Parsed => debug!("Received {} translations", outcome.data.len()),
            ParseStatus::PartiallyRecovered => warn!("Response needed repair, recovered {} slots", outcome.data.len()),
            ParseStatus::Failed => warn!("Response could not be parsed, {} slots hold placeholders", outcome.data.len()),
        }

        Ok(outcome.data)
    }

    async fn request_with_retry(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut attempt: u32 = 0;

        loop {
            let request = self.provider.prompt_request(prompt);

            match self.provider.complete(request).await {
                Ok(response) => return Ok(P::extract_text(&response)),
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!("Request failed, retrying ({}/{}): {}", attempt, self.config.max_retries, e);
                    let delay = self.config.retry_delay.saturating_mul(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<P: Provider> BatchTranslator for RemoteTranslationClient<P> {
    async fn try_translate_batch(&self, texts: &[String]) -> Result<Vec<String>, ProviderError> {
        self.run_batch(texts, false).await
    }
}
