/*!
 * Mock provider implementations for testing.
 *
 * The mock reads the JSON input array back out of the batch prompt and
 * answers with a JSON array in one of several shapes:
 * - `MockProvider::working()` - clean array of translated strings
 * - `MockProvider::fenced()` - the same array wrapped in a markdown fence
 * - `MockProvider::truncated()` - array cut off mid-string
 * - `MockProvider::garbled()` - prose with no recoverable array
 * - `MockProvider::failing()` - always fails with an error
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Prefix the mock puts in front of every translated text
pub const MOCK_TRANSLATION_PREFIX: &str = "[RU] ";

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// The full prompt
    pub prompt: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The raw response text
    pub text: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a clean JSON array
    Working,
    /// Succeeds with the array wrapped in a ```json fence
    Fenced,
    /// Returns the array cut off inside its last string
    Truncated,
    /// Returns prose with no array in it
    Garbled,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Number of inputs seen in each request, shared between clones
    batch_sizes: Arc<Mutex<Vec<usize>>>,
    /// Custom translation function (optional)
    custom_translation: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            batch_sizes: Arc::new(Mutex::new(Vec::new())),
            custom_translation: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that fences its JSON answer
    pub fn fenced() -> Self {
        Self::new(MockBehavior::Fenced)
    }

    /// Create a mock that returns truncated responses
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a mock that returns unparseable prose
    pub fn garbled() -> Self {
        Self::new(MockBehavior::Garbled)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that waits before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom per-text translation function
    pub fn with_custom_translation(mut self, translate: fn(&str) -> String) -> Self {
        self.custom_translation = Some(translate);
        self
    }

    /// Number of `complete` calls made so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of inputs carried by each request, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    /// Read the input texts back out of a batch prompt
    pub fn extract_inputs(prompt: &str) -> Vec<String> {
        let Some(marker) = prompt.find("INPUT") else {
            return Vec::new();
        };
        let after = &prompt[marker..];
        let Some(start) = after.find('[') else {
            return Vec::new();
        };

        serde_json::Deserializer::from_str(&after[start..])
            .into_iter::<Vec<String>>()
            .next()
            .and_then(Result::ok)
            .unwrap_or_default()
    }

    fn translate(&self, text: &str) -> String {
        match self.custom_translation {
            Some(translate) => translate(text),
            None => format!("{}{}", MOCK_TRANSLATION_PREFIX, text),
        }
    }

    /// Clean JSON array answer for the given prompt
    fn json_answer(&self, prompt: &str) -> String {
        let translated: Vec<String> = Self::extract_inputs(prompt).iter().map(|t| self.translate(t)).collect();
        serde_json::to_string(&translated).unwrap_or_else(|_| "[]".to_string())
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    fn prompt_request(&self, prompt: &str) -> Self::Request {
        MockRequest {
            prompt: prompt.to_string(),
        }
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(Self::extract_inputs(&request.prompt).len());

        let text = match self.behavior {
            MockBehavior::Working => self.json_answer(&request.prompt),

            MockBehavior::Fenced => format!("```json\n{}\n```", self.json_answer(&request.prompt)),

            MockBehavior::Truncated => {
                let full = self.json_answer(&request.prompt);
                // Drop the closing quote and bracket of the last item
                full.trim_end_matches(']').trim_end_matches('"').to_string()
            }

            MockBehavior::Garbled => "Sorry, I can't produce JSON right now.".to_string(),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    return Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    });
                }
                self.json_answer(&request.prompt)
            }

            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    message: "Simulated provider failure".to_string(),
                    status_code: 500,
                });
            }

            MockBehavior::Empty => String::new(),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                self.json_answer(&request.prompt)
            }
        };

        Ok(MockResponse { text })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }
}
