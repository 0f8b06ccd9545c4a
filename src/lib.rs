/*!
 * # LazyDub - English to Russian subtitle translation
 *
 * A Rust library that translates WebVTT subtitles for long-form video with
 * a remote text-generation model.
 *
 * ## Features
 *
 * - Batched translation through Gemini or Anthropic, with request retry
 * - Recovery of translation arrays from malformed model output
 * - Early return once the opening minutes of playback are translated,
 *   with the rest of the track continuing in the background
 * - Pause and resume of running jobs
 * - Persistent translation cache with expiry and capacity handling
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: WebVTT parsing and export
 * - `translation`: Translation pipeline:
 *   - `translation::batch`: Batch boundaries and the initial window
 *   - `translation::prompt`: Batch prompt template
 *   - `translation::recovery`: Response recovery
 *   - `translation::client`: Remote translation client
 *   - `translation::cache`: Translation cache
 *   - `translation::scheduler`: Job scheduler
 * - `storage`: Key/value backends for the cache
 * - `providers`: Client implementations for LLM providers
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: Language names for the fixed pair
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod storage;
pub mod subtitle_processor;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{AppError, ProviderError, StorageError, TranslationError};
pub use subtitle_processor::{Cue, SubtitleTrack};
pub use translation::{TranslationCache, TranslationMap, TranslationScheduler};
