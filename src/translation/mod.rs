/*!
 * Subtitle translation pipeline.
 *
 * This module contains everything between parsed cues and a finished
 * translation map. It is split into several submodules:
 *
 * - `batch`: Batch boundaries and the initial playback window
 * - `prompt`: Prompt template for batch requests
 * - `recovery`: Recovery of translation arrays from model output
 * - `client`: Remote translation client with request retry
 * - `cache`: Persistent translation cache
 * - `scheduler`: Cache-aware job scheduler with background continuation
 */

use std::collections::BTreeMap;

/// Cue index to translated text
pub type TranslationMap = BTreeMap<usize, String>;

// Re-export main types for easier usage
pub use self::cache::{CacheEntry, TranslationCache};
pub use self::client::{BatchTranslator, ClientConfig, RemoteTranslationClient};
pub use self::recovery::{ParseOutcome, ParseStatus};
pub use self::scheduler::{
    BackgroundJob, JobControl, JobError, JobOutcome, JobStatus, SchedulerConfig, SharedTranslations,
    TranslateOptions, TranslationRun, TranslationScheduler,
};

// Submodules
pub mod batch;
pub mod cache;
pub mod client;
pub mod prompt;
pub mod recovery;
pub mod scheduler;
