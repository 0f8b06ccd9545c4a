/*!
 * Common test utilities for the lazydub test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use lazydub::app_config::Config;
use lazydub::errors::ProviderError;
use lazydub::storage::MemoryStore;
use lazydub::subtitle_processor::{format_vtt_time, Cue};
use lazydub::translation::{BatchTranslator, SchedulerConfig, TranslationCache, TranslationScheduler};

/// Prefix the scripted translator puts in front of every text
pub const SCRIPTED_PREFIX: &str = "RU:";

/// Batch translator with scripted failures that records every call
#[derive(Default)]
pub struct ScriptedTranslator {
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    failing_texts: HashSet<String>,
    panicking_texts: HashSet<String>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every batch containing `text`
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing_texts.insert(text.to_string());
        self
    }

    /// Panic on every batch containing `text`
    pub fn panicking_on(mut self, text: &str) -> Self {
        self.panicking_texts.insert(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every batch received, in call order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl BatchTranslator for ScriptedTranslator {
    async fn try_translate_batch(&self, texts: &[String]) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().push(texts.to_vec());

        if texts.iter().any(|t| self.panicking_texts.contains(t)) {
            panic!("scripted panic");
        }

        if texts.iter().any(|t| self.failing_texts.contains(t)) {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "scripted failure".to_string(),
            });
        }

        Ok(texts.iter().map(|t| format!("{}{}", SCRIPTED_PREFIX, t)).collect())
    }
}

/// `count` cues starting every `spacing` seconds, each lasting one second
pub fn sample_cues(count: usize, spacing: f64) -> Vec<Cue> {
    (0..count)
        .map(|i| {
            let start = i as f64 * spacing;
            Cue::new(i, start, start + 1.0, format!("cue {}", i))
        })
        .collect()
}

/// VTT document for `cues`
pub fn vtt_for(cues: &[Cue]) -> String {
    let mut content = String::from("WEBVTT\n\n");
    for cue in cues {
        content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index + 1,
            format_vtt_time(cue.start_time),
            format_vtt_time(cue.end_time),
            cue.text
        ));
    }
    content
}

/// Route library logs through the test harness, set RUST_LOG to see them
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scheduler settings without any waiting
pub fn immediate_scheduler_config(initial_window_secs: f64) -> SchedulerConfig {
    init_test_logging();
    SchedulerConfig {
        initial_window_secs,
        batch_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        ..SchedulerConfig::default()
    }
}

/// Cache over a fresh in-memory store
pub fn memory_cache() -> Arc<TranslationCache> {
    Arc::new(TranslationCache::new(Arc::new(MemoryStore::new())))
}

/// Scheduler over `translator` and `cache` with no delays
pub fn scheduler_with(
    translator: Arc<ScriptedTranslator>,
    cache: Arc<TranslationCache>,
    initial_window_secs: f64,
) -> TranslationScheduler {
    TranslationScheduler::new(translator, cache, immediate_scheduler_config(initial_window_secs))
        .expect("valid scheduler config")
}

/// Application config without any waiting
pub fn immediate_app_config() -> Config {
    init_test_logging();
    let mut config = Config::default();
    config.translation.common.retry_backoff_ms = 0;
    config.translation.common.request_delay_ms = 0;
    config.scheduler.batch_delay_ms = 0;
    config.scheduler.retry_delay_ms = 0;
    config
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a short lecture subtitle file for testing
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"WEBVTT

1
00:00:01.000 --> 00:00:04.000
Welcome to the course.

2
00:00:05.000 --> 00:00:09.000
Today we write a parser.

3
00:00:10.000 --> 00:00:14.000
Let's open the editor.
"#;
    create_test_file(dir, filename, content)
}
