use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{Config, TranslationProvider};
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::providers::anthropic::Anthropic;
use crate::providers::gemini::{Gemini, GenerationConfig};
use crate::providers::Provider;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};
use crate::subtitle_processor::{export_filename, generate_vtt, SubtitleTrack};
use crate::translation::{
    BatchTranslator, JobOutcome, RemoteTranslationClient, TranslateOptions, TranslationCache, TranslationMap,
    TranslationScheduler,
};

// @module: Application controller for subtitle translation

// @const: Issues log written next to the outputs
const ISSUES_LOG_FILENAME: &str = "lazydub.issues.log";

/// Connectivity checks against the configured provider
#[async_trait]
trait ProviderCheck: Send + Sync {
    async fn check_connection(&self) -> Result<bool, AppError>;
}

#[async_trait]
impl<P: Provider + 'static> ProviderCheck for RemoteTranslationClient<P> {
    async fn check_connection(&self) -> Result<bool, AppError> {
        self.provider().test_connection().await?;
        Ok(self.health_check().await)
    }
}

/// Files handled by a folder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of translating one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Translation written to the given path
    Written(PathBuf),
    /// Output already existed
    SkippedExisting(PathBuf),
    /// Input is itself a translated file
    AlreadyTranslated,
}

/// Main application controller for subtitle translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Cache shared with the scheduler
    cache: Arc<TranslationCache>,
    // @field: Batch scheduler
    scheduler: TranslationScheduler,
    // @field: Provider checks
    checker: Arc<dyn ProviderCheck>,
}

impl Controller {
    /// Create a controller from configuration, using the configured provider and cache database
    pub fn with_config(config: Config) -> Result<Self> {
        let store = Self::open_store(&config)?;
        let translation = &config.translation;
        let api_key = translation.get_api_key();
        let model = translation.get_model();
        let endpoint = translation.get_endpoint();
        let timeout_secs = translation.get_timeout_secs();
        let common = &translation.common;

        match translation.provider {
            TranslationProvider::Gemini => {
                let provider = Gemini::new(api_key, model, endpoint, timeout_secs).with_generation_config(
                    GenerationConfig {
                        temperature: common.temperature,
                        max_output_tokens: common.max_output_tokens,
                        ..GenerationConfig::default()
                    },
                );
                Self::with_provider(config, provider, store)
            }
            TranslationProvider::Anthropic => {
                let provider = Anthropic::new(api_key, model, endpoint, timeout_secs)
                    .with_sampling(common.temperature, common.max_output_tokens);
                Self::with_provider(config, provider, store)
            }
        }
    }

    /// Create a controller around an explicit provider and store
    pub fn with_provider<P: Provider + 'static>(
        config: Config,
        provider: P,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let cache = Arc::new(
            TranslationCache::new(store)
                .with_expiry_days(config.cache.expiry_days)
                .with_enabled(config.cache.enabled),
        );

        let client = Arc::new(RemoteTranslationClient::new(
            provider,
            config.translation.common.client_config(),
        ));
        let translator: Arc<dyn BatchTranslator> = client.clone();
        let checker: Arc<dyn ProviderCheck> = client;

        let scheduler = TranslationScheduler::new(translator, Arc::clone(&cache), config.scheduler.scheduler_config())
            .context("Failed to create translation scheduler")?;

        Ok(Self {
            config,
            cache,
            scheduler,
            checker,
        })
    }

    fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
        if !config.cache.enabled {
            debug!("Translation cache disabled");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let store = match &config.cache.path {
            Some(path) => SqliteStore::new(path),
            None => SqliteStore::new_default(),
        }
        .context("Failed to open translation cache")?
        .with_capacity(config.cache.max_bytes);

        debug!("Translation cache at {}", store.path().display());
        Ok(Arc::new(store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &TranslationScheduler {
        &self.scheduler
    }

    /// Check the provider connection and that it answers in Russian
    pub async fn check(&self) -> Result<bool, AppError> {
        info!(
            "Checking {} - {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );
        self.checker.check_connection().await
    }

    /// Remove every cached translation
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear_all();
        info!("Removed {} cached translations", removed);
        removed
    }

    /// Remove expired and unreadable cache entries
    pub fn cleanup_cache(&self) -> usize {
        let removed = self.cache.cleanup();
        info!("Removed {} stale cache entries", removed);
        removed
    }

    /// Translate one subtitle file into `output_dir`
    pub async fn run(
        &self,
        input_file: PathBuf,
        output_dir: PathBuf,
        force_overwrite: bool,
        force_retranslate: bool,
    ) -> Result<FileOutcome> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &output_dir, &multi_progress, force_overwrite, force_retranslate)
            .await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
        force_retranslate: bool,
    ) -> Result<FileOutcome> {
        let start_time = std::time::Instant::now();

        if !input_file.is_file() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let file_name = input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let track = SubtitleTrack::from_file(input_file).context("Failed to parse subtitle file")?;
        if track.is_translated {
            info!("{} is already translated, nothing to do", file_name);
            return Ok(FileOutcome::AlreadyTranslated);
        }

        FileManager::ensure_dir(output_dir)?;
        let output_path = output_dir.join(export_filename(&file_name));
        if output_path.exists() && !force_overwrite && !force_retranslate {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(FileOutcome::SkippedExisting(output_path));
        }

        let translations = self
            .translate_track_with_progress(&track, multi_progress, output_dir, force_retranslate)
            .await?;

        FileManager::write_to_file(&output_path, &generate_vtt(&track.cues, &translations))?;
        info!("Success: {} ({})", output_path.display(), Self::format_duration(start_time.elapsed()));

        Ok(FileOutcome::Written(output_path))
    }

    async fn translate_track_with_progress(
        &self,
        track: &SubtitleTrack,
        multi_progress: &MultiProgress,
        output_dir: &Path,
        force_retranslate: bool,
    ) -> Result<TranslationMap> {
        let (source, target) = language_utils::pair_names();
        info!(
            "🚀 LazyDub: {} - {} ({} → {}, {} cues)",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            source,
            target,
            track.cues.len()
        );

        let progress_bar = multi_progress.add(ProgressBar::new(100));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");

        let pb = progress_bar.clone();
        let options = TranslateOptions::new()
            .force_retranslate(force_retranslate)
            .on_progress(move |percent| pb.set_position(u64::from(percent)));

        let run = self
            .scheduler
            .translate_subtitles(&track.cues, &track.raw_text, options)
            .await?;

        if run.from_cache {
            info!("Using cached translation");
        }

        let translations = match run.background {
            Some(background) => {
                info!("First {} cues ready, translating the rest", run.translations.len());
                match background.wait().await? {
                    JobOutcome::Completed(map) => map,
                    JobOutcome::Paused(map) => {
                        warn!("Translation paused with {}/{} cues translated", map.len(), track.cues.len());
                        map
                    }
                }
            }
            None => run.translations,
        };

        progress_bar.finish_and_clear();
        self.report_issues(output_dir, track);

        Ok(translations)
    }

    /// Log batch failures and append them to the issues log
    fn report_issues(&self, output_dir: &Path, track: &SubtitleTrack) {
        let errors = self.scheduler.status().errors;
        if errors.is_empty() {
            return;
        }

        warn!("Translation completed with {} batch errors.", errors.len());
        let log_file_path = output_dir.join(ISSUES_LOG_FILENAME);
        for err in &errors {
            let line = format!(
                "{} batch {}: {} ({})",
                track.source_file.display(),
                err.batch_index,
                err.message,
                chrono::DateTime::from_timestamp_millis(err.timestamp)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            );
            if let Err(e) = FileManager::append_to_log_file(&log_file_path, &line) {
                warn!("Failed to write logs to file: {}", e);
                return;
            }
        }
        info!("Logs written to {}", log_file_path.display());
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Translate every VTT file below `input_dir`, writing next to each source
    pub async fn run_folder(
        &self,
        input_dir: PathBuf,
        force_overwrite: bool,
        force_retranslate: bool,
    ) -> Result<FolderReport> {
        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let subtitle_files = FileManager::find_vtt_files(&input_dir)?;
        if subtitle_files.is_empty() {
            return Err(anyhow!("No subtitle files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(subtitle_files.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style.progress_chars("█▓▒░"));

        let mut report = FolderReport::default();

        for subtitle_file in &subtitle_files {
            let file_name = subtitle_file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = subtitle_file.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.clone());

            match self
                .run_with_progress(subtitle_file, &output_dir, &multi_progress, force_overwrite, force_retranslate)
                .await
            {
                Ok(FileOutcome::Written(_)) => report.processed += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    report.failed += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed: {} processed, {} skipped, {} errors",
            report.processed, report.skipped, report.failed
        );

        Ok(report)
    }
}
