/*!
 * Translation job scheduler.
 *
 * A job translates a whole subtitle track in fixed-size batches. The batches
 * covering the initial playback window are translated before
 * `translate_subtitles` returns; the rest continue on a spawned task while
 * readers observe the growing result through `SharedTranslations`.
 *
 * Finished maps are written to the translation cache, so the same content
 * is served without remote calls next time. A paused job keeps whatever it
 * has translated in memory and picks up from there when the same content is
 * submitted again.
 */

use std::future::Future;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::TranslationError;
use crate::subtitle_processor::Cue;
use crate::translation::batch::{batch_count, batch_range, initial_batch_count};
use crate::translation::cache::TranslationCache;
use crate::translation::client::BatchTranslator;
use crate::translation::TranslationMap;

/// Progress callback, receives a percentage in `0..=100`
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Completion callback
pub type CompleteCallback = Arc<dyn Fn() + Send + Sync>;

/// Job-level error callback
pub type ErrorCallback = Arc<dyn Fn(&TranslationError) + Send + Sync>;

/// Scheduling settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Length of the playback window translated before returning, in seconds
    pub initial_window_secs: f64,
    /// Cues per batch
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
    /// Failed attempts allowed per batch before falling back to the originals
    pub max_retries: u32,
    /// Pause before retrying a failed batch
    pub retry_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_window_secs: 600.0,
            batch_size: 50,
            batch_delay: Duration::from_millis(500),
            max_retries: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

impl SchedulerConfig {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), TranslationError> {
        if self.batch_size == 0 {
            return Err(TranslationError::InvalidInput("batch size must be greater than zero".to_string()));
        }
        if !self.initial_window_secs.is_finite() || self.initial_window_secs < 0.0 {
            return Err(TranslationError::InvalidInput(format!(
                "initial window must be a non-negative number of seconds, got {}",
                self.initial_window_secs
            )));
        }
        Ok(())
    }
}

/// Per-run options and callbacks
#[derive(Clone, Default)]
pub struct TranslateOptions {
    /// Ignore the cache and any partial result for this content
    pub force_retranslate: bool,
    /// Called after every batch
    pub on_progress: Option<ProgressCallback>,
    /// Called once the whole track is translated
    pub on_complete: Option<CompleteCallback>,
    /// Called when the job fails as a whole
    pub on_error: Option<ErrorCallback>,
}

impl TranslateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_retranslate(mut self, force: bool) -> Self {
        self.force_retranslate = force;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&TranslationError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn notify_progress(&self, percent: u8) {
        if let Some(callback) = &self.on_progress {
            callback(percent);
        }
    }

    fn notify_complete(&self) {
        if let Some(callback) = &self.on_complete {
            callback();
        }
    }

    fn notify_error(&self, error: &TranslationError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

/// Read handle on the translations of the current content
///
/// The scheduler is the only writer. Entries are only ever added while a job
/// runs; the map is replaced wholesale only when a job starts.
#[derive(Debug, Clone, Default)]
pub struct SharedTranslations {
    inner: Arc<RwLock<TranslationMap>>,
}

impl SharedTranslations {
    /// Translation of one cue
    pub fn get(&self, index: usize) -> Option<String> {
        self.inner.read().get(&index).cloned()
    }

    /// Whether cue `index` is translated
    pub fn contains(&self, index: usize) -> bool {
        self.inner.read().contains_key(&index)
    }

    /// Copy of the whole map
    pub fn snapshot(&self) -> TranslationMap {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Insert entries for indices that are not translated yet
    fn merge_missing(&self, partial: TranslationMap) {
        let mut map = self.inner.write();
        for (index, text) in partial {
            map.entry(index).or_insert(text);
        }
    }

    fn replace(&self, translations: TranslationMap) {
        *self.inner.write() = translations;
    }

    fn clear(&self) {
        self.inner.write().clear();
    }
}

/// A failed batch attempt
#[derive(Debug, Clone, Serialize)]
pub struct JobError {
    pub batch_index: usize,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Snapshot of the job state
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub is_processing: bool,
    pub is_paused: bool,
    pub progress: u8,
    pub current_batch: usize,
    pub total_batches: usize,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Default)]
struct JobQueueState {
    is_processing: bool,
    current_batch_index: usize,
    total_batches: usize,
    is_paused: bool,
    errors: Vec<JobError>,
    /// Cache key of the content the shared map belongs to
    content_key: Option<String>,
    job_id: Option<Uuid>,
}

impl JobQueueState {
    fn progress(&self) -> u8 {
        progress_percent(self.current_batch_index, self.total_batches)
    }

    fn status(&self) -> JobStatus {
        JobStatus {
            is_processing: self.is_processing,
            is_paused: self.is_paused,
            progress: self.progress(),
            current_batch: self.current_batch_index,
            total_batches: self.total_batches,
            errors: self.errors.clone(),
        }
    }
}

/// Percentage of batches done, rounded and clamped to 100; 0 without batches
pub fn progress_percent(current_batch: usize, total_batches: usize) -> u8 {
    if total_batches == 0 {
        return 0;
    }
    let percent = (current_batch as f64 / total_batches as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Pause/resume handle that can be moved into callbacks
#[derive(Debug, Clone)]
pub struct JobControl {
    state: Arc<Mutex<JobQueueState>>,
}

impl JobControl {
    /// Stop at the next batch boundary
    pub fn pause(&self) {
        self.state.lock().is_paused = true;
        info!("Translation paused");
    }

    /// Allow the next run to proceed
    pub fn resume(&self) {
        self.state.lock().is_paused = false;
        info!("Translation resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().is_paused
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status()
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Every batch was translated
    Completed(TranslationMap),
    /// The job stopped at a pause; the map holds what was done so far
    Paused(TranslationMap),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn translations(&self) -> &TranslationMap {
        match self {
            Self::Completed(map) | Self::Paused(map) => map,
        }
    }

    pub fn into_translations(self) -> TranslationMap {
        match self {
            Self::Completed(map) | Self::Paused(map) => map,
        }
    }
}

/// Result of the synchronous part of a job
#[derive(Debug)]
pub struct TranslationRun {
    /// Translations available when `translate_subtitles` returned
    pub translations: TranslationMap,
    /// Continuation for the remaining batches, if any
    pub background: Option<BackgroundJob>,
    /// Whether the map came straight from the cache
    pub from_cache: bool,
    /// Whether the initial phase stopped at a pause
    pub paused: bool,
}

/// Handle on the background continuation of a job
#[derive(Debug)]
pub struct BackgroundJob {
    job_id: Uuid,
    handle: JoinHandle<Result<JobOutcome, TranslationError>>,
    state: Arc<Mutex<JobQueueState>>,
}

impl BackgroundJob {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for the continuation to end
    pub async fn wait(self) -> Result<JobOutcome, TranslationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(TranslationError::Background("translation job was aborted".to_string())),
            Err(e) => Err(TranslationError::Background(e.to_string())),
        }
    }

    /// Cancel the continuation; translations made so far stay available
    pub fn abort(&self) {
        self.handle.abort();
        let mut state = self.state.lock();
        if state.job_id == Some(self.job_id) {
            state.is_processing = false;
        }
        info!("Background translation {} aborted", self.job_id);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Clears `is_processing` when the job that set it goes away
struct ProcessingGuard {
    job_id: Uuid,
    state: Arc<Mutex<JobQueueState>>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.job_id == Some(self.job_id) {
            state.is_processing = false;
        }
    }
}

/// Cache-aware batch scheduler for subtitle translation
#[derive(Clone)]
pub struct TranslationScheduler {
    translator: Arc<dyn BatchTranslator>,
    cache: Arc<TranslationCache>,
    config: SchedulerConfig,
    state: Arc<Mutex<JobQueueState>>,
    translations: SharedTranslations,
}

impl TranslationScheduler {
    /// Create a new scheduler
    pub fn new(
        translator: Arc<dyn BatchTranslator>,
        cache: Arc<TranslationCache>,
        config: SchedulerConfig,
    ) -> Result<Self, TranslationError> {
        config.validate()?;

        Ok(Self {
            translator,
            cache,
            config,
            state: Arc::new(Mutex::new(JobQueueState::default())),
            translations: SharedTranslations::default(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Read handle on the current translations
    pub fn translations(&self) -> SharedTranslations {
        self.translations.clone()
    }

    /// Pause/resume handle
    pub fn control(&self) -> JobControl {
        JobControl {
            state: Arc::clone(&self.state),
        }
    }

    /// Stop the running job at the next batch boundary
    pub fn pause_translation(&self) {
        self.control().pause();
    }

    /// Clear the pause flag; submit the content again to continue
    pub fn resume_translation(&self) {
        self.control().resume();
    }

    /// Snapshot of the job state
    pub fn status(&self) -> JobStatus {
        self.state.lock().status()
    }

    /// Translate a subtitle track.
    ///
    /// Returns once the batches covering the initial window are done. When
    /// more batches remain, they continue on the returned `BackgroundJob`.
    ///
    /// # Arguments
    /// * `cues` - Cues in track order, `cues[i].index == i`
    /// * `raw_text` - Raw subtitle file content, used as the cache address
    /// * `options` - Callbacks and cache bypass
    pub async fn translate_subtitles(
        &self,
        cues: &[Cue],
        raw_text: &str,
        options: TranslateOptions,
    ) -> Result<TranslationRun, TranslationError> {
        if let Some((position, cue)) = cues.iter().enumerate().find(|(i, cue)| cue.index != *i) {
            let err = TranslationError::InvalidInput(format!(
                "cue at position {} has index {}; cues must be numbered by position",
                position, cue.index
            ));
            error!("Rejecting translation job: {}", err);
            options.notify_error(&err);
            return Err(err);
        }

        let key = TranslationCache::compute_key(raw_text);
        let job_id = Uuid::new_v4();
        let total = batch_count(cues.len(), self.config.batch_size);

        let resuming = {
            let mut state = self.state.lock();
            if state.is_processing {
                return Err(TranslationError::JobInProgress {
                    key: state.content_key.clone().unwrap_or_default(),
                });
            }

            // The pause flag outlives runs until resume_translation clears it
            let is_paused = state.is_paused;
            let resuming = !options.force_retranslate && state.content_key.as_deref() == Some(key.as_str());
            *state = JobQueueState {
                is_processing: true,
                current_batch_index: 0,
                total_batches: total,
                is_paused,
                errors: Vec::new(),
                content_key: Some(key.clone()),
                job_id: Some(job_id),
            };
            resuming
        };
        let guard = ProcessingGuard {
            job_id,
            state: Arc::clone(&self.state),
        };

        if !resuming {
            self.translations.clear();
        }

        if !options.force_retranslate {
            if let Some(cached) = self.cache.get(&key) {
                info!("Job {}: using {} cached translations", job_id, cached.len());
                self.translations.replace(cached.clone());
                {
                    let mut state = self.state.lock();
                    state.current_batch_index = total;
                    state.is_processing = false;
                }
                options.notify_progress(100);
                options.notify_complete();
                return Ok(TranslationRun {
                    translations: cached,
                    background: None,
                    from_cache: true,
                    paused: false,
                });
            }
        }

        if cues.is_empty() {
            info!("Job {}: nothing to translate", job_id);
            self.state.lock().is_processing = false;
            options.notify_complete();
            return Ok(TranslationRun {
                translations: TranslationMap::new(),
                background: None,
                from_cache: false,
                paused: false,
            });
        }

        let initial = initial_batch_count(cues, self.config.batch_size, self.config.initial_window_secs).min(total);
        info!(
            "Job {}: translating {} cues, {}/{} batches before playback{}",
            job_id,
            cues.len(),
            initial,
            total,
            if resuming { " (resuming)" } else { "" }
        );

        let job = Job {
            id: job_id,
            key,
            cues: Arc::from(cues),
            scheduler: self.clone(),
            options,
        };

        let finished = job.process_batches(0..initial).await;
        let snapshot = self.translations.snapshot();

        if !finished {
            job.stop_paused();
            return Ok(TranslationRun {
                translations: snapshot,
                background: None,
                from_cache: false,
                paused: true,
            });
        }

        if initial < total {
            info!("Job {}: continuing {} batches in the background", job_id, total - initial);
            let handle = tokio::spawn(run_guarded(guard, job.clone(), job.run_remaining(initial..total)));
            return Ok(TranslationRun {
                translations: snapshot,
                background: Some(BackgroundJob {
                    job_id,
                    handle,
                    state: Arc::clone(&self.state),
                }),
                from_cache: false,
                paused: false,
            });
        }

        job.finish();
        Ok(TranslationRun {
            translations: snapshot,
            background: None,
            from_cache: false,
            paused: false,
        })
    }
}

/// Run a background continuation, turning a panic into a job error
async fn run_guarded<F>(guard: ProcessingGuard, job: Job, work: F) -> Result<JobOutcome, TranslationError>
where
    F: Future<Output = JobOutcome> + Send,
{
    let _guard = guard;

    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(outcome) => Ok(outcome),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = TranslationError::Background(message);
            job.fail(&err);
            Err(err)
        }
    }
}

/// State of one submitted job
#[derive(Clone)]
struct Job {
    id: Uuid,
    key: String,
    cues: Arc<[Cue]>,
    scheduler: TranslationScheduler,
    options: TranslateOptions,
}

impl Job {
    /// Translate the batches in `range`; false when stopped by a pause
    async fn process_batches(&self, range: Range<usize>) -> bool {
        let config = &self.scheduler.config;
        let last = range.end;

        for batch_index in range {
            if self.scheduler.state.lock().is_paused {
                info!("Job {}: paused before batch {}", self.id, batch_index);
                return false;
            }

            let span = batch_range(batch_index, config.batch_size, self.cues.len());
            let batch = &self.cues[span.clone()];
            let translations = &self.scheduler.translations;

            let already_done = span.clone().all(|i| translations.contains(i));
            if already_done {
                debug!("Job {}: batch {} already translated", self.id, batch_index);
            } else {
                debug!("Job {}: batch {} covers cues {}..{}", self.id, batch_index, span.start, span.end);
                let texts: Vec<String> = batch.iter().map(|cue| cue.text.clone()).collect();
                let results = self.translate_with_retry(batch_index, &texts).await;

                let partial: TranslationMap = batch
                    .iter()
                    .enumerate()
                    .map(|(offset, cue)| {
                        let text = results
                            .get(offset)
                            .filter(|t| !t.is_empty())
                            .cloned()
                            .unwrap_or_else(|| cue.text.clone());
                        (cue.index, text)
                    })
                    .collect();
                translations.merge_missing(partial);
            }

            let progress = {
                let mut state = self.scheduler.state.lock();
                state.current_batch_index = batch_index + 1;
                state.progress()
            };
            self.options.notify_progress(progress);

            if !already_done && batch_index + 1 < last && !config.batch_delay.is_zero() {
                tokio::time::sleep(config.batch_delay).await;
            }
        }

        true
    }

    /// Translate one batch, falling back to the originals once retries run out
    async fn translate_with_retry(&self, batch_index: usize, texts: &[String]) -> Vec<String> {
        let config = &self.scheduler.config;

        loop {
            match self.scheduler.translator.try_translate_batch(texts).await {
                Ok(results) => return results,
                Err(e) => {
                    let failures = {
                        let mut state = self.scheduler.state.lock();
                        state.errors.push(JobError {
                            batch_index,
                            message: e.to_string(),
                            timestamp: Utc::now().timestamp_millis(),
                        });
                        state.errors.iter().filter(|err| err.batch_index == batch_index).count()
                    };

                    if failures < config.max_retries as usize {
                        warn!("Job {}: batch {} failed ({}), retrying: {}", self.id, batch_index, failures, e);
                        if !config.retry_delay.is_zero() {
                            tokio::time::sleep(config.retry_delay).await;
                        }
                    } else {
                        warn!(
                            "Job {}: batch {} failed {} times, keeping original text: {}",
                            self.id, batch_index, failures, e
                        );
                        return texts.to_vec();
                    }
                }
            }
        }
    }

    async fn run_remaining(self, range: Range<usize>) -> JobOutcome {
        if self.process_batches(range).await {
            self.finish()
        } else {
            self.stop_paused()
        }
    }

    /// Whether the shared state still belongs to this job
    fn is_current(&self) -> bool {
        self.scheduler.state.lock().job_id == Some(self.id)
    }

    /// Clear the busy flag unless a newer job has taken over
    fn release(&self) {
        let mut state = self.scheduler.state.lock();
        if state.job_id == Some(self.id) {
            state.is_processing = false;
        }
    }

    /// Persist the finished map and signal completion
    fn finish(&self) -> JobOutcome {
        let translations = self.scheduler.translations.snapshot();
        if self.is_current() {
            self.scheduler.cache.put(&self.key, &translations);
        } else {
            warn!("Job {}: superseded by a newer job, not caching", self.id);
        }

        self.release();
        info!("Job {}: translated {} cues", self.id, translations.len());
        self.options.notify_complete();

        JobOutcome::Completed(translations)
    }

    fn stop_paused(&self) -> JobOutcome {
        self.release();
        let translations = self.scheduler.translations.snapshot();
        info!("Job {}: stopped with {}/{} cues translated", self.id, translations.len(), self.cues.len());
        JobOutcome::Paused(translations)
    }

    fn fail(&self, err: &TranslationError) {
        error!("Job {}: {}", self.id, err);
        self.release();
        self.options.notify_error(err);
    }
}
