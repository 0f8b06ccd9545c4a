/*!
 * Tests for scheduler admission and job control
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazydub::errors::TranslationError;
use lazydub::subtitle_processor::Cue;
use lazydub::translation::{SchedulerConfig, TranslateOptions, TranslationCache, TranslationScheduler};

use crate::common::{memory_cache, sample_cues, scheduler_with, vtt_for, ScriptedTranslator};

#[tokio::test]
async fn test_secondSubmission_whileBackgroundRuns_shouldBeRejected() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let scheduler = scheduler_with(Arc::new(ScriptedTranslator::new()), memory_cache(), 599.0);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    let background = run.background.unwrap();

    let other = sample_cues(10, 1.0);
    let err = scheduler
        .translate_subtitles(&other, &vtt_for(&other), TranslateOptions::new())
        .await
        .unwrap_err();
    match err {
        TranslationError::JobInProgress { key } => assert_eq!(key, TranslationCache::compute_key(&raw)),
        e => panic!("unexpected error: {}", e),
    }

    background.wait().await.unwrap();
    let run = scheduler
        .translate_subtitles(&other, &vtt_for(&other), TranslateOptions::new())
        .await
        .unwrap();
    assert_eq!(run.translations.len(), 10);
}

#[tokio::test]
async fn test_cuesNumberedOutOfPosition_shouldBeRejected() {
    let mut cues = sample_cues(3, 1.0);
    cues[1] = Cue::new(5, 1.0, 2.0, "misplaced");

    let errors = Arc::new(AtomicUsize::new(0));
    let sink = errors.clone();
    let translator = Arc::new(ScriptedTranslator::new());
    let scheduler = scheduler_with(translator.clone(), memory_cache(), 600.0);

    let result = scheduler
        .translate_subtitles(&cues, "WEBVTT", TranslateOptions::new().on_error(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

    assert!(matches!(result, Err(TranslationError::InvalidInput(_))));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(translator.calls(), 0);
    assert!(!scheduler.status().is_processing);
}

#[tokio::test]
async fn test_emptyTrack_shouldCompleteWithoutCalls() {
    let translator = Arc::new(ScriptedTranslator::new());
    let scheduler = scheduler_with(translator.clone(), memory_cache(), 600.0);
    let completions = Arc::new(AtomicUsize::new(0));
    let sink = completions.clone();

    let run = scheduler
        .translate_subtitles(&[], "WEBVTT\n", TranslateOptions::new().on_complete(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    assert!(run.translations.is_empty());
    assert!(run.background.is_none());
    assert_eq!(translator.calls(), 0);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shortTrack_shouldFinishBeforeReturning() {
    let cues = sample_cues(30, 2.0);
    let raw = vtt_for(&cues);
    let cache = memory_cache();
    let scheduler = scheduler_with(Arc::new(ScriptedTranslator::new()), cache.clone(), 600.0);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();

    assert!(run.background.is_none());
    assert_eq!(run.translations.len(), 30);
    assert_eq!(cache.get(&TranslationCache::compute_key(&raw)), Some(run.translations));
    assert!(!scheduler.status().is_processing);
}

#[tokio::test]
async fn test_abort_shouldKeepPartialTranslationsAndFreeScheduler() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let cache = memory_cache();
    let scheduler = scheduler_with(Arc::new(ScriptedTranslator::new()), cache.clone(), 599.0);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    let background = run.background.unwrap();
    background.abort();

    assert!(!scheduler.status().is_processing);
    assert!(matches!(background.wait().await, Err(TranslationError::Background(_))));
    assert_eq!(scheduler.translations().len(), 400);
    assert!(cache.get(&TranslationCache::compute_key(&raw)).is_none());
}

#[tokio::test]
async fn test_backgroundPanic_shouldFailJobAndKeepMergedBatches() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let cache = memory_cache();
    let translator = Arc::new(ScriptedTranslator::new().panicking_on("cue 450"));
    let scheduler = scheduler_with(translator, cache.clone(), 599.0);

    let errors = Arc::new(AtomicUsize::new(0));
    let sink = errors.clone();
    let run = scheduler
        .translate_subtitles(&cues, &raw, TranslateOptions::new().on_error(move |e| {
            assert!(matches!(e, TranslationError::Background(_)));
            sink.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

    match run.background.unwrap().wait().await {
        Err(TranslationError::Background(message)) => assert!(message.contains("scripted panic")),
        other => panic!("unexpected result: {:?}", other.map(|o| o.is_completed())),
    }

    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert!(!scheduler.status().is_processing);
    // Batches before the failing one stay readable, nothing is cached
    let kept = scheduler.translations();
    assert_eq!(kept.len(), 450);
    assert_eq!(kept.get(449).as_deref(), Some("RU:cue 449"));
    assert!(!kept.contains(450));
    assert!(cache.get(&TranslationCache::compute_key(&raw)).is_none());
}

#[tokio::test]
async fn test_newContent_shouldReplaceSharedTranslations() {
    let translator = Arc::new(ScriptedTranslator::new());
    let scheduler = scheduler_with(translator, memory_cache(), 600.0);

    let first = sample_cues(20, 1.0);
    scheduler
        .translate_subtitles(&first, &vtt_for(&first), TranslateOptions::new())
        .await
        .unwrap();
    assert_eq!(scheduler.translations().len(), 20);

    let second: Vec<Cue> = (0..5).map(|i| Cue::new(i, i as f64, i as f64 + 1.0, format!("other {}", i))).collect();
    scheduler
        .translate_subtitles(&second, &vtt_for(&second), TranslateOptions::new())
        .await
        .unwrap();

    let shared = scheduler.translations();
    assert_eq!(shared.len(), 5);
    assert_eq!(shared.get(0).as_deref(), Some("RU:other 0"));
}

#[test]
fn test_newScheduler_withInvalidConfig_shouldFail() {
    let config = SchedulerConfig {
        initial_window_secs: -1.0,
        ..SchedulerConfig::default()
    };
    let result = TranslationScheduler::new(Arc::new(ScriptedTranslator::new()), memory_cache(), config);
    assert!(result.is_err());
}
