/*!
 * End-to-end translation jobs over long tracks.
 *
 * Every job here runs with zero delays; the scripted translator answers
 * `RU:<text>` unless told to fail.
 */

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazydub::translation::{JobOutcome, TranslateOptions, TranslationCache};

use crate::common::{memory_cache, sample_cues, scheduler_with, vtt_for, ScriptedTranslator};

#[tokio::test]
async fn test_longTrack_shouldReturnInitialWindowThenFinishInBackground() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let translator = Arc::new(ScriptedTranslator::new());
    let cache = memory_cache();
    let scheduler = scheduler_with(translator.clone(), cache.clone(), 599.0);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));
    let progress_sink = progress.clone();
    let completion_sink = completions.clone();
    let options = TranslateOptions::new()
        .on_progress(move |p| progress_sink.lock().push(p))
        .on_complete(move || {
            completion_sink.fetch_add(1, Ordering::SeqCst);
        });

    let run = scheduler.translate_subtitles(&cues, &raw, options).await.unwrap();

    // Cues 0..400 start inside the window: 8 batches of 50
    assert!(!run.from_cache);
    assert_eq!(run.translations.len(), 400);
    assert_eq!(translator.calls(), 8);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert!(scheduler.status().is_processing);

    let background = run.background.expect("remaining batches continue in the background");
    let outcome = background.wait().await.unwrap();

    assert!(outcome.is_completed());
    let translations = outcome.into_translations();
    assert_eq!(translations.len(), 600);
    assert_eq!(translations[&0], "RU:cue 0");
    assert_eq!(translations[&599], "RU:cue 599");
    assert_eq!(translator.calls(), 12);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    let progress = progress.lock().clone();
    assert_eq!(progress.len(), 12);
    assert_eq!(progress.last(), Some(&100));

    let cached = cache.get(&TranslationCache::compute_key(&raw)).expect("finished job is cached");
    assert_eq!(cached, translations);

    let status = scheduler.status();
    assert!(!status.is_processing);
    assert_eq!(status.current_batch, 12);
    assert!(status.errors.is_empty());
}

#[tokio::test]
async fn test_cachedTrack_shouldBeServedWithoutRemoteCalls() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let cache = memory_cache();

    let first = scheduler_with(Arc::new(ScriptedTranslator::new()), cache.clone(), 599.0);
    let run = first.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    run.background.unwrap().wait().await.unwrap();

    let translator = Arc::new(ScriptedTranslator::new());
    let second = scheduler_with(translator.clone(), cache, 599.0);
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();

    // CRLF line endings address the same cache entry
    let crlf = raw.replace('\n', "\r\n");
    let run = second
        .translate_subtitles(&cues, &crlf, TranslateOptions::new().on_progress(move |p| sink.lock().push(p)))
        .await
        .unwrap();

    assert!(run.from_cache);
    assert!(run.background.is_none());
    assert_eq!(run.translations.len(), 600);
    assert_eq!(translator.calls(), 0);
    assert_eq!(*progress.lock(), vec![100]);
    assert_eq!(second.translations().get(42).as_deref(), Some("RU:cue 42"));
}

#[tokio::test]
async fn test_forceRetranslate_shouldBypassCache() {
    let cues = sample_cues(30, 2.0);
    let raw = vtt_for(&cues);
    let translator = Arc::new(ScriptedTranslator::new());
    let scheduler = scheduler_with(translator.clone(), memory_cache(), 600.0);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    assert!(run.background.is_none());
    assert_eq!(translator.calls(), 1);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    assert!(run.from_cache);
    assert_eq!(translator.calls(), 1);

    let run = scheduler
        .translate_subtitles(&cues, &raw, TranslateOptions::new().force_retranslate(true))
        .await
        .unwrap();
    assert!(!run.from_cache);
    assert_eq!(run.translations.len(), 30);
    assert_eq!(translator.calls(), 2);
}

#[tokio::test]
async fn test_batchThatAlwaysFails_shouldKeepOriginalsAndRecordErrors() {
    let cues = sample_cues(120, 1.5);
    let raw = vtt_for(&cues);
    let translator = Arc::new(ScriptedTranslator::new().failing_on("cue 60"));
    let cache = memory_cache();
    let scheduler = scheduler_with(translator.clone(), cache.clone(), 0.0);

    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    let outcome = run.background.unwrap().wait().await.unwrap();
    let translations = outcome.translations();

    assert!(outcome.is_completed());
    assert_eq!(translations.len(), 120);
    assert_eq!(translations[&49], "RU:cue 49");
    assert_eq!(translations[&50], "cue 50");
    assert_eq!(translations[&60], "cue 60");
    assert_eq!(translations[&100], "RU:cue 100");

    // One call for batch 0, three attempts for batch 1, one for batch 2
    assert_eq!(translator.calls(), 5);
    let errors = scheduler.status().errors;
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e.batch_index == 1));

    assert!(cache.get(&TranslationCache::compute_key(&raw)).is_some());
}

#[tokio::test]
async fn test_pauseDuringInitialWindow_shouldStopAndResumeWithoutRepeatingBatches() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let translator = Arc::new(ScriptedTranslator::new());
    let cache = memory_cache();
    let scheduler = scheduler_with(translator.clone(), cache.clone(), 599.0);

    let control = scheduler.control();
    let options = TranslateOptions::new().on_progress(move |p| {
        if p >= 25 {
            control.pause();
        }
    });

    let run = scheduler.translate_subtitles(&cues, &raw, options).await.unwrap();
    assert!(run.paused);
    assert!(run.background.is_none());
    assert_eq!(run.translations.len(), 150);
    assert_eq!(translator.calls(), 3);
    assert!(cache.get(&TranslationCache::compute_key(&raw)).is_none());

    let status = scheduler.status();
    assert!(status.is_paused);
    assert!(!status.is_processing);

    // Still paused: a new submission stops before its first batch
    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    assert!(run.paused);
    assert_eq!(translator.calls(), 3);

    scheduler.resume_translation();
    let run = scheduler.translate_subtitles(&cues, &raw, TranslateOptions::new()).await.unwrap();
    assert!(!run.paused);
    assert_eq!(run.translations.len(), 400);

    let outcome = run.background.unwrap().wait().await.unwrap();
    assert_eq!(outcome.translations().len(), 600);
    assert_eq!(translator.calls(), 12);

    let mut first_texts: Vec<String> = translator.batches().iter().map(|b| b[0].clone()).collect();
    first_texts.sort();
    first_texts.dedup();
    assert_eq!(first_texts.len(), 12, "no batch is translated twice");
}

#[tokio::test]
async fn test_pauseDuringBackground_shouldEndJobAsPaused() {
    let cues = sample_cues(600, 1.5);
    let raw = vtt_for(&cues);
    let translator = Arc::new(ScriptedTranslator::new());
    let cache = memory_cache();
    let scheduler = scheduler_with(translator.clone(), cache.clone(), 599.0);

    let completions = Arc::new(AtomicUsize::new(0));
    let completion_sink = completions.clone();
    let control = scheduler.control();
    let options = TranslateOptions::new()
        .on_progress(move |p| {
            if p >= 75 {
                control.pause();
            }
        })
        .on_complete(move || {
            completion_sink.fetch_add(1, Ordering::SeqCst);
        });

    let run = scheduler.translate_subtitles(&cues, &raw, options).await.unwrap();
    assert_eq!(run.translations.len(), 400);

    let outcome = run.background.unwrap().wait().await.unwrap();
    match outcome {
        JobOutcome::Paused(map) => assert_eq!(map.len(), 450),
        JobOutcome::Completed(_) => panic!("job should stop at the pause"),
    }

    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert!(cache.get(&TranslationCache::compute_key(&raw)).is_none());
    assert!(!scheduler.status().is_processing);
    assert_eq!(scheduler.translations().len(), 450);
}
