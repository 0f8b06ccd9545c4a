/*!
 * Tests for the remote translation client behind the scheduler
 */

use std::sync::Arc;
use std::time::Duration;

use lazydub::providers::mock::MockProvider;
use lazydub::translation::recovery::{TRANSLATION_ERROR_PLACEHOLDER, TRANSLATION_PENDING_PLACEHOLDER};
use lazydub::translation::{ClientConfig, RemoteTranslationClient, TranslateOptions, TranslationScheduler};

use crate::common::{immediate_scheduler_config, memory_cache, sample_cues, vtt_for};

fn immediate_client(provider: MockProvider) -> RemoteTranslationClient<MockProvider> {
    RemoteTranslationClient::new(
        provider,
        ClientConfig {
            retry_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
            ..ClientConfig::default()
        },
    )
}

fn texts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("line {}", i)).collect()
}

#[tokio::test]
async fn test_fencedAnswer_shouldParseCleanly() {
    let client = immediate_client(MockProvider::fenced());
    let result = client.try_translate_batch(&texts(3)).await.unwrap();
    assert_eq!(result, vec!["[RU] line 0", "[RU] line 1", "[RU] line 2"]);
}

#[tokio::test]
async fn test_garbledAnswer_shouldYieldErrorPlaceholders() {
    let client = immediate_client(MockProvider::garbled());
    let result = client.try_translate_batch(&texts(2)).await.unwrap();
    assert_eq!(result, vec![TRANSLATION_ERROR_PLACEHOLDER, TRANSLATION_ERROR_PLACEHOLDER]);
}

#[tokio::test]
async fn test_truncatedAnswer_shouldKeepRecoveredPrefix() {
    let client = immediate_client(MockProvider::truncated());
    let result = client.try_translate_batch(&texts(4)).await.unwrap();

    assert_eq!(result.len(), 4);
    assert_eq!(result[2], "[RU] line 2");
    assert_eq!(result[3], TRANSLATION_PENDING_PLACEHOLDER);
}

#[tokio::test]
async fn test_schedulerBatch_shouldBeSplitIntoClientRequests() {
    let provider = MockProvider::working();
    let client = Arc::new(immediate_client(provider.clone()));
    let scheduler = TranslationScheduler::new(client, memory_cache(), immediate_scheduler_config(600.0)).unwrap();

    let cues = sample_cues(60, 1.0);
    let run = scheduler
        .translate_subtitles(&cues, &vtt_for(&cues), TranslateOptions::new())
        .await
        .unwrap();

    // Scheduler batches of 50 and 10, the first split at the client's 25
    assert!(run.background.is_none());
    assert_eq!(provider.batch_sizes(), vec![25, 25, 10]);
    assert_eq!(run.translations[&59], "[RU] cue 59");
}

#[tokio::test]
async fn test_failingProvider_shouldFallBackToOriginalsInScheduler() {
    let provider = MockProvider::failing();
    let client = Arc::new(immediate_client(provider.clone()));
    let scheduler = TranslationScheduler::new(client, memory_cache(), immediate_scheduler_config(600.0)).unwrap();

    let cues = sample_cues(5, 1.0);
    let run = scheduler
        .translate_subtitles(&cues, &vtt_for(&cues), TranslateOptions::new())
        .await
        .unwrap();

    assert_eq!(run.translations[&3], "cue 3");
    assert_eq!(scheduler.status().errors.len(), 3);
    // Three scheduler attempts, each with one request plus three client retries
    assert_eq!(provider.request_count(), 12);
}
