/*!
 * Controller workflows over subtitle files on disk
 */

use std::fs;
use std::sync::Arc;

use lazydub::app_controller::{Controller, FileOutcome, FolderReport};
use lazydub::providers::mock::MockProvider;
use lazydub::storage::MemoryStore;
use lazydub::subtitle_processor::parse_vtt_string;

use crate::common::{create_temp_dir, create_test_file, create_test_subtitle, immediate_app_config};

fn controller_with(provider: MockProvider) -> Controller {
    Controller::with_provider(immediate_app_config(), provider, Arc::new(MemoryStore::new())).unwrap()
}

#[tokio::test]
async fn test_run_shouldWriteTranslatedVtt() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();
    let output_dir = dir.path().join("out");
    let controller = controller_with(MockProvider::working());

    let outcome = controller.run(input, output_dir.clone(), false, false).await.unwrap();

    let expected_path = output_dir.join("lecture_ru.vtt");
    assert_eq!(outcome, FileOutcome::Written(expected_path.clone()));

    let cues = parse_vtt_string(&fs::read_to_string(&expected_path).unwrap()).unwrap();
    assert_eq!(cues.len(), 3);
    assert_eq!(cues[0].text, "[RU] Welcome to the course.");
    assert_eq!(cues[2].start_time, 10.0);
}

#[tokio::test]
async fn test_run_twice_shouldSkipExistingOutputUnlessForced() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();
    let output_dir = dir.path().to_path_buf();
    let provider = MockProvider::working();
    let controller = controller_with(provider.clone());

    controller.run(input.clone(), output_dir.clone(), false, false).await.unwrap();
    assert_eq!(provider.request_count(), 1);

    let second = controller.run(input.clone(), output_dir.clone(), false, false).await.unwrap();
    assert!(matches!(second, FileOutcome::SkippedExisting(_)));

    // Overwriting is served from the cache
    let third = controller.run(input, output_dir, true, false).await.unwrap();
    assert!(matches!(third, FileOutcome::Written(_)));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_run_withTranslatedInput_shouldDoNothing() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(
        dir.path(),
        "lecture.ru.vtt",
        "WEBVTT\n\n00:01.000 --> 00:04.000\nДобро пожаловать.\n",
    )
    .unwrap();
    let provider = MockProvider::working();
    let controller = controller_with(provider.clone());

    let outcome = controller.run(input, dir.path().to_path_buf(), false, false).await.unwrap();

    assert_eq!(outcome, FileOutcome::AlreadyTranslated);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_run_withMissingInput_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let controller = controller_with(MockProvider::working());

    let result = controller
        .run(dir.path().join("missing.vtt"), dir.path().to_path_buf(), false, false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_runFolder_shouldTranslateEverySourceFile() {
    let dir = create_temp_dir().unwrap();
    let nested = dir.path().join("week2");
    fs::create_dir_all(&nested).unwrap();
    create_test_subtitle(dir.path(), "intro.vtt").unwrap();
    create_test_subtitle(&nested, "parsers.vtt").unwrap();
    create_test_file(dir.path(), "broken.vtt", "not a subtitle file").unwrap();

    let controller = controller_with(MockProvider::working());
    let report = controller.run_folder(dir.path().to_path_buf(), false, false).await.unwrap();

    assert_eq!(
        report,
        FolderReport {
            processed: 2,
            skipped: 0,
            failed: 1
        }
    );
    assert!(dir.path().join("intro_ru.vtt").exists());
    assert!(nested.join("parsers_ru.vtt").exists());

    // Exports are not picked up as sources on the next run
    let again = controller.run_folder(dir.path().to_path_buf(), false, false).await.unwrap();
    assert_eq!(again.skipped, 2);
    assert_eq!(again.processed, 0);
}

#[tokio::test]
async fn test_failingProvider_shouldWriteIssuesLog() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();
    let controller = controller_with(MockProvider::failing());

    let outcome = controller.run(input, dir.path().to_path_buf(), false, false).await.unwrap();
    assert!(matches!(outcome, FileOutcome::Written(_)));

    let issues = fs::read_to_string(dir.path().join("lazydub.issues.log")).unwrap();
    assert_eq!(issues.lines().count(), 3);

    // Untranslated cues keep their original text
    let exported = fs::read_to_string(dir.path().join("lecture_ru.vtt")).unwrap();
    assert!(exported.contains("Welcome to the course."));
}

#[test]
fn test_check_shouldRequireRussianAnswer() {
    let healthy = controller_with(MockProvider::working().with_custom_translation(|_| "Привет".to_string()));
    assert!(tokio_test::block_on(healthy.check()).unwrap());

    let english = controller_with(MockProvider::working());
    assert!(!tokio_test::block_on(english.check()).unwrap());

    let offline = controller_with(MockProvider::failing());
    assert!(tokio_test::block_on(offline.check()).is_err());
}

#[tokio::test]
async fn test_cacheMaintenance_shouldReportRemovedEntries() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();
    let controller = controller_with(MockProvider::working());

    controller.run(input, dir.path().to_path_buf(), false, false).await.unwrap();

    assert_eq!(controller.cleanup_cache(), 0);
    assert_eq!(controller.clear_cache(), 1);
    assert_eq!(controller.clear_cache(), 0);
}
