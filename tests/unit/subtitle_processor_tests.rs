/*!
 * Tests for reading subtitle files and exporting translations
 */

use lazydub::subtitle_processor::{export_filename, generate_vtt, parse_vtt_string, SubtitleTrack};
use lazydub::translation::TranslationMap;

use crate::common::{create_temp_dir, create_test_file, create_test_subtitle};

#[test]
fn test_fromFile_shouldParseLectureTrack() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();

    let track = SubtitleTrack::from_file(&path).unwrap();

    assert_eq!(track.cues.len(), 3);
    assert_eq!(track.cues[1].text, "Today we write a parser.");
    assert_eq!(track.cues[2].start_time, 10.0);
    assert!(!track.is_translated);
    assert_eq!(track.source_file, path);
}

#[test]
fn test_fromFile_withRussianSuffix_shouldMarkTranslated() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "lecture_ru.vtt",
        "WEBVTT\n\n00:01.000 --> 00:04.000\nДобро пожаловать на курс.\n",
    )
    .unwrap();

    let track = SubtitleTrack::from_file(&path).unwrap();

    assert!(track.is_translated);
    assert_eq!(track.cues[0].text, "Добро пожаловать на курс.");
}

#[test]
fn test_exportedTrack_shouldParseBackWithSameTiming() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_subtitle(dir.path(), "lecture.vtt").unwrap();
    let track = SubtitleTrack::from_file(&path).unwrap();

    let translations = TranslationMap::from([
        (0, "Добро пожаловать на курс.".to_string()),
        (2, "Откроем редактор.".to_string()),
    ]);
    let exported = generate_vtt(&track.cues, &translations);
    let reparsed = parse_vtt_string(&exported).unwrap();

    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed[1].text, "Откроем редактор.");
    assert_eq!(reparsed[1].start_time, track.cues[2].start_time);
    assert_eq!(reparsed[1].end_time, track.cues[2].end_time);
}

#[test]
fn test_fromFile_withoutCues_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "empty.vtt", "WEBVTT\n\nNOTE nothing here\n").unwrap();

    assert!(SubtitleTrack::from_file(&path).is_err());
}

#[test]
fn test_exportFilename_forVideoNames() {
    assert_eq!(export_filename("Lesson 01.mkv"), "Lesson 01_ru.vtt");
    assert_eq!(export_filename("lecture.vtt"), "lecture_ru.vtt");
    assert_eq!(export_filename(""), "subtitles_ru.vtt");
}
