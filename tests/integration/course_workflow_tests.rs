/*!
 * Integration tests for course creation, lesson import and phrase export
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use phrasecut::app_config::{Config, TranslationCommonConfig};
use phrasecut::app_controller::Controller;
use phrasecut::course::{CourseManager, ExportTriple, LessonImport, COURSE_INFO_FILE, LESSON_INFO_FILE};
use phrasecut::pipeline::{Pipeline, AUDIO_INFO_FILE};
use phrasecut::providers::mock::MockProvider;
use phrasecut::translation::SubtitleTranslator;
use crate::common::{self, FakeBackend, FakeExtractor};

fn lesson(name: &str, video: &Path, subtitles: &Path) -> LessonImport {
    LessonImport {
        name: name.to_string(),
        source_link: format!("https://example.com/{}", name),
        video_path: video.to_path_buf(),
        subtitle_path: subtitles.to_path_buf(),
        native_language: None,
        skip_extraction: false,
        index: None,
    }
}

fn translating_pipeline(provider: MockProvider) -> Pipeline {
    let translator =
        SubtitleTranslator::new(Arc::new(provider), &TranslationCommonConfig::default()).with_retry(0, 0);
    common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default()).with_translator(translator)
}

/// Test that an imported lesson is registered and laid out on disk
#[tokio::test]
async fn test_import_lesson_shouldWriteLessonAndRegisterIt() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "intro.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "intro.json", 3)?;
    let course = CourseManager::create_course("Spanish", temp_dir.path().join("course"), "spa")?;
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());

    let info = course.import_lesson(&pipeline, lesson("intro", &video, &subtitles), |_| {}).await?;

    assert_eq!(info.path, "lessons/lesson_1");
    assert_eq!(info.phrases.len(), 3);
    assert_eq!(info.phrases[0].source, "Line 1");
    assert_eq!(info.phrases[0].target, "");
    assert_eq!(info.phrases[2].source_audio, "segment_003.mp3");

    let lesson_dir = course.lesson_dir(1);
    assert!(lesson_dir.join(LESSON_INFO_FILE).is_file());
    assert!(lesson_dir.join("source-audio").join(AUDIO_INFO_FILE).is_file());
    assert!(lesson_dir.join("source-audio/segment_001.mp3").is_file());

    let course_info = course.info()?;
    assert_eq!(course_info.target_language, "es");
    assert_eq!(course_info.lessons.len(), 1);
    assert_eq!(course_info.lessons[0].source_link, "https://example.com/intro");
    assert_eq!(course.lesson(1)?, info);
    Ok(())
}

/// Test that lessons get increasing indices and can be overwritten by index
#[tokio::test]
async fn test_import_lesson_twice_shouldAllocateNextIndex() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "clip.json", 2)?;
    let course = CourseManager::create_course("French", temp_dir.path().join("course"), "fr")?;
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());

    course.import_lesson(&pipeline, lesson("one", &video, &subtitles), |_| {}).await?;
    let second = course.import_lesson(&pipeline, lesson("two", &video, &subtitles), |_| {}).await?;
    assert_eq!(second.path, "lessons/lesson_2");

    let mut redo = lesson("one again", &video, &subtitles);
    redo.index = Some(1);
    course.import_lesson(&pipeline, redo, |_| {}).await?;

    let lessons = course.lessons()?;
    assert_eq!(lessons.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(lessons[&1].name, "one again");
    assert_eq!(course.info()?.lessons.len(), 2);
    Ok(())
}

/// Test that the spoken text goes to `source` and the translation to `target`
#[tokio::test]
async fn test_import_lesson_withNativeLanguage_shouldPutTranslationInTarget() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "clip.json", 3)?;
    let course = CourseManager::create_course("German", temp_dir.path().join("course"), "de")?;
    let pipeline = translating_pipeline(MockProvider::failing_for("Line 2"));

    let mut import = lesson("intro", &video, &subtitles);
    import.native_language = Some("en".to_string());
    let info = course.import_lesson(&pipeline, import, |_| {}).await?;

    assert_eq!(info.phrases[0].source, "Line 1");
    assert_eq!(info.phrases[0].target, "[TRANSLATED to en] Line 1");
    assert_eq!(info.phrases[1].source, "Line 2");
    assert_eq!(info.phrases[1].target, "");

    let triples = course.export_phrases()?;
    assert_eq!(triples[0].target_text, "[TRANSLATED to en] Line 1");
    assert_eq!(triples[0].source_text, "Line 1");
    assert_eq!(triples[0].source_audio_filename, "segment_001.mp3");
    Ok(())
}

/// Test that export walks lessons in index order
#[tokio::test]
async fn test_export_phrases_shouldListEveryLessonInOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let short = common::create_json_subtitle(temp_dir.path(), "short.json", 1)?;
    let long = common::create_json_subtitle(temp_dir.path(), "long.json", 2)?;
    let course = CourseManager::create_course("Italian", temp_dir.path().join("course"), "it")?;
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());

    course.import_lesson(&pipeline, lesson("a", &video, &short), |_| {}).await?;
    course.import_lesson(&pipeline, lesson("b", &video, &long), |_| {}).await?;

    let triples = course.export_phrases()?;
    assert_eq!(
        triples,
        vec![
            ExportTriple {
                target_text: String::new(),
                source_text: "Line 1".to_string(),
                source_audio_filename: "segment_001.mp3".to_string(),
            },
            ExportTriple {
                target_text: String::new(),
                source_text: "Line 1".to_string(),
                source_audio_filename: "segment_001.mp3".to_string(),
            },
            ExportTriple {
                target_text: String::new(),
                source_text: "Line 2".to_string(),
                source_audio_filename: "segment_002.mp3".to_string(),
            },
        ]
    );
    Ok(())
}

/// Test that a failed import does not register a lesson
#[tokio::test]
async fn test_import_lesson_withFailingSegment_shouldLeaveCourseUnchanged() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "clip.json", 3)?;
    let course = CourseManager::create_course("Dutch", temp_dir.path().join("course"), "nl")?;
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0).failing_at(2), FakeExtractor::default());

    let before = fs::read(course.root().join(COURSE_INFO_FILE))?;
    let result = course.import_lesson(&pipeline, lesson("broken", &video, &subtitles), |_| {}).await;

    assert!(result.is_err());
    assert_eq!(fs::read(course.root().join(COURSE_INFO_FILE))?, before);
    assert!(!course.lesson_dir(1).exists());
    assert_eq!(course.next_lesson_index()?, 1);
    Ok(())
}

/// Test that a failed import does not use up its lesson index
#[tokio::test]
async fn test_import_lesson_afterFailedImport_shouldReuseIndex() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "clip.json", 2)?;
    let course = CourseManager::create_course("Swedish", temp_dir.path().join("course"), "sv")?;

    let broken = common::fake_pipeline(FakeBackend::new(60.0).failing_at(1), FakeExtractor::default());
    assert!(course.import_lesson(&broken, lesson("broken", &video, &subtitles), |_| {}).await.is_err());

    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());
    let info = course.import_lesson(&pipeline, lesson("fixed", &video, &subtitles), |_| {}).await?;

    assert_eq!(info.path, "lessons/lesson_1");
    assert_eq!(course.lessons()?.keys().copied().collect::<Vec<_>>(), vec![1]);
    Ok(())
}

/// Test that a failed re-import keeps the existing lesson directory
#[tokio::test]
async fn test_import_lesson_withFailingReimport_shouldKeepExistingLesson() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "clip.json", 2)?;
    let course = CourseManager::create_course("Polish", temp_dir.path().join("course"), "pl")?;
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());
    let first = course.import_lesson(&pipeline, lesson("first", &video, &subtitles), |_| {}).await?;

    let broken = common::fake_pipeline(FakeBackend::new(60.0).failing_at(1), FakeExtractor::default());
    let mut redo = lesson("redo", &video, &subtitles);
    redo.index = Some(1);
    assert!(course.import_lesson(&broken, redo, |_| {}).await.is_err());

    assert_eq!(course.lesson(1)?, first);
    assert!(course.lesson_dir(1).join("source-audio/segment_001.mp3").is_file());
    Ok(())
}

/// Test the controller front end over a fake pipeline
#[tokio::test]
async fn test_controller_withFakePipeline_shouldDriveCourseWorkflow() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "clip.mp4")?;
    let srt = common::create_test_subtitle(temp_dir.path(), "clip.srt")?;
    let controller = Controller::with_pipeline(
        Config::default(),
        common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default()),
    );

    let normalized = controller.normalize(&srt, None)?;
    assert_eq!(normalized, temp_dir.path().join("clip.json"));
    let again = controller.normalize(&normalized, None)?;
    assert_eq!(again, temp_dir.path().join("clip.normalized.json"));
    assert_eq!(fs::read(&normalized)?, fs::read(&again)?);

    let course_dir = temp_dir.path().join("course");
    let course = controller.create_course("Portuguese", &course_dir, "pt")?;
    assert_eq!(course.name, "Portuguese");

    let info = controller.import_lesson(&course_dir, lesson("first", &video, &normalized)).await?;
    assert_eq!(info.phrases.len(), 3);

    let export = temp_dir.path().join("phrases.json");
    let triples = controller.export_phrases(&course_dir, Some(&export))?;
    let written: Vec<ExportTriple> = serde_json::from_str(&fs::read_to_string(&export)?)?;
    assert_eq!(written, triples);
    Ok(())
}
