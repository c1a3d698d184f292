/*!
 * Integration tests for end-to-end segmentation runs
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use phrasecut::app_config::TranslationCommonConfig;
use phrasecut::audio::SegmentDescriptor;
use phrasecut::errors::PipelineError;
use phrasecut::pipeline::{RunRequest, SegmentProgress, AUDIO_INFO_FILE};
use phrasecut::providers::mock::MockProvider;
use phrasecut::subtitle_processor::{SubtitleCollection, TimedTextRecord};
use phrasecut::translation::SubtitleTranslator;
use crate::common::{self, FakeBackend, FakeExtractor};

/// Test the full video run: extraction, clips and metadata
#[tokio::test]
async fn test_run_withVideo_shouldWriteSegmentsAndMetadata() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "lesson.mp4")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 3)?;
    let output = temp_dir.path().join("out");

    let extractor = FakeExtractor::default();
    let pipeline = common::fake_pipeline(FakeBackend::new(30.0), extractor.clone());

    let mut progress: Vec<SegmentProgress> = Vec::new();
    let report = pipeline
        .run(RunRequest::new(&video, &subtitles, &output), |p| progress.push(p.clone()))
        .await?;

    assert_eq!(extractor.calls(), 1);
    assert_eq!(report.segment_count(), 3);
    assert_eq!(progress.iter().map(|p| p.processed).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(progress[2].text, "Line 3");

    let names: Vec<String> = common::snapshot_dir(&output)?.into_iter().map(|(name, _)| name).collect();
    assert_eq!(
        names,
        vec!["audio-info.json", "segment_001.mp3", "segment_002.mp3", "segment_003.mp3"]
    );

    let info: Vec<SegmentDescriptor> = serde_json::from_str(&fs::read_to_string(output.join(AUDIO_INFO_FILE))?)?;
    assert_eq!(info, report.segments);
    assert!(info.iter().all(|d| d.output_path.starts_with(&output)));

    // The extracted audio and working area are gone
    assert!(!temp_dir.path().join("lesson.mp3").exists());
    assert!(common::entries_with_prefix(temp_dir.path(), ".phrasecut-work-")?.is_empty());
    assert!(video.exists());

    Ok(())
}

/// Test that running twice yields byte-identical output with no leftovers
#[tokio::test]
async fn test_run_twice_shouldBeByteIdentical() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_test_subtitle(temp_dir.path(), "lesson.srt")?;
    let output = temp_dir.path().join("out");
    let pipeline = common::fake_pipeline(FakeBackend::new(30.0), FakeExtractor::default());

    pipeline.run(RunRequest::audio(&audio, &subtitles, &output), |_| {}).await?;
    let first = common::snapshot_dir(&output)?;

    // A stray file from some other process must not survive the rerun
    common::create_test_file(&output, "segment_099.mp3", "stale")?;

    pipeline.run(RunRequest::audio(&audio, &subtitles, &output), |_| {}).await?;
    let second = common::snapshot_dir(&output)?;

    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    Ok(())
}

/// Test the two-line scenario through the whole pipeline
#[tokio::test]
async fn test_run_withTwoLineScenario_shouldProduceExpectedWindows() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "clip.mp3", "audio")?;
    let subtitles = temp_dir.path().join("clip.json");
    SubtitleCollection::write_normalized(
        &[TimedTextRecord::new(0.0, 1.2, "Hi"), TimedTextRecord::new(2.0, 0.8, "Bye")],
        &subtitles,
    )?;
    let output = temp_dir.path().join("out");

    let pipeline = common::fake_pipeline(FakeBackend::new(5.0), FakeExtractor::default());
    let report = pipeline.run(RunRequest::audio(&audio, &subtitles, &output), |_| {}).await?;

    let windows: Vec<(f64, f64)> = report.segments.iter().map(|d| (d.window.start, d.window.end)).collect();
    assert_eq!(windows.len(), 2);
    assert!((windows[0].0 - 0.0).abs() < 1e-9 && (windows[0].1 - 1.53).abs() < 1e-9);
    assert!((windows[1].0 - 2.0).abs() < 1e-9 && (windows[1].1 - 3.13).abs() < 1e-9);
    assert!(output.join("segment_001.mp3").is_file());
    assert!(output.join("segment_002.mp3").is_file());
    Ok(())
}

/// Test that abandoning a run after two of ten segments cleans up
#[tokio::test]
async fn test_start_thenAbandon_shouldCloseHandleAndRemoveWorkDir() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "lesson.mkv")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 10)?;
    let output = temp_dir.path().join("out");

    let backend = FakeBackend::new(60.0);
    let counters = backend.counters.clone();
    let pipeline = common::fake_pipeline(backend, FakeExtractor::default());

    let mut run = pipeline.start(RunRequest::new(&video, &subtitles, &output)).await?;
    let work_dir = run.work_dir().to_path_buf();
    assert_eq!(run.total(), 10);

    let consumed: Vec<_> = run.by_ref().take(2).collect::<Result<_, _>>()?;
    assert_eq!(consumed.len(), 2);
    assert!(run.is_source_open());
    assert!(work_dir.is_dir());

    drop(run);

    assert_eq!(counters.opened(), 1);
    assert_eq!(counters.closed(), 1);
    assert!(!work_dir.exists());
    assert!(!output.exists());
    Ok(())
}

/// Test that an abandoned rerun leaves the previous output in place
#[tokio::test]
async fn test_start_thenAbandon_withPreviousOutput_shouldKeepIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 4)?;
    let output = temp_dir.path().join("out");
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());

    pipeline.run(RunRequest::audio(&audio, &subtitles, &output), |_| {}).await?;
    let before = common::snapshot_dir(&output)?;

    let mut run = pipeline.start(RunRequest::audio(&audio, &subtitles, &output)).await?;
    let _ = run.next();
    drop(run);

    assert_eq!(common::snapshot_dir(&output)?, before);
    Ok(())
}

/// Test that a failing segment aborts the run without touching the output
#[tokio::test]
async fn test_run_withWriteFailure_shouldFailAndCleanUp() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 5)?;
    let output = temp_dir.path().join("out");

    let backend = FakeBackend::new(60.0).failing_at(4);
    let counters = backend.counters.clone();
    let pipeline = common::fake_pipeline(backend, FakeExtractor::default());

    let result = pipeline.run(RunRequest::audio(&audio, &subtitles, &output), |_| {}).await;

    assert!(matches!(result, Err(PipelineError::Segment(_))));
    assert!(counters.balanced());
    assert!(!output.exists());
    assert!(common::entries_with_prefix(temp_dir.path(), ".phrasecut-work-")?.is_empty());
    Ok(())
}

/// Test that committing after an error reports the incomplete run
#[tokio::test]
async fn test_commit_afterWriteFailure_shouldReportIncomplete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 3)?;
    let output = temp_dir.path().join("out");
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0).failing_at(2), FakeExtractor::default());

    let mut run = pipeline.start(RunRequest::audio(&audio, &subtitles, &output)).await?;
    let results: Vec<_> = run.by_ref().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(run.written(), 1);

    assert!(matches!(run.commit(), Err(PipelineError::Incomplete { written: 1, total: 3 })));
    assert!(!output.exists());
    Ok(())
}

/// Test that a record whose translation fails keeps its text and is reported
#[tokio::test]
async fn test_run_withPartialTranslation_shouldKeepOriginalAndWarn() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 5)?;
    let output = temp_dir.path().join("out");

    let translator = SubtitleTranslator::new(
        Arc::new(MockProvider::failing_for("Line 3")),
        &TranslationCommonConfig::default(),
    )
    .with_retry(0, 0);
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default()).with_translator(translator);

    let request = RunRequest::audio(&audio, &subtitles, &output)
        .with_source_language("en")
        .with_target_language("es");
    let report = pipeline.run(request, |_| {}).await?;

    assert_eq!(report.segment_count(), 5);
    assert_eq!(report.segments[2].record.text, "Line 3");
    assert_eq!(report.segments[0].record.text, "[TRANSLATED to es] Line 1");
    assert_eq!(report.translation_warnings.len(), 1);
    assert_eq!(report.translation_warnings[0].index, 3);
    assert_eq!(report.original_records[0].text, "Line 1");

    // Timing survives translation
    assert_eq!(report.segments[4].record.start, report.original_records[4].start);
    Ok(())
}

/// Test that asking for a translation without a translator is refused up front
#[tokio::test]
async fn test_run_withTargetButNoTranslator_shouldFailBeforeWriting() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "lesson.mp3", "audio")?;
    let subtitles = common::create_json_subtitle(temp_dir.path(), "lesson.json", 2)?;
    let output = temp_dir.path().join("out");
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), FakeExtractor::default());

    let request = RunRequest::audio(&audio, &subtitles, &output).with_target_language("fr");
    let result = pipeline.run(request, |_| {}).await;

    assert!(matches!(result, Err(PipelineError::Configuration(_))));
    assert!(!output.exists());
    Ok(())
}

/// Test that a malformed subtitle stops the run before extraction
#[tokio::test]
async fn test_run_withMalformedSubtitle_shouldNotExtract() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_fake_video(temp_dir.path(), "lesson.mp4")?;
    let subtitles = common::create_test_file(
        temp_dir.path(),
        "lesson.srt",
        "1\n00:00:05,000 --> 00:00:01,000\nbackwards\n",
    )?;

    let extractor = FakeExtractor::default();
    let pipeline = common::fake_pipeline(FakeBackend::new(60.0), extractor.clone());
    let result = pipeline
        .run(RunRequest::new(&video, &subtitles, temp_dir.path().join("out")), |_| {})
        .await;

    assert!(matches!(result, Err(PipelineError::Subtitle(_))));
    assert_eq!(extractor.calls(), 0);
    Ok(())
}
