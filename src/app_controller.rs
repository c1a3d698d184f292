use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::course::{CourseInfo, CourseManager, ExportTriple, LessonImport, LessonInfo};
use crate::file_utils::{FileManager, FileType};
use crate::pipeline::{Pipeline, RunReport, RunRequest, SegmentProgress};
use crate::subtitle_processor::SubtitleCollection;
use crate::translation::TranslationService;

// @module: Application controller for segmentation and course workflows

/// Where the subtitles for a video come from
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleInput {
    /// A subtitle file on disk
    File(PathBuf),
    /// A text subtitle stream inside the video container
    Track(usize),
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    pipeline: Pipeline,
    multi_progress: MultiProgress,
}

impl Controller {
    // @method: Create a controller backed by ffmpeg and the configured provider
    pub fn with_config(config: Config) -> Result<Self> {
        let pipeline = Pipeline::from_config(&config)?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a controller around an already assembled pipeline
    pub fn with_pipeline(config: Config, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            multi_progress: MultiProgress::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cut a video into phrase clips
    pub async fn split_video(&self, video: &Path, subtitles: SubtitleInput, output_dir: &Path) -> Result<RunReport> {
        if !FileManager::file_exists(video) {
            return Err(anyhow!("Input file does not exist: {:?}", video));
        }

        match subtitles {
            SubtitleInput::File(path) => {
                let request = self.request(RunRequest::new(video, path, output_dir));
                self.run_pipeline(request).await
            }
            SubtitleInput::Track(track_id) => {
                // Scratch area for the extracted track, removed when done
                let scratch = tempfile::Builder::new()
                    .prefix(".phrasecut-subtitles-")
                    .tempdir()
                    .context("Failed to create scratch directory")?;
                let srt_path = scratch.path().join("track.srt");

                let collection =
                    SubtitleCollection::extract_from_video(&self.config.media, video, track_id, &srt_path).await?;
                info!("Extracted {} records from track {}", collection.records.len(), track_id);

                let request = self.request(RunRequest::new(video, srt_path, output_dir));
                self.run_pipeline(request).await
            }
        }
    }

    /// Cut an audio file into phrase clips
    pub async fn split_audio(&self, audio: &Path, subtitles: &Path, output_dir: &Path) -> Result<RunReport> {
        if FileManager::detect_file_type(audio)? == FileType::Video {
            warn!("{:?} looks like a video; use split-video to extract its audio first", audio);
        }

        let request = self.request(RunRequest::audio(audio, subtitles, output_dir));
        self.run_pipeline(request).await
    }

    /// Write the normalized JSON form of a subtitle file.
    ///
    /// Defaults to `<stem>.json` next to the input, or `<stem>.normalized.json`
    /// when the input is already JSON.
    pub fn normalize(&self, subtitles: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
        let collection = SubtitleCollection::from_file(subtitles)?;

        let output = output.unwrap_or_else(|| {
            let sibling = FileManager::sibling_with_extension(subtitles, "json");
            if sibling == subtitles {
                FileManager::sibling_with_extension(subtitles, "normalized.json")
            } else {
                sibling
            }
        });

        SubtitleCollection::write_normalized(&collection.records, &output)?;
        info!("Normalized {} records: {:?}", collection.records.len(), output);
        Ok(output)
    }

    pub fn create_course(&self, name: &str, path: &Path, target_language: &str) -> Result<CourseInfo> {
        CourseManager::create_course(name, path, target_language)?.info()
    }

    /// Import a video as the next lesson of a course
    pub async fn import_lesson(&self, course_path: &Path, lesson: LessonImport) -> Result<LessonInfo> {
        let course = CourseManager::open(course_path)?;
        if lesson.native_language.is_some() {
            self.check_translation_provider().await;
        }
        let start_time = Instant::now();

        let progress_bar = self.segment_progress_bar();
        let pb = progress_bar.clone();
        let pipeline = self.pipeline_with_translation_progress();

        let result = course
            .import_lesson(&pipeline, lesson, move |p: &SegmentProgress| {
                update_segment_progress(&pb, p)
            })
            .await;
        progress_bar.finish_and_clear();

        let lesson_info = result?;
        info!(
            "Lesson '{}' imported with {} phrases in {}",
            lesson_info.name,
            lesson_info.phrases.len(),
            Self::format_duration(start_time.elapsed())
        );
        Ok(lesson_info)
    }

    /// Phrase triples of a course; written as JSON to `output` when given
    pub fn export_phrases(&self, course_path: &Path, output: Option<&Path>) -> Result<Vec<ExportTriple>> {
        let triples = CourseManager::open(course_path)?.export_phrases()?;

        if let Some(output) = output {
            let json = serde_json::to_string_pretty(&triples).context("Failed to serialize phrases")?;
            FileManager::write_to_file(output, &json)?;
            info!("Success: {:?}", output);
        }

        Ok(triples)
    }

    fn request(&self, request: RunRequest) -> RunRequest {
        let mut request = request.with_source_language(self.config.source_language.clone());
        request.target_language = self.config.target_language.clone();
        request
    }

    /// Warn early when the translation provider cannot be reached
    async fn check_translation_provider(&self) {
        let service = match TranslationService::new(self.config.translation.clone()) {
            Ok(service) => service,
            Err(e) => {
                warn!("Translation provider is not usable: {:#}", e);
                return;
            }
        };

        if let Err(e) = service.test_connection().await {
            warn!("{:#}; records will keep their original text if translation fails", e);
        }
    }

    async fn run_pipeline(&self, request: RunRequest) -> Result<RunReport> {
        if request.target_language.is_some() {
            self.check_translation_provider().await;
        }
        let start_time = Instant::now();
        let output_dir = request.output_dir.clone();

        let progress_bar = self.segment_progress_bar();
        let pb = progress_bar.clone();
        let pipeline = self.pipeline_with_translation_progress();

        let result = pipeline
            .run(request, move |p: &SegmentProgress| update_segment_progress(&pb, p))
            .await;
        progress_bar.finish_and_clear();

        let report = result.with_context(|| format!("Failed to segment into {:?}", output_dir))?;

        for warning in &report.translation_warnings {
            warn!("Record {} kept its original text: {}", warning.index, warning.message);
        }
        info!(
            "{} segments written to {:?} in {}",
            report.segment_count(),
            report.output_dir,
            Self::format_duration(start_time.elapsed())
        );

        Ok(report)
    }

    fn pipeline_with_translation_progress(&self) -> Pipeline {
        if self.config.target_language.is_none() {
            return self.pipeline.clone();
        }

        let bar = self.multi_progress.add(ProgressBar::new(0));
        bar.set_style(Self::bar_style("records"));
        bar.set_message("Translating");

        self.pipeline.clone().on_translation_progress(move |completed, total| {
            bar.set_length(total as u64);
            bar.set_position(completed as u64);
            if completed == total {
                bar.finish_and_clear();
            }
        })
    }

    fn segment_progress_bar(&self) -> ProgressBar {
        let bar = self.multi_progress.add(ProgressBar::new(0));
        bar.set_style(Self::bar_style("segments"));
        bar
    }

    fn bar_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{percent}}%) {{msg}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
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
}

fn update_segment_progress(bar: &ProgressBar, progress: &SegmentProgress) {
    bar.set_length(progress.total as u64);
    bar.set_position(progress.processed as u64);
    let preview: String = progress.text.chars().take(40).collect();
    bar.set_message(preview);
}
