/*!
 * Pipeline orchestrator.
 *
 * `Pipeline::start` does the eager work (normalization, translation, audio
 * extraction) and returns a `PipelineRun`: a lazy iterator over the
 * segments being written into a staging directory. `PipelineRun::commit`
 * writes the metadata and swaps the staging directory into place.
 *
 * Everything lives in a `TempDir` next to the output directory, so dropping
 * a run at any point leaves the output directory untouched.
 */

use anyhow::Context;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::app_config::Config;
use crate::audio::{ExtractedAudio, MediaExtractor, SegmentDescriptor, Segmenter, Segments};
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::subtitle_processor::{to_pretty_json, SubtitleCollection, TimedTextRecord};
use crate::translation::{SubtitleTranslator, TranslationOutcome, TranslationService, TranslationWarning};

use super::{RunReport, RunRequest, SegmentProgress};

/// Metadata file written next to the segments
pub const AUDIO_INFO_FILE: &str = "audio-info.json";

const STAGING_DIR: &str = "segments";
const NORMALIZED_SUBTITLES: &str = "subtitles.json";

type TranslationProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Wires the normalizer, translator, extractor and segmenter together
#[derive(Clone)]
pub struct Pipeline {
    segmenter: Segmenter,
    extractor: MediaExtractor,
    translator: Option<SubtitleTranslator>,
    translation_progress: Option<TranslationProgressFn>,
}

impl Pipeline {
    pub fn new(segmenter: Segmenter, extractor: MediaExtractor) -> Self {
        Self {
            segmenter,
            extractor,
            translator: None,
            translation_progress: None,
        }
    }

    /// ffmpeg-backed pipeline; a translator is attached when the config
    /// names a target language
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let segmenter = Segmenter::with_ffmpeg(config.media.clone(), config.segmentation.clone());
        let extractor = MediaExtractor::with_ffmpeg(config.media.clone(), config.segmentation.audio_extension.clone());
        let mut pipeline = Self::new(segmenter, extractor);

        if config.target_language.is_some() {
            let service = TranslationService::new(config.translation.clone())
                .context("Failed to create translation service")?;
            pipeline = pipeline.with_translator(SubtitleTranslator::new(Arc::new(service), &config.translation.common));
        }

        Ok(pipeline)
    }

    pub fn with_translator(mut self, translator: SubtitleTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Report `(completed, total)` while subtitles are translated
    pub fn on_translation_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.translation_progress = Some(Arc::new(progress));
        self
    }

    /// Prepare a run. Nothing is written to `output_dir` until `commit`.
    pub async fn start(&self, request: RunRequest) -> Result<PipelineRun, PipelineError> {
        let collection = SubtitleCollection::from_file(&request.subtitle_path)?;
        let original_records = collection.records;
        info!(
            "Normalized {} records from {:?}",
            original_records.len(),
            request.subtitle_path
        );

        let outcome = match &request.target_language {
            Some(target) => self.translate(&original_records, &request.source_language, target).await?,
            None => TranslationOutcome::pass_through(original_records.clone()),
        };

        let work_dir = create_work_dir(&request.output_dir)?;
        debug!("Working area: {:?}", work_dir.path());

        SubtitleCollection::write_normalized(&original_records, work_dir.path().join(NORMALIZED_SUBTITLES))?;
        if let Some(target) = &request.target_language {
            let translated_copy = work_dir.path().join(format!("subtitles.{}.json", target));
            SubtitleCollection::write_normalized(&outcome.records, translated_copy)?;
        }

        let audio = if request.skip_extraction {
            None
        } else {
            Some(self.extractor.extract_audio_into(&request.video_path, work_dir.path()).await?)
        };
        let audio_path = audio
            .as_ref()
            .map(|a| a.path().to_path_buf())
            .unwrap_or_else(|| request.video_path.clone());

        let staging_dir = work_dir.path().join(STAGING_DIR);
        let segments = self.segmenter.segment(&audio_path, &outcome.records, &staging_dir)?;

        Ok(PipelineRun {
            segments,
            audio,
            descriptors: Vec::new(),
            original_records,
            translation_warnings: outcome.warnings,
            staging_dir,
            output_dir: request.output_dir,
            work_dir,
        })
    }

    /// Run to completion, reporting each written segment
    pub async fn run<F>(&self, request: RunRequest, mut on_progress: F) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&SegmentProgress),
    {
        let mut run = self.start(request).await?;
        let total = run.total();

        let mut processed = 0;
        for item in run.by_ref() {
            let descriptor = item?;
            processed += 1;
            on_progress(&SegmentProgress {
                processed,
                total,
                index: descriptor.index,
                text: descriptor.record.text.clone(),
            });
        }

        run.commit()
    }

    async fn translate(
        &self,
        records: &[TimedTextRecord],
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslationOutcome, PipelineError> {
        if language_utils::is_auto(target_language) {
            return Err(PipelineError::Configuration(
                "target language must be a concrete language code".to_string(),
            ));
        }

        let translator = self.translator.as_ref().ok_or_else(|| {
            PipelineError::Configuration(format!(
                "translation to '{}' requested but no translator is configured",
                target_language
            ))
        })?;

        info!("Translating {} records to {}", records.len(), target_language);
        let outcome = match &self.translation_progress {
            Some(progress) => {
                translator
                    .translate_with_progress(records, source_language, target_language, |done, total| {
                        progress(done, total)
                    })
                    .await
            }
            None => translator.translate(records, source_language, target_language).await,
        };

        Ok(outcome)
    }
}

fn create_work_dir(output_dir: &Path) -> Result<TempDir, PipelineError> {
    let parent = output_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    Ok(tempfile::Builder::new().prefix(".phrasecut-work-").tempdir_in(parent)?)
}

/// A started run.
///
/// Iterating writes segments into the staging area; `commit` finishes the
/// run. Dropping it releases the audio source and removes the working area.
pub struct PipelineRun {
    // Field order is drop order: audio handle, extracted file, then the area
    segments: Segments,
    audio: Option<ExtractedAudio>,
    descriptors: Vec<SegmentDescriptor>,
    original_records: Vec<TimedTextRecord>,
    translation_warnings: Vec<TranslationWarning>,
    staging_dir: PathBuf,
    output_dir: PathBuf,
    work_dir: TempDir,
}

impl PipelineRun {
    /// Number of segments this run will write
    pub fn total(&self) -> usize {
        self.segments.total()
    }

    /// Segments written so far
    pub fn written(&self) -> usize {
        self.segments.last_successful()
    }

    /// Whether the audio source is still open
    pub fn is_source_open(&self) -> bool {
        self.segments.is_open()
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Write any remaining segments and the metadata, then replace
    /// `output_dir` with the result
    pub fn commit(mut self) -> Result<RunReport, PipelineError> {
        for item in self.by_ref() {
            item?;
        }

        let total = self.total();
        let written = self.written();
        if written < total {
            return Err(PipelineError::Incomplete { written, total });
        }

        let PipelineRun {
            segments,
            audio,
            descriptors,
            original_records,
            translation_warnings,
            staging_dir,
            output_dir,
            work_dir,
        } = self;
        drop(segments);

        let segments: Vec<SegmentDescriptor> = descriptors.iter().map(|d| d.relocated(&output_dir)).collect();

        let mut info = to_pretty_json(&segments).map_err(|e| PipelineError::Io(e.to_string()))?;
        info.push(b'\n');
        fs::write(staging_dir.join(AUDIO_INFO_FILE), info)?;

        if let Some(audio) = audio {
            audio.release();
        }

        FileManager::replace_dir(&staging_dir, &output_dir).map_err(|e| PipelineError::Io(format!("{:#}", e)))?;
        drop(work_dir);

        info!("Wrote {} segments to {:?}", segments.len(), output_dir);

        Ok(RunReport {
            segments,
            translation_warnings,
            original_records,
            output_dir,
        })
    }
}

impl Iterator for PipelineRun {
    type Item = Result<SegmentDescriptor, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.segments.next()?;
        Some(
            item.map(|descriptor| {
                self.descriptors.push(descriptor.clone());
                descriptor
            })
            .map_err(PipelineError::from),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.segments.size_hint()
    }
}
