/*!
 * End-to-end segmentation pipeline.
 *
 * normalize → (optional) translate → extract audio → segment, staged in a
 * temporary working area and swapped into the output directory on commit.
 */

use serde::Serialize;
use std::path::PathBuf;

use crate::audio::SegmentDescriptor;
use crate::language_utils::AUTO_LANGUAGE;
use crate::subtitle_processor::TimedTextRecord;
use crate::translation::TranslationWarning;

pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineRun, AUDIO_INFO_FILE};

/// What to segment and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Video container, or an audio file when `skip_extraction` is set
    pub video_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub output_dir: PathBuf,
    /// ISO code of the subtitle language, or `auto`
    pub source_language: String,
    /// Translate the subtitles into this language first
    pub target_language: Option<String>,
    /// Treat `video_path` as audio and segment it directly
    pub skip_extraction: bool,
}

impl RunRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        subtitle_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            subtitle_path: subtitle_path.into(),
            output_dir: output_dir.into(),
            source_language: AUTO_LANGUAGE.to_string(),
            target_language: None,
            skip_extraction: false,
        }
    }

    /// Segment an audio file instead of a video
    pub fn audio(
        audio_path: impl Into<PathBuf>,
        subtitle_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            skip_extraction: true,
            ..Self::new(audio_path, subtitle_path, output_dir)
        }
    }

    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = language.into();
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }
}

/// Progress notification, one per written segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentProgress {
    /// Segments written so far
    pub processed: usize,
    pub total: usize,
    /// Index of the segment just written
    pub index: usize,
    pub text: String,
}

/// Result of a committed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Written segments, with paths inside `output_dir`
    pub segments: Vec<SegmentDescriptor>,
    /// Records that kept their source text
    pub translation_warnings: Vec<TranslationWarning>,
    /// Normalized records before translation, in segment order
    pub original_records: Vec<TimedTextRecord>,
    pub output_dir: PathBuf,
}

impl RunReport {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}
