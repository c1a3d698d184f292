use async_trait::async_trait;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::MediaConfig;
use crate::errors::MediaError;
use crate::file_utils::ScopedFile;

use super::filter_ffmpeg_stderr;

// @module: Audio track extraction from video containers

/// Writes the audio channel of `input` to `output`
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, input: &Path, output: &Path) -> Result<(), MediaError>;
}

/// ffmpeg based extractor
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    media: MediaConfig,
}

impl FfmpegExtractor {
    pub fn new(media: MediaConfig) -> Self {
        Self { media }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let ffmpeg_future = Command::new(&self.media.ffmpeg_path)
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-map")
            .arg("0:a:0")
            .arg("-q:a")
            .arg(self.media.audio_quality.to_string())
            .arg("-map_metadata")
            .arg("-1")
            .arg("-fflags")
            .arg("+bitexact")
            .arg("-flags:a")
            .arg("+bitexact")
            .arg(output)
            .kill_on_drop(true)
            .output();

        let timeout = Duration::from_secs(self.media.timeout_secs);
        let result = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| MediaError::ExtractionFailed {
                    path: input.to_path_buf(),
                    reason: format!("failed to execute {}: {}", self.media.ffmpeg_path, e),
                })?
            },
            _ = tokio::time::sleep(timeout) => {
                return Err(MediaError::Timeout(self.media.timeout_secs));
            }
        };

        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            error!("Audio extraction failed: {}", filtered);
            return Err(MediaError::ExtractionFailed {
                path: input.to_path_buf(),
                reason: filtered,
            });
        }

        Ok(())
    }
}

/// Extracted audio file, deleted when dropped
pub type ExtractedAudio = ScopedFile;

/// Derives standalone audio tracks from video files
#[derive(Clone)]
pub struct MediaExtractor {
    extractor: Arc<dyn AudioExtractor>,
    audio_extension: String,
}

impl MediaExtractor {
    pub fn new(extractor: Arc<dyn AudioExtractor>, audio_extension: impl Into<String>) -> Self {
        Self {
            extractor,
            audio_extension: audio_extension.into(),
        }
    }

    /// Extractor backed by ffmpeg
    pub fn with_ffmpeg(media: MediaConfig, audio_extension: impl Into<String>) -> Self {
        Self::new(Arc::new(FfmpegExtractor::new(media)), audio_extension)
    }

    /// Extract next to the video: `clip.mp4` becomes `clip.mp3`
    pub async fn extract_audio<P: AsRef<Path>>(&self, video_path: P) -> Result<ExtractedAudio, MediaError> {
        let video_path = video_path.as_ref();
        let target = video_path.with_extension(&self.audio_extension);
        self.extract_to(video_path, target).await
    }

    /// Extract into `dir`, keeping the video's base name
    pub async fn extract_audio_into<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        dir: Q,
    ) -> Result<ExtractedAudio, MediaError> {
        let video_path = video_path.as_ref();
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let target = dir.as_ref().join(format!("{}.{}", stem, self.audio_extension));
        self.extract_to(video_path, target).await
    }

    async fn extract_to(&self, video_path: &Path, target: PathBuf) -> Result<ExtractedAudio, MediaError> {
        if !video_path.is_file() {
            return Err(MediaError::NotFound(video_path.to_path_buf()));
        }
        if target == video_path {
            return Err(MediaError::WouldOverwriteInput(target));
        }

        // Guard first so a half-written file is removed if ffmpeg fails
        let guard = ScopedFile::new(target);
        self.extractor.extract(video_path, guard.path()).await?;

        info!("Extracted audio track to {:?}", guard.path());
        Ok(guard)
    }
}
