/*!
 * Subtitle-synchronized audio segmentation.
 *
 * `Segmenter::segment` opens the audio source once and returns `Segments`,
 * a lazy iterator that writes one clip per record as it is pulled. The
 * source is released exactly once: after the last record, on the first
 * error, on `close()`, or when the iterator is dropped early.
 */

use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::app_config::{MediaConfig, SegmentationConfig};
use crate::errors::SegmentError;
use crate::subtitle_processor::TimedTextRecord;

use super::{AudioBackend, AudioSource, FfmpegBackend};

/// Time range of one clip, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipWindow {
    #[serde(rename = "clip_start")]
    pub start: f64,
    #[serde(rename = "clip_end")]
    pub end: f64,
}

impl ClipWindow {
    /// Window for `record`: no leading buffer, `buffer` seconds of trailing
    /// margin, and never past `track_duration`.
    pub fn for_record(record: &TimedTextRecord, buffer: f64, track_duration: f64) -> Self {
        let start = round_millis(record.start);
        let wanted_end = record.start + record.duration + buffer;

        let end = if wanted_end >= track_duration {
            track_duration
        } else {
            round_millis(wanted_end).min(track_duration)
        };

        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// One written clip and the subtitle record it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// 1-based position in the record sequence
    pub index: usize,
    #[serde(flatten)]
    pub record: TimedTextRecord,
    pub output_path: PathBuf,
    #[serde(flatten)]
    pub window: ClipWindow,
}

impl SegmentDescriptor {
    /// File name of the clip, e.g. `segment_001.mp3`
    pub fn file_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Same descriptor pointing into another directory
    pub fn relocated(&self, dir: &Path) -> Self {
        Self {
            output_path: dir.join(self.file_name()),
            ..self.clone()
        }
    }
}

/// Cuts audio tracks into per-record clips
#[derive(Clone)]
pub struct Segmenter {
    backend: Arc<dyn AudioBackend>,
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(backend: Arc<dyn AudioBackend>, config: SegmentationConfig) -> Self {
        Self { backend, config }
    }

    /// Segmenter backed by ffprobe/ffmpeg
    pub fn with_ffmpeg(media: MediaConfig, config: SegmentationConfig) -> Self {
        Self::new(Arc::new(FfmpegBackend::new(media)), config)
    }

    /// Override the trailing buffer
    pub fn with_buffer_time(mut self, seconds: f64) -> Self {
        self.config.buffer_time_seconds = seconds;
        self
    }

    /// Open `audio_path` and prepare one clip per record in `output_dir`.
    ///
    /// Nothing is written until the returned iterator is pulled. Calling this
    /// again with the same inputs starts a fresh sequence that overwrites the
    /// same files.
    pub fn segment<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        audio_path: P,
        records: &[TimedTextRecord],
        output_dir: Q,
    ) -> Result<Segments, SegmentError> {
        let audio_path = audio_path.as_ref();
        let output_dir = output_dir.as_ref();

        let max = self.config.max_segments();
        if records.len() > max {
            return Err(SegmentError::LimitExceeded {
                count: records.len(),
                width: self.config.segment_index_width,
                max,
            });
        }

        let source = self
            .backend
            .open(audio_path)
            .map_err(|e| SegmentError::AudioDecode {
                path: audio_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        std::fs::create_dir_all(output_dir).map_err(|source| SegmentError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let track_duration = source.duration();
        debug!(
            "Segmenting {:?} ({:.3}s) into {} clips in {:?}",
            audio_path,
            track_duration,
            records.len(),
            output_dir
        );

        let mut segments = Segments {
            source: Some(source),
            records: records.to_vec().into_iter(),
            next_index: 1,
            total: records.len(),
            last_successful: 0,
            track_duration,
            output_dir: output_dir.to_path_buf(),
            config: self.config.clone(),
        };

        if segments.total == 0 {
            segments.close();
        }

        Ok(segments)
    }
}

/// Lazy sequence of written segments.
///
/// Yields `Ok(descriptor)` per record in input order. The first error is
/// yielded once and ends the sequence.
pub struct Segments {
    source: Option<Box<dyn AudioSource>>,
    records: std::vec::IntoIter<TimedTextRecord>,
    next_index: usize,
    total: usize,
    last_successful: usize,
    track_duration: f64,
    output_dir: PathBuf,
    config: SegmentationConfig,
}

impl Segments {
    /// Number of records in the batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Index of the last segment written, 0 if none
    pub fn last_successful(&self) -> usize {
        self.last_successful
    }

    /// Whether the audio source is still held
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Release the audio source; the sequence ends
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!(
                "Released audio source after {}/{} segments",
                self.last_successful, self.total
            );
        }
    }

    fn write_next(&mut self, record: TimedTextRecord) -> Result<SegmentDescriptor, SegmentError> {
        let index = self.next_index;
        self.next_index += 1;

        let write_error = |reason: String| SegmentError::Write {
            index,
            last_successful: index - 1,
            reason,
        };

        if record.start >= self.track_duration {
            return Err(write_error(format!(
                "record starts at {:.2}s, beyond the end of the track ({:.3}s)",
                record.start, self.track_duration
            )));
        }

        let window = ClipWindow::for_record(&record, self.config.buffer_time_seconds, self.track_duration);
        let output_path = self.output_dir.join(self.config.segment_file_name(index));

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| write_error("audio source already released".to_string()))?;

        source
            .write_clip(window, &output_path)
            .map_err(|e| write_error(e.to_string()))?;

        debug!("Segment {:?} has been created", output_path);
        self.last_successful = index;

        Ok(SegmentDescriptor {
            index,
            record,
            output_path,
            window,
        })
    }
}

impl Iterator for Segments {
    type Item = Result<SegmentDescriptor, SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.source.is_none() {
            return None;
        }

        let Some(record) = self.records.next() else {
            self.close();
            return None;
        };

        let result = self.write_next(record);
        match &result {
            Ok(_) if self.records.len() == 0 => self.close(),
            Ok(_) => {}
            Err(e) => {
                error!("{}", e);
                self.close();
            }
        }

        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.source.is_none() {
            return (0, Some(0));
        }
        (0, Some(self.records.len()))
    }
}

impl FusedIterator for Segments {}

impl Drop for Segments {
    fn drop(&mut self) {
        self.close();
    }
}
