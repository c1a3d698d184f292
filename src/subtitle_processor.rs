use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use crate::app_config::MediaConfig;
use crate::audio::filter_ffmpeg_stderr;
use crate::errors::{MediaError, SubtitleError};

// @module: Subtitle normalization

// @const: SRT timing line, `,` or `.` before the milliseconds
static SRT_TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @const: WebVTT timing line, hours optional, cue settings ignored
static VTT_TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})").unwrap()
});

// @const: WebVTT inline markup (<c>, <i>, karaoke timestamps)
static VTT_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One subtitle line with its timing in seconds.
///
/// `start` and `duration` are non-negative. Within a normalized sequence
/// records keep source order and `start` never decreases; the position in
/// the sequence becomes the segment index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTextRecord {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl TimedTextRecord {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// Build a record from millisecond bounds, rounding to centiseconds
    pub fn from_millis(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self::new(
            millis_to_rounded_secs(start_ms),
            millis_to_rounded_secs(end_ms - start_ms),
            text,
        )
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Same timing, new text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self::new(self.start, self.duration, text)
    }
}

impl fmt::Display for TimedTextRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:.2} +{:.2}] {}", self.start, self.duration, self.text)
    }
}

/// Convert milliseconds to seconds rounded half-up to 2 decimals.
///
/// Working from integer milliseconds keeps the result identical across runs.
pub fn millis_to_rounded_secs(ms: u64) -> f64 {
    let centis = (ms + 5) / 10;
    centis as f64 / 100.0
}

/// Parse an `HH:MM:SS,mmm` (or `.mmm`) timestamp to milliseconds
pub fn parse_timestamp(timestamp: &str) -> Result<u64, String> {
    let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

    let (hours, rest) = match parts.len() {
        4 => (parts[0], &parts[1..]),
        3 => ("0", &parts[..]),
        _ => return Err(format!("Invalid timestamp format: {}", timestamp)),
    };

    let field = |s: &str, name: &str| -> Result<u64, String> {
        s.parse::<u64>()
            .map_err(|_| format!("Failed to parse {} in timestamp: {}", name, timestamp))
    };

    timestamp_to_ms(
        field(hours, "hours")?,
        field(rest[0], "minutes")?,
        field(rest[1], "seconds")?,
        field(rest[2], "milliseconds")?,
    )
    .ok_or_else(|| format!("Invalid time components in timestamp: {}", timestamp))
}

fn timestamp_to_ms(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Supported subtitle resource formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// SubRip
    Srt,
    /// WebVTT
    WebVtt,
    /// Already-normalized `[{start, duration, text}]` JSON
    Json,
}

impl SubtitleFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::WebVtt),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Guess the format from the content
    pub fn sniff(content: &str) -> Option<Self> {
        let trimmed = content.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with("WEBVTT") {
            Some(Self::WebVtt)
        } else if trimmed.starts_with('[') {
            Some(Self::Json)
        } else if trimmed.lines().any(|l| SRT_TIMING_REGEX.is_match(l.trim())) {
            Some(Self::Srt)
        } else {
            None
        }
    }
}

/// A normalized subtitle resource
#[derive(Debug, Clone)]
pub struct SubtitleCollection {
    /// File the records were read from
    pub source_file: PathBuf,

    /// Format the source was in
    pub format: SubtitleFormat,

    /// Ordered timed text records
    pub records: Vec<TimedTextRecord>,
}

impl SubtitleCollection {
    /// Read and normalize a subtitle file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SubtitleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let format = SubtitleFormat::from_path(path)
            .or_else(|| SubtitleFormat::sniff(&content))
            .ok_or_else(|| SubtitleError::UnsupportedFormat(path.display().to_string()))?;

        let records = Self::parse_str(&content, format)?;
        debug!("Normalized {} subtitle records from {:?} ({:?})", records.len(), path, format);

        Ok(Self {
            source_file: path.to_path_buf(),
            format,
            records,
        })
    }

    /// Normalize subtitle content in the given format
    pub fn parse_str(content: &str, format: SubtitleFormat) -> Result<Vec<TimedTextRecord>, SubtitleError> {
        let content = content.trim_start_matches('\u{feff}');
        let records = match format {
            SubtitleFormat::Srt => Self::parse_srt_string(content)?,
            SubtitleFormat::WebVtt => Self::parse_vtt_string(content)?,
            SubtitleFormat::Json => Self::parse_json_string(content)?,
        };

        if records.is_empty() {
            return Err(SubtitleError::malformed(0, "no subtitle entries found"));
        }

        Ok(records)
    }

    /// Parse SRT content into records
    pub fn parse_srt_string(content: &str) -> Result<Vec<TimedTextRecord>, SubtitleError> {
        let mut records = Vec::new();

        for (i, block) in split_blocks(content).into_iter().enumerate() {
            let entry = i + 1;
            let mut lines = block.iter().copied();

            let mut timing = lines
                .next()
                .ok_or_else(|| SubtitleError::malformed(entry, "empty entry"))?;

            // Sequence numbers are informative only; order comes from the file
            if timing.parse::<u64>().is_ok() {
                timing = lines
                    .next()
                    .ok_or_else(|| SubtitleError::malformed(entry, "missing timing line"))?;
            }

            let caps = SRT_TIMING_REGEX
                .captures(timing)
                .ok_or_else(|| SubtitleError::malformed(entry, format!("invalid timing line: {}", timing)))?;

            let (start_ms, end_ms) = captured_bounds(&caps, entry)?;
            let text = lines.collect::<Vec<_>>().join("\n");

            push_record(&mut records, entry, start_ms, end_ms, text)?;
        }

        Ok(records)
    }

    /// Parse WebVTT content into records
    pub fn parse_vtt_string(content: &str) -> Result<Vec<TimedTextRecord>, SubtitleError> {
        let mut blocks = split_blocks(content).into_iter();

        match blocks.next() {
            Some(header) if header[0].starts_with("WEBVTT") => {}
            _ => return Err(SubtitleError::malformed(0, "missing WEBVTT header")),
        }

        let mut records = Vec::new();
        let mut entry = 0;

        for block in blocks {
            let first = block[0];
            if first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
                continue;
            }
            entry += 1;

            // An optional cue identifier precedes the timing line
            let (timing, text_lines) = if first.contains("-->") {
                (first, &block[1..])
            } else if block.len() > 1 && block[1].contains("-->") {
                (block[1], &block[2..])
            } else {
                return Err(SubtitleError::malformed(entry, format!("cue without timing line: {}", first)));
            };

            let caps = VTT_TIMING_REGEX
                .captures(timing)
                .ok_or_else(|| SubtitleError::malformed(entry, format!("invalid timing line: {}", timing)))?;

            let (start_ms, end_ms) = captured_bounds(&caps, entry)?;
            let text = text_lines
                .iter()
                .map(|line| VTT_TAG_REGEX.replace_all(line, "").trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");

            push_record(&mut records, entry, start_ms, end_ms, text)?;
        }

        Ok(records)
    }

    /// Validate an already-normalized JSON resource
    pub fn parse_json_string(content: &str) -> Result<Vec<TimedTextRecord>, SubtitleError> {
        let values: Vec<Value> = serde_json::from_str(content)
            .map_err(|e| SubtitleError::malformed(0, format!("invalid timed-text JSON: {}", e)))?;

        let mut records: Vec<TimedTextRecord> = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let entry = i + 1;
            let record: TimedTextRecord = serde_json::from_value(value)
                .map_err(|e| SubtitleError::malformed(entry, e.to_string()))?;

            if !record.start.is_finite() || record.start < 0.0 {
                return Err(SubtitleError::malformed(entry, format!("negative start {}", record.start)));
            }
            if !record.duration.is_finite() || record.duration < 0.0 {
                return Err(SubtitleError::malformed(entry, format!("negative duration {}", record.duration)));
            }
            if let Some(prev) = records.last() {
                if record.start < prev.start {
                    return Err(SubtitleError::malformed(
                        entry,
                        format!("start {} is before previous start {}", record.start, prev.start),
                    ));
                }
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Persist records in the normalized JSON form.
    ///
    /// Output is pretty-printed with a 4-space indent and a trailing newline,
    /// so writing the same records twice yields identical bytes.
    pub fn write_normalized<P: AsRef<Path>>(records: &[TimedTextRecord], path: P) -> Result<(), SubtitleError> {
        let path = path.as_ref();
        let io_err = |source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut bytes = to_pretty_json(records).map_err(|e| io_err(std::io::Error::other(e)))?;
        bytes.push(b'\n');
        fs::write(path, bytes).map_err(io_err)
    }

    /// Extract a text subtitle track from a media container as SRT and normalize it
    pub async fn extract_from_video<P: AsRef<Path>, Q: AsRef<Path>>(
        media: &MediaConfig,
        video_path: P,
        track_id: usize,
        output_path: Q,
    ) -> anyhow::Result<Self> {
        let video_path = video_path.as_ref();
        let output_path = output_path.as_ref();

        if !video_path.exists() {
            return Err(MediaError::NotFound(video_path.to_path_buf()).into());
        }

        let ffmpeg_future = Command::new(&media.ffmpeg_path)
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(video_path)
            .arg("-map")
            .arg(format!("0:{}", track_id))
            .arg("-c:s")
            .arg("srt")
            .arg(output_path)
            .output();

        let timeout = Duration::from_secs(media.timeout_secs);
        let result = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| MediaError::ExtractionFailed {
                    path: video_path.to_path_buf(),
                    reason: format!("failed to execute ffmpeg: {}", e),
                })?
            },
            _ = tokio::time::sleep(timeout) => {
                return Err(MediaError::Timeout(media.timeout_secs).into());
            }
        };

        if !result.status.success() {
            let filtered = filter_ffmpeg_stderr(&String::from_utf8_lossy(&result.stderr));
            error!("Subtitle extraction failed: {}", filtered);
            return Err(MediaError::ExtractionFailed {
                path: video_path.to_path_buf(),
                reason: filtered,
            }
            .into());
        }

        let collection = Self::from_file(output_path)?;
        if collection.format != SubtitleFormat::Srt {
            warn!("Extracted track {} was not written as SRT: {:?}", track_id, output_path);
        }
        Ok(collection)
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Format: {:?}", self.format)?;
        writeln!(f, "Records: {}", self.records.len())?;
        Ok(())
    }
}

/// Normalize a subtitle file into ordered timed text records
pub fn normalize<P: AsRef<Path>>(path: P) -> Result<Vec<TimedTextRecord>, SubtitleError> {
    SubtitleCollection::from_file(path).map(|c| c.records)
}

pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
    value.serialize(&mut serializer)?;
    Ok(bytes)
}

// Blank-line separated blocks of trimmed, non-empty lines
fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn captured_bounds(caps: &regex::Captures, entry: usize) -> Result<(u64, u64), SubtitleError> {
    let start = captured_ms(caps, 1, entry)?;
    let end = captured_ms(caps, 5, entry)?;
    Ok((start, end))
}

fn captured_ms(caps: &regex::Captures, first: usize, entry: usize) -> Result<u64, SubtitleError> {
    let field = |i: usize| -> Result<u64, SubtitleError> {
        match caps.get(first + i) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| SubtitleError::malformed(entry, format!("unparseable number: {}", m.as_str()))),
            // only the VTT hour group is optional
            None => Ok(0),
        }
    };

    timestamp_to_ms(field(0)?, field(1)?, field(2)?, field(3)?)
        .ok_or_else(|| SubtitleError::malformed(entry, "time component out of range"))
}

fn push_record(
    records: &mut Vec<TimedTextRecord>,
    entry: usize,
    start_ms: u64,
    end_ms: u64,
    text: String,
) -> Result<(), SubtitleError> {
    if end_ms < start_ms {
        return Err(SubtitleError::malformed(
            entry,
            format!("negative duration (start {} ms, end {} ms)", start_ms, end_ms),
        ));
    }

    let record = TimedTextRecord::from_millis(start_ms, end_ms, text);
    if let Some(prev) = records.last() {
        if record.start < prev.start {
            return Err(SubtitleError::malformed(
                entry,
                format!("start {} is before previous start {}", record.start, prev.start),
            ));
        }
    }

    records.push(record);
    Ok(())
}
