/*!
 * Audio extraction and segmentation.
 *
 * - `extractor`: pulls the audio channel out of a video container
 * - `segmenter`: cuts an audio track into one clip per subtitle record
 *
 * Decoding and encoding go through the `AudioBackend` trait. The production
 * backend drives ffprobe/ffmpeg; tests plug in in-memory fakes.
 */

use anyhow::{Result, anyhow, Context};
use log::{debug, error};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::app_config::MediaConfig;

pub mod extractor;
pub mod segmenter;

pub use extractor::{AudioExtractor, ExtractedAudio, FfmpegExtractor, MediaExtractor};
pub use segmenter::{ClipWindow, SegmentDescriptor, Segmenter, Segments};

/// Opens audio sources for segmentation
pub trait AudioBackend: Send + Sync {
    /// Open `path` and determine its total duration
    fn open(&self, path: &Path) -> Result<Box<dyn AudioSource>>;
}

/// An open, decodable audio source.
///
/// The source is released when the box is dropped.
pub trait AudioSource: Send {
    /// Total duration in seconds
    fn duration(&self) -> f64;

    /// Encode the `[window.start, window.end]` range into `output`
    fn write_clip(&mut self, window: ClipWindow, output: &Path) -> Result<()>;
}

/// ffprobe/ffmpeg backed audio sources
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    media: MediaConfig,
}

impl FfmpegBackend {
    pub fn new(media: MediaConfig) -> Self {
        Self { media }
    }

    /// Duration of a media file as reported by ffprobe
    pub fn probe_duration(&self, path: &Path) -> Result<f64> {
        let mut command = Command::new(&self.media.ffprobe_path);
        command
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path);
        let output = run_with_timeout(&mut command, Duration::from_secs(self.media.timeout_secs))
            .with_context(|| format!("Failed to execute {}", self.media.ffprobe_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffprobe failed: {}", stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration: f64 = stdout
            .trim()
            .parse()
            .with_context(|| format!("Unexpected ffprobe duration output: {:?}", stdout.trim()))?;

        if !duration.is_finite() || duration <= 0.0 {
            return Err(anyhow!("Audio source has no playable duration: {}", duration));
        }

        Ok(duration)
    }
}

impl AudioBackend for FfmpegBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioSource>> {
        if !path.is_file() {
            return Err(anyhow!("Audio file does not exist: {:?}", path));
        }

        let duration = self.probe_duration(path)?;
        debug!("Opened audio source {:?} ({:.3}s)", path, duration);

        Ok(Box::new(FfmpegSource {
            path: path.to_path_buf(),
            duration,
            media: self.media.clone(),
        }))
    }
}

struct FfmpegSource {
    path: PathBuf,
    duration: f64,
    media: MediaConfig,
}

impl AudioSource for FfmpegSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn write_clip(&mut self, window: ClipWindow, output: &Path) -> Result<()> {
        // Metadata is stripped and bitexact set so reruns produce identical bytes
        let mut command = Command::new(&self.media.ffmpeg_path);
        command
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", window.start))
            .arg("-t")
            .arg(format!("{:.3}", window.length()))
            .arg("-i")
            .arg(&self.path)
            .arg("-vn")
            .arg("-map_metadata")
            .arg("-1")
            .arg("-q:a")
            .arg(self.media.audio_quality.to_string())
            .arg("-fflags")
            .arg("+bitexact")
            .arg("-flags:a")
            .arg("+bitexact")
            .arg(output);
        let result = run_with_timeout(&mut command, Duration::from_secs(self.media.timeout_secs))
            .with_context(|| format!("Failed to execute {}", self.media.ffmpeg_path))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!("ffmpeg failed: {}", filter_ffmpeg_stderr(&stderr)));
        }

        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        debug!("Closed audio source {:?}", self.path);
    }
}

/// Run `command` to completion, killing it once `timeout` has elapsed.
/// Output pipes are drained on their own threads.
pub(crate) fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            error!("Process timed out after {}s", timeout.as_secs());
            return Err(anyhow!("Process timed out after {} seconds", timeout.as_secs()));
        }
        thread::sleep(Duration::from_millis(10));
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub(crate) fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "encoder",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
