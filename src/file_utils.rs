use anyhow::{Result, Context, anyhow};
use log::{debug, error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, creating the parent directory
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir(parent)?;
            }
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Sibling path with the same stem and a different extension
    pub fn sibling_with_extension<P: AsRef<Path>>(path: P, extension: &str) -> PathBuf {
        path.as_ref().with_extension(extension)
    }

    /// Replace `target` with the directory at `staging` in one rename.
    ///
    /// Both must live on the same filesystem. Any previous `target` is moved
    /// aside first and deleted only once `staging` is in place; if the final
    /// rename fails the previous contents are restored.
    pub fn replace_dir<P1: AsRef<Path>, P2: AsRef<Path>>(staging: P1, target: P2) -> Result<()> {
        let staging = staging.as_ref();
        let target = target.as_ref();

        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::ensure_dir(parent)?;

        if !target.exists() {
            fs::rename(staging, target)
                .with_context(|| format!("Failed to move {:?} to {:?}", staging, target))?;
            return Ok(());
        }

        if !target.is_dir() {
            return Err(anyhow!("Output path exists and is not a directory: {:?}", target));
        }

        // Removed recursively on drop, together with the previous contents
        let holder = tempfile::Builder::new()
            .prefix(".phrasecut-previous-")
            .tempdir_in(parent)
            .with_context(|| format!("Failed to create backup area in {:?}", parent))?;
        let previous = holder.path().join("previous");

        fs::rename(target, &previous)
            .with_context(|| format!("Failed to move aside existing {:?}", target))?;

        if let Err(e) = fs::rename(staging, target) {
            if let Err(restore) = fs::rename(&previous, target) {
                error!("Failed to restore {:?} after aborted replace: {}", target, restore);
            }
            return Err(anyhow!("Failed to move {:?} to {:?}: {}", staging, target, e));
        }

        debug!("Replaced {:?}", target);
        Ok(())
    }

    /// Detect if a file is a subtitle, an audio file or a video file
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow!("File does not exist: {:?}", path));
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let subtitle_extensions = ["srt", "vtt", "json"];
        let audio_extensions = ["mp3", "m4a", "aac", "wav", "flac", "ogg", "opus"];
        // Not exhaustive but covers the usual ffmpeg inputs
        let video_extensions = [
            "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
            "mpg", "mpeg", "ogv", "ts", "mts", "m2ts",
        ];

        let file_type = if subtitle_extensions.contains(&ext.as_str()) {
            FileType::Subtitle
        } else if audio_extensions.contains(&ext.as_str()) {
            FileType::Audio
        } else if video_extensions.contains(&ext.as_str()) {
            FileType::Video
        } else {
            FileType::Unknown
        };

        Ok(file_type)
    }
}

/// Enum representing different file types
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    /// Subtitle file (SRT, WebVTT or normalized JSON)
    Subtitle,
    /// Audio-only media
    Audio,
    /// Video container supported by ffmpeg
    Video,
    /// Unknown file type
    Unknown,
}

/// A file that is deleted when the guard goes out of scope.
///
/// Release happens on every exit path. A file that is already gone is
/// logged as a warning, any other failure as an error; neither is
/// propagated.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
    released: bool,
}

impl ScopedFile {
    /// Take ownership of the file at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now instead of at drop
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_file(&self.path) {
            Ok(()) => info!("File successfully removed: {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("File was already removed or does not exist: {:?}", self.path)
            }
            Err(e) => error!("An error occurred while trying to remove {:?}: {}", self.path, e),
        }
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        self.remove();
    }
}
