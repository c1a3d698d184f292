/*!
 * Error types for the phrasecut library.
 *
 * Each stage of the segmentation pipeline has its own error enum so callers
 * can tell a malformed subtitle apart from an unreadable media file or a
 * failed segment write. `AppError` wraps all of them for the CLI.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors raised while normalizing a subtitle resource
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// An entry could not be parsed or carries invalid timing
    #[error("Malformed subtitle entry {entry}: {reason}")]
    Malformed {
        /// 1-based position of the offending entry in the source
        entry: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The resource format could not be recognized
    #[error("Unsupported subtitle format: {0}")]
    UnsupportedFormat(String),

    /// Reading or writing the resource failed
    #[error("Subtitle I/O error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SubtitleError {
    pub(crate) fn malformed(entry: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            entry,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the media extractor
#[derive(Error, Debug)]
pub enum MediaError {
    /// Input media does not exist
    #[error("Media file does not exist: {0:?}")]
    NotFound(PathBuf),

    /// The extraction target would overwrite the input
    #[error("Refusing to overwrite input media {0:?} with extracted audio")]
    WouldOverwriteInput(PathBuf),

    /// ffmpeg could not be spawned or returned a failure
    #[error("Audio extraction failed for {path:?}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// ffmpeg did not finish in time
    #[error("Audio extraction timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors raised by the segmenter
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The source audio could not be opened or probed
    #[error("Cannot decode audio source {path:?}: {reason}")]
    AudioDecode { path: PathBuf, reason: String },

    /// Writing one segment failed; the batch stops here
    #[error("Failed to write segment {index} (last successful: {last_successful}): {reason}")]
    Write {
        /// Index of the failing segment (1-based)
        index: usize,
        /// Index of the last segment written, 0 if none
        last_successful: usize,
        reason: String,
    },

    /// More records than the configured index width can name
    #[error("{count} segments requested but an index width of {width} allows at most {max}")]
    LimitExceeded { count: usize, width: usize, max: usize },

    /// The output directory could not be prepared
    #[error("Cannot prepare output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered with nothing usable
    #[error("Empty translation returned for: {0}")]
    EmptyResponse(String),

    /// Any other failure reported by a translation backend
    #[error("Translation failed: {0}")]
    Other(String),
}

/// Errors raised by the pipeline orchestrator
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// A translation target was requested without a translator
    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),

    /// `commit` was reached before every segment was written
    #[error("Run is incomplete: {written} of {total} segments written")]
    Incomplete { written: usize, total: usize },

    /// Working area or final relocation failed
    #[error("Pipeline I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from the segmentation pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
