/*!
 * # phrasecut - subtitle-synchronized audio segmentation
 *
 * Cuts the audio of a video into one clip per subtitle line, for building
 * language-learning material.
 *
 * ## Features
 *
 * - Normalize SRT, WebVTT and JSON subtitles into timed text records
 * - Optionally translate every record through an LLM provider
 *   (Ollama or Anthropic) while keeping its timing
 * - Extract the audio track of a video with ffmpeg
 * - Write `segment_001.mp3`, `segment_002.mp3`, ... plus `audio-info.json`
 * - Organize segmented lessons into courses and export phrase triples
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Subtitle normalization
 * - `translation`: Optional record-level translation stage
 * - `providers`: LLM provider clients
 * - `audio`: Audio extraction and segmentation
 * - `pipeline`: End-to-end orchestration with atomic output
 * - `course`: Course and lesson store
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod course;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod subtitle_processor;
pub mod translation;

pub use app_config::Config;
pub use audio::{MediaExtractor, SegmentDescriptor, Segmenter};
pub use errors::{AppError, MediaError, PipelineError, SegmentError, SubtitleError, TranslationError};
pub use pipeline::{Pipeline, RunReport, RunRequest, SegmentProgress};
pub use subtitle_processor::{normalize, SubtitleCollection, TimedTextRecord};
pub use translation::{SubtitleTranslator, TranslationService};
