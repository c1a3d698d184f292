/*!
 * On-disk course and lesson documents.
 *
 * ```text
 * course_dir/
 *   course-info.json
 *   lessons/
 *     lesson_<i>/
 *       lesson-info.json
 *       source-audio/
 *         audio-info.json
 *         segment_001.mp3
 * ```
 */

use serde::{Deserialize, Serialize};

/// Deck identifiers, generated once when the course is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnkiIds {
    pub model_id: u64,
    pub deck_id: u64,
}

/// `course-info.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub name: String,
    /// Language being learned; the language spoken in the lesson audio
    pub target_language: String,
    #[serde(default)]
    pub lessons: Vec<LessonEntry>,
    pub anki: AnkiIds,
}

/// A lesson as listed in the course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonEntry {
    pub name: String,
    #[serde(rename = "source-link")]
    pub source_link: String,
    /// Lesson directory relative to the course root
    pub path: String,
}

/// `lesson-info.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonInfo {
    pub name: String,
    #[serde(rename = "source-link")]
    pub source_link: String,
    pub path: String,
    #[serde(default)]
    pub phrases: Vec<Phrase>,
}

/// One segmented phrase of a lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub index: usize,
    /// Translation into the learner's language, empty when not translated
    pub target: String,
    /// Text as spoken in the audio
    pub source: String,
    /// Segment file name inside `source-audio/`
    pub source_audio: String,
    pub start: f64,
    pub duration: f64,
}

/// Flash-card material for one phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTriple {
    pub target_text: String,
    pub source_text: String,
    pub source_audio_filename: String,
}

impl From<&Phrase> for ExportTriple {
    fn from(phrase: &Phrase) -> Self {
        Self {
            target_text: phrase.target.clone(),
            source_text: phrase.source.clone(),
            source_audio_filename: phrase.source_audio.clone(),
        }
    }
}

/// Input for `CourseManager::import_lesson`
#[derive(Debug, Clone)]
pub struct LessonImport {
    pub name: String,
    pub source_link: String,
    pub video_path: std::path::PathBuf,
    pub subtitle_path: std::path::PathBuf,
    /// Translate phrases into this language
    pub native_language: Option<String>,
    /// `video_path` is already an audio file
    pub skip_extraction: bool,
    /// Overwrite this lesson instead of allocating a new index
    pub index: Option<usize>,
}
