/*!
 * Course manager.
 *
 * This module handles:
 * - Creating an empty course with stable deck identifiers
 * - Importing lessons through the segmentation pipeline
 * - Reading lessons back by index
 * - Exporting phrase triples for flash cards
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;
use crate::language_utils;
use crate::pipeline::{Pipeline, RunRequest, SegmentProgress};
use crate::subtitle_processor::to_pretty_json;

use super::models::{AnkiIds, CourseInfo, ExportTriple, LessonEntry, LessonImport, LessonInfo, Phrase};

pub const COURSE_INFO_FILE: &str = "course-info.json";
pub const LESSON_INFO_FILE: &str = "lesson-info.json";

const LESSONS_DIR: &str = "lessons";
const SOURCE_AUDIO_DIR: &str = "source-audio";

static LESSON_DIR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^lesson_(\d+)$").unwrap());

/// Handle on a course directory
#[derive(Debug, Clone)]
pub struct CourseManager {
    root: PathBuf,
}

impl CourseManager {
    /// Open an existing course
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !FileManager::file_exists(root.join(COURSE_INFO_FILE)) {
            return Err(anyhow!("No course found at {:?} (missing {})", root, COURSE_INFO_FILE));
        }
        Ok(Self { root })
    }

    /// Create an empty course at `path`.
    ///
    /// Deck identifiers are generated here and never regenerated.
    pub fn create_course<P: AsRef<Path>>(name: &str, path: P, target_language: &str) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let info_path = root.join(COURSE_INFO_FILE);

        if FileManager::file_exists(&info_path) {
            return Err(anyhow!("A course already exists at {:?}", root));
        }
        if name.trim().is_empty() {
            return Err(anyhow!("Course name cannot be empty"));
        }
        language_utils::validate_language_code(target_language)?;

        let course = CourseInfo {
            name: name.to_string(),
            target_language: language_utils::normalize_to_part1_or_part2t(target_language)?,
            lessons: Vec::new(),
            anki: generate_anki_ids(),
        };

        FileManager::ensure_dir(&root)?;
        let manager = Self { root };
        manager.save_info(&course)?;

        info!("Created course '{}' at {:?}", course.name, manager.root);
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read `course-info.json`
    pub fn info(&self) -> Result<CourseInfo> {
        read_json(&self.root.join(COURSE_INFO_FILE))
    }

    fn save_info(&self, course: &CourseInfo) -> Result<()> {
        write_json(&self.root.join(COURSE_INFO_FILE), course)
    }

    /// Lesson path relative to the course root
    fn lesson_path(index: usize) -> String {
        format!("{}/lesson_{}", LESSONS_DIR, index)
    }

    pub fn lesson_dir(&self, index: usize) -> PathBuf {
        self.root.join(Self::lesson_path(index))
    }

    /// Smallest index above every lesson listed or present on disk
    pub fn next_lesson_index(&self) -> Result<usize> {
        let mut highest = self
            .info()?
            .lessons
            .iter()
            .filter_map(|entry| entry.path.rsplit('/').next().and_then(parse_lesson_index))
            .max()
            .unwrap_or(0);

        let lessons_dir = self.root.join(LESSONS_DIR);
        if FileManager::dir_exists(&lessons_dir) {
            for entry in fs::read_dir(&lessons_dir).with_context(|| format!("Failed to list {:?}", lessons_dir))? {
                let entry = entry?;
                if let Some(index) = parse_lesson_index(&entry.file_name().to_string_lossy()) {
                    highest = highest.max(index);
                }
            }
        }

        Ok(highest + 1)
    }

    /// Segment a video into a new lesson and register it with the course
    pub async fn import_lesson<F>(&self, pipeline: &Pipeline, lesson: LessonImport, on_progress: F) -> Result<LessonInfo>
    where
        F: FnMut(&SegmentProgress),
    {
        let mut course = self.info()?;

        let index = match lesson.index {
            Some(0) => return Err(anyhow!("Lesson indices start at 1")),
            Some(index) => index,
            None => self.next_lesson_index()?,
        };
        let relative = Self::lesson_path(index);
        let lesson_dir = self.root.join(&relative);
        let fresh_dir = !FileManager::dir_exists(&lesson_dir);

        info!("Importing '{}' as lesson {}", lesson.name, index);

        let mut request = RunRequest::new(
            &lesson.video_path,
            &lesson.subtitle_path,
            lesson_dir.join(SOURCE_AUDIO_DIR),
        )
        .with_source_language(course.target_language.clone());
        request.target_language = lesson.native_language.clone();
        request.skip_extraction = lesson.skip_extraction;

        let report = match pipeline.run(request, on_progress).await {
            Ok(report) => report,
            Err(e) => {
                if fresh_dir {
                    discard_lesson_dir(&lesson_dir);
                }
                return Err(anyhow::Error::new(e).context(format!("Failed to segment lesson '{}'", lesson.name)));
            }
        };

        let untranslated: HashSet<usize> = report.translation_warnings.iter().map(|w| w.index).collect();
        let translated = lesson.native_language.is_some();

        let phrases: Vec<Phrase> = report
            .segments
            .iter()
            .map(|segment| {
                let spoken = report
                    .original_records
                    .get(segment.index - 1)
                    .map(|r| r.text.clone())
                    .unwrap_or_else(|| segment.record.text.clone());
                let translation = if translated && !untranslated.contains(&segment.index) {
                    segment.record.text.clone()
                } else {
                    String::new()
                };

                Phrase {
                    index: segment.index,
                    target: translation,
                    source: spoken,
                    source_audio: segment.file_name(),
                    start: segment.record.start,
                    duration: segment.record.duration,
                }
            })
            .collect();

        if !untranslated.is_empty() {
            warn!("{} phrases of lesson {} have no translation", untranslated.len(), index);
        }

        let lesson_info = LessonInfo {
            name: lesson.name.clone(),
            source_link: lesson.source_link.clone(),
            path: relative.clone(),
            phrases,
        };
        write_json(&lesson_dir.join(LESSON_INFO_FILE), &lesson_info)?;

        let entry = LessonEntry {
            name: lesson.name,
            source_link: lesson.source_link,
            path: relative,
        };
        match course.lessons.iter_mut().find(|existing| existing.path == entry.path) {
            Some(existing) => *existing = entry,
            None => course.lessons.push(entry),
        }
        self.save_info(&course)?;

        debug!("Lesson {} has {} phrases", index, lesson_info.phrases.len());
        Ok(lesson_info)
    }

    /// Lesson metadata by index
    pub fn lesson(&self, index: usize) -> Result<LessonInfo> {
        read_json(&self.lesson_dir(index).join(LESSON_INFO_FILE))
    }

    /// All lessons listed in the course, keyed by index
    pub fn lessons(&self) -> Result<BTreeMap<usize, LessonInfo>> {
        let course = self.info()?;
        let mut lessons = BTreeMap::new();

        for entry in &course.lessons {
            let index = entry
                .path
                .rsplit('/')
                .next()
                .and_then(parse_lesson_index)
                .ok_or_else(|| anyhow!("Unexpected lesson path in course: {}", entry.path))?;
            let info: LessonInfo = read_json(&self.root.join(&entry.path).join(LESSON_INFO_FILE))?;
            lessons.insert(index, info);
        }

        Ok(lessons)
    }

    /// Phrase triples of every lesson, in lesson then phrase order
    pub fn export_phrases(&self) -> Result<Vec<ExportTriple>> {
        let triples: Vec<ExportTriple> = self
            .lessons()?
            .values()
            .flat_map(|lesson| lesson.phrases.iter().map(ExportTriple::from))
            .collect();

        info!("Exported {} phrases from {:?}", triples.len(), self.root);
        Ok(triples)
    }
}

/// Remove a lesson directory left behind by a failed import
fn discard_lesson_dir(lesson_dir: &Path) {
    match fs::remove_dir_all(lesson_dir) {
        Ok(()) => debug!("Removed unfinished lesson dir {:?}", lesson_dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove unfinished lesson dir {:?}: {}", lesson_dir, e),
    }
}

fn parse_lesson_index(name: &str) -> Option<usize> {
    LESSON_DIR_REGEX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn generate_anki_ids() -> AnkiIds {
    let mut rng = rand::rng();
    let model_id = rng.random_range((1u64 << 30)..(1u64 << 31));
    let mut deck_id = rng.random_range((1u64 << 30)..(1u64 << 31));
    while deck_id == model_id {
        deck_id = rng.random_range((1u64 << 30)..(1u64 << 31));
    }
    AnkiIds { model_id, deck_id }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = FileManager::read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = to_pretty_json(value).with_context(|| format!("Failed to serialize {:?}", path))?;
    bytes.push(b'\n');
    fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))
}
