/*!
 * Course store: a directory of lessons built from segmented media.
 *
 * - `models`: the JSON documents kept on disk
 * - `manager`: course creation, lesson import, and phrase export
 */

pub mod manager;
pub mod models;

pub use manager::{CourseManager, COURSE_INFO_FILE, LESSON_INFO_FILE};
pub use models::{AnkiIds, CourseInfo, ExportTriple, LessonEntry, LessonImport, LessonInfo, Phrase};
