/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::path::Path;

use phrasecut::file_utils::{FileManager, FileType, ScopedFile};
use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "exists.tmp", "test content")?;

    assert!(FileManager::file_exists(&test_file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test that dir_exists returns false for non-existent directories
#[test]
fn test_dir_exists_withNonExistentDir_shouldReturnFalse() {
    assert!(!FileManager::dir_exists("./non_existent_directory_12345"));
}

/// Test that write_to_file creates missing parents
#[test]
fn test_write_to_file_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = temp_dir.path().join("a/b/c.txt");

    FileManager::write_to_file(&target, "hello")?;
    assert_eq!(FileManager::read_to_string(&target)?, "hello");
    Ok(())
}

/// Test the sibling path helper
#[test]
fn test_sibling_with_extension_shouldSwapExtension() {
    assert_eq!(
        FileManager::sibling_with_extension(Path::new("/tmp/movie.srt"), "json"),
        Path::new("/tmp/movie.json")
    );
}

/// Test file type detection by extension
#[test]
fn test_detect_file_type_shouldClassifyByExtension() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let cases = [
        ("a.srt", FileType::Subtitle),
        ("a.vtt", FileType::Subtitle),
        ("a.MP3", FileType::Audio),
        ("a.mkv", FileType::Video),
        ("a.xyz", FileType::Unknown),
    ];

    for (name, expected) in cases {
        let path = common::create_test_file(temp_dir.path(), name, "x")?;
        assert_eq!(FileManager::detect_file_type(&path)?, expected, "{}", name);
    }

    assert!(FileManager::detect_file_type(temp_dir.path().join("missing.mp4")).is_err());
    Ok(())
}

/// Test that replace_dir moves the staging directory into a fresh target
#[test]
fn test_replace_dir_withNoTarget_shouldMoveStaging() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let staging = temp_dir.path().join("staging");
    fs::create_dir(&staging)?;
    common::create_test_file(&staging, "new.txt", "new")?;

    let target = temp_dir.path().join("out");
    FileManager::replace_dir(&staging, &target)?;

    assert!(!staging.exists());
    assert_eq!(fs::read_to_string(target.join("new.txt"))?, "new");
    Ok(())
}

/// Test that replace_dir drops stale files from a previous target
#[test]
fn test_replace_dir_withExistingTarget_shouldReplaceContents() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = temp_dir.path().join("out");
    fs::create_dir(&target)?;
    common::create_test_file(&target, "stale.txt", "old")?;

    let staging = temp_dir.path().join("staging");
    fs::create_dir(&staging)?;
    common::create_test_file(&staging, "new.txt", "new")?;

    FileManager::replace_dir(&staging, &target)?;

    assert!(!target.join("stale.txt").exists());
    assert!(target.join("new.txt").exists());
    assert!(common::entries_with_prefix(temp_dir.path(), ".phrasecut-previous-")?.is_empty());
    Ok(())
}

/// Test that a file target is never clobbered
#[test]
fn test_replace_dir_withFileTarget_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = common::create_test_file(temp_dir.path(), "out", "file")?;
    let staging = temp_dir.path().join("staging");
    fs::create_dir(&staging)?;

    assert!(FileManager::replace_dir(&staging, &target).is_err());
    assert_eq!(fs::read_to_string(&target)?, "file");
    Ok(())
}

/// Test that ScopedFile deletes on drop
#[test]
fn test_scoped_file_onDrop_shouldRemoveFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "scratch.mp3", "x")?;

    {
        let guard = ScopedFile::new(&path);
        assert_eq!(guard.path(), path.as_path());
    }

    assert!(!path.exists());
    Ok(())
}

/// Test that releasing a file that is already gone does not panic
#[test]
fn test_scoped_file_release_withMissingFile_shouldNotPanic() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    ScopedFile::new(temp_dir.path().join("never-created.mp3")).release();
    Ok(())
}
