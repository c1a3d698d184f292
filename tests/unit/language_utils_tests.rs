/*!
 * Tests for language code utilities
 */

use phrasecut::language_utils::{
    get_language_name, is_auto, normalize_to_part1_or_part2t, validate_language_code, validate_source_language,
};

/// Test that 2 and 3 letter codes are accepted
#[test]
fn test_validate_language_code_withKnownCodes_shouldSucceed() {
    for code in ["en", "fr", "fra", "fre", "deu", "ger", "ES"] {
        assert!(validate_language_code(code).is_ok(), "{}", code);
    }
}

/// Test that unknown codes are rejected
#[test]
fn test_validate_language_code_withUnknownCodes_shouldFail() {
    for code in ["", "x", "zz", "english", "auto"] {
        assert!(validate_language_code(code).is_err(), "{}", code);
    }
}

/// Test that auto is only valid as a source
#[test]
fn test_validate_source_language_withAuto_shouldSucceed() {
    assert!(is_auto("AUTO"));
    assert!(validate_source_language("auto").is_ok());
    assert!(validate_source_language("nl").is_ok());
    assert!(validate_source_language("nope").is_err());
}

/// Test that two-letter codes are preferred when available
#[test]
fn test_normalize_to_part1_or_part2t_shouldPreferTwoLetters() {
    assert_eq!(normalize_to_part1_or_part2t("spa").unwrap(), "es");
    assert_eq!(normalize_to_part1_or_part2t("chi").unwrap(), "zh");
    assert_eq!(normalize_to_part1_or_part2t("fre").unwrap(), "fr");
    assert_eq!(normalize_to_part1_or_part2t("ger").unwrap(), "de");
}

/// Test English names
#[test]
fn test_get_language_name_shouldReturnEnglishName() {
    assert_eq!(get_language_name("ja").unwrap(), "Japanese");
    assert!(get_language_name("qq").is_err());
}
