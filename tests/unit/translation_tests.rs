/*!
 * Tests for the record-level translation stage
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use phrasecut::app_config::TranslationCommonConfig;
use phrasecut::providers::mock::MockProvider;
use phrasecut::subtitle_processor::TimedTextRecord;
use phrasecut::translation::{SubtitleTranslator, TranslationCache};

fn records(texts: &[&str]) -> Vec<TimedTextRecord> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| TimedTextRecord::new(i as f64 * 3.0, 2.5, *text))
        .collect()
}

fn translator(provider: &MockProvider) -> SubtitleTranslator {
    SubtitleTranslator::new(Arc::new(provider.clone()), &TranslationCommonConfig::default()).with_retry(1, 0)
}

/// Test that timing is kept and only text changes
#[tokio::test]
async fn test_translate_withWorkingProvider_shouldKeepTiming() {
    let provider = MockProvider::working();
    let input = records(&["Hola", "Adiós"]);

    let outcome = translator(&provider).translate(&input, "es", "en").await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.records.len(), 2);
    for (original, translated) in input.iter().zip(&outcome.records) {
        assert_eq!(original.start, translated.start);
        assert_eq!(original.duration, translated.duration);
        assert_eq!(translated.text, format!("[TRANSLATED to en] {}", original.text));
    }
}

/// Test that one failing record keeps its text and is reported by index
#[tokio::test]
async fn test_translate_withRecordThreeFailing_shouldWarnAndKeepOriginal() {
    let provider = MockProvider::failing_for("three");
    let input = records(&["one", "two", "three", "four", "five"]);

    let outcome = translator(&provider).translate(&input, "auto", "fr").await;

    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.records[2], input[2]);
    assert_eq!(outcome.records[3].text, "[TRANSLATED to fr] four");
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].index, 3);
    // one attempt plus one retry for the failing record
    assert_eq!(provider.request_count(), 4 + 2);
}

/// Test that a transient failure is recovered by the retry
#[tokio::test]
async fn test_translate_withIntermittentProvider_shouldRetry() {
    let provider = MockProvider::intermittent(2);
    let input = records(&["a", "b", "c"]);

    let outcome = translator(&provider).translate(&input, "en", "de").await;

    assert!(outcome.is_complete());
    assert!(outcome.records.iter().all(|r| r.text.starts_with("[TRANSLATED to de]")));
}

/// Test that a dead provider leaves every record untouched
#[tokio::test]
async fn test_translate_withFailingProvider_shouldPassEverythingThrough() {
    let provider = MockProvider::failing();
    let input = records(&["a", "b"]);

    let outcome = translator(&provider).translate(&input, "en", "de").await;

    assert_eq!(outcome.records, input);
    assert_eq!(outcome.warnings.iter().map(|w| w.index).collect::<Vec<_>>(), vec![1, 2]);
}

/// Test that empty answers count as failures
#[tokio::test]
async fn test_translate_withEmptyResponses_shouldWarn() {
    let provider = MockProvider::empty();
    let outcome = translator(&provider).translate(&records(&["a"]), "en", "de").await;

    assert_eq!(outcome.records[0].text, "a");
    assert_eq!(outcome.warnings.len(), 1);
}

/// Test that blank records are not sent
#[tokio::test]
async fn test_translate_withBlankText_shouldSkipRequest() {
    let provider = MockProvider::working();
    let input = records(&["", "   ", "x"]);

    let outcome = translator(&provider).translate(&input, "en", "de").await;

    assert_eq!(provider.request_count(), 1);
    assert_eq!(outcome.records[0].text, "");
    assert!(outcome.is_complete());
}

/// Test that progress is reported once per record
#[tokio::test]
async fn test_translate_with_progress_shouldReportEachRecord() {
    let provider = MockProvider::working();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    translator(&provider)
        .translate_with_progress(&records(&["a", "b", "c"]), "en", "de", move |done, total| {
            assert_eq!(total, 3);
            assert_eq!(done, seen.fetch_add(1, Ordering::SeqCst) + 1);
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Test that the cache serves repeated lookups
#[test]
fn test_translation_cache_shouldCountHitsAndMisses() {
    let cache = TranslationCache::new(true);

    assert!(cache.get("hola", "es", "en").is_none());
    cache.store("hola", "es", "en", "hello");
    assert_eq!(cache.get("hola", "es", "en").as_deref(), Some("hello"));

    let (hits, misses, _) = cache.stats();
    assert_eq!((hits, misses), (1, 1));
}
