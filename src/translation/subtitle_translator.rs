/*!
 * Record-level subtitle translation.
 *
 * Each record is translated independently. Failures are retried with
 * exponential backoff; a record that still fails keeps its original text
 * and is reported as a `TranslationWarning`. Timing is never touched.
 */

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationCommonConfig;
use crate::errors::TranslationError;
use crate::subtitle_processor::TimedTextRecord;

/// Anything that can translate one line of text.
///
/// `source_language` may be `"auto"`, leaving detection to the backend.
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate_text(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError>;
}

/// A record whose translation failed and kept its source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationWarning {
    /// 1-based record index
    pub index: usize,
    pub message: String,
}

/// Translated records plus the warnings raised on the way
#[derive(Debug, Clone, Default)]
pub struct TranslationOutcome {
    pub records: Vec<TimedTextRecord>,
    pub warnings: Vec<TranslationWarning>,
}

impl TranslationOutcome {
    /// Records unchanged, no warnings
    pub fn pass_through(records: Vec<TimedTextRecord>) -> Self {
        Self {
            records,
            warnings: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Translates whole subtitle collections one record at a time
#[derive(Clone)]
pub struct SubtitleTranslator {
    translator: Arc<dyn TextTranslator>,
    retry_count: u32,
    retry_backoff_ms: u64,
}

impl SubtitleTranslator {
    pub fn new(translator: Arc<dyn TextTranslator>, common: &TranslationCommonConfig) -> Self {
        Self {
            translator,
            retry_count: common.retry_count,
            retry_backoff_ms: common.retry_backoff_ms,
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry_count: u32, retry_backoff_ms: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Translate every record from `source_language` to `target_language`
    pub async fn translate(
        &self,
        records: &[TimedTextRecord],
        source_language: &str,
        target_language: &str,
    ) -> TranslationOutcome {
        self.translate_with_progress(records, source_language, target_language, |_, _| {})
            .await
    }

    /// Same as `translate`, calling `progress(completed, total)` after each record
    pub async fn translate_with_progress<F>(
        &self,
        records: &[TimedTextRecord],
        source_language: &str,
        target_language: &str,
        progress: F,
    ) -> TranslationOutcome
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let total = records.len();
        let mut outcome = TranslationOutcome {
            records: Vec::with_capacity(total),
            warnings: Vec::new(),
        };

        for (position, record) in records.iter().enumerate() {
            let index = position + 1;

            if record.text.trim().is_empty() {
                outcome.records.push(record.clone());
            } else {
                match self
                    .translate_with_retry(&record.text, source_language, target_language)
                    .await
                {
                    Ok(text) => outcome.records.push(record.with_text(text)),
                    Err(e) => {
                        warn!("Keeping original text for record {}: {}", index, e);
                        outcome.warnings.push(TranslationWarning {
                            index,
                            message: e.to_string(),
                        });
                        outcome.records.push(record.clone());
                    }
                }
            }

            progress(index, total);
        }

        if !outcome.warnings.is_empty() {
            warn!(
                "{} of {} records could not be translated",
                outcome.warnings.len(),
                total
            );
        }

        outcome
    }

    async fn translate_with_retry(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let mut attempt: u32 = 0;

        loop {
            match self
                .translator
                .translate_text(text, source_language, target_language)
                .await
            {
                Ok(translated) => return Ok(translated),
                Err(e) if attempt >= self.retry_count => return Err(e),
                Err(e) => {
                    let backoff_ms = self.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16));
                    debug!(
                        "Translation attempt {}/{} failed: {}; retrying in {}ms",
                        attempt + 1,
                        self.retry_count + 1,
                        e,
                        backoff_ms
                    );
                    if backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
