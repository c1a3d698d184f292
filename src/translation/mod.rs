/*!
 * Optional subtitle translation stage.
 *
 * - `subtitle_translator`: per-record translation with retry and warnings
 * - `core`: provider-backed `TranslationService`
 * - `cache`: in-memory cache in front of the providers
 */

pub use self::cache::TranslationCache;
pub use self::core::TranslationService;
pub use self::subtitle_translator::{
    SubtitleTranslator, TextTranslator, TranslationOutcome, TranslationWarning,
};

pub mod cache;
pub mod core;
pub mod subtitle_translator;
