use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language spoken in the source media (ISO code or "auto")
    pub source_language: String,

    /// Language subtitles are translated into; `None` skips translation
    #[serde(default)]
    pub target_language: Option<String>,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Segmenter settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// External media tool settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                timeout_secs: default_timeout_secs(),
            },
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                timeout_secs: default_anthropic_timeout_secs(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Retry count for a failed subtitle line before keeping its original text
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Segmenter settings.
///
/// `segment_index_width` fixes the zero padding of segment file names and
/// with it the maximum number of segments per lesson (`10^width - 1`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SegmentationConfig {
    #[serde(default = "default_segment_index_width")]
    pub segment_index_width: usize,

    /// Trailing margin added after each subtitle line, in seconds
    #[serde(default = "default_buffer_time_seconds")]
    pub buffer_time_seconds: f64,

    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            segment_index_width: default_segment_index_width(),
            buffer_time_seconds: default_buffer_time_seconds(),
            audio_extension: default_audio_extension(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl SegmentationConfig {
    /// Largest segment count the index width can name
    pub fn max_segments(&self) -> usize {
        u32::try_from(self.segment_index_width)
            .ok()
            .and_then(|width| 10usize.checked_pow(width))
            .map_or(usize::MAX, |limit| limit - 1)
    }

    /// File name for the segment at `index` (1-based)
    pub fn segment_file_name(&self, index: usize) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.file_prefix,
            index,
            self.audio_extension,
            width = self.segment_index_width
        )
    }
}

/// ffmpeg/ffprobe settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Timeout in seconds for each ffmpeg/ffprobe invocation
    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,

    /// Variable bitrate quality passed as `-q:a` (0 is best)
    #[serde(default)]
    pub audio_quality: u8,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_media_timeout_secs(),
            audio_quality: 0,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate the following subtitle line from {source_language} to {target_language}. Keep the meaning and tone. Only respond with the translated text.".to_string()
}

fn default_segment_index_width() -> usize {
    3
}

fn default_buffer_time_seconds() -> f64 {
    0.33
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

fn default_file_prefix() -> String {
    "segment".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_media_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_source_language(&self.source_language)?;
        if let Some(target) = &self.target_language {
            let _target_name = crate::language_utils::get_language_name(target)?;

            if self.translation.provider == TranslationProvider::Anthropic
                && self.translation.get_api_key().is_empty()
            {
                return Err(anyhow!("Translation API key is required for Anthropic provider"));
            }
        }

        let seg = &self.segmentation;
        if seg.segment_index_width == 0 || seg.segment_index_width > 9 {
            return Err(anyhow!(
                "segment_index_width must be between 1 and 9, got {}",
                seg.segment_index_width
            ));
        }
        if !seg.buffer_time_seconds.is_finite() || seg.buffer_time_seconds < 0.0 {
            return Err(anyhow!(
                "buffer_time_seconds must be a non-negative number, got {}",
                seg.buffer_time_seconds
            ));
        }
        if seg.audio_extension.trim().is_empty() || seg.audio_extension.contains('.') {
            return Err(anyhow!("audio_extension must be a bare extension such as \"mp3\""));
        }
        if seg.file_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(anyhow!("file_prefix must not contain a path separator"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "auto".to_string(),
            target_language: None,
            translation: TranslationConfig::default(),
            segmentation: SegmentationConfig::default(),
            media: MediaConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        // Ollama doesn't use API keys
        String::new()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs)
    }

    /// System prompt with the language placeholders filled in
    pub fn render_system_prompt(&self, source_language: &str, target_language: &str) -> String {
        let source = if crate::language_utils::is_auto(source_language) {
            "the detected source language".to_string()
        } else {
            crate::language_utils::get_language_name(source_language)
                .unwrap_or_else(|_| source_language.to_string())
        };
        let target = crate::language_utils::get_language_name(target_language)
            .unwrap_or_else(|_| target_language.to_string());

        self.common
            .system_prompt
            .replace("{source_language}", &source)
            .replace("{target_language}", &target)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::Anthropic),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
