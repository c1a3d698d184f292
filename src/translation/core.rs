/*!
 * Provider-backed translation service.
 *
 * `TranslationService` turns the configured provider (Ollama or Anthropic)
 * into a `TextTranslator`, with an in-memory cache in front of it.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, info};
use std::time::Instant;
use url::Url;

use crate::app_config::{TranslationConfig, TranslationProvider as ConfigTranslationProvider};
use crate::errors::TranslationError;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::ollama::{GenerationRequest, Ollama};
use crate::providers::Provider;

use super::cache::TranslationCache;
use super::subtitle_translator::TextTranslator;

/// Parse an endpoint string into host and port
fn parse_endpoint(endpoint: &str) -> Result<(String, u16)> {
    if endpoint.is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("http://{}", endpoint))?
    };

    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Invalid host in endpoint: {}", endpoint))?;
    let host = format!("{}://{}", url.scheme(), host);

    let port = url.port().unwrap_or(if url.scheme() == "https" { 443 } else { 80 });

    Ok((host, port))
}

/// Translation provider implementation variants
#[derive(Debug)]
enum TranslationProviderImpl {
    Ollama { client: Ollama },
    Anthropic { client: Anthropic },
}

/// Translates single lines of text through the configured provider
#[derive(Debug)]
pub struct TranslationService {
    provider: TranslationProviderImpl,

    /// Configuration for the translation service
    pub config: TranslationConfig,

    /// Shared cache of finished translations
    pub cache: TranslationCache,
}

impl TranslationService {
    /// Create a new translation service with the given configuration
    pub fn new(config: TranslationConfig) -> Result<Self> {
        let timeout_secs = config.get_timeout_secs();

        let provider = match config.provider {
            ConfigTranslationProvider::Ollama => {
                let (host, port) = parse_endpoint(&config.get_endpoint())?;
                TranslationProviderImpl::Ollama {
                    client: Ollama::new(host, port, timeout_secs),
                }
            }
            ConfigTranslationProvider::Anthropic => {
                let api_key = config.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("Anthropic provider requires an API key"));
                }
                TranslationProviderImpl::Anthropic {
                    client: Anthropic::new(api_key, config.get_endpoint(), config.get_model(), timeout_secs),
                }
            }
        };

        Ok(Self {
            provider,
            config,
            cache: TranslationCache::new(true),
        })
    }

    /// Test the connection to the translation provider
    pub async fn test_connection(&self) -> Result<()> {
        info!(
            "Testing connection to {} with model {}",
            self.config.provider.display_name(),
            self.config.get_model()
        );

        let result = match &self.provider {
            TranslationProviderImpl::Ollama { client } => client.test_connection().await,
            TranslationProviderImpl::Anthropic { client } => client.test_connection().await,
        };

        result.map_err(|e| anyhow!("Failed to connect to {}: {}", self.config.provider.display_name(), e))
    }

    async fn request_translation(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let system_prompt = self.config.render_system_prompt(source_language, target_language);
        let model = self.config.get_model();
        let temperature = self.config.common.temperature;

        let translated = match &self.provider {
            TranslationProviderImpl::Ollama { client } => {
                let request = GenerationRequest::new(model, text)
                    .system(system_prompt)
                    .temperature(temperature)
                    .seed(0);
                let response = client.complete(request).await?;
                Ollama::extract_text(&response)
            }
            TranslationProviderImpl::Anthropic { client } => {
                let request = AnthropicRequest::new(model.clone(), max_tokens_for_model(&model))
                    .system(system_prompt)
                    .add_message("user", text)
                    .temperature(temperature);
                let response = client.complete(request).await?;
                debug!(
                    "Anthropic usage: {} in / {} out tokens",
                    response.usage.input_tokens, response.usage.output_tokens
                );
                Anthropic::extract_text(&response)
            }
        };

        if translated.is_empty() {
            return Err(TranslationError::EmptyResponse(text.to_string()));
        }

        Ok(translated)
    }
}

#[async_trait]
impl TextTranslator for TranslationService {
    async fn translate_text(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        if let Some(cached) = self.cache.get(text, source_language, target_language) {
            return Ok(cached);
        }

        let start_time = Instant::now();
        let translated = self.request_translation(text, source_language, target_language).await?;
        debug!(
            "{} answered in {:?}",
            self.config.provider.display_name(),
            start_time.elapsed()
        );

        self.cache.store(text, source_language, target_language, &translated);
        Ok(translated)
    }
}

/// Output budget for a single subtitle line
fn max_tokens_for_model(model: &str) -> u32 {
    match model {
        "claude-3-opus-20240229" | "claude-3-sonnet-20240229" | "claude-3-haiku-20240307" => 1024,
        _ => 512,
    }
}
