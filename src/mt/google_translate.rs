//! Google Translate API v2 provider
//!
//! The generic translation-service backend. The API key is read from
//! `GOOGLE_TRANSLATE_API_KEY`; keys are created in the Google Cloud console.
//!
//! Requests carry at most 128 strings and each string at most 30 000
//! characters. Larger batches are split into several requests that run one
//! after another, so the output keeps the input order.

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{
    MachineTranslator, ensure_same_length, normalize_locale, validate_locale,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const API_KEY_VAR: &str = "GOOGLE_TRANSLATE_API_KEY";

const API_KEY_HEADER: &str = "x-goog-api-key";

const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateProvider {
    /// Google Translate v2 accepts up to 128 texts per request
    const MAX_BATCH_SIZE: usize = 128;

    const MAX_CHARS_PER_STRING: usize = 30_000;

    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
            MtError::ConfigError(format!("{} environment variable not set", API_KEY_VAR))
        })?;

        Self::new(api_key)
    }

    /// Point the provider at another endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn chunk_batch(texts: &[String]) -> Vec<&[String]> {
        texts.chunks(Self::MAX_BATCH_SIZE).collect()
    }

    fn check_length(texts: &[String]) -> MtResult<()> {
        for (i, text) in texts.iter().enumerate() {
            if text.chars().count() > Self::MAX_CHARS_PER_STRING {
                return Err(MtError::TranslationError(format!(
                    "Text at index {} exceeds maximum length of {} characters",
                    i,
                    Self::MAX_CHARS_PER_STRING
                )));
            }
        }
        Ok(())
    }

    async fn translate_chunk(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        let body = json!({
            "q": texts,
            "source": normalize_locale(source_locale),
            "target": normalize_locale(target_locale),
            "format": "text"
        });

        let response = self
            .client
            .post(&self.base_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(if status.as_u16() == 429 {
                MtError::RateLimited(format!("API quota exceeded ({}): {}", status, error_text))
            } else if status.is_client_error() {
                MtError::ConfigError(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::TranslationError(format!("API server error ({}): {}", status, error_text))
            });
        }

        let parsed: TranslateResponse = response.json().await.map_err(|e| {
            MtError::TranslationError(format!(
                "Failed to parse API response: {}",
                e.without_url()
            ))
        })?;

        let results: Vec<String> = parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect();
        ensure_same_length(texts.len(), results.len())?;
        Ok(results)
    }
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        let mut results = self
            .translate_batch(&[text.to_string()], source_locale, target_locale)
            .await?;
        Ok(results.pop().unwrap_or_default())
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if texts.is_empty() || texts.iter().all(|t| t.is_empty()) {
            return Ok(texts.to_vec());
        }
        Self::check_length(texts)?;

        let mut all_results = Vec::with_capacity(texts.len());
        for chunk in Self::chunk_batch(texts) {
            let chunk_results = self
                .translate_chunk(chunk, source_locale, target_locale)
                .await?;
            all_results.extend(chunk_results);
        }

        ensure_same_length(texts.len(), all_results.len())?;
        Ok(all_results)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_valid_key() {
        let provider = GoogleTranslateProvider::new("test-api-key".to_string()).unwrap();
        assert_eq!(provider.provider_name(), "Google Translate");
    }

    #[test]
    fn test_new_with_blank_key() {
        for key in ["", "   "] {
            match GoogleTranslateProvider::new(key.to_string()) {
                Err(MtError::ConfigError(msg)) => assert!(msg.contains("empty")),
                other => panic!("Expected ConfigError, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_from_env_without_key() {
        unsafe {
            std::env::remove_var(API_KEY_VAR);
        }
        match GoogleTranslateProvider::from_env() {
            Err(MtError::ConfigError(msg)) => assert!(msg.contains("not set")),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_chunking() {
        let texts = (0..300).map(|i| format!("text{}", i)).collect::<Vec<_>>();
        let sizes: Vec<usize> = GoogleTranslateProvider::chunk_batch(&texts)
            .iter()
            .map(|c| c.len())
            .collect();
        assert_eq!(sizes, vec![128, 128, 44]);
        assert!(GoogleTranslateProvider::chunk_batch(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_needs_no_request() {
        // the base URL is unreachable; an empty batch must not touch it
        let provider = GoogleTranslateProvider::new("test-key".to_string())
            .unwrap()
            .with_base_url("http://127.0.0.1:9/unreachable");
        assert_eq!(provider.translate("", "zh-CN", "en").await.unwrap(), "");
        let results = provider.translate_batch(&[], "zh-CN", "en").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_locale() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        let result = provider.translate("hello", "en", "invalid#code").await;
        assert!(matches!(result, Err(MtError::InvalidLocale(_))));
    }

    #[tokio::test]
    async fn test_text_too_long() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        let long_text = "字".repeat(GoogleTranslateProvider::MAX_CHARS_PER_STRING + 1);
        match provider.translate(&long_text, "zh-CN", "en").await {
            Err(MtError::TranslationError(msg)) => assert!(msg.contains("exceeds maximum")),
            other => panic!("Expected TranslationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let provider = GoogleTranslateProvider::new("test-key".to_string())
            .unwrap()
            .with_base_url("http://127.0.0.1:9/unreachable");
        let result = provider.translate("你好", "zh-CN", "en").await;
        assert!(matches!(result, Err(MtError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_network_error_does_not_reveal_key() {
        // a key smuggled into the base URL must not surface either
        for base in [
            "http://127.0.0.1:9/unreachable",
            "http://127.0.0.1:9/unreachable?key=SECRETKEY123",
        ] {
            let provider = GoogleTranslateProvider::new("SECRETKEY123".to_string())
                .unwrap()
                .with_base_url(base);
            let err = provider.translate("你好", "zh-CN", "en").await.unwrap_err();
            assert!(matches!(err, MtError::NetworkError(_)));
            assert!(!err.to_string().contains("SECRETKEY123"), "{}", err);
        }
    }

    #[test]
    fn test_debug_masks_key() {
        let provider = GoogleTranslateProvider::new("secret-key".to_string()).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("***"));
        assert!(!debug_str.contains("secret-key"));
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_real_api_batch_translation() {
        if std::env::var(API_KEY_VAR).is_err() {
            eprintln!("Skipping: {} not set", API_KEY_VAR);
            return;
        }

        let provider = GoogleTranslateProvider::from_env().unwrap();
        let texts = vec!["你好".to_string(), "再见".to_string()];
        let results = provider.translate_batch(&texts, "zh-CN", "en").await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_empty()));
    }
}
