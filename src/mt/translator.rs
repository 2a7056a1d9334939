//! Machine translation trait and locale helpers
//!
//! `MachineTranslator` is the text-level seam of the pipeline: it knows
//! nothing about documents, only about strings. The document-level backends
//! in [`crate::backend`] feed it the paragraph texts of a page unit.
//!
//! # Example
//!
//! ```ignore
//! use docx_translate::mt::{MachineTranslator, GoogleTranslateProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GoogleTranslateProvider::from_env()?;
//!
//!     let texts = vec!["你好".to_string(), "再见".to_string()];
//!     let results = provider.translate_batch(&texts, "zh-CN", "en").await?;
//!     println!("{:?}", results);
//!
//!     Ok(())
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use async_trait::async_trait;

/// Generic trait for machine translation providers
///
/// Implementations either call a remote service (Google Translate, an
/// OpenAI-compatible chat endpoint) or are deterministic (passthrough, mock).
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text string from source to target locale
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String>;

    /// Translate several strings
    ///
    /// # Guarantees
    ///
    /// - Output order matches input order
    /// - Output length equals input length, otherwise an error is returned
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>>;

    /// Name used in logs, e.g. "Google Translate"
    fn provider_name(&self) -> &str;
}

/// Check that a provider answered with one item per submitted text
pub fn ensure_same_length(submitted: usize, received: usize) -> MtResult<()> {
    if submitted != received {
        return Err(MtError::TranslationError(format!(
            "malformed response: submitted {} texts, received {} translations",
            submitted, received
        )));
    }
    Ok(())
}

/// Reduce a locale to the code Google Translate expects
///
/// Region and script are dropped (`en-US` → `en`), except for Chinese where
/// they select the written variant:
/// - `zh-CN`, `zh-Hans`, `zh-SG` → `zh-CN`
/// - `zh-TW`, `zh-Hant`, `zh-HK` → `zh-TW`
pub fn normalize_locale(locale: &str) -> String {
    let mut parts = locale.split(['-', '_']);
    let language = parts.next().unwrap_or(locale).to_lowercase();
    if language != "zh" {
        return language;
    }
    match parts.next().map(|p| p.to_lowercase()).as_deref() {
        Some("tw" | "hant" | "hk" | "mo") => "zh-TW".to_string(),
        _ => "zh-CN".to_string(),
    }
}

/// English name of a language, for prompts. Falls back to the code itself.
pub fn language_name(locale: &str) -> String {
    let name = match normalize_locale(locale).as_str() {
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "vi" => "Vietnamese",
        "th" => "Thai",
        _ => return locale.to_string(),
    };
    name.to_string()
}

/// Validate that a locale code contains only `[A-Za-z0-9_-]`
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_locale_with_region() {
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("fr_FR"), "fr");
        assert_eq!(normalize_locale("EN"), "en");
    }

    #[test]
    fn test_normalize_locale_chinese_variants() {
        assert_eq!(normalize_locale("zh"), "zh-CN");
        assert_eq!(normalize_locale("zh-CN"), "zh-CN");
        assert_eq!(normalize_locale("zh-Hans"), "zh-CN");
        assert_eq!(normalize_locale("zh-TW"), "zh-TW");
        assert_eq!(normalize_locale("zh_Hant"), "zh-TW");
        assert_eq!(normalize_locale("zh-HK"), "zh-TW");
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("zh-CN"), "Simplified Chinese");
        assert_eq!(language_name("en-GB"), "English");
        assert_eq!(language_name("xx"), "xx");
    }

    #[test]
    fn test_validate_locale() {
        assert!(validate_locale("en").is_ok());
        assert!(validate_locale("zh-CN").is_ok());
        assert!(validate_locale("de_DE").is_ok());
        assert!(validate_locale("").is_err());
        assert!(validate_locale("en@invalid").is_err());

        match validate_locale("fr#bad") {
            Err(MtError::InvalidLocale(msg)) => assert!(msg.contains("Invalid characters")),
            other => panic!("Expected InvalidLocale error, got {:?}", other),
        }
    }

    #[test]
    fn test_ensure_same_length() {
        assert!(ensure_same_length(2, 2).is_ok());
        assert!(matches!(
            ensure_same_length(3, 2),
            Err(MtError::TranslationError(_))
        ));
    }
}
