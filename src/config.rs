//! Typed configuration for the pipeline stages.
//!
//! The CLI fills these from flags; library users build them directly.
//! Credentials are never stored here, providers read them from the
//! environment (`GOOGLE_TRANSLATE_API_KEY`, `DEEPSEEK_API_KEY`,
//! `OPENAI_API_KEY`).

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::docx::WriteMode;
use crate::error::{PipelineError, Result};

pub const DEFAULT_SOURCE_LOCALE: &str = "zh-CN";
pub const DEFAULT_TARGET_LOCALE: &str = "en";

/// Settings of the batch translation driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Hard ceiling on units translated at the same time
    pub workers: usize,
    /// Per-unit limit; `None` waits as long as the backend takes
    pub unit_timeout: Option<Duration>,
    /// Extra attempts after a failed one
    pub retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub retry_backoff: Duration,
}

impl DriverConfig {
    pub const DEFAULT_WORKERS: usize = 30;
    pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PipelineError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.unit_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::Config(
                "unit timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff
            .saturating_mul(factor)
            .min(Self::MAX_BACKOFF)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: Self::DEFAULT_WORKERS,
            unit_timeout: None,
            retries: 0,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// External programs used by the converting splitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub soffice: PathBuf,
    pub pdfseparate: PathBuf,
    pub pdf2docx: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            soffice: PathBuf::from("soffice"),
            pdfseparate: PathBuf::from("pdfseparate"),
            pdf2docx: PathBuf::from("pdf2docx"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// OpenAI-compatible chat completion (DeepSeek by default)
    #[default]
    Chat,
    /// Google Translate v2
    Google,
    /// Leave the text unchanged
    Passthrough,
    /// Deterministic offline translator
    Mock,
    /// Run an external program on each unit
    Command,
}

/// Which backend translates the units, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub source_locale: String,
    pub target_locale: String,
    pub mode: WriteMode,
    /// Leave paragraphs inside tables untranslated
    pub skip_tables: bool,
    pub model: Option<String>,
    pub api_base: Option<String>,
    /// Domain notes appended to the chat system prompt
    pub context: Option<String>,
    /// Program and leading arguments for [`BackendKind::Command`]
    pub command: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            source_locale: DEFAULT_SOURCE_LOCALE.to_string(),
            target_locale: DEFAULT_TARGET_LOCALE.to_string(),
            mode: WriteMode::default(),
            skip_tables: false,
            model: None,
            api_base: None,
            context: None,
            command: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.workers, 30);
        assert_eq!(config.unit_timeout, None);
        assert_eq!(config.retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = DriverConfig::default().with_workers(0);
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = DriverConfig {
            unit_timeout: Some(Duration::ZERO),
            ..DriverConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = DriverConfig {
            retry_backoff: Duration::from_secs(1),
            ..DriverConfig::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for(3), Duration::from_secs(4));
        assert_eq!(config.backoff_for(5), Duration::from_secs(10));
        assert_eq!(config.backoff_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_backend_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.kind, BackendKind::Chat);
        assert_eq!(config.source_locale, "zh-CN");
        assert_eq!(config.target_locale, "en");
        assert_eq!(config.mode, WriteMode::Replace);
    }
}
