//! Mock machine translator
//!
//! Deterministic and offline. Used by the test suite and by the `mock`
//! backend of the CLI to exercise the pipeline without API keys.
//!
//! ```ignore
//! use docx_translate::mt::{MachineTranslator, MockMode, MockTranslator};
//!
//! let mock = MockTranslator::new(MockMode::Suffix);
//! assert_eq!(mock.translate("你好", "zh-CN", "en").await?, "你好 [en]");
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target locale: "你好" → "你好 [en]"
    Suffix,

    /// (text, target_locale) → translation, falling back to `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// Every call fails with this message
    Error(String),

    /// Fail only for texts containing the trigger, translate the rest with `Suffix`
    FailOn(String),
}

/// Mock translator with optional latency and a shared call counter
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Each call sleeps `delay_ms` before answering
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `translate`/`translate_batch` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        let suffixed = || format!("{} [{}]", text, target);
        match &self.mode {
            MockMode::Suffix => Ok(suffixed()),
            MockMode::Mappings(map) => Ok(map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(suffixed)),
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::FailOn(trigger) if text.contains(trigger.as_str()) => Err(
                MtError::TranslationError(format!("mock failure on {:?}", trigger)),
            ),
            MockMode::FailOn(_) => Ok(suffixed()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        self.apply_translation(text, target_locale)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // delay is per batch, not per string
        self.apply_delay().await;
        texts
            .iter()
            .map(|text| self.apply_translation(text, target_locale))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
