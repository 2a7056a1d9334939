//! Translation backends: translate one page unit in place.
//!
//! [`PageTranslator`] is the seam the batch driver works against. It only
//! sees a path; whatever happens inside the file is the backend's business.
//!
//! - [`DocxPageTranslator`] reads the paragraphs of the unit, sends them to a
//!   [`MachineTranslator`] and writes the answers back.
//! - [`CommandPageTranslator`] hands the path to an external program.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::{BackendConfig, BackendKind};
use crate::docx::{DocxError, DocxPackage, WriteMode, apply_translations, extract_spans};
use crate::error::{PipelineError, Result};
use crate::mt::{
    ChatCompletionProvider, GoogleTranslateProvider, MachineTranslator, MockMode, MockTranslator,
    MtError, PassthroughTranslator, ensure_same_length, validate_locale,
};

/// Why one unit could not be translated. Shown verbatim in the batch summary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Translation(#[from] MtError),

    #[error(transparent)]
    Document(#[from] DocxError),

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait PageTranslator: Send + Sync {
    /// Translate the unit at `path`, rewriting the file in place
    async fn translate_page(&self, path: &Path) -> std::result::Result<(), BackendError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Options shared by every document-level translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub source_locale: String,
    pub target_locale: String,
    pub mode: WriteMode,
    pub skip_tables: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        let config = BackendConfig::default();
        Self {
            source_locale: config.source_locale,
            target_locale: config.target_locale,
            mode: config.mode,
            skip_tables: config.skip_tables,
        }
    }
}

/// Translates the paragraphs of a unit with a text-level provider
pub struct DocxPageTranslator {
    translator: Arc<dyn MachineTranslator>,
    options: PageOptions,
    name: String,
}

impl DocxPageTranslator {
    pub fn new(translator: Arc<dyn MachineTranslator>, options: PageOptions) -> Self {
        let name = format!("{} ({:?})", translator.provider_name(), options.mode);
        Self {
            translator,
            options,
            name,
        }
    }

    /// Translations for `xml`, keyed by paragraph index. Paragraphs whose
    /// translation equals the original are left out so they keep their runs.
    async fn translate_document(
        &self,
        xml: &str,
    ) -> std::result::Result<HashMap<usize, String>, BackendError> {
        let spans: Vec<_> = extract_spans(xml)?
            .into_iter()
            .filter(|span| !span.is_blank())
            .filter(|span| !(self.options.skip_tables && span.in_table))
            .collect();
        if spans.is_empty() {
            return Ok(HashMap::new());
        }

        let texts: Vec<String> = spans.iter().map(|span| span.text.clone()).collect();
        let translated = self
            .translator
            .translate_batch(
                &texts,
                &self.options.source_locale,
                &self.options.target_locale,
            )
            .await?;
        ensure_same_length(texts.len(), translated.len())?;

        Ok(spans
            .into_iter()
            .zip(translated)
            .filter(|(span, text)| *text != span.text)
            .map(|(span, text)| (span.index, text))
            .collect())
    }
}

#[async_trait]
impl PageTranslator for DocxPageTranslator {
    async fn translate_page(&self, path: &Path) -> std::result::Result<(), BackendError> {
        let bytes = tokio::fs::read(path).await.map_err(DocxError::Io)?;
        let mut package = DocxPackage::from_bytes(&bytes)?;
        let xml = package.document_xml()?;

        let translations = self.translate_document(&xml).await?;
        if translations.is_empty() {
            debug!("{}: nothing changed, file left as is", path.display());
            return Ok(());
        }
        debug!("{}: {} paragraphs translated", path.display(), translations.len());

        let rewritten = apply_translations(&xml, &translations, self.options.mode)?;
        package.set_document_xml(rewritten);

        let bytes = tokio::task::spawn_blocking(move || package.to_bytes())
            .await
            .map_err(|e| BackendError::Other(format!("packaging task failed: {}", e)))??;
        // no await from here on: an aborted call either commits fully or not at all
        DocxPackage::write_atomically(path, &bytes)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Runs `program args... <unit path>`; the program rewrites the unit itself
#[derive(Debug, Clone)]
pub struct CommandPageTranslator {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl CommandPageTranslator {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = format!("command `{}`", program.display());
        Self {
            program,
            args,
            name,
        }
    }

    /// Build from a command line given as separate words
    pub fn from_command_line(words: &[String]) -> Result<Self> {
        match words.split_first() {
            Some((program, args)) if !program.trim().is_empty() => {
                Ok(Self::new(program, args.to_vec()))
            }
            _ => Err(PipelineError::Config(
                "the command backend needs a program to run (--command)".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PageTranslator for CommandPageTranslator {
    async fn translate_page(&self, path: &Path) -> std::result::Result<(), BackendError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BackendError::Launch {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(BackendError::Command {
            program,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pick and configure the backend named in `config`.
///
/// Fails when credentials are missing or options do not fit together, so a
/// batch never starts with a backend that cannot work.
pub fn build_page_translator(config: &BackendConfig) -> Result<Arc<dyn PageTranslator>> {
    validate_locale(&config.source_locale)?;
    validate_locale(&config.target_locale)?;

    let translator: Arc<dyn MachineTranslator> = match config.kind {
        BackendKind::Command => {
            let backend = CommandPageTranslator::from_command_line(&config.command)?;
            return Ok(Arc::new(backend));
        }
        BackendKind::Chat => {
            let mut provider =
                ChatCompletionProvider::from_env()?.with_context(config.context.clone());
            if let Some(base) = &config.api_base {
                provider = provider.with_base_url(base.clone());
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone());
            }
            Arc::new(provider)
        }
        BackendKind::Google => {
            let mut provider = GoogleTranslateProvider::from_env()?;
            if let Some(base) = &config.api_base {
                provider = provider.with_base_url(base.clone());
            }
            Arc::new(provider)
        }
        BackendKind::Passthrough => Arc::new(PassthroughTranslator),
        BackendKind::Mock => Arc::new(MockTranslator::new(MockMode::Suffix)),
    };

    let options = PageOptions {
        source_locale: config.source_locale.clone(),
        target_locale: config.target_locale.clone(),
        mode: config.mode,
        skip_tables: config.skip_tables,
    };
    Ok(Arc::new(DocxPageTranslator::new(translator, options)))
}
