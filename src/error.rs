//! Pipeline-level error taxonomy.
//!
//! Splitting and merging abort the whole run on the first error; batch
//! translation never surfaces a unit's failure through this type (see
//! [`crate::batch`]), only failures that prevent the batch from starting.

use std::path::PathBuf;

use thiserror::Error;

use crate::docx::DocxError;
use crate::mt::MtError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external converter exited unsuccessfully or could not be launched
    #[error("conversion failed in `{tool}`: {detail}")]
    Conversion { tool: String, detail: String },

    /// The translation service could not be configured or reached
    #[error("translation service failure: {0}")]
    Translation(#[from] MtError),

    /// A document could not be read, parsed or written
    #[error("document error in {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocxError,
    },

    /// Page units cannot be put into a complete page order
    #[error("merge ordering failure: {0}")]
    MergeOrdering(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn document(path: impl Into<PathBuf>, source: DocxError) -> Self {
        PipelineError::Document {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
