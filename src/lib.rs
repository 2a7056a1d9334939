//! Page-parallel DOCX translation.
//!
//! A document goes through three stages:
//!
//! 1. [`split`]: the source is cut into single-page units, `page-<n>.docx`
//! 2. [`batch`]: every unit is translated in place by a [`backend`], many at
//!    a time, failures isolated per unit
//! 3. [`merge`]: the units are concatenated back in page order
//!
//! Text-level providers (Google Translate, OpenAI-compatible chat, ...) live
//! in [`mt`]; the small amount of WordprocessingML the pipeline needs is in
//! [`docx`].

pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod docx;
pub mod error;
pub mod merge;
pub mod mt;
pub mod split;
pub mod units;

mod integration_tests;

pub use backend::{BackendError, PageTranslator, build_page_translator};
pub use batch::{BatchDriver, BatchJob, BatchSummary, CancelHandle, JobOutcome};
pub use config::{BackendConfig, BackendKind, DriverConfig, Toolchain};
pub use error::{PipelineError, Result};
pub use merge::{MergeOptions, merge_units};
pub use split::{SplitStrategy, Splitter, build_splitter};
pub use units::{PageUnit, discover_units};
