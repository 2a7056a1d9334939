//! Command line interface.
//!
//! Four subcommands: `split`, `translate`, `merge` and `run` (all three in a
//! row). Argument structs convert into the typed configuration of
//! [`crate::config`]; the pipeline stages never see clap types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::backend::build_page_translator;
use crate::batch::{BatchDriver, BatchSummary, CancelHandle};
use crate::config::{
    BackendConfig, BackendKind, DEFAULT_SOURCE_LOCALE, DEFAULT_TARGET_LOCALE, DriverConfig,
    Toolchain,
};
use crate::docx::WriteMode;
use crate::merge::{DEFAULT_OUTPUT, MergeOptions, merge_units};
use crate::split::{SplitStrategy, build_splitter};

const DEFAULT_WORK_DIR: &str = "pages_output";

#[derive(Parser, Debug)]
#[command(
    name = "docx-translate",
    version,
    about = "Split a DOCX into pages, translate them in parallel, merge them back."
)]
pub struct Cli {
    /// Debug logging for this tool, on top of any RUST_LOG directives
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a document into page-<n>.docx units
    Split(SplitArgs),
    /// Translate every unit of a directory in place
    Translate(TranslateArgs),
    /// Merge the units of a directory into one document
    Merge(MergeArgs),
    /// Split, translate and merge
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    pub input: PathBuf,

    #[arg(short, long, default_value = DEFAULT_WORK_DIR)]
    pub output: PathBuf,

    #[command(flatten)]
    pub splitter: SplitterArgs,
}

#[derive(Args, Debug)]
pub struct SplitterArgs {
    #[arg(long, value_enum, default_value_t = SplitStrategy::Convert)]
    pub strategy: SplitStrategy,

    /// Pages per unit (page-break strategy only)
    #[arg(long, default_value_t = 1)]
    pub pages_per_unit: usize,

    #[arg(long, default_value = "soffice")]
    pub soffice: PathBuf,

    #[arg(long, default_value = "pdfseparate")]
    pub pdfseparate: PathBuf,

    #[arg(long, default_value = "pdf2docx")]
    pub pdf2docx: PathBuf,
}

impl SplitterArgs {
    fn toolchain(&self) -> Toolchain {
        Toolchain {
            soffice: self.soffice.clone(),
            pdfseparate: self.pdfseparate.clone(),
            pdf2docx: self.pdf2docx.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct BackendArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Chat)]
    pub backend: BackendKind,

    /// Program (and arguments) for the command backend; the unit path is
    /// appended. Must come last.
    #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "PROG")]
    pub command: Vec<String>,

    #[arg(long, default_value = DEFAULT_SOURCE_LOCALE)]
    pub source: String,

    #[arg(long, default_value = DEFAULT_TARGET_LOCALE)]
    pub target: String,

    #[arg(long, value_enum, default_value_t = WriteMode::Replace)]
    pub mode: WriteMode,

    /// Leave text inside tables untranslated
    #[arg(long)]
    pub skip_tables: bool,

    /// Chat model, e.g. deepseek-chat or gpt-4o-mini
    #[arg(long)]
    pub model: Option<String>,

    /// Override the provider endpoint
    #[arg(long)]
    pub api_base: Option<String>,

    /// Domain notes or glossary for the chat backend
    #[arg(long)]
    pub context: Option<String>,
}

impl From<&BackendArgs> for BackendConfig {
    fn from(args: &BackendArgs) -> Self {
        BackendConfig {
            kind: args.backend,
            source_locale: args.source.clone(),
            target_locale: args.target.clone(),
            mode: args.mode,
            skip_tables: args.skip_tables,
            model: args.model.clone(),
            api_base: args.api_base.clone(),
            context: args.context.clone(),
            command: args.command.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct DriverArgs {
    /// Units translated at the same time
    #[arg(short, long, default_value_t = DriverConfig::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Give up on a unit after this many seconds
    #[arg(long, value_name = "SECS")]
    pub unit_timeout: Option<u64>,

    /// Retry a failed unit this many times
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
}

impl From<&DriverArgs> for DriverConfig {
    fn from(args: &DriverArgs) -> Self {
        DriverConfig {
            workers: args.workers,
            unit_timeout: args.unit_timeout.map(Duration::from_secs),
            retries: args.retries,
            ..DriverConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    #[arg(default_value = DEFAULT_WORK_DIR)]
    pub dir: PathBuf,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub driver: DriverArgs,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    pub dir: PathBuf,

    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Merge even if some pages are missing
    #[arg(long)]
    pub allow_gaps: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub input: PathBuf,

    /// Directory for the page units
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    #[arg(long)]
    pub allow_gaps: bool,

    #[command(flatten)]
    pub splitter: SplitterArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub driver: DriverArgs,
}

impl Cli {
    /// Log filter from the `RUST_LOG` value, if any. Without one, this crate
    /// logs at info; `--verbose` raises it to debug either way.
    pub fn log_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        let level = if self.verbose { "debug" } else { "info" };
        let default = format!("docx_translate={}", level);
        let directives = match rust_log.map(str::trim).filter(|d| !d.is_empty()) {
            Some(env) if self.verbose => format!("{},{}", env, default),
            Some(env) => env.to_string(),
            None => default.clone(),
        };
        EnvFilter::try_new(&directives).unwrap_or_else(|e| {
            eprintln!("ignoring invalid RUST_LOG {:?}: {}", directives, e);
            EnvFilter::new(default)
        })
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Split(args) => {
                split(&args.input, &args.output, &args.splitter).await?;
            }
            Commands::Translate(args) => {
                let summary = translate(&args.dir, &args.backend, &args.driver).await?;
                println!("{}", summary);
            }
            Commands::Merge(args) => {
                merge(&args.dir, &args.output, args.allow_gaps).await?;
            }
            Commands::Run(args) => {
                split(&args.input, &args.work_dir, &args.splitter).await?;
                let summary = translate(&args.work_dir, &args.backend, &args.driver).await?;
                println!("{}", summary);
                if !summary.is_complete_success() {
                    bail!(
                        "{} of {} units failed to translate; not merging",
                        summary.failed_count(),
                        summary.attempted
                    );
                }
                merge(&args.work_dir, &args.output, args.allow_gaps).await?;
            }
        }
        Ok(())
    }
}

async fn split(input: &Path, out_dir: &Path, args: &SplitterArgs) -> Result<()> {
    let splitter = build_splitter(args.strategy, args.toolchain(), args.pages_per_unit)?;
    info!("Splitting {} ({} strategy)", input.display(), splitter.name());
    let units = splitter
        .split(input, out_dir)
        .await
        .with_context(|| format!("failed to split {}", input.display()))?;
    println!(
        "Split {} into {} units in {}",
        input.display(),
        units.len(),
        out_dir.display()
    );
    Ok(())
}

async fn translate(dir: &Path, backend: &BackendArgs, driver: &DriverArgs) -> Result<BatchSummary> {
    let translator = build_page_translator(&BackendConfig::from(backend))
        .context("cannot set up the translation backend")?;

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding units");
            on_interrupt.cancel();
        }
    });

    let driver = BatchDriver::new(translator, DriverConfig::from(driver)).with_cancel(cancel);
    let result = driver.run(dir).await;
    interrupt.abort();

    let summary = result.with_context(|| format!("cannot translate units in {}", dir.display()))?;
    Ok(summary)
}

async fn merge(dir: &Path, output: &Path, allow_gaps: bool) -> Result<()> {
    let units = merge_units(dir, output, MergeOptions { allow_gaps })
        .await
        .with_context(|| format!("failed to merge units in {}", dir.display()))?;
    println!("Merged {} units into {}", units.len(), output.display());
    Ok(())
}
