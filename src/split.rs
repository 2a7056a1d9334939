//! Splitter: one source document in, `page-<n>.docx` units out.
//!
//! Two strategies:
//!
//! - [`ConverterSplitter`] renders the document to PDF with an office suite,
//!   separates the PDF pages and converts every page back to DOCX. Page
//!   boundaries are exactly the rendered ones, at the price of three
//!   external programs and a lossy round trip.
//! - [`PageBreakSplitter`] cuts the document natively at explicit page
//!   breaks. Formatting survives untouched, but only pages ended by a hard
//!   break are found, and a break is honoured at the end of the top-level
//!   block (paragraph or table) that contains it.
//!
//! Any failure aborts the split.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use clap::ValueEnum;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::Toolchain;
use crate::docx::{
    Block, BodyLayout, DocxPackage, DocxResult, count_page_breaks, strip_page_breaks,
};
use crate::error::{PipelineError, Result};
use crate::units::{page_index_of, unit_file_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SplitStrategy {
    /// soffice → pdfseparate → pdf2docx
    #[default]
    Convert,
    /// Cut at explicit page breaks without leaving DOCX
    PageBreak,
}

#[async_trait]
pub trait Splitter: Send + Sync {
    /// Write the units of `input` into `out_dir` and return their paths in
    /// page order
    async fn split(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;

    fn name(&self) -> &str;
}

pub fn build_splitter(
    strategy: SplitStrategy,
    toolchain: Toolchain,
    pages_per_unit: usize,
) -> Result<Box<dyn Splitter>> {
    match strategy {
        SplitStrategy::Convert => Ok(Box::new(ConverterSplitter::new(toolchain))),
        SplitStrategy::PageBreak => Ok(Box::new(PageBreakSplitter::new(pages_per_unit)?)),
    }
}

async fn check_input(input: &Path) -> Result<()> {
    match tokio::fs::metadata(input).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(PipelineError::NotFound(format!(
            "source document {} does not exist",
            input.display()
        ))),
    }
}

async fn prepare_output(out_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PipelineError::io(out_dir, e))
}

/// Runs the external converters
#[derive(Debug, Clone, Default)]
pub struct ConverterSplitter {
    toolchain: Toolchain,
}

impl ConverterSplitter {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    /// Run `program` to completion; anything but exit status 0 is a
    /// conversion failure naming the tool
    async fn run_tool<I, S>(program: &Path, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let tool = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::Conversion {
                tool: tool.clone(),
                detail: format!("could not start: {}", e),
            })?;

        if output.status.success() {
            debug!("{} finished", tool);
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(PipelineError::Conversion {
            detail: if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr)
            },
            tool,
        })
    }

    /// Files in `dir` with extension `ext`
    async fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| PipelineError::io(dir, e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(dir, e))?
        {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl Splitter for ConverterSplitter {
    async fn split(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        check_input(input).await?;
        prepare_output(out_dir).await?;

        let scratch = tempfile::tempdir().map_err(|e| PipelineError::io(std::env::temp_dir(), e))?;
        let pdf_dir = scratch.path().join("pdf");
        let pages_dir = scratch.path().join("pages");
        for dir in [&pdf_dir, &pages_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::io(dir, e))?;
        }

        info!("Converting {} to PDF", input.display());
        Self::run_tool(
            &self.toolchain.soffice,
            [
                OsStr::new("--headless"),
                OsStr::new("--convert-to"),
                OsStr::new("pdf"),
                OsStr::new("--outdir"),
                pdf_dir.as_os_str(),
                input.as_os_str(),
            ],
        )
        .await?;

        let pdf = Self::files_with_extension(&pdf_dir, "pdf")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Conversion {
                tool: self.toolchain.soffice.display().to_string(),
                detail: "no PDF was produced".to_string(),
            })?;

        let pattern = pages_dir.join("page-%d.pdf");
        Self::run_tool(
            &self.toolchain.pdfseparate,
            [pdf.as_os_str(), pattern.as_os_str()],
        )
        .await?;

        let mut pages: Vec<(u32, PathBuf)> = Self::files_with_extension(&pages_dir, "pdf")
            .await?
            .into_iter()
            .filter_map(|path| page_index_of(&path).map(|page| (page, path)))
            .collect();
        pages.sort();
        if pages.is_empty() {
            return Err(PipelineError::Conversion {
                tool: self.toolchain.pdfseparate.display().to_string(),
                detail: "no pages were separated".to_string(),
            });
        }
        info!("{} has {} pages", input.display(), pages.len());

        let mut units = Vec::with_capacity(pages.len());
        for (page, page_pdf) in pages {
            let unit = out_dir.join(unit_file_name(page));
            Self::run_tool(
                &self.toolchain.pdf2docx,
                [
                    OsStr::new("convert"),
                    page_pdf.as_os_str(),
                    unit.as_os_str(),
                ],
            )
            .await?;
            debug!("Wrote {}", unit.display());
            units.push(unit);
        }
        Ok(units)
    }

    fn name(&self) -> &str {
        "convert"
    }
}

/// Cuts the document at explicit page breaks
#[derive(Debug, Clone)]
pub struct PageBreakSplitter {
    pages_per_unit: usize,
}

impl PageBreakSplitter {
    pub fn new(pages_per_unit: usize) -> Result<Self> {
        if pages_per_unit == 0 {
            return Err(PipelineError::Config(
                "pages per unit must be at least 1".to_string(),
            ));
        }
        Ok(Self { pages_per_unit })
    }
}

#[async_trait]
impl Splitter for PageBreakSplitter {
    async fn split(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        check_input(input).await?;
        prepare_output(out_dir).await?;

        let input = input.to_path_buf();
        let out_dir = out_dir.to_path_buf();
        let pages_per_unit = self.pages_per_unit;
        tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let package =
                DocxPackage::open(&input).map_err(|e| PipelineError::document(&input, e))?;
            let units = split_package(&package, pages_per_unit)
                .map_err(|e| PipelineError::document(&input, e))?;
            info!("{} split into {} units", input.display(), units.len());

            let mut paths = Vec::with_capacity(units.len());
            for (i, unit) in units.iter().enumerate() {
                let path = out_dir.join(unit_file_name(i as u32 + 1));
                unit.save(&path)
                    .map_err(|e| PipelineError::document(&path, e))?;
                paths.push(path);
            }
            Ok(paths)
        })
        .await
        .map_err(|e| PipelineError::Config(format!("split task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "page-break"
    }
}

/// Split a package into units of `pages_per_unit` pages.
///
/// Every unit is a copy of the source package (styles, numbering, media)
/// with its body replaced by a run of top-level blocks plus the source's
/// section properties. The page break that closes a unit is removed from it.
pub fn split_package(package: &DocxPackage, pages_per_unit: usize) -> DocxResult<Vec<DocxPackage>> {
    let xml = package.document_xml()?;
    let layout = BodyLayout::parse(&xml)?;
    let groups = group_blocks(&layout.blocks, pages_per_unit.max(1))?;

    Ok(groups
        .iter()
        .map(|blocks| {
            let mut unit = package.clone();
            unit.set_document_xml(layout.rebuild(blocks.iter().map(String::as_str)));
            unit
        })
        .collect())
}

fn group_blocks(blocks: &[Block], pages_per_unit: usize) -> DocxResult<Vec<Vec<String>>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut page = 1;
    let mut unit_start = 1;

    for block in blocks {
        let breaks = count_page_breaks(&block.xml)?;
        page += breaks;
        if breaks > 0 && page >= unit_start + pages_per_unit {
            current.push(strip_page_breaks(&block.xml)?);
            groups.push(std::mem::take(&mut current));
            unit_start = page;
        } else {
            current.push(block.xml.clone());
        }
    }

    // a document without content is still one (empty) page
    if !current.is_empty() || groups.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}
