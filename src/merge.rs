//! Merger: concatenate translated page units into one document.
//!
//! Units are taken in numeric page order (`page-2` before `page-10`). The
//! first unit is the template: its styles, numbering and section properties
//! carry over to the result, and the bodies of the other units are appended
//! to its body with a page break between consecutive units.
//!
//! Relationships of the other units (images, hyperlinks) are not carried
//! over, so such content keeps its text but may lose the linked resource.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::docx::{BodyLayout, DocxError, DocxPackage, DocxResult, page_break_paragraph};
use crate::error::{PipelineError, Result};
use crate::units::{PageUnit, discover_units};

pub const DEFAULT_OUTPUT: &str = "merged.docx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOptions {
    /// Merge whatever pages exist instead of failing on a missing one
    pub allow_gaps: bool,
}

/// Put the units in merge order and check the page sequence.
///
/// Files without a page index are skipped. Duplicates are always an error;
/// a page missing from `1..=last` is one unless gaps are allowed.
pub fn plan_merge(units: Vec<PageUnit>, options: MergeOptions) -> Result<Vec<PageUnit>> {
    let (mut indexed, unindexed): (Vec<PageUnit>, Vec<PageUnit>) =
        units.into_iter().partition(|unit| unit.page.is_some());
    for unit in &unindexed {
        warn!("Skipping {}: no page number in the file name", unit);
    }
    indexed.sort();

    let mut expected = 1;
    for pair in indexed.windows(2) {
        if pair[0].page == pair[1].page {
            return Err(PipelineError::MergeOrdering(format!(
                "duplicate page {}: {} and {}",
                pair[0].page.unwrap_or_default(),
                pair[0],
                pair[1]
            )));
        }
    }
    for unit in &indexed {
        let page = unit.page.unwrap_or_default();
        if page != expected {
            if !options.allow_gaps {
                return Err(PipelineError::MergeOrdering(format!(
                    "missing page {}",
                    expected
                )));
            }
            warn!("Pages {} to {} are missing", expected, page.saturating_sub(1));
        }
        expected = page.saturating_add(1);
    }

    Ok(indexed)
}

/// Concatenate the bodies of `units` into a copy of the first one
pub fn merge_packages(units: &[DocxPackage]) -> DocxResult<DocxPackage> {
    let (first, _) = units
        .split_first()
        .ok_or_else(|| DocxError::Structure("nothing to merge".to_string()))?;
    let template = BodyLayout::parse(&first.document_xml()?)?;

    let mut blocks: Vec<String> = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        if i > 0 {
            blocks.push(page_break_paragraph().to_string());
        }
        let layout = BodyLayout::parse(&unit.document_xml()?)?;
        blocks.extend(layout.blocks.into_iter().map(|block| block.xml));
    }

    let mut merged = first.clone();
    merged.set_document_xml(template.rebuild(blocks.iter().map(String::as_str)));
    Ok(merged)
}

fn merge_blocking(dir: &Path, output: &Path, options: MergeOptions) -> Result<Vec<PageUnit>> {
    let units = plan_merge(discover_units(dir)?, options)?;
    if units.is_empty() {
        return Err(PipelineError::NotFound(format!(
            "no page units in {}",
            dir.display()
        )));
    }

    let mut packages = Vec::with_capacity(units.len());
    for unit in &units {
        debug!("Reading {}", unit);
        let package =
            DocxPackage::open(&unit.path).map_err(|e| PipelineError::document(&unit.path, e))?;
        packages.push(package);
    }

    let first = &units[0].path;
    let merged = merge_packages(&packages).map_err(|e| PipelineError::document(first, e))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    merged
        .save(output)
        .map_err(|e| PipelineError::document(output, e))?;

    info!("Merged {} units into {}", units.len(), output.display());
    Ok(units)
}

/// Merge the units in `dir` into `output`; returns the merged units in order.
///
/// Nothing is written unless every unit could be read.
pub async fn merge_units(dir: &Path, output: &Path, options: MergeOptions) -> Result<Vec<PageUnit>> {
    let dir: PathBuf = dir.to_path_buf();
    let output: PathBuf = output.to_path_buf();
    tokio::task::spawn_blocking(move || merge_blocking(&dir, &output, options))
        .await
        .map_err(|e| PipelineError::Config(format!("merge task failed: {}", e)))?
}
