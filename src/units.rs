//! Page units on disk
//!
//! A page unit is one `.docx` file whose name carries its page number, as
//! written by the splitter: `page-<n>.docx`. Names such as `page_7.docx` or
//! `page-36_translated.docx` are understood too.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{PipelineError, Result};

static PAGE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)page[-_](\d+)").expect("page index pattern is valid")
});

const UNIT_EXTENSION: &str = "docx";

/// File name the splitter gives to page `page`
pub fn unit_file_name(page: u32) -> String {
    format!("page-{}.{}", page, UNIT_EXTENSION)
}

/// Page number embedded in a file name, if any
pub fn page_index_of(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    PAGE_INDEX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUnit {
    pub path: PathBuf,
    pub page: Option<u32>,
}

impl PageUnit {
    pub fn new(path: PathBuf) -> Self {
        let page = page_index_of(&path);
        Self { path, page }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for PageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Numbered units first, by page number; then the rest by file name.
impl Ord for PageUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.page, other.page) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.file_name().cmp(&other.file_name()))
        .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for PageUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn is_eligible(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(UNIT_EXTENSION));
    // `~$name.docx` is the lock file Word leaves next to an open document
    let is_lock_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("~$"));
    has_extension && !is_lock_file
}

/// Snapshot of the `.docx` files in `dir`, sorted by page order.
pub fn discover_units(dir: &Path) -> Result<Vec<PageUnit>> {
    if !dir.is_dir() {
        return Err(PipelineError::NotFound(format!(
            "working directory {} does not exist",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut units = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && is_eligible(&path) {
            units.push(PageUnit::new(path));
        }
    }
    units.sort();

    debug!("Found {} page units in {}", units.len(), dir.display());
    Ok(units)
}
