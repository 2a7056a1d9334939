//! Minimal WordprocessingML support
//!
//! A DOCX file is a ZIP archive; the main story lives in `word/document.xml`.
//! This module only understands what the pipeline needs:
//!
//! - [`package`]: read and write the archive, part by part
//! - [`body`]: cut `w:body` into top-level blocks, find page breaks, rebuild
//! - [`text`]: collect paragraph text and write translations back in place
//!
//! Everything else in the document (styles, numbering, media, properties of
//! runs that are not touched) is carried through byte for byte.

pub mod body;
pub mod package;
pub mod text;

pub use body::{Block, BodyLayout, count_page_breaks, page_break_paragraph, strip_page_breaks};
pub use package::{DOCUMENT_PART, DocxPackage};
pub use text::{TextSpan, WriteMode, apply_translations, extract_spans};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("invalid DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("missing part `{0}`")]
    MissingPart(String),
    #[error("part `{0}` is not valid UTF-8")]
    Encoding(String),
    #[error("unexpected document structure: {0}")]
    Structure(String),
}

impl From<quick_xml::Error> for DocxError {
    fn from(err: quick_xml::Error) -> Self {
        DocxError::Xml(err.to_string())
    }
}

pub type DocxResult<T> = Result<T, DocxError>;

/// Name of a start/end/empty tag as a string slice, lossy for non UTF-8 names
pub(crate) fn tag_name(raw: &[u8]) -> &str {
    std::str::from_utf8(raw).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-written documents shared by the tests of several modules.

    use super::DocxPackage;

    const DOCUMENT_OPEN: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );

    pub const SECTION: &str =
        r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#;

    pub fn paragraph(text: &str) -> String {
        format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", text)
    }

    pub fn paragraph_with_break(text: &str) -> String {
        format!(
            r#"<w:p><w:r><w:t>{}</w:t></w:r><w:r><w:br w:type="page"/></w:r></w:p>"#,
            text
        )
    }

    pub fn document_xml(body: &str) -> String {
        format!(
            "{}<w:body>{}{}</w:body></w:document>",
            DOCUMENT_OPEN, body, SECTION
        )
    }

    pub fn package_with_body(body: &str) -> DocxPackage {
        let mut package = DocxPackage::new();
        package.set_part(
            "[Content_Types].xml",
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_vec(),
        );
        package.set_part("word/styles.xml", b"<w:styles/>".to_vec());
        package.set_document_xml(document_xml(body));
        package
    }

    pub fn write_unit(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        package_with_body(body).save(&path).unwrap();
        path
    }
}
