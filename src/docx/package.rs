//! DOCX archive I/O
//!
//! Parts are kept in archive order so `[Content_Types].xml` stays first when
//! the package is written back.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{DocxError, DocxResult};

/// Part holding the main document story
pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    parts: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> DocxResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> DocxResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        let package = Self { parts };
        if package.part(DOCUMENT_PART).is_none() {
            return Err(DocxError::MissingPart(DOCUMENT_PART.to_string()));
        }
        Ok(package)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(part, _)| part == name)
            .map(|(_, data)| data.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    /// Replace a part, or append it when the package does not have it yet
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(part, _)| part == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    pub fn document_xml(&self) -> DocxResult<String> {
        let data = self
            .part(DOCUMENT_PART)
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT_PART.to_string()))?;
        String::from_utf8(data.to_vec()).map_err(|_| DocxError::Encoding(DOCUMENT_PART.to_string()))
    }

    pub fn set_document_xml(&mut self, xml: String) {
        self.set_part(DOCUMENT_PART, xml.into_bytes());
    }

    pub fn to_bytes(&self) -> DocxResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.parts {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Write the package to `path`, replacing any existing file only once the
    /// new archive is completely on disk.
    pub fn save(&self, path: &Path) -> DocxResult<()> {
        Self::write_atomically(path, &self.to_bytes()?)
    }

    /// Replace `path` with `bytes` through a temporary file in the same
    /// directory, so readers see either the old or the new archive.
    pub fn write_atomically(path: &Path, bytes: &[u8]) -> DocxResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| DocxError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures;

    #[test]
    fn test_roundtrip_keeps_part_order() {
        let package = fixtures::package_with_body(&fixtures::paragraph("hello"));
        let bytes = package.to_bytes().unwrap();
        let reopened = DocxPackage::from_bytes(&bytes).unwrap();

        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(
            names,
            vec!["[Content_Types].xml", "word/styles.xml", DOCUMENT_PART]
        );
        assert_eq!(
            reopened.document_xml().unwrap(),
            package.document_xml().unwrap()
        );
    }

    #[test]
    fn test_missing_document_part() {
        let mut package = DocxPackage::new();
        package.set_part("word/styles.xml", b"<w:styles/>".to_vec());
        let bytes = package.to_bytes().unwrap();

        match DocxPackage::from_bytes(&bytes) {
            Err(DocxError::MissingPart(name)) => assert_eq!(name, DOCUMENT_PART),
            other => panic!("Expected MissingPart, got {:?}", other),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let result = DocxPackage::from_bytes(b"definitely not a zip archive");
        assert!(matches!(result, Err(DocxError::Zip(_))));
    }

    #[test]
    fn test_set_part_replaces() {
        let mut package = fixtures::package_with_body("");
        package.set_part("word/styles.xml", b"<w:styles>new</w:styles>".to_vec());
        assert_eq!(
            package.part("word/styles.xml").unwrap(),
            b"<w:styles>new</w:styles>"
        );
        assert_eq!(package.part_names().count(), 3);
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page-1.docx");
        let package = fixtures::package_with_body(&fixtures::paragraph("saved"));
        package.save(&path).unwrap();

        // saving over an existing file replaces it
        package.save(&path).unwrap();

        let reopened = DocxPackage::open(&path).unwrap();
        assert!(reopened.document_xml().unwrap().contains("saved"));
    }
}
