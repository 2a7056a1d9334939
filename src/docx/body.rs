//! Body-level view of `word/document.xml`
//!
//! The body is cut into its top-level children ("blocks": paragraphs, tables,
//! bookmarks, ...) without re-serialising anything, so a block can be moved to
//! another document verbatim. The trailing `w:sectPr` (page size, margins,
//! headers) is kept apart because every document needs exactly one.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};

use super::{DocxError, DocxResult, tag_name};

/// One top-level child of `w:body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Qualified tag name, e.g. `w:p` or `w:tbl`
    pub name: String,
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLayout {
    /// Everything up to and including the `<w:body>` start tag
    pub prefix: String,
    pub blocks: Vec<Block>,
    /// Final section properties, if the body has them
    pub section: Option<String>,
    /// `</w:body>` and everything after it
    pub suffix: String,
}

impl BodyLayout {
    pub fn parse(xml: &str) -> DocxResult<Self> {
        let mut reader = Reader::from_str(xml);

        let mut depth = 0usize;
        let mut body_depth: Option<usize> = None;
        let mut prefix_end = None;
        let mut suffix_start = None;
        let mut block_start = 0usize;
        let mut blocks = Vec::new();

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let end = reader.buffer_position() as usize;

            match event {
                Event::Start(e) => {
                    if body_depth == Some(depth) {
                        block_start = start;
                    }
                    depth += 1;
                    if body_depth.is_none() && e.name().as_ref() == b"w:body" {
                        body_depth = Some(depth);
                        prefix_end = Some(end);
                    }
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    if let Some(body) = body_depth {
                        if depth + 1 == body && e.name().as_ref() == b"w:body" {
                            suffix_start = Some(start);
                            break;
                        }
                        if depth == body {
                            blocks.push(Block {
                                name: tag_name(e.name().as_ref()).to_string(),
                                xml: xml[block_start..end].to_string(),
                            });
                        }
                    }
                }
                Event::Empty(e) => {
                    if body_depth == Some(depth) {
                        blocks.push(Block {
                            name: tag_name(e.name().as_ref()).to_string(),
                            xml: xml[start..end].to_string(),
                        });
                    } else if body_depth.is_none() && e.name().as_ref() == b"w:body" {
                        // `<w:body/>`: an empty story
                        return Ok(Self {
                            prefix: format!("{}<w:body>", &xml[..start]),
                            blocks: Vec::new(),
                            section: None,
                            suffix: format!("</w:body>{}", &xml[end..]),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (Some(prefix_end), Some(suffix_start)) = (prefix_end, suffix_start) else {
            return Err(DocxError::Structure(
                "document has no complete w:body element".to_string(),
            ));
        };

        let section = match blocks.last() {
            Some(last) if last.name == "w:sectPr" => blocks.pop().map(|block| block.xml),
            _ => None,
        };

        Ok(Self {
            prefix: xml[..prefix_end].to_string(),
            blocks,
            section,
            suffix: xml[suffix_start..].to_string(),
        })
    }

    /// Assemble a document with this layout's frame and section properties
    /// around the given blocks.
    pub fn rebuild<'a, I>(&self, blocks: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut xml = String::with_capacity(self.prefix.len() + self.suffix.len() + 1024);
        xml.push_str(&self.prefix);
        for block in blocks {
            xml.push_str(block);
        }
        if let Some(section) = &self.section {
            xml.push_str(section);
        }
        xml.push_str(&self.suffix);
        xml
    }

    pub fn to_xml(&self) -> String {
        self.rebuild(self.blocks.iter().map(|block| block.xml.as_str()))
    }
}

fn is_page_break(e: &BytesStart) -> bool {
    e.name().as_ref() == b"w:br"
        && e.attributes().flatten().any(|attr| {
            attr.key.as_ref() == b"w:type" && attr.value.as_ref() == b"page"
        })
}

/// Number of explicit page breaks (`<w:br w:type="page"/>`) inside a fragment
pub fn count_page_breaks(fragment: &str) -> DocxResult<usize> {
    let mut reader = Reader::from_str(fragment);
    let mut count = 0;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if is_page_break(&e) => count += 1,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(count)
}

/// Remove explicit page breaks from a fragment, leaving everything else as is
pub fn strip_page_breaks(fragment: &str) -> DocxResult<String> {
    let mut reader = Reader::from_str(fragment);
    let mut writer = Writer::new(Vec::with_capacity(fragment.len()));
    let mut skipping = 0usize;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) if skipping == 0 && is_page_break(e) => {}
            Event::Start(ref e) if skipping == 0 && is_page_break(e) => skipping = 1,
            Event::Start(_) if skipping > 0 => skipping += 1,
            Event::End(_) if skipping > 0 => skipping -= 1,
            _ if skipping > 0 => {}
            other => writer.write_event(other)?,
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|_| DocxError::Encoding("page break fragment".to_string()))
}

/// A paragraph holding nothing but a page break
pub fn page_break_paragraph() -> &'static str {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::{self, SECTION};

    #[test]
    fn test_parse_blocks_and_section() {
        let body = format!(
            "{}<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl><w:bookmarkStart w:id=\"0\"/>",
            fixtures::paragraph("one"),
            fixtures::paragraph("cell")
        );
        let xml = fixtures::document_xml(&body);
        let layout = BodyLayout::parse(&xml).unwrap();

        let names: Vec<&str> = layout.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["w:p", "w:tbl", "w:bookmarkStart"]);
        assert_eq!(layout.blocks[0].xml, fixtures::paragraph("one"));
        assert_eq!(layout.section.as_deref(), Some(SECTION));
        assert!(layout.prefix.ends_with("<w:body>"));
        assert_eq!(layout.suffix, "</w:body></w:document>");
    }

    #[test]
    fn test_rebuild_is_lossless() {
        let body = format!(
            "{}\n  {}",
            fixtures::paragraph("a &amp; b"),
            fixtures::paragraph_with_break("c")
        );
        let xml = fixtures::document_xml(&body);
        let layout = BodyLayout::parse(&xml).unwrap();
        // whitespace between blocks is not a block
        assert_eq!(layout.blocks.len(), 2);
        let rebuilt = layout.to_xml();
        assert_eq!(BodyLayout::parse(&rebuilt).unwrap(), layout);
    }

    #[test]
    fn test_empty_body_element() {
        let xml = r#"<w:document xmlns:w="x"><w:body/></w:document>"#;
        let layout = BodyLayout::parse(xml).unwrap();
        assert!(layout.blocks.is_empty());
        assert_eq!(
            layout.rebuild([fixtures::paragraph("x").as_str()]),
            format!(
                r#"<w:document xmlns:w="x"><w:body>{}</w:body></w:document>"#,
                fixtures::paragraph("x")
            )
        );
    }

    #[test]
    fn test_missing_body() {
        let result = BodyLayout::parse(r#"<w:document xmlns:w="x"></w:document>"#);
        assert!(matches!(result, Err(DocxError::Structure(_))));
    }

    #[test]
    fn test_count_page_breaks() {
        assert_eq!(count_page_breaks(&fixtures::paragraph("x")).unwrap(), 0);
        assert_eq!(
            count_page_breaks(&fixtures::paragraph_with_break("x")).unwrap(),
            1
        );
        // line and column breaks do not count
        let mixed = r#"<w:p><w:r><w:br/><w:br w:type="column"/><w:br w:type="page"></w:br></w:r></w:p>"#;
        assert_eq!(count_page_breaks(mixed).unwrap(), 1);
    }

    #[test]
    fn test_strip_page_breaks() {
        let stripped = strip_page_breaks(&fixtures::paragraph_with_break("x")).unwrap();
        assert_eq!(stripped, "<w:p><w:r><w:t>x</w:t></w:r><w:r></w:r></w:p>");
        assert_eq!(count_page_breaks(&stripped).unwrap(), 0);

        let line_break = r#"<w:p><w:r><w:br/></w:r></w:p>"#;
        assert_eq!(strip_page_breaks(line_break).unwrap(), line_break);
    }

    #[test]
    fn test_page_break_paragraph_counts_as_break() {
        assert_eq!(count_page_breaks(page_break_paragraph()).unwrap(), 1);
    }
}
