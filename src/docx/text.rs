//! Paragraph text extraction and in-place rewriting
//!
//! A *span* is the text of one paragraph: the concatenation of all its `w:t`
//! elements in document order. Paragraphs are numbered in the order their
//! start tags appear, which includes paragraphs nested in table cells and
//! text boxes. [`extract_spans`] and [`apply_translations`] walk the XML the
//! same way, so an index produced by one is valid for the other.
//!
//! Deleted text (`w:delText`) and field instructions (`w:instrText`) are not
//! spans and are never rewritten.

use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{DocxError, DocxResult};

/// Colour, size (half-points) and style of the appended translation run in
/// [`WriteMode::Bilingual`]
const BILINGUAL_COLOR: &str = "4224E9";
const BILINGUAL_HALF_POINTS: &str = "18";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Paragraph ordinal within the document
    pub index: usize,
    pub text: String,
    /// True when the paragraph sits inside a table
    pub in_table: bool,
}

impl TextSpan {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// How a translation is written back into its paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WriteMode {
    /// Translation replaces the text; it is written into the first text
    /// element of the paragraph and the remaining text elements are emptied,
    /// so the paragraph takes the formatting of its first run.
    #[default]
    Replace,
    /// Original text is kept and the translation follows it after a line
    /// break, in a small italic coloured run.
    Bilingual,
}

/// Tracks which paragraph the reader is in while walking `document.xml`
#[derive(Default)]
struct SpanCursor {
    open: Vec<usize>,
    next_index: usize,
    table_depth: usize,
    in_text: bool,
}

enum Step {
    ParagraphStart { index: usize, in_table: bool },
    ParagraphEnd { index: usize },
    TextStart { paragraph: usize },
    TextEnd,
    Other,
}

impl SpanCursor {
    fn start(&mut self, e: &BytesStart) -> Step {
        match e.name().as_ref() {
            b"w:p" => {
                let index = self.next_index;
                self.next_index += 1;
                self.open.push(index);
                Step::ParagraphStart {
                    index,
                    in_table: self.table_depth > 0,
                }
            }
            b"w:tbl" => {
                self.table_depth += 1;
                Step::Other
            }
            b"w:t" => match self.open.last() {
                Some(&paragraph) => {
                    self.in_text = true;
                    Step::TextStart { paragraph }
                }
                None => Step::Other,
            },
            _ => Step::Other,
        }
    }

    fn end(&mut self, e: &BytesEnd) -> Step {
        match e.name().as_ref() {
            b"w:p" => match self.open.pop() {
                Some(index) => Step::ParagraphEnd { index },
                None => Step::Other,
            },
            b"w:tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                Step::Other
            }
            b"w:t" if self.in_text => {
                self.in_text = false;
                Step::TextEnd
            }
            _ => Step::Other,
        }
    }

    fn current_text_paragraph(&self) -> Option<usize> {
        if self.in_text {
            self.open.last().copied()
        } else {
            None
        }
    }
}

fn unescape(text: &BytesText) -> DocxResult<String> {
    text.unescape()
        .map(|s| s.into_owned())
        .map_err(|e| DocxError::Xml(e.to_string()))
}

/// Collect the text of every paragraph, in document order.
///
/// Empty paragraphs are included so that `spans[i].index == i`.
pub fn extract_spans(xml: &str) -> DocxResult<Vec<TextSpan>> {
    let mut reader = Reader::from_str(xml);
    let mut cursor = SpanCursor::default();
    let mut spans: Vec<TextSpan> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Step::ParagraphStart { index, in_table } = cursor.start(&e) {
                    debug_assert_eq!(index, spans.len());
                    spans.push(TextSpan {
                        index,
                        text: String::new(),
                        in_table,
                    });
                }
            }
            Event::End(e) => {
                cursor.end(&e);
            }
            Event::Text(t) => {
                if let Some(paragraph) = cursor.current_text_paragraph() {
                    spans[paragraph].text.push_str(&unescape(&t)?);
                }
            }
            Event::CData(c) => {
                if let Some(paragraph) = cursor.current_text_paragraph() {
                    spans[paragraph]
                        .text
                        .push_str(&String::from_utf8_lossy(c.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(spans)
}

fn has_attribute(e: &BytesStart, key: &[u8]) -> bool {
    e.attributes().flatten().any(|attr| attr.key.as_ref() == key)
}

fn write_bilingual_run<W: std::io::Write>(writer: &mut Writer<W>, text: &str) -> DocxResult<()> {
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
    writer.write_event(Event::Empty(BytesStart::new("w:i")))?;
    writer.write_event(Event::Empty(
        BytesStart::new("w:color").with_attributes([("w:val", BILINGUAL_COLOR)]),
    ))?;
    writer.write_event(Event::Empty(
        BytesStart::new("w:sz").with_attributes([("w:val", BILINGUAL_HALF_POINTS)]),
    ))?;
    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    writer.write_event(Event::Empty(BytesStart::new("w:br")))?;
    writer.write_event(Event::Start(
        BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

/// Write translations back into `xml`.
///
/// `translations` maps a paragraph index (as returned by [`extract_spans`])
/// to its new text; paragraphs without an entry are left untouched.
pub fn apply_translations(
    xml: &str,
    translations: &HashMap<usize, String>,
    mode: WriteMode,
) -> DocxResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + xml.len() / 2));
    let mut cursor = SpanCursor::default();
    // paragraphs whose translation has already been placed (Replace mode)
    let mut placed: Vec<usize> = Vec::new();
    let mut suppress_text = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Start(e) => match cursor.start(&e) {
                Step::TextStart { paragraph } if mode == WriteMode::Replace => {
                    match translations.get(&paragraph) {
                        Some(translated) if !placed.contains(&paragraph) => {
                            let mut start = e.into_owned();
                            if !has_attribute(&start, b"xml:space") {
                                start.push_attribute(("xml:space", "preserve"));
                            }
                            writer.write_event(Event::Start(start))?;
                            writer.write_event(Event::Text(BytesText::new(translated)))?;
                            placed.push(paragraph);
                            suppress_text = true;
                        }
                        Some(_) => {
                            writer.write_event(Event::Start(e))?;
                            suppress_text = true;
                        }
                        None => writer.write_event(Event::Start(e))?,
                    }
                }
                _ => writer.write_event(Event::Start(e))?,
            },
            Event::End(e) => match cursor.end(&e) {
                Step::TextEnd => {
                    suppress_text = false;
                    writer.write_event(Event::End(e))?;
                }
                Step::ParagraphEnd { index } if mode == WriteMode::Bilingual => {
                    if let Some(translated) = translations.get(&index) {
                        write_bilingual_run(&mut writer, translated)?;
                    }
                    writer.write_event(Event::End(e))?;
                }
                _ => writer.write_event(Event::End(e))?,
            },
            Event::Text(_) | Event::CData(_) if suppress_text => {}
            other => writer.write_event(other)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|_| DocxError::Encoding("document body".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures;

    fn translations(pairs: &[(usize, &str)]) -> HashMap<usize, String> {
        pairs
            .iter()
            .map(|(index, text)| (*index, text.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_joins_runs() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Hello, </w:t></w:r><w:r><w:t xml:space="preserve">world &amp; all</w:t></w:r></w:p>"#;
        let spans = extract_spans(&fixtures::document_xml(body)).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello, world & all");
        assert!(!spans[0].in_table);
    }

    #[test]
    fn test_extract_marks_table_cells() {
        let body = format!(
            "{}<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>{}",
            fixtures::paragraph("before"),
            fixtures::paragraph("cell 1"),
            fixtures::paragraph("cell 2"),
            fixtures::paragraph("after"),
        );
        let spans = extract_spans(&fixtures::document_xml(&body)).unwrap();
        let summary: Vec<(&str, bool)> = spans
            .iter()
            .map(|s| (s.text.as_str(), s.in_table))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("before", false),
                ("cell 1", true),
                ("cell 2", true),
                ("after", false)
            ]
        );
    }

    #[test]
    fn test_extract_ignores_deleted_and_field_text() {
        let body = r#"<w:p><w:r><w:instrText>PAGE</w:instrText></w:r><w:del><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:t>kept</w:t></w:r></w:p>"#;
        let spans = extract_spans(&fixtures::document_xml(body)).unwrap();
        assert_eq!(spans[0].text, "kept");
    }

    #[test]
    fn test_empty_paragraphs_keep_numbering() {
        let body = format!(
            "<w:p/><w:p></w:p>{}",
            fixtures::paragraph("text")
        );
        let spans = extract_spans(&fixtures::document_xml(&body)).unwrap();
        // `<w:p/>` is an empty element and carries no text, so it is not numbered
        assert_eq!(spans.len(), 2);
        assert!(spans[0].is_blank());
        assert_eq!(spans[1].index, 1);
        assert_eq!(spans[1].text, "text");
    }

    #[test]
    fn test_replace_writes_first_run_and_empties_rest() {
        let body = r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>你好，</w:t></w:r><w:r><w:t>世界</w:t></w:r></w:p>"#;
        let xml = fixtures::document_xml(body);
        let out = apply_translations(&xml, &translations(&[(0, "Hello, world")]), WriteMode::Replace)
            .unwrap();

        assert!(out.contains(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Hello, world</w:t></w:r><w:r><w:t></w:t></w:r>"#));
        let spans = extract_spans(&out).unwrap();
        assert_eq!(spans[0].text, "Hello, world");
    }

    #[test]
    fn test_replace_escapes_markup() {
        let xml = fixtures::document_xml(&fixtures::paragraph("a"));
        let out = apply_translations(&xml, &translations(&[(0, "<b> & \"c\"")]), WriteMode::Replace)
            .unwrap();
        assert_eq!(extract_spans(&out).unwrap()[0].text, "<b> & \"c\"");
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn test_untouched_paragraphs_are_byte_identical() {
        let body = format!(
            "{}{}",
            fixtures::paragraph("keep me"),
            fixtures::paragraph("change me")
        );
        let xml = fixtures::document_xml(&body);
        let out = apply_translations(&xml, &translations(&[(1, "changed")]), WriteMode::Replace)
            .unwrap();
        assert!(out.contains(&fixtures::paragraph("keep me")));
        assert!(!out.contains("change me"));

        let unchanged = apply_translations(&xml, &HashMap::new(), WriteMode::Replace).unwrap();
        assert_eq!(unchanged, xml);
    }

    #[test]
    fn test_nested_paragraph_in_text_box() {
        let body = r#"<w:p><w:r><w:t>outer</w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t> tail</w:t></w:r></w:p>"#;
        let xml = fixtures::document_xml(body);
        let spans = extract_spans(&xml).unwrap();
        assert_eq!(spans[0].text, "outer tail");
        assert_eq!(spans[1].text, "inner");

        let out = apply_translations(
            &xml,
            &translations(&[(0, "OUTER"), (1, "INNER")]),
            WriteMode::Replace,
        )
        .unwrap();
        let spans = extract_spans(&out).unwrap();
        assert_eq!(spans[0].text, "OUTER");
        assert_eq!(spans[1].text, "INNER");
    }

    #[test]
    fn test_bilingual_appends_run() {
        let xml = fixtures::document_xml(&fixtures::paragraph("原文"));
        let out = apply_translations(&xml, &translations(&[(0, "source text")]), WriteMode::Bilingual)
            .unwrap();

        assert!(out.contains("<w:t>原文</w:t>"));
        assert!(out.contains(r#"<w:color w:val="4224E9"/>"#));
        assert!(out.contains(r#"<w:sz w:val="18"/>"#));
        assert!(out.contains(r#"<w:br/><w:t xml:space="preserve">source text</w:t></w:r></w:p>"#));
        assert_eq!(extract_spans(&out).unwrap()[0].text, "原文source text");
    }

    #[test]
    fn test_malformed_xml() {
        let result = extract_spans("<w:document><w:body><w:p></w:body></w:document>");
        assert!(matches!(result, Err(DocxError::Xml(_))));
    }
}
