//! End-to-end tests: split → translate → merge
//!
//! Everything runs offline with the native page-break splitter and the mock
//! translator. The external converters are covered in `split`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::backend::{DocxPageTranslator, PageOptions, PageTranslator};
    use crate::batch::BatchDriver;
    use crate::config::DriverConfig;
    use crate::docx::fixtures::{paragraph, paragraph_with_break, write_unit};
    use crate::docx::{DocxPackage, WriteMode, extract_spans};
    use crate::merge::{MergeOptions, merge_units};
    use crate::mt::{MockMode, MockTranslator};
    use crate::split::{PageBreakSplitter, Splitter};

    fn document_texts(path: &std::path::Path) -> Vec<String> {
        let xml = DocxPackage::open(path).unwrap().document_xml().unwrap();
        extract_spans(&xml)
            .unwrap()
            .into_iter()
            .map(|span| span.text)
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Twelve pages, so that page 10..12 would sort before 2 lexically
    fn twelve_pages() -> String {
        (1..=12)
            .map(|page| {
                let text = format!("第{}页", page);
                if page < 12 {
                    paragraph_with_break(&text)
                } else {
                    paragraph(&text)
                }
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_full_pipeline_keeps_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_unit(dir.path(), "source.docx", &twelve_pages());
        let work = dir.path().join("pages_output");
        let output = dir.path().join("merged.docx");

        let units = PageBreakSplitter::new(1)
            .unwrap()
            .split(&source, &work)
            .await
            .unwrap();
        assert_eq!(units.len(), 12);

        // a slow mock makes completions arrive out of order
        let translator = Arc::new(DocxPageTranslator::new(
            Arc::new(MockTranslator::with_delay(MockMode::Suffix, 10)),
            PageOptions::default(),
        ));
        let summary = BatchDriver::new(translator, DriverConfig::default().with_workers(5))
            .run(&work)
            .await
            .unwrap();
        assert_eq!(summary.attempted, 12);
        assert_eq!(summary.succeeded, 12);

        let merged = merge_units(&work, &output, MergeOptions::default())
            .await
            .unwrap();
        assert_eq!(merged.len(), 12);

        let expected: Vec<String> = (1..=12).map(|page| format!("第{}页 [en]", page)).collect();
        assert_eq!(document_texts(&output), expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_unit_stays_untranslated() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_unit(
            dir.path(),
            "source.docx",
            &[
                paragraph_with_break("一"),
                paragraph_with_break("BOOM"),
                paragraph("三"),
            ]
            .concat(),
        );
        let work = dir.path().join("pages");
        PageBreakSplitter::new(1)
            .unwrap()
            .split(&source, &work)
            .await
            .unwrap();

        let translator: Arc<dyn PageTranslator> = Arc::new(DocxPageTranslator::new(
            Arc::new(MockTranslator::new(MockMode::FailOn("BOOM".to_string()))),
            PageOptions::default(),
        ));
        let summary = BatchDriver::new(translator, DriverConfig::default())
            .run(&work)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failed[0].unit.page, Some(2));
        assert_eq!(document_texts(&work.join("page-2.docx")), vec!["BOOM"]);
        assert_eq!(document_texts(&work.join("page-3.docx")), vec!["三 [en]"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bilingual_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_unit(
            dir.path(),
            "source.docx",
            &[paragraph_with_break("你好"), paragraph("再见")].concat(),
        );
        let work = dir.path().join("pages");
        let output = dir.path().join("bilingual.docx");
        PageBreakSplitter::new(1)
            .unwrap()
            .split(&source, &work)
            .await
            .unwrap();

        let options = PageOptions {
            mode: WriteMode::Bilingual,
            target_locale: "fr".to_string(),
            ..PageOptions::default()
        };
        let translator = Arc::new(DocxPageTranslator::new(
            Arc::new(MockTranslator::new(MockMode::Suffix)),
            options,
        ));
        let config = DriverConfig {
            unit_timeout: Some(Duration::from_secs(30)),
            ..DriverConfig::default()
        };
        BatchDriver::new(translator, config).run(&work).await.unwrap();
        merge_units(&work, &output, MergeOptions::default())
            .await
            .unwrap();

        assert_eq!(
            document_texts(&output),
            vec!["你好你好 [fr]", "再见再见 [fr]"]
        );
    }
}
