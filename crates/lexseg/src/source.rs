use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use lexseg_core::run::BoxError;
use lexseg_core::segment::Hyperlink;
use lexseg_core::span::{LayoutBlock, LayoutLine, LayoutSpan, PageLayout};
use lexseg_core::DocumentSource;

use crate::prelude::*;

/// A PDF file opened for one run.
///
/// The blocks of the last page parsed are kept, so asking for a page's
/// links and then its layout parses the content stream once.
pub struct PdfSource {
    document: pdf::Document,
    last_page: RefCell<Option<(u32, Vec<pdf::TextBlock>)>>,
}

impl PdfSource {
    pub fn open(path: &Path) -> Result<Self> {
        let document = pdf::Document::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self::new(document))
    }

    pub fn new(document: pdf::Document) -> Self {
        Self {
            document,
            last_page: RefCell::new(None),
        }
    }

    fn blocks(&self, page: u32) -> std::result::Result<Vec<pdf::TextBlock>, pdf::PdfError> {
        if let Some((cached, blocks)) = self.last_page.borrow().as_ref() {
            if *cached == page {
                return Ok(blocks.clone());
            }
        }
        let blocks = self.document.page_blocks(page)?;
        *self.last_page.borrow_mut() = Some((page, blocks.clone()));
        Ok(blocks)
    }

    #[cfg(test)]
    fn cached_page(&self) -> Option<u32> {
        self.last_page.borrow().as_ref().map(|(page, _)| *page)
    }
}

impl DocumentSource for PdfSource {
    fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    fn page_layout(&self, page: u32) -> std::result::Result<PageLayout, BoxError> {
        Ok(to_layout(page, self.blocks(page)?))
    }

    fn links(&self, page: u32) -> std::result::Result<Vec<Hyperlink>, BoxError> {
        let blocks = self.blocks(page)?;
        Ok(self
            .document
            .links_in(page, &blocks)?
            .into_iter()
            .map(|link| Hyperlink {
                raw_text: link.anchor_text,
                link: link.uri,
            })
            .collect())
    }

    fn plain_text(&self, pages: RangeInclusive<u32>) -> std::result::Result<String, BoxError> {
        Ok(self.document.plain_text(pages)?)
    }
}

fn to_layout(page: u32, blocks: Vec<pdf::TextBlock>) -> PageLayout {
    PageLayout {
        page,
        blocks: blocks
            .into_iter()
            .map(|block| LayoutBlock {
                lines: block
                    .lines
                    .into_iter()
                    .map(|line| LayoutLine {
                        spans: line
                            .spans
                            .into_iter()
                            .map(|span| LayoutSpan {
                                font: span.font_name,
                                size: span.font_size,
                                text: span.text,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// PDF files under `path`: the file itself, or the `.pdf` entries of a
/// folder (not recursive) sorted by file name.
pub fn list_pdfs(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !is_pdf(path) {
            return Err(Error::NotAPdf(path.display().to_string()).into());
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read folder {}", path.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry_path = entry?.path();
        if entry_path.is_file() && is_pdf(&entry_path) {
            files.push(entry_path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}

/// The document identifier stored with every record: the file name.
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{BatchWriter, Repository};
    use crate::testing::{case_pdf, CASE_RANGES, CITATION_URI};
    use lexseg_core::ranges::PageRangeIndex;
    use lexseg_core::records::FootnoteRecord;
    use lexseg_core::SegmentationRun;

    #[test]
    fn test_list_pdfs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c.pdf.bak"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| document_id(p))
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_list_pdfs_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("volume.pdf");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(list_pdfs(&file).unwrap(), vec![file]);

        let text = dir.path().join("volume.txt");
        std::fs::write(&text, b"").unwrap();
        assert!(list_pdfs(&text).is_err());
    }

    #[test]
    fn test_layout_keeps_font_and_size() {
        let blocks = vec![pdf::TextBlock {
            lines: vec![pdf::TextLine {
                spans: vec![pdf::TextSpan::new("1", 72.0, 103.0, 3.0, 6.0, "Helvetica")],
                y: 103.0,
                font_size: 6.0,
            }],
        }];

        let layout = to_layout(4, blocks);
        assert_eq!(layout.page, 4);
        let span = &layout.blocks[0].lines[0].spans[0];
        assert_eq!(span.font, "Helvetica");
        assert_eq!(span.size, 6.0);
        assert_eq!(span.text, "1");
    }

    #[test]
    fn test_links_then_layout_parse_page_once() {
        let document = pdf::Document::from_bytes(&case_pdf()).unwrap();
        let source = PdfSource::new(document);
        assert_eq!(source.cached_page(), None);

        let links = source.links(1).unwrap();
        assert_eq!(source.cached_page(), Some(1));
        assert_eq!(links[0].raw_text, "Smith v. Jones");

        let layout = source.page_layout(1).unwrap();
        let fresh = pdf::Document::from_bytes(&case_pdf()).unwrap();
        assert_eq!(layout, to_layout(1, fresh.page_blocks(1).unwrap()));

        source.page_layout(2).unwrap();
        assert_eq!(source.cached_page(), Some(2));
        assert!(source.links(2).unwrap().is_empty());
    }

    #[test]
    fn test_case_pdf_segments_end_to_end() {
        let source = PdfSource::new(pdf::Document::from_bytes(&case_pdf()).unwrap());
        let repo = Repository::new_in_memory().unwrap();
        let ranges = PageRangeIndex::from_ranges(crate::ranges::parse_ranges(CASE_RANGES).unwrap());
        let engine = Config::default().engine();
        let mut run =
            SegmentationRun::new(&engine, &ranges, BatchWriter::new(repo.clone(), 100)).unwrap();

        let footnotes = run.footnotes("case.pdf", &source).unwrap();
        assert_eq!((footnotes.pages, footnotes.records, footnotes.unresolved), (2, 2, 0));
        let opinions = run.opinions("case.pdf", &source).unwrap();
        assert_eq!(opinions.records, 1);
        assert_eq!(run.flush().unwrap().inserted, 3);

        assert_eq!(
            repo.footnotes("case.pdf").unwrap(),
            vec![
                FootnoteRecord {
                    document: "case.pdf".to_string(),
                    page: 1,
                    text: "1 See id. at 5 See id. at 5".to_string(),
                    unit_no: Some("A".to_string()),
                },
                FootnoteRecord {
                    document: "case.pdf".to_string(),
                    page: 2,
                    text: "2 Cf. Doe v. Roe Cf. Doe v. Roe".to_string(),
                    unit_no: Some("B".to_string()),
                },
            ]
        );

        let stored = repo.opinions("case.pdf").unwrap();
        assert_eq!(stored.len(), 1);
        let opinion = &stored[0];
        assert_eq!(opinion.unit_id, 0);
        assert_eq!((opinion.start_page, opinion.end_page), (1, 2));
        assert_eq!(
            opinion.content,
            "See Smith v. Jones held the rule. The judgment is affirmed."
        );
        assert_eq!(
            opinion.links,
            vec![Hyperlink {
                raw_text: "Smith v. Jones".to_string(),
                link: CITATION_URI.to_string(),
            }]
        );
    }
}
