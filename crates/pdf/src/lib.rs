//! Positioned text and link annotations from PDF files.
//!
//! [`Document`] loads a file once and answers per-page queries: text blocks
//! with exact font names and sizes, URI links resolved to their anchor text,
//! and plain text for a range of pages.

use std::ops::RangeInclusive;
use std::path::Path;

use thiserror::Error;

use parser::backend::{LopdfBackend, PageId, PdfBackend};
use parser::layout;

pub mod parser;
pub mod types;

pub use parser::layout::{TextBlock, TextLine, TextSpan};
pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A loaded PDF document.
pub struct Document {
    backend: LopdfBackend,
}

impl Document {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self {
            backend: LopdfBackend::load_bytes(bytes)?,
        })
    }

    pub fn page_count(&self) -> u32 {
        u32::try_from(self.backend.page_count()).unwrap_or(u32::MAX)
    }

    /// Text blocks of a 1-based page, top of the page first.
    pub fn page_blocks(&self, page: u32) -> Result<Vec<TextBlock>, PdfError> {
        let page_id = self.page_id(page)?;
        let spans = layout::extract_page_spans(&self.backend, page_id)?;
        Ok(layout::analyze_page(spans))
    }

    /// URI links of a 1-based page with the text painted under each one.
    pub fn links(&self, page: u32) -> Result<Vec<PageLink>, PdfError> {
        let page_id = self.page_id(page)?;
        if self.backend.page_links(page_id)?.is_empty() {
            return Ok(Vec::new());
        }
        self.links_in(page, &self.page_blocks(page)?)
    }

    /// Like [`Document::links`], resolving anchors against `blocks` already
    /// parsed from the same page.
    pub fn links_in(&self, page: u32, blocks: &[TextBlock]) -> Result<Vec<PageLink>, PdfError> {
        let annotations = self.backend.page_links(self.page_id(page)?)?;
        Ok(annotations
            .into_iter()
            .map(|annotation| PageLink {
                anchor_text: layout::text_in_rect(blocks, &annotation.rect),
                uri: annotation.uri,
            })
            .collect())
    }

    /// Plain text of the given 1-based pages, clipped to the document.
    /// Pages are separated by a blank line.
    pub fn plain_text(&self, pages: RangeInclusive<u32>) -> Result<String, PdfError> {
        let first = (*pages.start()).max(1);
        let last = (*pages.end()).min(self.page_count());

        let mut texts = Vec::new();
        for page in first..=last {
            texts.push(layout::page_text(&self.page_blocks(page)?));
        }
        Ok(texts.join("\n"))
    }

    fn page_id(&self, page: u32) -> Result<PageId, PdfError> {
        self.backend
            .pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                page,
                page_count: self.page_count(),
            })
    }
}
