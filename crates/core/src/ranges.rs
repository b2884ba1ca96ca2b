//! Page-range resolver.
//!
//! The index table maps page intervals of a compiled PDF to case numbers.
//! Ranges with no end page are open-ended: they cover everything from their
//! start page on, and the first qualifying range in ascending start order
//! wins. A later closed range that overlaps an earlier open one is therefore
//! unreachable for the overlapping pages, exactly as the table encodes it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub document: String,
    pub unit_no: String,
    pub start_page: u32,
    #[serde(default)]
    pub end_page: Option<u32>,
}

impl PageRange {
    pub fn contains(&self, page: u32) -> bool {
        match self.end_page {
            Some(end) => self.start_page <= page && page <= end,
            None => page >= self.start_page,
        }
    }
}

/// In-memory index of page ranges, grouped per document and sorted by
/// start page once at construction.
#[derive(Debug, Clone, Default)]
pub struct PageRangeIndex {
    by_document: HashMap<String, Vec<PageRange>>,
}

impl PageRangeIndex {
    pub fn from_ranges(ranges: impl IntoIterator<Item = PageRange>) -> Self {
        let mut by_document: HashMap<String, Vec<PageRange>> = HashMap::new();
        for range in ranges {
            by_document
                .entry(range.document.clone())
                .or_default()
                .push(range);
        }
        for list in by_document.values_mut() {
            list.sort_by_key(|r| r.start_page);
        }
        Self { by_document }
    }

    /// Unit number of the first range containing `page`, or `None` for an
    /// unknown document or an uncovered page.
    pub fn resolve(&self, document: &str, page: u32) -> Option<&str> {
        self.by_document
            .get(document)?
            .iter()
            .find(|r| r.contains(page))
            .map(|r| r.unit_no.as_str())
    }

    /// Ranges of one document in ascending start order.
    pub fn ranges_for(&self, document: &str) -> &[PageRange] {
        self.by_document
            .get(document)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn document_count(&self) -> usize {
        self.by_document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_document.is_empty()
    }
}
