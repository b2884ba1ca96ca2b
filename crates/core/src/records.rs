//! Persisted record shapes and bulk-write accounting.
//!
//! Each record carries its natural identity so repeated runs over the same
//! document overwrite rather than duplicate:
//!
//! | Record   | Key                      |
//! |----------|--------------------------|
//! | footnote | document, page, text     |
//! | opinion  | document, unit_id        |
//! | metadata | document, page           |

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::metadata::MetadataFields;
use crate::segment::{Footnote, Hyperlink, Opinion};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteRecord {
    pub document: String,
    pub page: u32,
    pub text: String,
    /// Case number resolved from the page-range table.
    pub unit_no: Option<String>,
}

impl FootnoteRecord {
    pub fn new(document: &str, footnote: Footnote, unit_no: Option<String>) -> Self {
        Self {
            document: document.to_string(),
            page: footnote.page,
            text: footnote.text,
            unit_no,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionRecord {
    pub document: String,
    pub unit_id: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub content: String,
    pub links: Vec<Hyperlink>,
}

impl OpinionRecord {
    pub fn new(document: &str, opinion: Opinion) -> Self {
        Self {
            document: document.to_string(),
            unit_id: opinion.unit_id,
            start_page: opinion.start_page,
            end_page: opinion.end_page,
            content: opinion.content,
            links: opinion.links,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub document: String,
    /// 1-based start page of the case.
    pub page: u32,
    #[serde(flatten)]
    pub fields: MetadataFields,
}

/// Counts reported by one or more bulk writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteResult {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

impl BulkWriteResult {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl AddAssign for BulkWriteResult {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}
