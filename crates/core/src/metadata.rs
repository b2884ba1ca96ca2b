//! Bibliographic metadata for one case in a compiled PDF.
//!
//! A case occupies a page range inside a larger export. Its header area
//! (caption, core terms, counsel, judges, history) sits on the first page or
//! two, but the "Opinion by" line and the counsel block can be pushed much
//! further down by long headnote sections. Two text windows are therefore
//! scanned: a short local one and a longer extended one, both starting at
//! the case's first page.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fields::{
    extract_before_clause, extract_caption, FieldError, OneLinePattern, SectionPattern, Separator,
};
use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Pages, counted from the start page, joined into the local window.
    pub local_scan_pages: u32,
    /// Pages, counted from the start page, joined into the extended window.
    pub extended_scan_pages: u32,
    /// Remove `[*12]` / `[**12]` pagination markers from free-text fields.
    pub strip_markers: bool,
    pub core_terms_max_len: usize,
    pub judges_max_len: usize,
    pub subsequent_history_max_len: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            local_scan_pages: 2,
            extended_scan_pages: 13,
            strip_markers: false,
            core_terms_max_len: 2000,
            judges_max_len: 300,
            subsequent_history_max_len: 1000,
        }
    }
}

/// Inputs for one extraction, assembled by the caller from the reader.
#[derive(Debug, Clone, Default)]
pub struct MetadataWindows {
    pub local_text: String,
    pub extended_text: String,
    /// Flattened spans of the start page, used for the caption.
    pub start_page_spans: Vec<Span>,
}

/// Extracted fields. A field that was not found is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFields {
    pub core_terms: Vec<String>,
    pub judges: String,
    pub counsel: String,
    pub plaintiff_defendant: String,
    pub opinion_by: String,
    pub prior_history: String,
    pub subsequent_history: String,
}

fn pagination_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\*+\d+\]").unwrap())
}

/// Remove `[*N]` style pagination markers and trim.
pub fn strip_markers(text: &str) -> String {
    pagination_marker().replace_all(text, "").trim().to_string()
}

/// Compiled field patterns.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    core_terms: SectionPattern,
    judges: SectionPattern,
    counsel: SectionPattern,
    prior_history: SectionPattern,
    subsequent_history: SectionPattern,
    opinion_by: OneLinePattern,
    strip_markers: bool,
}

impl MetadataExtractor {
    pub fn new(config: &MetadataConfig) -> Result<Self, FieldError> {
        let core_terms = SectionPattern::new(
            "Core Terms",
            Separator::Whitespace,
            &[
                "Counsel:",
                "LexisNexis",
                "Headnotes",
                r"HN\d+\[",
                "Opinion by:",
                "Judges?:",
            ],
            false,
        )?
        .with_max_len(config.core_terms_max_len);

        let judges = SectionPattern::new(
            "Judges:",
            Separator::Whitespace,
            &["Opinion by:", "Core Terms", "Counsel:"],
            false,
        )?
        .with_max_len(config.judges_max_len);

        let counsel = SectionPattern::new(
            "Counsel:",
            Separator::OptionalWhitespace,
            &[
                r"HN\d+\[",
                "Headnotes",
                "Judges?:",
                "Opinion by:",
                "Core Terms",
                "Subsequent History:",
                "Prior History:",
                "Disposition:",
            ],
            true,
        )?;

        let prior_history = SectionPattern::new(
            "Prior History",
            Separator::ColonOrWhitespace,
            &[
                "Disposition:",
                "Core Terms",
                "Subsequent History:",
                "LexisNexis",
                "Headnotes",
                r"HN\d+\[",
            ],
            true,
        )?;

        let subsequent_history = SectionPattern::new(
            "Subsequent History:",
            Separator::Whitespace,
            &[
                "Prior History:",
                "Disposition:",
                "Core Terms",
                "LexisNexis",
                "Headnotes",
            ],
            false,
        )?
        .with_max_len(config.subsequent_history_max_len);

        Ok(Self {
            core_terms,
            judges,
            counsel,
            prior_history,
            subsequent_history,
            opinion_by: OneLinePattern::new("Opinion by")?,
            strip_markers: config.strip_markers,
        })
    }

    /// Run every field extractor. Misses leave the field empty and never
    /// affect the other fields.
    pub fn extract(&self, windows: &MetadataWindows) -> MetadataFields {
        let local = windows.local_text.as_str();
        let extended = windows.extended_text.as_str();

        let core_terms = self
            .core_terms
            .extract(local)
            .map(|raw| split_terms(&raw))
            .unwrap_or_default();

        let judges = self
            .judges
            .extract(local)
            .or_else(|| extract_before_clause(extended));

        let mut fields = MetadataFields {
            core_terms,
            judges: judges.unwrap_or_default(),
            counsel: self.counsel.extract(extended).unwrap_or_default(),
            plaintiff_defendant: extract_caption(&windows.start_page_spans).unwrap_or_default(),
            opinion_by: self.opinion_by.extract(extended).unwrap_or_default(),
            prior_history: self.prior_history.extract(local).unwrap_or_default(),
            subsequent_history: self.subsequent_history.extract(local).unwrap_or_default(),
        };

        if self.strip_markers {
            for field in [
                &mut fields.judges,
                &mut fields.opinion_by,
                &mut fields.prior_history,
                &mut fields.subsequent_history,
            ] {
                *field = strip_markers(field);
            }
        }

        fields
    }
}

fn split_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
