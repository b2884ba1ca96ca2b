//! Label-anchored field extraction.
//!
//! Metadata labels ("Judges:", "Counsel:", ...) share one typeface with the
//! surrounding text, so they are located in plain page text instead of by
//! font signature. A bounded section runs from its start label to the
//! nearest terminator label sitting at the start of a line.
//!
//! Every extractor returns `Option<String>`: `None` is a miss and is never
//! an error. Malformed terminator fragments are rejected when the pattern
//! is built.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("invalid pattern for label '{label}': {source}")]
    InvalidPattern {
        label: String,
        #[source]
        source: regex::Error,
    },
}

/// What may separate a start label from the captured text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// One or more whitespace characters.
    Whitespace,
    /// Zero or more whitespace characters.
    OptionalWhitespace,
    /// One or more colons or whitespace characters.
    ColonOrWhitespace,
}

impl Separator {
    fn as_regex(self) -> &'static str {
        match self {
            Separator::Whitespace => r"\s+",
            Separator::OptionalWhitespace => r"\s*",
            Separator::ColonOrWhitespace => r"[:\s]+",
        }
    }
}

/// A compiled bounded-section pattern.
#[derive(Debug, Clone)]
pub struct SectionPattern {
    label: String,
    start: Regex,
    /// `None` when no terminator was configured: such a section never closes.
    terminator: Option<Regex>,
    max_len: Option<usize>,
}

impl SectionPattern {
    /// Build a pattern from a literal start label and terminator regex
    /// fragments. Labels and terminators match case-insensitively.
    pub fn new(
        label: &str,
        separator: Separator,
        terminators: &[&str],
        allow_end_of_text: bool,
    ) -> Result<Self, FieldError> {
        let invalid = |source| FieldError::InvalidPattern {
            label: label.to_string(),
            source,
        };

        let start = Regex::new(&format!(
            "(?i){}{}",
            regex::escape(label),
            separator.as_regex()
        ))
        .map_err(invalid)?;

        let mut alternatives: Vec<String> =
            terminators.iter().map(|t| format!("(?:{})", t)).collect();
        if allow_end_of_text {
            alternatives.push(r"\n?\z".to_string());
        }
        let terminator = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\n(?:{})", alternatives.join("|"))).map_err(invalid)?)
        };

        Ok(Self {
            label: label.to_string(),
            start,
            terminator,
            max_len: None,
        })
    }

    /// Discard captures longer than `max_len` characters.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Capture the text between the start label and the first terminator.
    ///
    /// Newlines in the capture collapse to single spaces and the result is
    /// trimmed. An over-long capture is treated as a miss, not truncated:
    /// it almost always means the terminator was missing and the capture
    /// bled into the following fields.
    pub fn extract(&self, text: &str) -> Option<String> {
        let terminator = self.terminator.as_ref()?;
        let content = self.start.find_iter(text).find_map(|m| {
            let body_start = m.end();
            let first_len = text[body_start..].chars().next()?.len_utf8();
            let stop = terminator.find_at(text, body_start + first_len)?;
            Some(&text[body_start..stop.start()])
        })?;

        let content = content.replace('\n', " ").trim().to_string();
        if content.is_empty() {
            return None;
        }
        match self.max_len {
            Some(max) if content.chars().count() > max => None,
            _ => Some(content),
        }
    }
}

/// A compiled `label:` pattern capturing the rest of its line.
#[derive(Debug, Clone)]
pub struct OneLinePattern {
    re: Regex,
}

impl OneLinePattern {
    pub fn new(label: &str) -> Result<Self, FieldError> {
        let pattern = format!(r"(?i){}:\s*(.+)", regex::escape(label));
        let re = Regex::new(&pattern).map_err(|source| FieldError::InvalidPattern {
            label: label.to_string(),
            source,
        })?;
        Ok(Self { re })
    }

    /// Capture the rest of the first line carrying the label.
    pub fn extract(&self, text: &str) -> Option<String> {
        let value = self.re.captures(text)?.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// "Before X, Y and Z." panel clause, used when no "Judges:" label exists.
pub fn extract_before_clause(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\bBefore\s+(.+?)\.").unwrap());
    let value = re.captures(text)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Pick the largest-font span containing "v." as the case caption.
///
/// Ties keep the first span seen.
pub fn extract_caption(spans: &[Span]) -> Option<String> {
    let mut best: Option<(&str, f32)> = None;
    for span in spans {
        let text = span.text.trim();
        if !text.contains("v.") {
            continue;
        }
        let max = best.map(|(_, size)| size).unwrap_or(0.0);
        if span.size > max {
            best = Some((text, span.size));
        }
    }
    best.map(|(text, _)| text.to_string())
}
