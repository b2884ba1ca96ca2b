//! Signature classifier.
//!
//! Court-opinion exports carry no structure tags. The only reliable hint is
//! typography: footnote markers are tiny superscripts glued to body-sized
//! text, opinion headings are large and bold, opinion prose uses one font
//! family at one size. A signature is a `(font, size[, next_size])` tuple and
//! classification is a pure function of the span, its right-hand neighbour
//! and the configured table.
//!
//! Sizes are compared with exact `f32` equality. The values come from a
//! small font-size palette baked into the exporter, so a tolerance would
//! only introduce false matches between neighbouring palette entries.

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// A classification trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRule {
    pub font: String,
    pub size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_size: Option<f32>,
}

impl SignatureRule {
    pub fn new(font: impl Into<String>, size: f32) -> Self {
        Self {
            font: font.into(),
            size,
            next_size: None,
        }
    }

    pub fn followed_by(mut self, next_size: f32) -> Self {
        self.next_size = Some(next_size);
        self
    }

    /// Returns `true` when `span` carries this signature.
    ///
    /// A rule with `next_size` never matches a span that ends its line.
    #[allow(clippy::float_cmp)]
    pub fn matches(&self, span: &Span, next: Option<&Span>) -> bool {
        if span.font != self.font || span.size != self.size {
            return false;
        }
        match self.next_size {
            None => true,
            Some(expected) => next.is_some_and(|n| n.size == expected),
        }
    }
}

// ---------------------------------------------------------------------------
// Footnote mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootnoteRole {
    /// Superscript marker immediately followed by footnote body text.
    StartMarker,
    /// Any other span carrying text.
    Continuation,
    /// Nothing to contribute.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootnoteSignatures {
    pub start: SignatureRule,
}

impl Default for FootnoteSignatures {
    fn default() -> Self {
        Self {
            start: SignatureRule::new("Helvetica", 6.0).followed_by(9.0),
        }
    }
}

impl FootnoteSignatures {
    pub fn classify(&self, span: &Span, next: Option<&Span>) -> FootnoteRole {
        if self.start.matches(span, next) {
            FootnoteRole::StartMarker
        } else if span.text.is_empty() {
            FootnoteRole::None
        } else {
            FootnoteRole::Continuation
        }
    }
}

// ---------------------------------------------------------------------------
// Opinion mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpinionRole {
    /// Section heading that opens a new opinion.
    Header,
    /// Opinion prose. `terminates` is set when the text also carries the
    /// end-of-document marker.
    Body { terminates: bool },
    /// End-of-document marker outside the body signature.
    Terminator,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpinionSignatures {
    pub header: SignatureRule,
    /// Case-sensitive substring a header span must contain.
    pub header_keyword: String,
    pub body_fonts: Vec<String>,
    pub body_size: f32,
    pub end_marker: String,
}

impl Default for OpinionSignatures {
    fn default() -> Self {
        Self {
            header: SignatureRule::new("Helvetica-Bold", 14.0),
            header_keyword: "Opinion".to_string(),
            body_fonts: vec![
                "Helvetica".to_string(),
                "Helvetica-BoldOblique".to_string(),
                "Helvetica-Oblique".to_string(),
            ],
            body_size: 10.0,
            end_marker: "End of Document".to_string(),
        }
    }
}

impl OpinionSignatures {
    /// Classify a span. Opinion text is compared trimmed.
    #[allow(clippy::float_cmp)]
    pub fn classify(&self, span: &Span) -> OpinionRole {
        let text = span.text.trim();

        if self.header.matches(span, None) && text.contains(self.header_keyword.as_str()) {
            return OpinionRole::Header;
        }

        let terminates = !self.end_marker.is_empty() && text.contains(self.end_marker.as_str());
        let body = span.size == self.body_size && self.body_fonts.iter().any(|f| *f == span.font);

        match (body && !text.is_empty(), terminates) {
            (true, terminates) => OpinionRole::Body { terminates },
            (false, true) => OpinionRole::Terminator,
            (false, false) => OpinionRole::None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::flat;
    use super::*;

    #[test]
    fn test_footnote_start_requires_marker_and_larger_neighbour() {
        let sigs = FootnoteSignatures::default();
        let marker = flat("Helvetica", 6.0, "1");
        let body = flat("Helvetica", 9.0, "See generally");
        let other = flat("Helvetica", 10.0, "See generally");

        assert_eq!(sigs.classify(&marker, Some(&body)), FootnoteRole::StartMarker);
        assert_eq!(sigs.classify(&marker, Some(&other)), FootnoteRole::Continuation);
        assert_eq!(sigs.classify(&marker, None), FootnoteRole::Continuation);
    }

    #[test]
    fn test_footnote_font_mismatch() {
        let sigs = FootnoteSignatures::default();
        let marker = flat("Times-Roman", 6.0, "1");
        let body = flat("Helvetica", 9.0, "text");
        assert_eq!(sigs.classify(&marker, Some(&body)), FootnoteRole::Continuation);
    }

    #[test]
    fn test_size_comparison_is_exact() {
        let sigs = FootnoteSignatures::default();
        let marker = flat("Helvetica", 6.0001, "1");
        let body = flat("Helvetica", 9.0, "text");
        assert_eq!(sigs.classify(&marker, Some(&body)), FootnoteRole::Continuation);

        let marker = flat("Helvetica", 6.0, "1");
        let body = flat("Helvetica", 8.9999, "text");
        assert_eq!(sigs.classify(&marker, Some(&body)), FootnoteRole::Continuation);
    }

    #[test]
    fn test_footnote_empty_span_is_none() {
        let sigs = FootnoteSignatures::default();
        assert_eq!(sigs.classify(&flat("Helvetica", 9.0, ""), None), FootnoteRole::None);
    }

    #[test]
    fn test_opinion_header() {
        let sigs = OpinionSignatures::default();
        assert_eq!(
            sigs.classify(&flat("Helvetica-Bold", 14.0, " Opinion ")),
            OpinionRole::Header
        );
        // Keyword is case-sensitive.
        assert_eq!(
            sigs.classify(&flat("Helvetica-Bold", 14.0, "OPINION")),
            OpinionRole::None
        );
        assert_eq!(
            sigs.classify(&flat("Helvetica-Bold", 12.0, "Opinion")),
            OpinionRole::None
        );
    }

    #[test]
    fn test_opinion_body_fonts() {
        let sigs = OpinionSignatures::default();
        for font in ["Helvetica", "Helvetica-Oblique", "Helvetica-BoldOblique"] {
            assert_eq!(
                sigs.classify(&flat(font, 10.0, "The court")),
                OpinionRole::Body { terminates: false }
            );
        }
        assert_eq!(
            sigs.classify(&flat("Helvetica-Bold", 10.0, "The court")),
            OpinionRole::None
        );
        assert_eq!(sigs.classify(&flat("Helvetica", 10.0, "   ")), OpinionRole::None);
    }

    #[test]
    fn test_opinion_terminator() {
        let sigs = OpinionSignatures::default();
        assert_eq!(
            sigs.classify(&flat("Helvetica", 10.0, "Affirmed. End of Document")),
            OpinionRole::Body { terminates: true }
        );
        assert_eq!(
            sigs.classify(&flat("Helvetica-Bold", 8.0, "End of Document")),
            OpinionRole::Terminator
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let sigs = OpinionSignatures::default();
        let span = flat("Helvetica", 10.0, "text");
        assert_eq!(sigs.classify(&span), sigs.classify(&span));
    }
}
