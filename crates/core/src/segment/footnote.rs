//! Footnote segmentation.
//!
//! A footnote opens on a superscript marker glued to body-sized text and
//! stays open until one of:
//!
//! - a span ending in `.` is followed on the same line by a span starting
//!   with an uppercase letter (prose resumed),
//! - the last line of the current block has been consumed,
//! - the document ends.
//!
//! The sentence-end heuristic misfires on abbreviations such as
//! "U.S. Courts". Tightening it changes extraction output and so is a
//! deliberate behaviour change, not a bug fix.

use crate::signature::{FootnoteRole, FootnoteSignatures};
use crate::span::{next_in_line, Span};

use super::{Footnote, UnitCounter};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Open {
        text: String,
    },
}

/// Outcome of feeding one span.
struct Step {
    state: State,
    closed: Option<String>,
}

impl Step {
    fn stay(state: State) -> Self {
        Self {
            state,
            closed: None,
        }
    }
}

/// Transition function for a single span.
///
/// A span that closes a footnote is neither appended nor checked for a new
/// marker.
fn step(state: State, span: &Span, next: Option<&Span>, signatures: &FootnoteSignatures) -> Step {
    match state {
        State::Open { mut text } => {
            if span.text.is_empty() {
                return Step::stay(State::Open { text });
            }
            if closes_sentence(span, next) {
                return Step {
                    state: State::Idle,
                    closed: Some(text),
                };
            }
            text.push(' ');
            text.push_str(&span.text);
            Step::stay(State::Open { text })
        }
        State::Idle => match signatures.classify(span, next) {
            FootnoteRole::StartMarker => {
                let follow = next.map(|n| n.text.trim()).unwrap_or_default();
                Step::stay(State::Open {
                    text: format!("{} {}", span.text, follow),
                })
            }
            FootnoteRole::Continuation | FootnoteRole::None => Step::stay(State::Idle),
        },
    }
}

fn closes_sentence(span: &Span, next: Option<&Span>) -> bool {
    let Some(next) = next else {
        return false;
    };
    span.text.ends_with('.') && next.text.starts_with(|c: char| c.is_ascii_uppercase())
}

/// Footnote accumulator for one document.
#[derive(Debug, Clone)]
pub struct FootnoteAccumulator {
    signatures: FootnoteSignatures,
    state: State,
    ids: UnitCounter,
    last_page: u32,
}

impl FootnoteAccumulator {
    pub fn new(signatures: FootnoteSignatures) -> Self {
        Self {
            signatures,
            state: State::Idle,
            ids: UnitCounter::default(),
            last_page: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Feed one page of flattened spans, returning the footnotes that closed
    /// on it.
    pub fn feed_page(&mut self, page: u32, spans: &[Span]) -> Vec<Footnote> {
        self.last_page = page;
        let mut closed = Vec::new();

        for (i, span) in spans.iter().enumerate() {
            let next = next_in_line(spans, i);
            let Step { state, closed: text } =
                step(std::mem::take(&mut self.state), span, next, &self.signatures);
            self.state = state;

            if let Some(text) = text {
                closed.push(self.emit(page, text));
            }

            if span.ends_block() {
                if let State::Open { text } = std::mem::take(&mut self.state) {
                    closed.push(self.emit(page, text));
                }
            }
        }

        closed
    }

    /// Flush a footnote still open at end of document. Only non-blank text
    /// is emitted, and the accumulator is left idle so a second call
    /// returns `None`.
    pub fn finish(&mut self) -> Option<Footnote> {
        match std::mem::take(&mut self.state) {
            State::Open { text } if !text.trim().is_empty() => {
                let page = self.last_page;
                Some(self.emit(page, text))
            }
            _ => None,
        }
    }

    fn emit(&mut self, page: u32, text: String) -> Footnote {
        Footnote {
            unit_id: self.ids.next(),
            page,
            text: text.trim().to_string(),
        }
    }
}

impl Default for FootnoteAccumulator {
    fn default() -> Self {
        Self::new(FootnoteSignatures::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::fixtures::{block, line, page, span};
    use crate::span::{flatten_page, LayoutBlock};

    const BODY: &str = "Helvetica";

    fn run(pages: Vec<(u32, Vec<LayoutBlock>)>) -> Vec<Footnote> {
        let mut acc = FootnoteAccumulator::default();
        let mut out = Vec::new();
        for (no, blocks) in pages {
            let spans = flatten_page(&page(no, blocks));
            out.extend(acc.feed_page(no, &spans));
        }
        out.extend(acc.finish());
        out
    }

    #[test]
    fn test_marker_opens_and_block_end_closes() {
        let notes = run(vec![(
            4,
            vec![block(vec![
                line(vec![span(BODY, 6.0, "1"), span(BODY, 9.0, " See Smith")]),
                line(vec![span(BODY, 9.0, "v. Jones, 12 F.2d 3")]),
            ])],
        )]);

        assert_eq!(notes.len(), 1);
        // The neighbour span is captured trimmed when the footnote opens
        // and appended again as the first continuation.
        assert_eq!(notes[0].text, "1 See Smith  See Smith v. Jones, 12 F.2d 3");
        assert!(notes[0].text.starts_with("1 See Smith"));
        assert_eq!(notes[0].page, 4);
        assert_eq!(notes[0].unit_id, 0);
    }

    #[test]
    fn test_period_then_uppercase_closes_without_appending() {
        let notes = run(vec![(
            1,
            vec![block(vec![
                line(vec![span(BODY, 6.0, "2"), span(BODY, 9.0, "Id.")]),
                line(vec![
                    span(BODY, 9.0, "at 5."),
                    span(BODY, 10.0, "The"),
                    span(BODY, 10.0, "court"),
                ]),
                line(vec![span(BODY, 10.0, "continued")]),
            ])],
        )]);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "2 Id. Id.");
    }

    #[test]
    fn test_period_at_line_end_does_not_close() {
        let notes = run(vec![(
            1,
            vec![block(vec![
                line(vec![span(BODY, 6.0, "3"), span(BODY, 9.0, "First.")]),
                line(vec![span(BODY, 9.0, "Second")]),
            ])],
        )]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "3 First. First. Second");
    }

    #[test]
    fn test_period_then_lowercase_does_not_close() {
        let notes = run(vec![(
            1,
            vec![block(vec![line(vec![
                span(BODY, 6.0, "4"),
                span(BODY, 9.0, "cf."),
                span(BODY, 9.0, "infra"),
            ])])],
        )]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "4 cf. cf. infra");
    }

    #[test]
    fn test_abbreviation_false_positive_is_kept() {
        let notes = run(vec![(
            1,
            vec![block(vec![line(vec![
                span(BODY, 6.0, "5"),
                span(BODY, 9.0, "U.S."),
                span(BODY, 9.0, "Courts"),
            ])])],
        )]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "5 U.S.");
    }

    #[test]
    fn test_no_marker_no_footnote() {
        let notes = run(vec![(
            1,
            vec![block(vec![line(vec![
                span(BODY, 10.0, "1"),
                span(BODY, 9.0, "Plain text"),
            ])])],
        )]);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_closing_span_does_not_reopen() {
        // "end." carries the marker signature, but it closes the open
        // footnote and is not checked again as a start marker.
        let notes = run(vec![(
            1,
            vec![
                block(vec![line(vec![
                    span(BODY, 6.0, "1"),
                    span(BODY, 9.0, "a"),
                    span(BODY, 6.0, "end."),
                    span(BODY, 9.0, "Next"),
                ])]),
                block(vec![line(vec![span(BODY, 6.0, "2"), span(BODY, 9.0, "b")])]),
            ],
        )]);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].text, "1 a a");
        assert_eq!(notes[1].text, "2 b b");
        assert_eq!(notes[1].unit_id, 1);
    }

    #[test]
    fn test_ids_are_sequential_across_pages() {
        let notes = run(vec![
            (
                1,
                vec![block(vec![line(vec![span(BODY, 6.0, "1"), span(BODY, 9.0, "x")])])],
            ),
            (
                2,
                vec![block(vec![line(vec![span(BODY, 6.0, "2"), span(BODY, 9.0, "y")])])],
            ),
        ]);
        let ids: Vec<u32> = notes.iter().map(|n| n.unit_id).collect();
        let pages: Vec<u32> = notes.iter().map(|n| n.page).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_finish_flushes_once() {
        let mut acc = FootnoteAccumulator::default();
        acc.state = State::Open {
            text: "7 dangling".to_string(),
        };
        acc.last_page = 9;

        let first = acc.finish().expect("open footnote is flushed");
        assert_eq!(first.page, 9);
        assert_eq!(first.text, "7 dangling");
        assert!(acc.finish().is_none());
        assert!(!acc.is_open());
    }

    #[test]
    fn test_footnote_open_at_page_end_closes_on_that_page() {
        let mut acc = FootnoteAccumulator::default();
        let third = flatten_page(&page(
            3,
            vec![
                block(vec![line(vec![span(BODY, 10.0, "The court held")])]),
                block(vec![
                    line(vec![span(BODY, 6.0, "8"), span(BODY, 9.0, "See")]),
                    line(vec![span(BODY, 9.0, "Doe v. Roe")]),
                ]),
            ],
        ));

        let notes = acc.feed_page(3, &third);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].page, 3);
        assert_eq!(notes[0].text, "8 See See Doe v. Roe");
        assert!(!acc.is_open());

        let fourth = flatten_page(&page(
            4,
            vec![block(vec![line(vec![span(BODY, 10.0, "affirmed")])])],
        ));
        assert!(acc.feed_page(4, &fourth).is_empty());
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_blank_span_at_page_end_still_closes() {
        let mut acc = FootnoteAccumulator::default();
        let spans = flatten_page(&page(
            2,
            vec![block(vec![line(vec![
                span(BODY, 6.0, "9"),
                span(BODY, 9.0, "Ibid"),
                span(BODY, 9.0, ""),
            ])])],
        ));

        let notes = acc.feed_page(2, &spans);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "9 Ibid Ibid");
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_finish_skips_blank_text() {
        let mut acc = FootnoteAccumulator::default();
        acc.state = State::Open {
            text: "   ".to_string(),
        };
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let pages = || {
            vec![(
                1,
                vec![block(vec![
                    line(vec![span(BODY, 6.0, "1"), span(BODY, 9.0, "Alpha.")]),
                    line(vec![span(BODY, 9.0, "beta"), span(BODY, 9.0, "Gamma")]),
                ])],
            )]
        };
        assert_eq!(run(pages()), run(pages()));
    }
}
