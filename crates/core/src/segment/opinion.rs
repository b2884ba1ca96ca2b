//! Opinion segmentation.
//!
//! An opinion opens on a bold "Opinion" heading, collects body-signature
//! prose across pages and closes on the end-of-document marker, on the next
//! heading, or at end of document. `Page N of M` running footers are removed
//! from the buffer after every append so they never leak into the content.

use std::sync::OnceLock;

use regex::Regex;

use crate::signature::{OpinionRole, OpinionSignatures};
use crate::span::Span;

use super::{Hyperlink, Opinion, UnitCounter};

fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Page\s+\d+\s+of\s+\d+").unwrap())
}

/// Remove `Page N of M` artifacts and trim.
pub fn strip_page_markers(text: &str) -> String {
    page_marker().replace_all(text, "").trim().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Open {
        start_page: u32,
        content: String,
    },
}

/// What a transition closed, if anything.
#[derive(Debug, PartialEq, Eq)]
enum Closed {
    /// Superseded by a new heading; ends on the previous page.
    Superseded { start_page: u32, content: String },
    /// Closed by the end-of-document marker on the current page.
    Terminated { start_page: u32, content: String },
}

fn step(state: State, role: OpinionRole, span: &Span, page: u32) -> (State, Option<Closed>) {
    match (state, role) {
        (State::Open { start_page, content }, OpinionRole::Header) => {
            let reopened = State::Open {
                start_page: page,
                content: String::new(),
            };
            // A heading directly after a heading closes nothing.
            if content.trim().is_empty() {
                (reopened, None)
            } else {
                (reopened, Some(Closed::Superseded { start_page, content }))
            }
        }
        (State::Idle, OpinionRole::Header) => (
            State::Open {
                start_page: page,
                content: String::new(),
            },
            None,
        ),
        (State::Open { start_page, mut content }, OpinionRole::Body { terminates }) => {
            content.push(' ');
            content.push_str(span.text.trim());
            let content = strip_page_markers(&content);
            if terminates {
                (State::Idle, Some(Closed::Terminated { start_page, content }))
            } else {
                (State::Open { start_page, content }, None)
            }
        }
        (State::Open { start_page, content }, OpinionRole::Terminator) => {
            (State::Idle, Some(Closed::Terminated { start_page, content }))
        }
        (state, _) => (state, None),
    }
}

/// Opinion accumulator for one document.
#[derive(Debug, Clone)]
pub struct OpinionAccumulator {
    signatures: OpinionSignatures,
    state: State,
    links: Vec<Hyperlink>,
    ids: UnitCounter,
}

impl OpinionAccumulator {
    pub fn new(signatures: OpinionSignatures) -> Self {
        Self {
            signatures,
            state: State::Idle,
            links: Vec::new(),
            ids: UnitCounter::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open { .. })
    }

    /// Feed one page: its link annotations first, then its spans.
    ///
    /// Links are accumulated whether or not an opinion is open; they belong
    /// to whichever opinion is emitted next.
    pub fn feed_page(&mut self, page: u32, links: Vec<Hyperlink>, spans: &[Span]) -> Vec<Opinion> {
        self.links.extend(links);
        let mut closed = Vec::new();

        for span in spans {
            let role = self.signatures.classify(span);
            let (state, done) = step(std::mem::take(&mut self.state), role, span, page);
            self.state = state;

            match done {
                Some(Closed::Superseded { start_page, content }) => {
                    // Two headings on one page leave end_page below start_page.
                    let end_page = page.saturating_sub(1);
                    closed.push(self.emit(start_page, end_page, content.trim().to_string()));
                }
                Some(Closed::Terminated { start_page, content }) => {
                    let content = content
                        .replace(self.signatures.end_marker.as_str(), "")
                        .trim()
                        .to_string();
                    closed.push(self.emit(start_page, page, content));
                }
                None => {}
            }
        }

        closed
    }

    /// Flush an opinion still open at end of document with
    /// `end_page = total_pages`. Blank content is dropped.
    pub fn finish(&mut self, total_pages: u32) -> Option<Opinion> {
        match std::mem::take(&mut self.state) {
            State::Open { start_page, content } if !content.trim().is_empty() => {
                Some(self.emit(start_page, total_pages, content.trim().to_string()))
            }
            _ => None,
        }
    }

    fn emit(&mut self, start_page: u32, end_page: u32, content: String) -> Opinion {
        Opinion {
            unit_id: self.ids.next(),
            start_page,
            end_page,
            content,
            links: std::mem::take(&mut self.links),
        }
    }
}

impl Default for OpinionAccumulator {
    fn default() -> Self {
        Self::new(OpinionSignatures::default())
    }
}
