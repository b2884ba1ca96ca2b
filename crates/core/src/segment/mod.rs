//! Page-spanning segment accumulators.
//!
//! Both accumulators consume the flattened span stream in document order and
//! emit closed segments. Each one is a two-state machine (`Idle` / `Open`)
//! whose open state owns the text collected so far; transitions take the
//! state by value and hand back the successor plus whatever segment the
//! transition closed.

use serde::{Deserialize, Serialize};

pub mod footnote;
pub mod opinion;

pub use footnote::FootnoteAccumulator;
pub use opinion::OpinionAccumulator;

/// A URI annotation found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// Text found inside the link rectangle, trimmed.
    pub raw_text: String,
    pub link: String,
}

/// A closed footnote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footnote {
    pub unit_id: u32,
    /// Page on which the footnote closed.
    pub page: u32,
    pub text: String,
}

/// A closed opinion section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub unit_id: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub content: String,
    pub links: Vec<Hyperlink>,
}

/// Sequential identifier source, scoped to one accumulator.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnitCounter(u32);

impl UnitCounter {
    pub(crate) fn next(&mut self) -> u32 {
        let id = self.0;
        self.0 += 1;
        id
    }
}
