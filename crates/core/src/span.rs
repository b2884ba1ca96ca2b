//! Span stream adapter.
//!
//! A document reader hands us each page as nested blocks, lines and styled
//! spans. Everything downstream wants a flat, ordered sequence instead, with
//! just enough positional information left on every record to answer "is
//! there a next span on this line?" and "is this the last line of its
//! block?".

use serde::{Deserialize, Serialize};

/// A styled run of text as reported by the document reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpan {
    pub font: String,
    pub size: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub spans: Vec<LayoutSpan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub lines: Vec<LayoutLine>,
}

/// One page of reader output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based page number.
    pub page: u32,
    pub blocks: Vec<LayoutBlock>,
}

/// A flattened span record.
///
/// `block`, `line` and `index_in_line` are 0-based positions within the
/// page. The two `last_*` flags let consumers detect line and block
/// boundaries without re-walking the nested layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub page: u32,
    pub font: String,
    pub size: f32,
    pub text: String,
    pub block: usize,
    pub line: usize,
    pub index_in_line: usize,
    pub last_in_line: bool,
    pub last_line_of_block: bool,
}

impl Span {
    /// Returns `true` if this span closes its line and that line is the
    /// last one of its block.
    pub fn ends_block(&self) -> bool {
        self.last_in_line && self.last_line_of_block
    }
}

/// Flatten a page layout into spans ordered by (block, line, index).
///
/// Lines without spans are skipped, but the last-line flag is still computed
/// against the block's full line list so an empty trailing line does not
/// hide the block boundary from the spans before it.
pub fn flatten_page(layout: &PageLayout) -> Vec<Span> {
    let mut spans = Vec::new();

    for (block_idx, block) in layout.blocks.iter().enumerate() {
        let last_non_empty = block.lines.iter().rposition(|l| !l.spans.is_empty());

        for (line_idx, line) in block.lines.iter().enumerate() {
            let line_len = line.spans.len();
            for (idx, span) in line.spans.iter().enumerate() {
                spans.push(Span {
                    page: layout.page,
                    font: span.font.clone(),
                    size: span.size,
                    text: span.text.clone(),
                    block: block_idx,
                    line: line_idx,
                    index_in_line: idx,
                    last_in_line: idx + 1 == line_len,
                    last_line_of_block: Some(line_idx) == last_non_empty,
                });
            }
        }
    }

    spans
}

/// The span following `spans[i]` on the same line, if any.
pub fn next_in_line(spans: &[Span], i: usize) -> Option<&Span> {
    let current = spans.get(i)?;
    if current.last_in_line {
        return None;
    }
    spans.get(i + 1)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn span(font: &str, size: f32, text: &str) -> LayoutSpan {
        LayoutSpan {
            font: font.to_string(),
            size,
            text: text.to_string(),
        }
    }

    pub fn line(spans: Vec<LayoutSpan>) -> LayoutLine {
        LayoutLine { spans }
    }

    pub fn block(lines: Vec<LayoutLine>) -> LayoutBlock {
        LayoutBlock { lines }
    }

    pub fn page(page: u32, blocks: Vec<LayoutBlock>) -> PageLayout {
        PageLayout { page, blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_flatten_preserves_order_and_positions() {
        let layout = page(
            3,
            vec![
                block(vec![
                    line(vec![span("Helvetica", 10.0, "a"), span("Helvetica", 10.0, "b")]),
                    line(vec![span("Helvetica", 10.0, "c")]),
                ]),
                block(vec![line(vec![span("Helvetica-Bold", 14.0, "d")])]),
            ],
        );

        let spans = flatten_page(&layout);
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);

        assert!(spans.iter().all(|s| s.page == 3));
        assert_eq!((spans[1].block, spans[1].line, spans[1].index_in_line), (0, 0, 1));
        assert!(!spans[0].last_in_line);
        assert!(spans[1].last_in_line);
        assert!(!spans[1].last_line_of_block);
        assert!(spans[2].ends_block());
        assert!(spans[3].ends_block());
        assert_eq!(spans[3].block, 1);
    }

    #[test]
    fn test_flatten_empty_blocks_contribute_nothing() {
        let layout = page(1, vec![block(vec![]), block(vec![line(vec![])])]);
        assert!(flatten_page(&layout).is_empty());
    }

    #[test]
    fn test_trailing_empty_line_keeps_block_boundary() {
        let layout = page(
            1,
            vec![block(vec![
                line(vec![span("Helvetica", 9.0, "x")]),
                line(vec![]),
            ])],
        );
        let spans = flatten_page(&layout);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].ends_block());
    }

    #[test]
    fn test_next_in_line_stops_at_line_end() {
        let layout = page(
            1,
            vec![block(vec![
                line(vec![span("F", 6.0, "1"), span("F", 9.0, "Text")]),
                line(vec![span("F", 9.0, "More")]),
            ])],
        );
        let spans = flatten_page(&layout);
        assert_eq!(next_in_line(&spans, 0).map(|s| s.text.as_str()), Some("Text"));
        assert!(next_in_line(&spans, 1).is_none());
        assert!(next_in_line(&spans, 2).is_none());
        assert!(next_in_line(&spans, 9).is_none());
    }
}
