//! Text extraction, line grouping and block assembly.
//!
//! A pure pipeline from content-stream operators to positioned text:
//!
//! ```text
//! content ops  ->  TextSpan[]  ->  TextLine[]  ->  TextBlock[]
//!   (per page)      extract         group_spans      group_lines
//! ```
//!
//! Font names and sizes are carried through untouched: downstream
//! classification compares them exactly, so nothing here rounds or buckets
//! a size that ends up on a span.

use std::cmp::Ordering;

use super::backend::{get_number_from_value, BackendFontInfo, PageId, PdfBackend, PdfValue};
use crate::types::Rect;
use crate::PdfError;

/// A run of text in one font at a specific position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    /// Baseline, including text rise.
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub font_name: String,
    /// Start x of each char of `text`, kept through merges so a rectangle
    /// can clip part of a run.
    glyph_x: Vec<f32>,
}

impl TextSpan {
    /// A span whose chars are spread evenly across `width`.
    pub fn new(
        text: impl Into<String>,
        x: f32,
        y: f32,
        width: f32,
        font_size: f32,
        font_name: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let count = text.chars().count();
        let advance = if count == 0 { 0.0 } else { width / count as f32 };
        Self {
            glyph_x: (0..count).map(|i| x + i as f32 * advance).collect(),
            text,
            x,
            y,
            width,
            font_size,
            font_name: font_name.into(),
        }
    }

    fn end_x(&self) -> f32 {
        self.x + self.width
    }

    /// The chars whose horizontal centre lies within `x0..=x1`.
    fn chars_between(&self, x0: f32, x1: f32) -> String {
        let end = self.end_x();
        self.text
            .chars()
            .zip(&self.glyph_x)
            .enumerate()
            .filter(|&(i, (_, &start))| {
                let next = self.glyph_x.get(i + 1).copied().unwrap_or(end).max(start);
                let centre = (start + next) / 2.0;
                centre >= x0 && centre <= x1
            })
            .map(|(_, (ch, _))| ch)
            .collect()
    }
}

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    pub y: f32,
    /// Size covering the most characters of the line.
    pub font_size: f32,
}

impl TextLine {
    /// Concatenate all span texts with a single space separator.
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Consecutive lines set close together in the same size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

/// Baselines closer than this always share a line.
const Y_TOLERANCE: f32 = 1.0;

/// Fraction of the larger font size within which two baselines still share
/// a line. Superscript footnote markers sit well above the body baseline.
const LINE_OVERLAP_RATIO: f32 = 0.5;

/// Character width as a fraction of font size when no glyph metrics are
/// available.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Minimum gap (points) between same-font spans before a space is inserted.
const MIN_WORD_GAP: f32 = 1.5;

/// A vertical gap larger than this multiple of the line's font size starts
/// a new block.
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// The identity 2x3 text matrix: [a, b, c, d, tx, ty].
const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Text state tracked while walking a page's content stream.
#[derive(Debug, Clone)]
struct TextState {
    /// Current font resource key (`/F1`), not the base font name.
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    text_matrix: [f32; 6],
    /// Set by BT and updated by Td/TD/T*/Tm.
    line_matrix: [f32; 6],
    /// Horizontal scaling (percent / 100).
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn x(&self) -> f32 {
        self.text_matrix[4]
    }

    fn y(&self) -> f32 {
        self.text_matrix[5] + self.text_rise
    }

    /// `font_size * sqrt(b^2 + d^2)`. With an unscaled matrix this is the
    /// `Tf` operand itself, bit for bit.
    fn effective_font_size(&self) -> f32 {
        let [_, b, _, d, _, _] = self.text_matrix;
        if b == 0.0 && d.abs() == 1.0 {
            return self.font_size.abs();
        }
        (self.font_size * (b * b + d * d).sqrt()).abs()
    }

    fn advance_x(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    /// Td: translate the line matrix and restart the text matrix from it.
    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = self.line_matrix;
        self.line_matrix[4] = m[0] * tx + m[2] * ty + m[4];
        self.line_matrix[5] = m[1] * tx + m[3] * ty + m[5];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn char_width(&self) -> f32 {
        self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
    }

    fn estimate_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width()
    }

    /// Move past `text` as if it had been painted, recording where each
    /// char starts.
    fn advance_after_show(&mut self, text: &str, glyph_x: &mut Vec<f32>) {
        for ch in text.chars() {
            glyph_x.push(self.x());
            let spacing = if ch == ' ' { self.word_spacing } else { 0.0 };
            self.advance_x(self.char_width() + self.char_spacing + spacing);
        }
    }
}

fn decode_string(
    val: &PdfValue,
    backend: &dyn PdfBackend,
    page_id: PageId,
    font_key: &[u8],
) -> String {
    match val {
        PdfValue::Str(bytes) => backend.decode_text(page_id, font_key, bytes),
        _ => String::new(),
    }
}

fn first_number(operands: &[PdfValue]) -> Option<f32> {
    operands.first().and_then(get_number_from_value)
}

fn two_numbers(operands: &[PdfValue]) -> Option<(f32, f32)> {
    match operands {
        [a, b, ..] => Some((
            get_number_from_value(a).unwrap_or(0.0),
            get_number_from_value(b).unwrap_or(0.0),
        )),
        _ => None,
    }
}

/// Walk a page's content stream and collect its text spans in paint order.
///
/// | Operator | Action |
/// |----------|--------|
/// | `BT`     | Reset text and line matrices |
/// | `Tf`     | Set font and size |
/// | `Tm`     | Set text matrix |
/// | `Td` `TD` `T*` | Move to a new line |
/// | `TL` `Tc` `Tw` `Tz` `Ts` | Leading, spacing, scaling, rise |
/// | `Tj` `TJ` `'` `"` | Show text |
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page_id: PageId,
) -> Result<Vec<TextSpan>, PdfError> {
    let raw_content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&raw_content)?;
    let fonts = backend.page_fonts(page_id).unwrap_or_default();

    let mut state = TextState::default();
    let mut spans: Vec<TextSpan> = Vec::new();

    for op in &ops {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "BT" => {
                state.text_matrix = IDENTITY_MATRIX;
                state.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => handle_tf(operands, &fonts, &mut state),
            "Tm" => handle_tm(operands, &mut state),
            "Td" => {
                if let Some((tx, ty)) = two_numbers(operands) {
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = two_numbers(operands) {
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => state.next_line(),
            "TL" => {
                if let Some(v) = first_number(operands) {
                    state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = first_number(operands) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = first_number(operands) {
                    state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = first_number(operands) {
                    state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = first_number(operands) {
                    state.text_rise = v;
                }
            }
            "Tj" => {
                if let Some(first) = operands.first() {
                    show_string(first, backend, page_id, &mut state, &mut spans);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = operands.first() {
                    show_tj_array(items, backend, page_id, &mut state, &mut spans);
                }
            }
            "'" => {
                state.next_line();
                if let Some(first) = operands.first() {
                    show_string(first, backend, page_id, &mut state, &mut spans);
                }
            }
            "\"" => {
                if let [aw, ac, text, ..] = operands {
                    if let Some(aw) = get_number_from_value(aw) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(ac) {
                        state.char_spacing = ac;
                    }
                    state.next_line();
                    show_string(text, backend, page_id, &mut state, &mut spans);
                }
            }
            _ => {}
        }
    }

    Ok(spans)
}

fn handle_tf(operands: &[PdfValue], fonts: &[BackendFontInfo], state: &mut TextState) {
    let [key, size, ..] = operands else {
        return;
    };
    let key = match key {
        PdfValue::Name(n) | PdfValue::Str(n) => n.clone(),
        _ => return,
    };

    state.font_name = fonts
        .iter()
        .find(|info| info.name == key)
        .and_then(|info| info.base_font.clone())
        .unwrap_or_else(|| String::from_utf8_lossy(&key).into_owned());
    state.font_size = get_number_from_value(size).unwrap_or(0.0);
    state.font_key = key;
}

fn handle_tm(operands: &[PdfValue], state: &mut TextState) {
    let vals: Vec<f32> = operands
        .iter()
        .take(6)
        .filter_map(get_number_from_value)
        .collect();
    if let [a, b, c, d, e, f] = vals[..] {
        state.text_matrix = [a, b, c, d, e, f];
        state.line_matrix = state.text_matrix;
    }
}

fn push_span(
    text: String,
    glyph_x: Vec<f32>,
    (x, y): (f32, f32),
    state: &TextState,
    spans: &mut Vec<TextSpan>,
) {
    spans.push(TextSpan {
        width: state.estimate_width(&text),
        text,
        x,
        y,
        font_size: state.effective_font_size(),
        font_name: state.font_name.clone(),
        glyph_x,
    });
}

/// Shared by `Tj`, `'` and `"`.
fn show_string(
    operand: &PdfValue,
    backend: &dyn PdfBackend,
    page_id: PageId,
    state: &mut TextState,
    spans: &mut Vec<TextSpan>,
) {
    let text = decode_string(operand, backend, page_id, &state.font_key);
    if text.is_empty() {
        return;
    }
    let origin = (state.x(), state.y());
    let mut glyph_x = Vec::with_capacity(text.len());
    state.advance_after_show(&text, &mut glyph_x);
    push_span(text, glyph_x, origin, state, spans);
}

/// `TJ` arrays mix strings with kerning adjustments in thousandths of a
/// text-space unit. A large enough negative adjustment reads as a word gap.
fn show_tj_array(
    items: &[PdfValue],
    backend: &dyn PdfBackend,
    page_id: PageId,
    state: &mut TextState,
    spans: &mut Vec<TextSpan>,
) {
    let mut buf = String::new();
    let mut glyph_x = Vec::new();
    let (mut x, y) = (state.x(), state.y());

    for item in items {
        if let PdfValue::Str(_) = item {
            let fragment = decode_string(item, backend, page_id, &state.font_key);
            if buf.is_empty() {
                x = state.x();
            }
            buf.push_str(&fragment);
            state.advance_after_show(&fragment, &mut glyph_x);
        } else if let Some(adj) = get_number_from_value(item) {
            let dx = -adj / 1000.0 * state.font_size * state.horiz_scale;
            if dx > state.char_width() * 0.3 && !buf.is_empty() {
                buf.push(' ');
                glyph_x.push(state.x());
            }
            state.advance_x(dx);
        }
    }

    let text = buf.trim_end();
    if !text.is_empty() {
        glyph_x.truncate(text.chars().count());
        push_span(text.to_string(), glyph_x, (x, y), state, spans);
    }
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn same_line(line_y: f32, line_size: f32, span: &TextSpan) -> bool {
    let tolerance = (line_size.max(span.font_size) * LINE_OVERLAP_RATIO).max(Y_TOLERANCE);
    (span.y - line_y).abs() <= tolerance
}

/// Group spans into lines, top of the page first.
///
/// Spans are sorted by descending baseline, so a raised superscript opens
/// its line and the body spans that follow are measured against it.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| cmp_f32(b.y, a.y).then(cmp_f32(a.x, b.x)));

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let (mut line_y, mut line_size) = (0.0, 0.0);

    for span in spans {
        if !current.is_empty() && !same_line(line_y, line_size, &span) {
            lines.push(assemble_line(std::mem::take(&mut current)));
        }
        if current.is_empty() {
            line_y = span.y;
            line_size = span.font_size;
        } else {
            line_size = line_size.max(span.font_size);
        }
        current.push(span);
    }

    if !current.is_empty() {
        lines.push(assemble_line(current));
    }

    lines
}

/// Order a line's spans left to right and merge neighbours painted in the
/// same font and size. Sizes must match exactly for a merge.
fn assemble_line(mut spans: Vec<TextSpan>) -> TextLine {
    spans.sort_by(|a, b| cmp_f32(a.x, b.x));

    let mut merged: Vec<TextSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(prev) = merged.last_mut() {
            let gap = span.x - (prev.x + prev.width);
            let same_font = prev.font_name == span.font_name && prev.font_size == span.font_size;

            if same_font && gap > -prev.font_size && gap < prev.font_size * 2.0 {
                if gap >= MIN_WORD_GAP && !prev.text.ends_with(' ') && !span.text.starts_with(' ') {
                    prev.text.push(' ');
                    prev.glyph_x.push(prev.end_x());
                }
                prev.text.push_str(&span.text);
                prev.glyph_x.extend_from_slice(&span.glyph_x);
                prev.width = span.end_x() - prev.x;
                continue;
            }
        }
        merged.push(span);
    }

    let y = merged
        .iter()
        .max_by_key(|s| s.text.chars().count())
        .map(|s| s.y)
        .unwrap_or(0.0);

    TextLine {
        font_size: dominant_font_size(&merged),
        y,
        spans: merged,
    }
}

/// The font size covering the most characters; ties keep the first size.
fn dominant_font_size(spans: &[TextSpan]) -> f32 {
    let mut counts: Vec<(f32, usize)> = Vec::new();
    for span in spans {
        let chars = span.text.chars().count();
        match counts.iter_mut().find(|(size, _)| *size == span.font_size) {
            Some((_, count)) => *count += chars,
            None => counts.push((span.font_size, chars)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(f32, usize)>, (size, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((size, count)),
        })
        .map(|(size, _)| size)
        .unwrap_or(0.0)
}

/// Group consecutive lines into blocks.
///
/// A new block starts when the vertical gap to the previous line exceeds
/// [`BLOCK_GAP_FACTOR`] times its font size, or when the dominant font size
/// changes (body text to footnotes and back).
pub fn group_lines_into_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();

    for line in lines {
        let breaks = current.last().is_some_and(|prev| {
            let gap = (prev.y - line.y).abs();
            gap > prev.font_size * BLOCK_GAP_FACTOR || prev.font_size != line.font_size
        });
        if breaks {
            blocks.push(TextBlock {
                lines: std::mem::take(&mut current),
            });
        }
        current.push(line);
    }

    if !current.is_empty() {
        blocks.push(TextBlock { lines: current });
    }

    blocks
}

/// Spans to blocks for one page.
pub fn analyze_page(spans: Vec<TextSpan>) -> Vec<TextBlock> {
    group_lines_into_blocks(group_spans_into_lines(spans))
}

/// Plain page text: one line per text line, blocks in order, each line
/// terminated by `\n`.
pub fn page_text(blocks: &[TextBlock]) -> String {
    let mut text = String::new();
    for line in blocks.iter().flat_map(|b| &b.lines) {
        text.push_str(&line.text());
        text.push('\n');
    }
    text
}

/// Text of the chars whose horizontal centre and baseline fall inside
/// `rect`, in reading order. A rectangle over part of a merged run keeps
/// only the chars it covers.
pub fn text_in_rect(blocks: &[TextBlock], rect: &Rect) -> String {
    blocks
        .iter()
        .flat_map(|b| &b.lines)
        .flat_map(|l| &l.spans)
        .filter(|s| rect.y0 <= s.y && s.y <= rect.y1)
        .map(|s| s.chars_between(rect.x0, rect.x1))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
