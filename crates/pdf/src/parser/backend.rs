use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::types::{LinkAnnotation, Rect};
use crate::PdfError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone)]
pub struct BackendFontInfo {
    /// The resource key the content stream refers to (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name with any subset tag removed.
    pub base_font: Option<String>,
    pub encoding: Option<String>,
}

/// A lopdf-independent PDF value, so layout code can be tested without
/// building real documents.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Numeric operand as `f32`, integers included.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`]. Stream payloads are
/// dropped; only their dictionary survives.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    use lopdf::Object;

    let dict_entries = |dict: &lopdf::Dictionary| {
        dict.iter()
            .map(|(k, v)| (k.clone(), convert_object(v)))
            .collect()
    };

    match obj {
        Object::Null => PdfValue::Null,
        Object::Boolean(b) => PdfValue::Bool(*b),
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(f) => PdfValue::Real(*f),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(s, _) => PdfValue::Str(s.clone()),
        Object::Array(items) => PdfValue::Array(items.iter().map(convert_object).collect()),
        Object::Dictionary(dict) => PdfValue::Dict(dict_entries(dict)),
        Object::Stream(stream) => PdfValue::Dict(dict_entries(&stream.dict)),
        Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Decode PDF string bytes: UTF-16BE when a BOM is present, then UTF-8,
/// then Latin-1 as the last resort.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Strip a six-letter subset tag (`ABCDEF+Helvetica` -> `Helvetica`).
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Abstraction over the PDF parsing backend so layout and link code can be
/// exercised against mock documents.
pub trait PdfBackend {
    /// Mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError>;

    /// Raw (possibly compressed) content stream bytes of a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;

    /// Decode the bytes of a text-showing operator using whatever encoding
    /// hints the page's font carries.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;

    /// URI link annotations of a page. Other annotation kinds are skipped.
    fn page_links(&self, page: PageId) -> Result<Vec<LinkAnnotation>, PdfError>;
}

/// [`PdfBackend`] backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Follow one level of indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Object> {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn font_encoding_name(&self, page: PageId, font_name: &[u8]) -> Option<String> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        let font_dict = fonts.get(font_name)?;
        match font_dict.get(b"Encoding").ok()? {
            lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }

    fn rect_from(&self, obj: &lopdf::Object) -> Option<Rect> {
        let items = self.resolve(obj)?.as_array().ok()?;
        let nums: Vec<f32> = items
            .iter()
            .filter_map(|item| match self.resolve(item)? {
                lopdf::Object::Integer(i) => Some(*i as f32),
                lopdf::Object::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        match nums.as_slice() {
            [x1, y1, x2, y2] => Some(Rect::new(*x1, *y1, *x2, *y2)),
            _ => None,
        }
    }

    /// `/A << /S /URI /URI (...) >>` of a link annotation.
    fn uri_from(&self, annot: &lopdf::Dictionary) -> Option<String> {
        let action = self.resolve(annot.get(b"A").ok()?)?.as_dict().ok()?;
        if action.get(b"S").ok()?.as_name().ok()? != b"URI" {
            return None;
        }
        match self.resolve(action.get(b"URI").ok()?)? {
            lopdf::Object::String(bytes, _) => Some(decode_text_simple(bytes)),
            _ => None,
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, PdfError> {
        let fonts_map = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page fonts: {}", e)))?;

        let name_of = |obj: &lopdf::Object| match obj {
            lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
            _ => None,
        };

        Ok(fonts_map
            .iter()
            .map(|(key, dict)| BackendFontInfo {
                name: key.clone(),
                base_font: dict
                    .get(b"BaseFont")
                    .ok()
                    .and_then(name_of)
                    .map(|n| strip_subset_prefix(&n).to_string()),
                encoding: dict.get(b"Encoding").ok().and_then(name_of),
            })
            .collect())
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        let identity = self
            .font_encoding_name(page, font_name)
            .is_some_and(|enc| enc.contains("Identity"));

        // Identity-H/V fonts carry 2-byte codes that usually map to Unicode.
        if identity && bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&units);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }

    fn page_links(&self, page: PageId) -> Result<Vec<LinkAnnotation>, PdfError> {
        let page_dict = self
            .doc
            .get_object(page)
            .and_then(|obj| obj.as_dict())
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))?;

        let Some(annots) = page_dict
            .get(b"Annots")
            .ok()
            .and_then(|obj| self.resolve(obj))
            .and_then(|obj| obj.as_array().ok())
        else {
            return Ok(Vec::new());
        };

        let links = annots
            .iter()
            .filter_map(|entry| self.resolve(entry)?.as_dict().ok())
            .filter(|annot| {
                annot
                    .get(b"Subtype")
                    .and_then(|s| s.as_name())
                    .is_ok_and(|s| s == b"Link")
            })
            .filter_map(|annot| {
                Some(LinkAnnotation {
                    rect: self.rect_from(annot.get(b"Rect").ok()?)?,
                    uri: self.uri_from(annot)?,
                })
            })
            .collect();

        Ok(links)
    }
}
