//! PDF fixtures for the command tests, built with lopdf.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

/// `(font key, size, x, y, text)`. `F1` is Helvetica, `F2` a subset
/// Helvetica-Bold.
pub type Run = (&'static str, i64, i64, i64, &'static str);

/// `(uri, [x0, y0, x1, y1])`.
pub type Link = (&'static str, [i64; 4]);

pub fn build_pdf(pages: &[(Vec<Run>, Vec<Link>)]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "ABCDEF+Helvetica-Bold",
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular, "F2" => bold },
    });

    let mut kids = Vec::new();
    for (runs, links) in pages {
        let mut operations = Vec::new();
        for &(font, size, x, y, text) in runs {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.into(), size.into()]),
                Operation::new("Td", vec![x.into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let encoded = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        let annots: Vec<Object> = links
            .iter()
            .map(|&(uri, rect)| {
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Link",
                    "Rect" => rect.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
                    "A" => dictionary! { "S" => "URI", "URI" => Object::string_literal(uri) },
                }))
            })
            .collect();
        if !annots.is_empty() {
            page.set("Annots", annots);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub const CITATION_URI: &str = "https://advance.lexis.com/smith-v-jones";

/// A two-page case export.
///
/// Page 1 carries the header labels, the "Opinion" heading, a body line
/// whose citation is linked, and footnote 1. Page 2 ends the opinion and
/// carries footnote 2.
pub fn case_pdf() -> Vec<u8> {
    build_pdf(&[
        (
            vec![
                ("F1", 10, 72, 750, "Judges: SMITH"),
                ("F1", 10, 72, 738, "Opinion by: SMITH"),
                ("F2", 14, 72, 700, "Opinion"),
                ("F1", 10, 72, 680, "See Smith v. Jones held the rule."),
                ("F1", 6, 72, 103, "1"),
                ("F1", 9, 76, 100, "See id. at 5"),
            ],
            // Covers "Smith v. Jones" only: 10pt chars are 5pt wide.
            vec![(CITATION_URI, [90, 675, 165, 695])],
        ),
        (
            vec![
                ("F1", 10, 72, 700, "The judgment is affirmed."),
                ("F1", 10, 72, 686, "End of Document"),
                ("F1", 6, 72, 103, "2"),
                ("F1", 9, 76, 100, "Cf. Doe v. Roe"),
            ],
            vec![],
        ),
    ])
}

/// Case "A" covers page 1, case "B" runs from page 2.
pub const CASE_RANGES: &str = r#"[
    {"document": "case.pdf", "unit_no": "A", "start_page": 1, "end_page": 1},
    {"document": "case.pdf", "unit_no": "B", "start_page": 2}
]"#;

pub fn write_case_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, case_pdf()).unwrap();
    path
}
