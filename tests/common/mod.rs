//! In-memory PDF fixtures shared by the integration tests.

#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// A page of a fixture document: its text label and optional own `/Rotate`.
pub struct FixturePage<'a> {
    pub label: &'a str,
    pub rotate: Option<i64>,
}

pub fn page(label: &str) -> FixturePage<'_> {
    FixturePage {
        label,
        rotate: None,
    }
}

pub fn rotated_page(label: &str, rotate: i64) -> FixturePage<'_> {
    FixturePage {
        label,
        rotate: Some(rotate),
    }
}

/// A PDF whose pages each draw their label with a font shared through
/// `/Resources` inherited from the `/Pages` node, as many producers do.
pub fn fixture_pdf(labels: &[&str]) -> Vec<u8> {
    let pages: Vec<FixturePage> = labels.iter().map(|label| page(label)).collect();
    fixture_pdf_with(&pages, None)
}

pub fn fixture_pdf_with(pages: &[FixturePage], tree_rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", page.label);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(rotate) = page.rotate {
            page_dict.set("Rotate", Object::Integer(rotate));
        }
        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ],
    };
    if let Some(rotate) = tree_rotate {
        pages_dict.set("Rotate", Object::Integer(rotate));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Labels drawn by each page of `bytes`, in page order.
pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| label_of(&doc, page_id))
        .collect()
}

/// `/Rotate` written on each page dictionary of `bytes`.
pub fn page_rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            doc.get_dictionary(page_id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Number of objects in `bytes` whose `/Type` is `type_name`.
pub fn count_objects_of_type(bytes: &[u8], type_name: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    doc.objects
        .values()
        .filter(|object| match object {
            Object::Dictionary(dict) => matches!(
                dict.get(b"Type"),
                Ok(Object::Name(name)) if name.as_slice() == type_name
            ),
            _ => false,
        })
        .count()
}

fn label_of(doc: &Document, page_id: ObjectId) -> String {
    let content = doc.get_page_content(page_id).unwrap();
    let text = String::from_utf8_lossy(&content);
    match (text.find('('), text.find(')')) {
        (Some(start), Some(end)) if start < end => text[start + 1..end].to_string(),
        _ => String::new(),
    }
}
