//! Document store: parses raw bytes into read-only PDF object graphs.

use log::{debug, info, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::geometry::{MediaBox, PageGeometry, Rotation};

/// Where the `%PDF-` marker may appear; some producers prepend junk.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Guards against cyclic `/Parent` chains in damaged page trees.
const MAX_TREE_DEPTH: usize = 64;

/// A loaded source PDF. Never mutated after `load`.
#[derive(Debug)]
pub struct SourceDocument {
    name: String,
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl SourceDocument {
    /// Parse `bytes` into a document called `name`.
    ///
    /// Fails with [`Error::Parse`] for a missing header or a corrupt
    /// cross-reference/trailer, and with [`Error::UnsupportedFeature`] for
    /// encrypted files.
    pub fn load(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(Error::parse(&name, "missing %PDF- header"));
        }

        let inner = Document::load_mem(bytes).map_err(|e| Error::parse(&name, e))?;
        let document = SourceDocument::from_document(name, inner)?;
        info!(
            "loaded '{}': {} page(s), PDF {}",
            document.name,
            document.page_count(),
            document.inner.version
        );
        Ok(document)
    }

    /// Wrap an already parsed document.
    ///
    /// lopdf decrypts files that open with an empty user password while
    /// loading and drops their `/Encrypt` entry, so those arrive here as
    /// plain documents. Only files that still carry `/Encrypt` need a
    /// password we do not have, and are rejected.
    pub(crate) fn from_document(name: String, inner: Document) -> Result<Self> {
        if inner.trailer.get(b"Encrypt").is_ok() {
            return Err(Error::UnsupportedFeature(format!(
                "'{}' is encrypted",
                name
            )));
        }
        if inner.trailer.get(b"Root").is_err() {
            return Err(Error::parse(&name, "trailer has no /Root"));
        }

        let page_ids: Vec<ObjectId> = inner.get_pages().into_values().collect();
        if page_ids.is_empty() {
            warn!("'{}' has no pages", name);
        }
        Ok(SourceDocument {
            name,
            inner,
            page_ids,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// PDF version from the file header.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Media box and inherited rotation of the 0-based page `index`.
    pub fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        let page_id = self.page_object_id(index)?;

        let media_box = self
            .inherited_attribute(page_id, b"MediaBox")
            .and_then(|value| self.resolve(value).as_array().ok())
            .and_then(|items| MediaBox::from_array(items))
            .unwrap_or_else(|| {
                debug!("'{}' page {}: no usable /MediaBox, assuming Letter", self.name, index);
                MediaBox::LETTER
            });

        let rotation = self
            .inherited_attribute(page_id, b"Rotate")
            .and_then(|value| self.resolve(value).as_i64().ok())
            .map(Rotation::from_page_attribute)
            .unwrap_or_default();

        Ok(PageGeometry {
            media_box,
            rotation,
        })
    }

    pub(crate) fn page_object_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(Error::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    pub(crate) fn page_dictionary(&self, index: usize) -> Result<&Dictionary> {
        let page_id = self.page_object_id(index)?;
        self.inner
            .get_dictionary(page_id)
            .map_err(|e| Error::parse(&self.name, format!("page {}: {}", index, e)))
    }

    /// Look `key` up on the page, then on each ancestor `/Pages` node.
    ///
    /// Returns the stored value unresolved, so a reference stays a reference.
    pub(crate) fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.inner.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.inner.get_dictionary(parent).ok()?;
        }
        warn!("'{}': page tree deeper than {} levels", self.name, MAX_TREE_DEPTH);
        None
    }

    /// Follow a single indirect reference; other values are returned as-is.
    fn resolve<'a>(&'a self, value: &'a Object) -> &'a Object {
        match value {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(value),
            _ => value,
        }
    }

    pub(crate) fn object(&self, id: ObjectId) -> Option<&Object> {
        self.inner.get_object(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn two_page_document(rotate_on_tree: Option<i64>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m".to_vec()));
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Rotate" => Object::Integer(270),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200),
                Object::Integer(100),
            ],
        });
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(first), Object::Reference(second)],
            "Count" => Object::Integer(2),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        };
        if let Some(rotate) = rotate_on_tree {
            pages.set("Rotate", Object::Integer(rotate));
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_load_rejects_missing_header() {
        let result = SourceDocument::load("notes.txt", b"hello world");
        assert!(matches!(result, Err(Error::Parse { ref name, .. }) if name == "notes.txt"));
    }

    #[test]
    fn test_load_rejects_truncated_body() {
        let result = SourceDocument::load("broken.pdf", b"%PDF-1.4\n1 0 obj\n<<");
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_encrypted_document_is_unsupported() {
        let mut doc = two_page_document(None);
        doc.trailer.set("Encrypt", dictionary! { "Filter" => "Standard" });
        let result = SourceDocument::from_document("secret.pdf".to_string(), doc);
        assert!(matches!(result, Err(Error::UnsupportedFeature(_))));
    }

    #[test]
    fn test_geometry_inherits_from_page_tree() {
        let doc = SourceDocument::from_document("a.pdf".to_string(), two_page_document(Some(90)))
            .unwrap();
        assert_eq!(doc.page_count(), 2);

        let first = doc.page_geometry(0).unwrap();
        assert_eq!(first.media_box.width(), 595.0);
        assert_eq!(first.rotation, Rotation::CLOCKWISE);

        let second = doc.page_geometry(1).unwrap();
        assert_eq!(second.media_box.width(), 200.0);
        assert_eq!(second.rotation, Rotation::COUNTER_CLOCKWISE);
    }

    #[test]
    fn test_geometry_out_of_range() {
        let doc =
            SourceDocument::from_document("a.pdf".to_string(), two_page_document(None)).unwrap();
        assert!(matches!(
            doc.page_geometry(2),
            Err(Error::PageOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_load_from_saved_bytes() {
        let mut doc = two_page_document(None);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let loaded = SourceDocument::load("saved.pdf", &bytes).unwrap();
        assert_eq!(loaded.name(), "saved.pdf");
        assert_eq!(loaded.page_count(), 2);
        assert_eq!(loaded.page_geometry(0).unwrap().rotation, Rotation::ZERO);
    }
}
