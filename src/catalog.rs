//! Page catalog: an append-only arena of every page the session has seen.
//!
//! Pages are addressed by [`PageUid`], never by on-screen position. A uid is
//! issued once and stays resolvable for the lifetime of the session, even
//! after the page has been dropped from every plan or its document unloaded.

use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::geometry::{MediaBox, Rotation};
use crate::store::SourceDocument;

/// Session-unique, monotonically assigned page handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageUid(u64);

impl PageUid {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a document loaded into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub(crate) u32);

impl DocId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// One page of one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub uid: PageUid,
    pub doc_id: DocId,
    /// 0-based position of the page inside its document.
    pub source_index: usize,
    pub media_box: MediaBox,
    pub inherited_rotation: Rotation,
}

#[derive(Debug, Default)]
pub struct PageCatalog {
    entries: Vec<PageEntry>,
}

impl PageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog every page of `documents`, in argument order.
    ///
    /// Each call issues fresh uids; cataloging the same document twice yields
    /// two independent sets of entries. Nothing is appended if any page's
    /// geometry cannot be read.
    pub fn build(&mut self, documents: &[(DocId, &SourceDocument)]) -> Result<Vec<PageEntry>> {
        let mut next = self.entries.len() as u64;
        let mut built = Vec::new();

        for &(doc_id, document) in documents {
            for source_index in 0..document.page_count() {
                let geometry = document.page_geometry(source_index)?;
                built.push(PageEntry {
                    uid: PageUid(next),
                    doc_id,
                    source_index,
                    media_box: geometry.media_box,
                    inherited_rotation: geometry.rotation,
                });
                next += 1;
            }
            debug!(
                "cataloged {} page(s) of '{}' as {}",
                document.page_count(),
                document.name(),
                doc_id
            );
        }

        self.entries.extend(built.iter().cloned());
        Ok(built)
    }

    pub fn lookup(&self, uid: PageUid) -> Result<&PageEntry> {
        usize::try_from(uid.0)
            .ok()
            .and_then(|index| self.entries.get(index))
            .ok_or(Error::NotFound(uid))
    }

    /// Number of uids issued so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry issued for `doc_id`, oldest first.
    pub fn entries_for(&self, doc_id: DocId) -> impl Iterator<Item = &PageEntry> {
        self.entries.iter().filter(move |entry| entry.doc_id == doc_id)
    }
}

#[cfg(test)]
impl PageEntry {
    /// Entry with Letter geometry, for tests that never touch a document.
    pub(crate) fn synthetic(uid: u64, doc_id: u32, source_index: usize) -> Self {
        PageEntry {
            uid: PageUid(uid),
            doc_id: DocId(doc_id),
            source_index,
            media_box: MediaBox::LETTER,
            inherited_rotation: Rotation::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};

    fn document(name: &str, pages: usize) -> SourceDocument {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        SourceDocument::from_document(name.to_string(), doc).unwrap()
    }

    #[test]
    fn test_build_assigns_uids_across_documents() {
        let a = document("a.pdf", 2);
        let b = document("b.pdf", 3);
        let mut catalog = PageCatalog::new();

        let entries = catalog.build(&[(DocId(0), &a), (DocId(1), &b)]).unwrap();
        let uids: Vec<u64> = entries.iter().map(|e| e.uid.get()).collect();
        assert_eq!(uids, vec![0, 1, 2, 3, 4]);
        assert_eq!(entries[2].doc_id, DocId(1));
        assert_eq!(entries[2].source_index, 0);
        assert_eq!(entries[4].source_index, 2);
        assert!(entries.iter().all(|e| e.inherited_rotation == Rotation::ZERO));
    }

    #[test]
    fn test_uids_are_never_reused() {
        let a = document("a.pdf", 2);
        let mut catalog = PageCatalog::new();

        let first = catalog.build(&[(DocId(0), &a)]).unwrap();
        let second = catalog.build(&[(DocId(0), &a)]).unwrap();
        assert_eq!(second[0].uid.get(), 2);
        assert_ne!(first[0].uid, second[0].uid);
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.entries_for(DocId(0)).count(), 4);
    }

    #[test]
    fn test_lookup() {
        let a = document("a.pdf", 1);
        let mut catalog = PageCatalog::new();
        let entries = catalog.build(&[(DocId(7), &a)]).unwrap();

        assert_eq!(catalog.lookup(entries[0].uid).unwrap().doc_id, DocId(7));
        assert!(matches!(catalog.lookup(PageUid(99)), Err(Error::NotFound(PageUid(99)))));
    }
}
