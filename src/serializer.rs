//! Serializer: writes the kept pages of a plan into a new standalone PDF.
//!
//! Each page dictionary is rebuilt in a fresh object graph. Everything it
//! references (content streams, resources, fonts, images) is copied and
//! renumbered into the output id space. Objects shared by several pages of
//! the same source document are copied once per call; identical resources
//! coming from different source documents are not merged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use log::{debug, info, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::catalog::{DocId, PageCatalog};
use crate::error::{Error, Result};
use crate::plan::AssemblyPlan;
use crate::store::SourceDocument;

/// Page attributes a page may inherit from its `/Pages` ancestors and that
/// must be made explicit once the page leaves its original tree.
const INHERITED_KEYS: [&[u8]; 3] = [b"MediaBox", b"CropBox", b"Resources"];

/// Page keys that are not carried into the output.
const DROPPED_PAGE_KEYS: [&[u8]; 5] = [b"Parent", b"Rotate", b"Annots", b"B", b"StructParents"];

/// Output shaping for [`assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleOptions {
    pub pdf_version: String,
    pub output_name: String,
    /// Maximum kids per `/Pages` node.
    pub page_tree_fanout: usize,
    /// `/Producer` written to `/Info`; `None` writes no `/Info`.
    pub producer: Option<String>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            pdf_version: "1.5".to_string(),
            output_name: "merged.pdf".to_string(),
            page_tree_fanout: 8,
            producer: Some("pagewright".to_string()),
        }
    }
}

impl AssembleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn with_pdf_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    pub fn with_page_tree_fanout(mut self, fanout: usize) -> Self {
        self.page_tree_fanout = fanout;
        self
    }

    pub fn with_producer(mut self, producer: Option<String>) -> Self {
        self.producer = producer;
        self
    }

    /// Output name with a `.pdf` extension.
    pub fn suggested_name(&self) -> String {
        let name = self.output_name.trim();
        if name.is_empty() {
            return "merged.pdf".to_string();
        }
        let path = Path::new(name);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => name.to_string(),
            _ => path.with_extension("pdf").to_string_lossy().into_owned(),
        }
    }
}

/// A finished output document.
#[derive(Debug, Clone)]
pub struct AssembledPdf {
    pub bytes: Vec<u8>,
    pub suggested_name: String,
    pub page_count: usize,
}

/// Write the kept pages of `plan`, in position order, into a new PDF.
///
/// Fails with [`Error::Serialization`] when nothing is kept or a page's
/// document is no longer in `documents`. Validation happens before any
/// output is built.
pub fn assemble(
    documents: &BTreeMap<DocId, SourceDocument>,
    catalog: &PageCatalog,
    plan: &AssemblyPlan,
    options: &AssembleOptions,
) -> Result<AssembledPdf> {
    let kept = plan.kept_entries();
    if kept.is_empty() {
        return Err(Error::Serialization("the plan keeps no pages".to_string()));
    }

    let mut sources = Vec::with_capacity(kept.len());
    for selection in &kept {
        let page = catalog.lookup(selection.page_uid()).map_err(|_| {
            Error::Serialization(format!(
                "page {} was not issued by this session",
                selection.page_uid()
            ))
        })?;
        let document = documents.get(&page.doc_id).ok_or_else(|| {
            Error::Serialization(format!(
                "page {} belongs to {}, which is no longer loaded",
                page.uid, page.doc_id
            ))
        })?;
        sources.push((page.doc_id, document, page.source_index, selection.rotation()));
    }

    let mut output = Document::with_version(options.pdf_version.as_str());
    let mut copiers: HashMap<DocId, ObjectCopier> = HashMap::new();
    let mut page_ids = Vec::with_capacity(sources.len());

    for (doc_id, document, source_index, rotation) in sources {
        let copier = copiers
            .entry(doc_id)
            .or_insert_with(|| ObjectCopier::new(document));
        let source_page_id = document.page_object_id(source_index)?;
        let source_page = document.page_dictionary(source_index)?;

        let mut page = Dictionary::new();
        for (key, value) in source_page.iter() {
            if DROPPED_PAGE_KEYS.contains(&key.as_slice()) {
                continue;
            }
            page.set(key.clone(), value.clone());
        }
        for key in INHERITED_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = document.inherited_attribute(source_page_id, key) {
                page.set(key.to_vec(), value.clone());
            }
        }
        if !page.has(b"MediaBox") {
            page.set("MediaBox", letter_media_box());
        }
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Rotate", Object::Integer(i64::from(rotation.degrees())));

        let page_id = copier.claim(&mut output, source_page_id);
        let mut page = Object::Dictionary(page);
        copier.rewrite(&mut output, &mut page);
        copier.drain(&mut output);
        output.objects.insert(page_id, page);
        page_ids.push(page_id);

        debug!(
            "page {} of '{}' -> object {:?} at {}",
            source_index,
            document.name(),
            page_id,
            rotation
        );
    }

    let page_count = page_ids.len();
    let pages_id = create_page_tree(&mut output, page_ids, options.page_tree_fanout);

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    let catalog_id = output.add_object(catalog_dict);
    output.trailer.set("Root", Object::Reference(catalog_id));

    if let Some(producer) = &options.producer {
        let mut info_dict = Dictionary::new();
        info_dict.set(
            "Producer",
            Object::string_literal(producer.as_bytes().to_vec()),
        );
        let info_id = output.add_object(info_dict);
        output.trailer.set("Info", Object::Reference(info_id));
    }

    output
        .trailer
        .set("Size", Object::Integer(i64::from(output.max_id) + 1));

    let mut bytes = Vec::new();
    output
        .save_to(&mut bytes)
        .map_err(|e| Error::Serialization(format!("failed to write output: {}", e)))?;

    info!(
        "assembled {} page(s) from {} document(s) into {} bytes",
        page_count,
        copiers.len(),
        bytes.len()
    );

    Ok(AssembledPdf {
        bytes,
        suggested_name: options.suggested_name(),
        page_count,
    })
}

/// Copies objects out of one source document, renumbering them into the
/// output's id space. One copier per source document per call, which is
/// what bounds deduplication to a single source.
struct ObjectCopier<'a> {
    source: &'a SourceDocument,
    id_map: HashMap<ObjectId, ObjectId>,
    pending: Vec<ObjectId>,
    /// Output ids already written as kept pages.
    placed: HashSet<ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a SourceDocument) -> Self {
        Self {
            source,
            id_map: HashMap::new(),
            pending: Vec::new(),
            placed: HashSet::new(),
        }
    }

    /// Output id for a page object the caller writes itself.
    ///
    /// Every kept entry gets its own page object, even when several entries
    /// come from the same source page. References to the source page resolve
    /// to the first of them.
    fn claim(&mut self, output: &mut Document, page_id: ObjectId) -> ObjectId {
        let new_id = match self.id_map.get(&page_id) {
            Some(&mapped) if !self.placed.contains(&mapped) => mapped,
            Some(_) => output.new_object_id(),
            None => {
                let fresh = output.new_object_id();
                self.id_map.insert(page_id, fresh);
                fresh
            }
        };
        self.placed.insert(new_id);
        new_id
    }

    fn map_reference(&mut self, output: &mut Document, old_id: ObjectId) -> ObjectId {
        if let Some(&new_id) = self.id_map.get(&old_id) {
            return new_id;
        }
        let new_id = output.new_object_id();
        self.id_map.insert(old_id, new_id);
        self.pending.push(old_id);
        new_id
    }

    /// Point every reference inside `obj` at the output graph. `/Parent`
    /// links are cut so a copied object never drags in its source tree.
    fn rewrite(&mut self, output: &mut Document, obj: &mut Object) {
        match obj {
            Object::Reference(id) => {
                *id = self.map_reference(output, *id);
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.rewrite(output, item);
                }
            }
            Object::Dictionary(dict) => self.rewrite_dictionary(output, dict),
            Object::Stream(stream) => self.rewrite_dictionary(output, &mut stream.dict),
            _ => {}
        }
    }

    fn rewrite_dictionary(&mut self, output: &mut Document, dict: &mut Dictionary) {
        dict.remove(b"Parent");
        let keys: Vec<Vec<u8>> = dict.iter().map(|(k, _)| k.clone()).collect();
        for key in keys {
            if let Ok(value) = dict.get_mut(&key) {
                self.rewrite(output, value);
            }
        }
    }

    /// Copy every object queued by `map_reference`, following what they
    /// reference in turn.
    fn drain(&mut self, output: &mut Document) {
        while let Some(old_id) = self.pending.pop() {
            let Some(&new_id) = self.id_map.get(&old_id) else {
                continue;
            };
            let mut copied = match self.source.object(old_id) {
                Some(object) => object.clone(),
                None => {
                    warn!(
                        "'{}': dangling reference {:?}, writing null",
                        self.source.name(),
                        old_id
                    );
                    Object::Null
                }
            };
            self.rewrite(output, &mut copied);
            output.objects.insert(new_id, copied);
        }
    }
}

fn letter_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

/// Build a `/Pages` tree over `page_ids` with at most `fanout` kids per node
/// and return the root. Kids get their `/Parent` set.
fn create_page_tree(doc: &mut Document, page_ids: Vec<ObjectId>, fanout: usize) -> ObjectId {
    let fanout = fanout.max(2);
    let mut level: Vec<(ObjectId, i64)> = page_ids.into_iter().map(|id| (id, 1)).collect();

    while level.len() > fanout {
        level = level
            .chunks(fanout)
            .map(|chunk| add_pages_node(doc, chunk))
            .collect();
    }
    add_pages_node(doc, &level).0
}

fn add_pages_node(doc: &mut Document, kids: &[(ObjectId, i64)]) -> (ObjectId, i64) {
    let node_id = doc.new_object_id();
    let count: i64 = kids.iter().map(|(_, count)| count).sum();

    for (kid_id, _) in kids {
        if let Some(Object::Dictionary(kid)) = doc.objects.get_mut(kid_id) {
            kid.set("Parent", Object::Reference(node_id));
        }
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set(
        "Kids",
        Object::Array(kids.iter().map(|(id, _)| Object::Reference(*id)).collect()),
    );
    pages_dict.set("Count", Object::Integer(count));
    doc.objects.insert(node_id, Object::Dictionary(pages_dict));
    (node_id, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_pages(doc: &mut Document, count: usize) -> Vec<ObjectId> {
        (0..count)
            .map(|_| {
                let mut page = Dictionary::new();
                page.set("Type", Object::Name(b"Page".to_vec()));
                doc.add_object(page)
            })
            .collect()
    }

    fn kids_of(doc: &Document, node: ObjectId) -> Vec<ObjectId> {
        doc.get_dictionary(node)
            .unwrap()
            .get(b"Kids")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|kid| kid.as_reference().unwrap())
            .collect()
    }

    #[test]
    fn test_flat_page_tree() {
        let mut doc = Document::with_version("1.5");
        let pages = blank_pages(&mut doc, 3);
        let root = create_page_tree(&mut doc, pages.clone(), 8);

        assert_eq!(kids_of(&doc, root), pages);
        let root_dict = doc.get_dictionary(root).unwrap();
        assert_eq!(root_dict.get(b"Count").unwrap().as_i64().unwrap(), 3);
        for page in pages {
            let parent = doc.get_dictionary(page).unwrap().get(b"Parent").unwrap();
            assert_eq!(parent.as_reference().unwrap(), root);
        }
    }

    #[test]
    fn test_nested_page_tree_keeps_order_and_counts() {
        let mut doc = Document::with_version("1.5");
        let pages = blank_pages(&mut doc, 20);
        let root = create_page_tree(&mut doc, pages.clone(), 4);

        let root_dict = doc.get_dictionary(root).unwrap();
        assert_eq!(root_dict.get(b"Count").unwrap().as_i64().unwrap(), 20);
        assert!(kids_of(&doc, root).len() <= 4);

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(root));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let ordered: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(ordered, pages);
    }

    #[test]
    fn test_suggested_name_forces_pdf_extension() {
        assert_eq!(AssembleOptions::new().suggested_name(), "merged.pdf");
        let options = AssembleOptions::new().with_output_name("report");
        assert_eq!(options.suggested_name(), "report.pdf");
        let options = AssembleOptions::new().with_output_name("Report.PDF");
        assert_eq!(options.suggested_name(), "Report.PDF");
        let options = AssembleOptions::new().with_output_name("  ");
        assert_eq!(options.suggested_name(), "merged.pdf");
    }
}
