//! The in-memory session a host application works against.
//!
//! A session owns the loaded source documents and the page catalog. Plans
//! are plain values handed back to the caller; the session only reads them.

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};

use crate::catalog::{DocId, PageCatalog, PageEntry, PageUid};
use crate::error::{Error, Result};
use crate::geometry::{MediaBox, Rotation};
use crate::plan::AssemblyPlan;
use crate::serializer::{self, AssembleOptions, AssembledPdf};
use crate::store::SourceDocument;

/// What an external renderer needs to draw a preview of one planned page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub doc_id: DocId,
    pub source_index: usize,
    pub media_box: MediaBox,
    /// Rotation currently set in the plan, not the source's own.
    pub rotation: Rotation,
}

#[derive(Debug, Default)]
pub struct Session {
    documents: BTreeMap<DocId, SourceDocument>,
    catalog: PageCatalog,
    next_doc_id: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one named buffer and keep it in the session.
    pub fn load(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<DocId> {
        let document = SourceDocument::load(name, bytes)?;
        let doc_id = DocId(self.next_doc_id);
        self.next_doc_id += 1;
        self.documents.insert(doc_id, document);
        Ok(doc_id)
    }

    /// Load every input independently; one bad buffer does not stop the rest.
    ///
    /// Results come back in input order, paired with the input name.
    pub fn load_batch<I, N, B>(&mut self, inputs: I) -> Vec<(String, Result<DocId>)>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: AsRef<[u8]>,
    {
        inputs
            .into_iter()
            .map(|(name, bytes)| {
                let name = name.into();
                let result = self.load(name.clone(), bytes.as_ref());
                if let Err(e) = &result {
                    warn!("skipping '{}': {}", name, e);
                }
                (name, result)
            })
            .collect()
    }

    /// Read a file and load it under its file name.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<DocId> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load(name, &bytes)
    }

    /// Drop a document. Its catalog entries stay resolvable, but plans that
    /// still keep its pages can no longer be assembled.
    pub fn unload(&mut self, doc_id: DocId) -> Result<SourceDocument> {
        let document = self
            .documents
            .remove(&doc_id)
            .ok_or(Error::DocumentNotFound(doc_id))?;
        info!("unloaded '{}' ({})", document.name(), doc_id);
        Ok(document)
    }

    pub fn document(&self, doc_id: DocId) -> Result<&SourceDocument> {
        self.documents
            .get(&doc_id)
            .ok_or(Error::DocumentNotFound(doc_id))
    }

    /// Loaded documents in load order.
    pub fn documents(&self) -> impl Iterator<Item = (DocId, &SourceDocument)> {
        self.documents.iter().map(|(id, doc)| (*id, doc))
    }

    /// Catalog every page of `doc_ids`, in argument order.
    pub fn build_catalog(&mut self, doc_ids: &[DocId]) -> Result<Vec<PageEntry>> {
        let documents = doc_ids
            .iter()
            .map(|&id| {
                self.documents
                    .get(&id)
                    .map(|doc| (id, doc))
                    .ok_or(Error::DocumentNotFound(id))
            })
            .collect::<Result<Vec<_>>>()?;
        self.catalog.build(&documents)
    }

    /// Catalog `doc_ids` and start a plan keeping all of their pages.
    pub fn new_plan(&mut self, doc_ids: &[DocId]) -> Result<AssemblyPlan> {
        let pages = self.build_catalog(doc_ids)?;
        Ok(AssemblyPlan::new(&pages))
    }

    pub fn lookup(&self, uid: PageUid) -> Result<&PageEntry> {
        self.catalog.lookup(uid)
    }

    pub fn catalog(&self) -> &PageCatalog {
        &self.catalog
    }

    /// Serialize `plan`. Neither the plan nor any document is modified.
    pub fn assemble(&self, plan: &AssemblyPlan, options: &AssembleOptions) -> Result<AssembledPdf> {
        serializer::assemble(&self.documents, &self.catalog, plan, options)
    }

    pub fn render_request(&self, plan: &AssemblyPlan, uid: PageUid) -> Result<RenderRequest> {
        let selection = plan.entry(uid)?;
        let page = self.catalog.lookup(uid)?;
        Ok(RenderRequest {
            doc_id: page.doc_id,
            source_index: page.source_index,
            media_box: page.media_box,
            rotation: selection.rotation(),
        })
    }
}
