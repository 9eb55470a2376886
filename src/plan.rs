//! Assembly plan: the mutable selection over cataloged pages.
//!
//! A plan is pure metadata. It never touches a source document, so it can be
//! edited and serialized any number of times. Every mutation validates its
//! input before changing anything; a failed call leaves the plan exactly as
//! it was.
//!
//! Mutations take `&mut self` and are not synchronized. A host sharing one
//! plan between threads has to serialize access itself.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::debug;

use crate::catalog::{DocId, PageEntry, PageUid};
use crate::error::{Error, Result};
use crate::geometry::Rotation;

/// Keep/rotation/order state of one page inside a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionEntry {
    page_uid: PageUid,
    doc_id: DocId,
    kept: bool,
    rotation: Rotation,
    position: Option<usize>,
}

impl SelectionEntry {
    pub fn page_uid(&self) -> PageUid {
        self.page_uid
    }

    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    pub fn kept(&self) -> bool {
        self.kept
    }

    /// Absolute rotation; preserved while the page is deleted.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Output position, `None` when the page is not kept.
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssemblyPlan {
    entries: Vec<SelectionEntry>,
    slots: HashMap<PageUid, usize>,
}

impl AssemblyPlan {
    /// One kept entry per page, in catalog order, at its inherited rotation.
    pub fn new(pages: &[PageEntry]) -> Self {
        let mut plan = AssemblyPlan::default();
        for page in pages {
            if plan.slots.contains_key(&page.uid) {
                continue;
            }
            let position = Some(plan.entries.len());
            plan.push(SelectionEntry {
                page_uid: page.uid,
                doc_id: page.doc_id,
                kept: true,
                rotation: page.inherited_rotation,
                position,
            });
        }
        plan
    }

    /// Drop `uid` from the output. Its rotation is kept for a later
    /// [`restore`](Self::restore). Deleting an already deleted page is a no-op.
    pub fn delete(&mut self, uid: PageUid) -> Result<()> {
        let slot = self.slot(uid)?;
        let entry = &mut self.entries[slot];
        if !entry.kept {
            return Ok(());
        }
        entry.kept = false;
        entry.position = None;
        self.renumber();
        debug!("deleted page {}, {} kept", uid, self.kept_count());
        Ok(())
    }

    /// Put a deleted page back, at the end of the current order.
    pub fn restore(&mut self, uid: PageUid) -> Result<()> {
        let slot = self.slot(uid)?;
        if self.entries[slot].kept {
            return Ok(());
        }
        let position = self.kept_count();
        let entry = &mut self.entries[slot];
        entry.kept = true;
        entry.position = Some(position);
        debug!("restored page {} at position {}", uid, position);
        Ok(())
    }

    /// Add `delta_degrees` to the page's rotation.
    ///
    /// Deleted pages can be rotated too; the result shows once they are
    /// restored.
    pub fn rotate(&mut self, uid: PageUid, delta_degrees: i64) -> Result<()> {
        let slot = self.slot(uid)?;
        let rotated = self.entries[slot].rotation.rotated(delta_degrees)?;
        self.entries[slot].rotation = rotated;
        debug!("rotated page {} by {} to {}", uid, delta_degrees, rotated);
        Ok(())
    }

    /// Replace the output order. `new_order` must list every kept page
    /// exactly once and nothing else.
    pub fn reorder(&mut self, new_order: &[PageUid]) -> Result<()> {
        let kept = self.kept_count();
        if new_order.len() != kept {
            return Err(Error::OrderMismatch(format!(
                "expected {} page(s), got {}",
                kept,
                new_order.len()
            )));
        }

        let mut seen = HashSet::with_capacity(new_order.len());
        let mut slots = Vec::with_capacity(new_order.len());
        for &uid in new_order {
            let slot = *self
                .slots
                .get(&uid)
                .ok_or_else(|| Error::OrderMismatch(format!("page {} is not in the plan", uid)))?;
            if !self.entries[slot].kept {
                return Err(Error::OrderMismatch(format!("page {} is deleted", uid)));
            }
            if !seen.insert(uid) {
                return Err(Error::OrderMismatch(format!("page {} is listed twice", uid)));
            }
            slots.push(slot);
        }

        for (position, slot) in slots.into_iter().enumerate() {
            self.entries[slot].position = Some(position);
        }
        Ok(())
    }

    /// Concatenate the kept pages of `plans`, in list order, into a new plan.
    ///
    /// Deleted entries are carried over so they can still be restored. The
    /// inputs are left untouched. A page kept in more than one input plan is
    /// rejected, since uids address exactly one entry.
    pub fn merge(plans: &[&AssemblyPlan]) -> Result<AssemblyPlan> {
        let mut merged = AssemblyPlan::default();

        for plan in plans {
            for entry in plan.kept_entries() {
                if merged.slots.contains_key(&entry.page_uid) {
                    return Err(Error::OrderMismatch(format!(
                        "page {} is kept by more than one plan",
                        entry.page_uid
                    )));
                }
                let position = Some(merged.entries.len());
                merged.push(SelectionEntry { position, ..*entry });
            }
        }

        for plan in plans {
            for entry in plan.entries.iter().filter(|entry| !entry.kept) {
                if !merged.slots.contains_key(&entry.page_uid) {
                    merged.push(*entry);
                }
            }
        }

        debug!(
            "merged {} plan(s) into {} kept page(s)",
            plans.len(),
            merged.kept_count()
        );
        Ok(merged)
    }

    pub fn entry(&self, uid: PageUid) -> Result<&SelectionEntry> {
        self.slot(uid).map(|slot| &self.entries[slot])
    }

    /// All entries, kept or not, in the order they entered the plan.
    pub fn entries(&self) -> impl Iterator<Item = &SelectionEntry> {
        self.entries.iter()
    }

    /// Kept entries in output order.
    pub fn kept_entries(&self) -> Vec<&SelectionEntry> {
        let mut kept: Vec<&SelectionEntry> =
            self.entries.iter().filter(|entry| entry.kept).collect();
        kept.sort_by_key(|entry| entry.position);
        kept
    }

    pub fn kept_uids(&self) -> Vec<PageUid> {
        self.kept_entries().iter().map(|entry| entry.page_uid).collect()
    }

    pub fn kept_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.kept).count()
    }

    /// Documents the plan draws pages from, kept or not.
    pub fn documents(&self) -> BTreeSet<DocId> {
        self.entries.iter().map(|entry| entry.doc_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: SelectionEntry) {
        self.slots.insert(entry.page_uid, self.entries.len());
        self.entries.push(entry);
    }

    fn slot(&self, uid: PageUid) -> Result<usize> {
        self.slots.get(&uid).copied().ok_or(Error::NotFound(uid))
    }

    /// Close the gaps left by a deletion, keeping relative order.
    fn renumber(&mut self) {
        let mut kept: Vec<(usize, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.position.map(|position| (position, slot)))
            .collect();
        kept.sort_unstable();
        for (position, (_, slot)) in kept.into_iter().enumerate() {
            self.entries[slot].position = Some(position);
        }
    }
}
