//! Undo/Redo log for annotation operations.
//!
//! The log is a single linear list of entries plus a pointer:
//! - pointer `None` (the head): every entry is applied, nothing to redo;
//! - pointer `Some(p)`: entries `[p, len)` have been undone and can be redone.
//!
//! Recording while entries are undone discards them first. Each entry holds a
//! snapshot of the annotation taken before the action (for `edit`/`delete`)
//! or the created annotation (for `add`). Edit entries are replayed by
//! swapping the live state with the stored one, so the same entry works in
//! both directions any number of times.

use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationId, PageNumber};
use crate::store::{AnnotationStore, Removal};

// ============================================================================
// Entries
// ============================================================================

/// Kind of the recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoAction {
    Add,
    Delete,
    Edit,
}

/// One recorded action.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub action: UndoAction,
    /// Snapshot of the annotation (see module docs for which state).
    pub annotation: Annotation,
    pub page_number: PageNumber,
    /// Position on the page, known once the annotation has been taken out.
    position: Option<usize>,
    /// For deletes: cascaded cells and trimmed links, without the annotation itself.
    removal: Removal,
}

impl UndoEntry {
    /// Record a freshly created annotation.
    pub fn add(page_number: PageNumber, annotation: Annotation) -> Self {
        Self {
            action: UndoAction::Add,
            annotation,
            page_number,
            position: None,
            removal: Removal::default(),
        }
    }

    /// Record an edit with the state before the change.
    pub fn edit(page_number: PageNumber, before: Annotation) -> Self {
        Self {
            action: UndoAction::Edit,
            annotation: before,
            page_number,
            position: None,
            removal: Removal::default(),
        }
    }

    /// Record a delete from the store's removal report.
    ///
    /// Returns `None` if the report does not contain `id`.
    pub fn delete(page_number: PageNumber, id: AnnotationId, removal: Removal) -> Option<Self> {
        let (position, annotation, removal) = split_removal(id, removal)?;
        Some(Self {
            action: UndoAction::Delete,
            annotation,
            page_number,
            position: Some(position),
            removal,
        })
    }

    pub fn annotation_id(&self) -> AnnotationId {
        self.annotation.id
    }

    /// Whether replaying this entry can bring back an annotation with `id`.
    pub fn references(&self, id: AnnotationId) -> bool {
        self.annotation.id == id || self.removal.removed.iter().any(|(_, ann)| ann.id == id)
    }

    /// Get a human-readable description of this entry.
    pub fn description(&self) -> String {
        match self.action {
            UndoAction::Add => format!("Add annotation {}", self.annotation.id),
            UndoAction::Delete => format!("Delete annotation {}", self.annotation.id),
            UndoAction::Edit => format!("Edit annotation {}", self.annotation.id),
        }
    }
}

/// Separate the primary annotation from the rest of a removal report.
fn split_removal(id: AnnotationId, mut removal: Removal) -> Option<(usize, Annotation, Removal)> {
    let index = removal.removed.iter().position(|(_, ann)| ann.id == id)?;
    let (position, annotation) = removal.removed.remove(index);
    Some((position, annotation, removal))
}

/// What an undo or redo step touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoStep {
    pub action: UndoAction,
    pub page_number: PageNumber,
    pub annotation_id: AnnotationId,
    /// Every page whose annotations changed, `page_number` first.
    pub affected_pages: Vec<PageNumber>,
}

impl UndoStep {
    fn of(entry: &UndoEntry) -> Self {
        let mut affected_pages = vec![entry.page_number];
        for trim in &entry.removal.trimmed_links {
            if !affected_pages.contains(&trim.page) {
                affected_pages.push(trim.page);
            }
        }
        Self {
            action: entry.action,
            page_number: entry.page_number,
            annotation_id: entry.annotation.id,
            affected_pages,
        }
    }
}

// ============================================================================
// Undo Log
// ============================================================================

/// Linear undo history with a redo pointer.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
    /// `None` = at the head; `Some(p)` = entries from `p` on are undone.
    pointer: Option<usize>,
}

impl UndoLog {
    /// Create a new empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, discarding the undone tail first.
    pub fn record(&mut self, entry: UndoEntry) {
        if let Some(pointer) = self.pointer.take() {
            log::debug!(
                "Undo: discarding {} undone entries",
                self.entries.len() - pointer
            );
            self.entries.truncate(pointer);
        }
        log::debug!("Undo: recorded '{}'", entry.description());
        self.entries.push(entry);
    }

    pub fn pointer(&self) -> Option<usize> {
        self.pointer
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry, applied or undone, mentions annotation `id`.
    pub fn references(&self, id: AnnotationId) -> bool {
        self.entries.iter().any(|entry| entry.references(id))
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.pointer != Some(0)
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.pointer.is_some()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pointer = None;
        log::debug!("Undo history cleared");
    }

    /// Reverse the most recent applied entry.
    /// Returns `None` if there was nothing to undo.
    pub fn undo(&mut self, store: &mut AnnotationStore) -> Option<UndoStep> {
        if !self.can_undo() {
            return None;
        }
        let index = match self.pointer {
            None => self.entries.len() - 1,
            Some(pointer) => pointer - 1,
        };

        let entry = &mut self.entries[index];
        apply_undo(entry, store);
        log::debug!("Undo: '{}'", entry.description());
        let step = UndoStep::of(entry);

        self.pointer = Some(index);
        Some(step)
    }

    /// Re-apply the oldest undone entry.
    /// Returns `None` if there was nothing to redo.
    pub fn redo(&mut self, store: &mut AnnotationStore) -> Option<UndoStep> {
        let index = self.pointer.filter(|_| !self.entries.is_empty())?;

        let entry = &mut self.entries[index];
        apply_redo(entry, store);
        log::debug!("Redo: '{}'", entry.description());
        let step = UndoStep::of(entry);

        self.pointer = if index + 1 >= self.entries.len() {
            None
        } else {
            Some(index + 1)
        };
        Some(step)
    }
}

// ============================================================================
// Replay
// ============================================================================

fn apply_undo(entry: &mut UndoEntry, store: &mut AnnotationStore) {
    match entry.action {
        UndoAction::Edit => swap_state(entry, store),
        UndoAction::Delete => {
            let mut removal = entry.removal.clone();
            if let Some(position) = entry.position {
                removal.removed.push((position, entry.annotation.clone()));
                removal.removed.sort_by_key(|(index, _)| *index);
            }
            store.restore(entry.page_number, &removal);
        }
        UndoAction::Add => {
            if let Some((position, _)) = store.remove_exact(entry.page_number, entry.annotation.id)
            {
                entry.position = Some(position);
            }
        }
    }
}

fn apply_redo(entry: &mut UndoEntry, store: &mut AnnotationStore) {
    match entry.action {
        UndoAction::Edit => swap_state(entry, store),
        UndoAction::Delete => {
            let id = entry.annotation.id;
            if let Some((position, annotation, removal)) = store
                .delete(entry.page_number, id)
                .and_then(|removal| split_removal(id, removal))
            {
                entry.position = Some(position);
                entry.annotation = annotation;
                entry.removal = removal;
            }
        }
        UndoAction::Add => match entry.position {
            Some(position) => {
                store.insert_at(entry.page_number, position, entry.annotation.clone())
            }
            None => store.create(entry.page_number, entry.annotation.clone()),
        },
    }
}

/// Swap the live annotation with the entry's stored state.
fn swap_state(entry: &mut UndoEntry, store: &mut AnnotationStore) {
    let id = entry.annotation.id;
    if let Some(current) = store.replace(entry.page_number, id, entry.annotation.clone()) {
        entry.annotation = current;
    }
}

// ============================================================================
// Tests
// ============================================================================
