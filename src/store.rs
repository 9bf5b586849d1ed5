//! Page-indexed annotation storage.
//!
//! The store owns every annotation of a document, grouped by page in
//! insertion order. Ids are unique across the whole document, so lookups
//! that do not know the page can resolve it with [`AnnotationStore::locate`].
//!
//! Mutations are plain CRUD plus the two consistency rules that deletes must
//! honour:
//! - deleting a `table` removes the `table_cell` annotations it lists as
//!   children, on the same page;
//! - any link on any page whose target was removed is dropped.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationChanges, AnnotationId, BoundType, Link, PageNumber};

/// Links of one annotation as they were before a delete trimmed them.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTrim {
    pub page: PageNumber,
    pub id: AnnotationId,
    pub links: Vec<Link>,
}

/// Everything a delete removed, so it can be put back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Removal {
    /// Removed annotations with their former position on the page, ascending.
    pub removed: Vec<(usize, Annotation)>,
    /// Link lists trimmed by the cleanup pass.
    pub trimmed_links: Vec<LinkTrim>,
}

impl Removal {
    pub fn removed_ids(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.removed.iter().map(|(_, ann)| ann.id)
    }
}

/// Storage for the annotations of every page of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStore {
    pages: BTreeMap<PageNumber, Vec<Annotation>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an existing page mapping.
    pub fn from_pages(pages: BTreeMap<PageNumber, Vec<Annotation>>) -> Self {
        Self { pages }
    }

    /// The page mapping.
    pub fn pages(&self) -> &BTreeMap<PageNumber, Vec<Annotation>> {
        &self.pages
    }

    /// Annotations of one page (empty if the page holds none).
    pub fn page(&self, page: PageNumber) -> &[Annotation] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get an annotation by page and ID.
    pub fn get(&self, page: PageNumber, id: AnnotationId) -> Option<&Annotation> {
        self.page(page).iter().find(|ann| ann.id == id)
    }

    /// Find the page currently holding `id`.
    pub fn locate(&self, id: AnnotationId) -> Option<PageNumber> {
        self.pages
            .iter()
            .find(|(_, anns)| anns.iter().any(|ann| ann.id == id))
            .map(|(page, _)| *page)
    }

    /// Find an annotation anywhere in the document.
    pub fn find(&self, id: AnnotationId) -> Option<(PageNumber, &Annotation)> {
        self.pages.iter().find_map(|(page, anns)| {
            anns.iter().find(|ann| ann.id == id).map(|ann| (*page, ann))
        })
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.locate(id).is_some()
    }

    /// Total number of annotations across all pages.
    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    /// Append an annotation to a page.
    pub fn create(&mut self, page: PageNumber, annotation: Annotation) {
        log::debug!("Store: create annotation {} on page {}", annotation.id, page);
        self.pages.entry(page).or_default().push(annotation);
    }

    /// Put an annotation back at `index` (clamped to the page length).
    pub fn insert_at(&mut self, page: PageNumber, index: usize, annotation: Annotation) {
        let anns = self.pages.entry(page).or_default();
        let index = index.min(anns.len());
        anns.insert(index, annotation);
    }

    /// Delete an annotation, cascading onto owned table cells and dropping
    /// links that pointed at anything removed.
    ///
    /// Returns `None` if `id` is not on `page`; nothing changes in that case.
    pub fn delete(&mut self, page: PageNumber, id: AnnotationId) -> Option<Removal> {
        let anns = self.pages.get_mut(&page)?;
        let target = anns.iter().find(|ann| ann.id == id)?;

        let mut doomed: HashSet<AnnotationId> = HashSet::from([id]);
        if target.owns_cells() {
            let children: HashSet<AnnotationId> = target.children.iter().copied().collect();
            doomed.extend(
                anns.iter()
                    .filter(|ann| {
                        ann.bound_type == BoundType::TableCell && children.contains(&ann.id)
                    })
                    .map(|ann| ann.id),
            );
        }

        let mut removal = Removal::default();
        let mut kept = Vec::with_capacity(anns.len());
        for (index, ann) in std::mem::take(anns).into_iter().enumerate() {
            if doomed.contains(&ann.id) {
                removal.removed.push((index, ann));
            } else {
                kept.push(ann);
            }
        }
        *anns = kept;

        for (link_page, anns) in self.pages.iter_mut() {
            for ann in anns.iter_mut() {
                if ann.links.iter().any(|link| doomed.contains(&link.to)) {
                    removal.trimmed_links.push(LinkTrim {
                        page: *link_page,
                        id: ann.id,
                        links: ann.links.clone(),
                    });
                    ann.links.retain(|link| !doomed.contains(&link.to));
                }
            }
        }

        log::debug!(
            "Store: deleted {} annotation(s) from page {}, trimmed links on {}",
            removal.removed.len(),
            page,
            removal.trimmed_links.len()
        );
        Some(removal)
    }

    /// Remove exactly one annotation, without cascade or link cleanup.
    pub fn remove_exact(&mut self, page: PageNumber, id: AnnotationId) -> Option<(usize, Annotation)> {
        let anns = self.pages.get_mut(&page)?;
        let index = anns.iter().position(|ann| ann.id == id)?;
        Some((index, anns.remove(index)))
    }

    /// Shallow-merge `changes` into an annotation. Returns the previous state.
    pub fn edit(
        &mut self,
        page: PageNumber,
        id: AnnotationId,
        changes: &AnnotationChanges,
    ) -> Option<Annotation> {
        let ann = self.get_mut(page, id)?;
        let before = ann.clone();
        changes.apply_to(ann);
        log::debug!("Store: edited annotation {} on page {}", id, page);
        Some(before)
    }

    /// Overwrite an annotation with `state`, keeping its id. Returns the previous state.
    pub fn replace(
        &mut self,
        page: PageNumber,
        id: AnnotationId,
        state: Annotation,
    ) -> Option<Annotation> {
        let ann = self.get_mut(page, id)?;
        let before = std::mem::replace(ann, Annotation { id, ..state });
        Some(before)
    }

    /// Remove links of one annotation that differ from `target` on every field.
    ///
    /// Returns `true` when at least one link was dropped.
    pub fn delete_link(&mut self, page: PageNumber, id: AnnotationId, target: &Link) -> bool {
        let Some(ann) = self.get_mut(page, id) else {
            return false;
        };
        let before = ann.links.len();
        ann.links.retain(|link| !link.differs_entirely_from(target));
        before != ann.links.len()
    }

    /// Overwrite the link list of one annotation.
    pub fn set_links(&mut self, page: PageNumber, id: AnnotationId, links: Vec<Link>) {
        if let Some(ann) = self.get_mut(page, id) {
            ann.links = links;
        }
    }

    /// Put back everything a [`Removal`] took out.
    pub fn restore(&mut self, page: PageNumber, removal: &Removal) {
        for (index, ann) in &removal.removed {
            self.insert_at(page, *index, ann.clone());
        }
        for trim in &removal.trimmed_links {
            self.set_links(trim.page, trim.id, trim.links.clone());
        }
    }

    fn get_mut(&mut self, page: PageNumber, id: AnnotationId) -> Option<&mut Annotation> {
        self.pages
            .get_mut(&page)?
            .iter_mut()
            .find(|ann| ann.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bound, LinkType};

    fn boxed(id: AnnotationId) -> Annotation {
        Annotation::new(id, BoundType::Box, Bound::new(0.0, 0.0, 10.0, 10.0), "1")
    }

    fn cell(id: AnnotationId) -> Annotation {
        Annotation::new(id, BoundType::TableCell, Bound::new(0.0, 0.0, 5.0, 5.0), "1")
    }

    #[test]
    fn test_create_and_locate() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(10));
        store.create(3, boxed(11));

        assert_eq!(store.len(), 2);
        assert_eq!(store.locate(11), Some(3));
        assert_eq!(store.locate(99), None);
        assert_eq!(store.page(2), &[] as &[Annotation]);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(10));
        assert!(store.delete(1, 99).is_none());
        assert!(store.delete(2, 10).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_table_delete_cascades_to_cells_on_same_page() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1).with_children(vec![2]));
        store.create(1, cell(2));
        store.create(1, cell(3));
        let mut table = boxed(4).with_children(vec![2, 3, 5]);
        table.bound_type = BoundType::Table;
        store.create(1, table);
        store.create(2, cell(5));

        let removal = store.delete(1, 4).unwrap();
        let removed: Vec<_> = removal.removed_ids().collect();
        assert_eq!(removed, vec![2, 3, 4]);
        assert_eq!(store.page(1).len(), 1);
        // Cells on other pages are not touched
        assert!(store.get(2, 5).is_some());
    }

    #[test]
    fn test_non_table_does_not_cascade() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1).with_children(vec![2]));
        store.create(1, cell(2));

        let removal = store.delete(1, 1).unwrap();
        assert_eq!(removal.removed.len(), 1);
        assert!(store.get(1, 2).is_some());
    }

    #[test]
    fn test_delete_drops_links_on_all_pages() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1));
        store.create(
            2,
            boxed(2).with_links(vec![
                Link::new("7", 1, 1, LinkType::Directional),
                Link::new("7", 3, 2, LinkType::Directional),
            ]),
        );
        store.create(2, boxed(3));

        let removal = store.delete(1, 1).unwrap();
        assert_eq!(removal.trimmed_links.len(), 1);
        assert_eq!(removal.trimmed_links[0].links.len(), 2);
        let remaining = &store.get(2, 2).unwrap().links;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].to, 3);
    }

    #[test]
    fn test_restore_puts_everything_back_in_place() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1));
        store.create(1, boxed(2));
        store.create(1, boxed(3).with_links(vec![Link::new("7", 2, 1, LinkType::Directional)]));
        let before = store.clone();

        let removal = store.delete(1, 2).unwrap();
        assert_ne!(store, before);
        store.restore(1, &removal);
        assert_eq!(store, before);
    }

    #[test]
    fn test_edit_returns_previous_state() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1));
        let before = store
            .edit(1, 1, &AnnotationChanges::bound(Bound::new(5.0, 5.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(before.bound, Bound::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(store.get(1, 1).unwrap().bound, Bound::new(5.0, 5.0, 1.0, 1.0));
        assert!(store.edit(1, 2, &AnnotationChanges::default()).is_none());
    }

    #[test]
    fn test_replace_keeps_id() {
        let mut store = AnnotationStore::new();
        store.create(1, boxed(1));
        let mut other = boxed(42);
        other.text = Some("x".to_string());
        store.replace(1, 1, other);
        let ann = store.get(1, 1).unwrap();
        assert_eq!(ann.id, 1);
        assert_eq!(ann.text.as_deref(), Some("x"));
    }

    // Link removal only drops links that differ from the target on every field.
    #[test]
    fn test_delete_link_and_of_inequalities() {
        let target = Link::new("7", 2, 1, LinkType::Directional);
        let mut store = AnnotationStore::new();
        store.create(
            1,
            boxed(1).with_links(vec![
                target.clone(),
                Link::new("8", 3, 2, LinkType::Directional),
                Link::new("9", 4, 3, LinkType::Undirectional),
            ]),
        );

        assert!(store.delete_link(1, 1, &target));
        let links = &store.get(1, 1).unwrap().links;
        // The exact match and the one sharing `type` both survive
        assert_eq!(links.len(), 2);
        assert!(links.contains(&target));
        assert!(!links.iter().any(|l| l.to == 4));
    }
}
