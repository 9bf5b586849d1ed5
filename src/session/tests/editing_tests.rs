//! Editing, undo/redo and clipboard behaviour of a session.

use std::collections::HashSet;

use super::fixtures::{backend, boxed, categories, load, offline};
use crate::model::{
    Annotation, AnnotationChanges, Bound, BoundType, ImageTool, Link, LinkType, PageSize,
};

fn table_with_cells() -> (Annotation, Annotation, Annotation) {
    let table = Annotation::new(1, BoundType::Table, Bound::new(0.0, 0.0, 100.0, 100.0), "3")
        .with_children(vec![2, 3]);
    let c1 = Annotation::new(2, BoundType::TableCell, Bound::new(0.0, 0.0, 50.0, 50.0), "3");
    let c2 = Annotation::new(3, BoundType::TableCell, Bound::new(50.0, 0.0, 50.0, 50.0), "3");
    (table, c1, c2)
}

#[test]
fn test_create_undo_redo_scenario() {
    let mut session = offline();
    session.on_category_selected(categories()[0].clone());

    session.on_annotation_created(1, boxed(7, Bound::new(10.0, 10.0, 20.0, 20.0)));
    let created = session.all_annotations()[&1].clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].label.as_deref(), Some("Name"));
    assert_eq!(created[0].color.as_deref(), Some("#ff0000"));

    session.undo();
    assert!(session.store().page(1).is_empty());

    session.redo();
    assert_eq!(session.store().page(1), created.as_slice());
}

#[test]
fn test_sequence_then_equal_undos_restores_mapping() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::new(0.0, 0.0, 10.0, 10.0)));
    session.on_annotation_created(1, boxed(2, Bound::new(20.0, 0.0, 10.0, 10.0)));
    let before = session.all_annotations().clone();

    session.on_annotation_created(2, boxed(3, Bound::new(0.0, 0.0, 5.0, 5.0)));
    session.on_annotation_edited(
        Some(1),
        1,
        &AnnotationChanges::bound(Bound::new(40.0, 40.0, 10.0, 10.0)),
    );
    session.on_annotation_deleted(1, 2);
    session.on_annotation_edited(None, 3, &AnnotationChanges {
        label: Some("moved".to_string()),
        ..Default::default()
    });
    let after = session.all_annotations().clone();

    for _ in 0..4 {
        assert!(session.undo().is_some());
    }
    // Page 2 exists but is empty again
    assert_eq!(session.store().page(1), before[&1].as_slice());
    assert!(session.store().page(2).is_empty());

    for _ in 0..4 {
        assert!(session.redo().is_some());
    }
    assert_eq!(session.all_annotations(), &after);
}

#[test]
fn test_two_edits_two_undos_restore_original() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::new(1.0, 1.0, 10.0, 10.0)));

    session.on_annotation_edited(
        Some(1),
        1,
        &AnnotationChanges::bound(Bound::new(2.0, 1.0, 10.0, 10.0)),
    );
    session.on_annotation_edited(
        Some(1),
        1,
        &AnnotationChanges::bound(Bound::new(3.0, 1.0, 10.0, 10.0)),
    );
    session.undo();
    session.undo();

    assert_eq!(session.store().get(1, 1).unwrap().bound.x, 1.0);
}

#[test]
fn test_new_action_discards_redo_tail() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::default()));
    session.on_annotation_created(1, boxed(2, Bound::default()));
    session.undo();
    assert!(session.undo_log().can_redo());

    session.on_annotation_edited(Some(1), 1, &AnnotationChanges::bound(Bound::new(5.0, 5.0, 1.0, 1.0)));
    assert!(!session.undo_log().can_redo());
    assert!(session.redo().is_none());
    assert!(session.store().get(1, 2).is_none());
}

#[test]
fn test_undo_at_start_is_noop() {
    let mut session = offline();
    assert!(session.undo().is_none());
    session.on_annotation_created(1, boxed(1, Bound::default()));
    assert!(session.undo().is_some());
    assert!(session.undo().is_none());
    assert_eq!(session.undo_log().pointer(), Some(0));
}

#[test]
fn test_table_delete_cascades_and_undo_restores() {
    let mut session = offline();
    let (table, c1, c2) = table_with_cells();
    let stray = Annotation::new(4, BoundType::TableCell, Bound::default(), "3");
    session.on_annotation_created(1, c1);
    session.on_annotation_created(1, table);
    session.on_annotation_created(1, stray);
    session.on_annotation_created(1, c2);
    let before = session.all_annotations().clone();

    assert!(session.on_annotation_deleted(1, 1));
    let ids: Vec<_> = session.store().page(1).iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![4]);

    session.undo();
    assert_eq!(session.all_annotations(), &before);
}

#[test]
fn test_cascade_only_on_same_page() {
    let mut session = offline();
    let (table, c1, c2) = table_with_cells();
    session.on_annotation_created(1, table);
    session.on_annotation_created(1, c1);
    session.on_annotation_created(2, c2);

    session.on_annotation_deleted(1, 1);
    assert!(session.store().page(1).is_empty());
    assert!(session.store().get(2, 3).is_some());
}

#[test]
fn test_delete_drops_links_to_removed_annotation() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::default()));
    let linker = boxed(2, Bound::default()).with_links(vec![
        Link::new("1", 1, 1, LinkType::Directional),
        Link::new("1", 9, 1, LinkType::Directional),
    ]);
    session.on_annotation_created(2, linker);

    session.on_annotation_deleted(1, 1);
    let links = &session.store().get(2, 2).unwrap().links;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].to, 9);
    assert!(session.validity().modified_pages.contains(&2));

    session.undo();
    assert_eq!(session.store().get(2, 2).unwrap().links.len(), 2);
}

#[test]
fn test_delete_link_removes_only_entirely_different_links() {
    let mut session = offline();
    let target = Link::new("1", 5, 1, LinkType::Directional);
    let same_category = Link::new("1", 6, 2, LinkType::Undirectional);
    let entirely_different = Link::new("2", 7, 3, LinkType::Omnidirectional);
    session.on_annotation_created(
        1,
        boxed(1, Bound::default()).with_links(vec![
            target.clone(),
            same_category.clone(),
            entirely_different,
        ]),
    );

    assert!(session.on_link_deleted(1, 1, &target));
    assert_eq!(
        session.store().get(1, 1).unwrap().links,
        vec![target.clone(), same_category]
    );

    // Nothing left that differs on every field
    assert!(!session.on_link_deleted(1, 1, &target));

    session.undo();
    assert_eq!(session.store().get(1, 1).unwrap().links.len(), 3);
}

#[test]
fn test_edit_with_unknown_page_locates_owner() {
    let mut session = offline();
    session.on_annotation_created(3, boxed(1, Bound::default()));

    let changes = AnnotationChanges {
        text: Some("found".to_string()),
        ..Default::default()
    };
    assert!(session.on_annotation_edited(None, 1, &changes));
    assert_eq!(session.store().get(3, 1).unwrap().text.as_deref(), Some("found"));
    assert!(session.validity().modified_pages.contains(&3));

    let log_len = session.undo_log().len();
    assert!(!session.on_annotation_edited(None, 99, &changes));
    assert!(!session.on_annotation_deleted(1, 99));
    assert_eq!(session.undo_log().len(), log_len);
}

#[test]
fn test_paste_recenters_with_fresh_id() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::new(10.0, 10.0, 20.0, 20.0)));
    assert!(session.on_annotation_copy(1, 1));

    let id = session
        .on_annotation_paste(PageSize::new(200.0, 200.0), 2)
        .unwrap();
    assert_ne!(id, 1);
    let pasted = session.store().get(2, id).unwrap();
    assert_eq!(pasted.bound, Bound::new(90.0, 90.0, 20.0, 20.0));
    assert!(session.validity().modified_pages.contains(&2));

    // Paste is undoable
    session.undo();
    assert!(session.store().get(2, id).is_none());
}

#[test]
fn test_paste_without_clipboard_does_nothing() {
    let mut session = offline();
    assert!(session.on_annotation_paste(PageSize::new(200.0, 200.0), 1).is_none());
    assert!(session.undo_log().is_empty());
}

#[test]
fn test_cut_copies_then_deletes() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::new(0.0, 0.0, 4.0, 4.0)));
    assert!(session.on_annotation_cut(1, 1));
    assert!(session.store().is_empty());
    assert_eq!(session.clipboard().get().unwrap().id, 1);

    let id = session.on_annotation_paste(PageSize::new(10.0, 10.0), 1).unwrap();
    assert_eq!(session.store().get(1, id).unwrap().bound, Bound::new(3.0, 3.0, 4.0, 4.0));
}

#[test]
fn test_ids_stay_unique_across_creates_and_pastes() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::default()));
    // Colliding id is replaced
    let second = session.on_annotation_created(2, boxed(1, Bound::default()));
    assert_ne!(second, 1);

    session.on_annotation_copy(1, 1);
    for page in 1..=3 {
        session.on_annotation_paste(PageSize::new(100.0, 100.0), page);
        session.on_annotation_paste(PageSize::new(100.0, 100.0), page);
    }

    let ids: Vec<_> = session
        .all_annotations()
        .values()
        .flatten()
        .map(|annotation| annotation.id)
        .collect();
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_ids_referenced_by_history_are_not_reused() {
    let mut session = offline();
    let first = session.on_annotation_created(1, boxed(5, Bound::default()));
    session.on_annotation_deleted(1, first);

    let second = session.on_annotation_created(1, boxed(5, Bound::default()));
    assert_ne!(second, first);

    // Undone creations still own their id
    session.on_annotation_created(2, boxed(6, Bound::default()));
    session.undo();
    let third = session.on_annotation_created(2, boxed(6, Bound::default()));
    assert_ne!(third, 6);
}

#[test]
fn test_deleted_annotation_values_do_not_leak_to_new_id() {
    let backend = backend();
    let mut session = load(&backend);
    session.on_annotation_click(100);
    session.on_data_attributes_change(0, "secret");
    session.on_annotation_deleted(1, 100);

    let formula = Annotation::new(100, BoundType::Box, Bound::default(), "2");
    let id = session.on_annotation_created(1, formula);
    assert_ne!(id, 100);
    let values = session.data_attributes().values(id).unwrap();
    assert!(values.iter().all(|attr| attr.value.is_empty()));

    // The deleted annotation keeps its values for undo
    session.undo();
    session.undo();
    assert_eq!(session.data_attributes().values(100).unwrap()[0].value, "secret");
}

#[test]
fn test_empty_edit_is_not_recorded() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::default()));
    let log_len = session.undo_log().len();

    assert!(!session.on_annotation_edited(Some(1), 1, &AnnotationChanges::default()));
    assert_eq!(session.undo_log().len(), log_len);
}

#[test]
fn test_undo_of_selected_annotation_clears_selection() {
    let mut session = offline();
    session.on_annotation_created(1, boxed(1, Bound::default()));
    session.on_annotation_click(1);
    session.undo();
    assert!(session.selection().annotation.is_none());
    assert!(session.selected_annotation().is_none());
}

#[test]
fn test_table_creation_enters_table_mode() {
    let mut session = offline();
    let (table, c1, _) = table_with_cells();
    session.on_annotation_created(1, table);
    assert!(session.selection().table_mode);
    session.on_annotation_created(1, c1);
    assert!(!session.selection().table_mode);
}

#[test]
fn test_tool_params_survive_switching_tools() {
    let mut session = offline();
    session.on_change_selected_tool(ImageTool::Eraser);
    let mut params = session.tools().params().cloned().unwrap();
    assert_eq!(params.value("radius"), Some(40.0));
    params.set_value("radius", 90.0);
    session.set_selected_tool_params(params);

    session.on_change_selected_tool(ImageTool::Wand);
    assert_eq!(session.tools().params().unwrap().value("threshold"), Some(35.0));
    session.on_change_selected_tool(ImageTool::Pen);
    assert!(session.tools().params().is_none());

    session.on_change_selected_tool(ImageTool::Eraser);
    assert_eq!(session.tools().params().unwrap().value("radius"), Some(90.0));
}
