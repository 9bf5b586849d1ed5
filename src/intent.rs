//! Intent messages for driving a session.
//!
//! Every synchronous session operation has a message form, so a UI or a
//! recorded script can drive the engine with plain data.

use serde::{Deserialize, Serialize};

use crate::data_attrs::DetailTab;
use crate::model::{
    Annotation, AnnotationChanges, AnnotationId, CategoryId, ImageTool, Link, PageNumber, PageSize,
    SelectionType,
};
use crate::selection::ToolParams;
use crate::session::AnnotatorSession;

/// Messages that change session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    // Annotations
    /// A new annotation was drawn
    Create {
        page: PageNumber,
        annotation: Annotation,
    },
    Delete {
        page: PageNumber,
        id: AnnotationId,
    },
    /// Partial update; without a page the owning page is looked up
    Edit {
        #[serde(default)]
        page: Option<PageNumber>,
        id: AnnotationId,
        changes: AnnotationChanges,
    },
    DeleteLink {
        page: PageNumber,
        id: AnnotationId,
        link: Link,
    },
    Undo,
    Redo,
    Copy {
        page: PageNumber,
        id: AnnotationId,
    },
    Cut {
        page: PageNumber,
        id: AnnotationId,
    },
    Paste {
        page: PageNumber,
        size: PageSize,
    },

    // Selection and tools
    SelectCategory {
        category_id: CategoryId,
    },
    SelectLink {
        link: Link,
    },
    ChangeSelectionType {
        selection_type: SelectionType,
    },
    ChangeTool {
        tool: ImageTool,
    },
    SetToolParams {
        params: ToolParams,
    },
    SetTableMode {
        enabled: bool,
    },
    SetTableCellCategory {
        #[serde(default)]
        category_id: Option<CategoryId>,
    },
    SetPageSize {
        size: PageSize,
    },
    ChangePage {
        page: PageNumber,
    },

    // Detail panel
    AnnotationClick {
        id: AnnotationId,
    },
    AnnotationDoubleClick {
        id: AnnotationId,
    },
    EmptyAreaClick,
    /// Edit one attribute value of the selected annotation
    DataAttributeChange {
        index: usize,
        value: String,
    },
    CloseExternalViewer,
    CloseDataTab,
    SetTab {
        tab: DetailTab,
    },

    // Page validation (current page)
    MarkValid,
    MarkInvalid,
    BeginEdit,
    CancelEdit,
    AddTouchedPage,
    ClearTouchedPages,
}

impl AnnotatorSession {
    /// Apply one intent.
    pub fn dispatch(&mut self, intent: Intent) {
        log::trace!("Dispatch: {:?}", intent);
        match intent {
            Intent::Create { page, annotation } => {
                self.on_annotation_created(page, annotation);
            }
            Intent::Delete { page, id } => {
                self.on_annotation_deleted(page, id);
            }
            Intent::Edit { page, id, changes } => {
                self.on_annotation_edited(page, id, &changes);
            }
            Intent::DeleteLink { page, id, link } => {
                self.on_link_deleted(page, id, &link);
            }
            Intent::Undo => {
                self.undo();
            }
            Intent::Redo => {
                self.redo();
            }
            Intent::Copy { page, id } => {
                self.on_annotation_copy(page, id);
            }
            Intent::Cut { page, id } => {
                self.on_annotation_cut(page, id);
            }
            Intent::Paste { page, size } => {
                self.on_annotation_paste(size, page);
            }
            Intent::SelectCategory { category_id } => {
                if !self.select_category_by_id(&category_id) {
                    log::warn!("Unknown category '{}'", category_id);
                }
            }
            Intent::SelectLink { link } => self.on_link_selected(link),
            Intent::ChangeSelectionType { selection_type } => {
                self.on_change_selection_type(selection_type)
            }
            Intent::ChangeTool { tool } => self.on_change_selected_tool(tool),
            Intent::SetToolParams { params } => self.set_selected_tool_params(params),
            Intent::SetTableMode { enabled } => self.set_table_mode(enabled),
            Intent::SetTableCellCategory { category_id } => {
                self.set_table_cell_category(category_id)
            }
            Intent::SetPageSize { size } => self.set_page_size(size),
            Intent::ChangePage { page } => self.on_current_page_change(page),
            Intent::AnnotationClick { id } => {
                self.on_annotation_click(id);
            }
            Intent::AnnotationDoubleClick { id } => {
                self.on_annotation_double_click(id);
            }
            Intent::EmptyAreaClick => self.on_empty_area_click(),
            Intent::DataAttributeChange { index, value } => {
                self.on_data_attributes_change(index, value);
            }
            Intent::CloseExternalViewer => self.on_external_viewer_close(),
            Intent::CloseDataTab => self.on_close_data_tab(),
            Intent::SetTab { tab } => self.set_tab(tab),
            Intent::MarkValid => self.on_valid_click(),
            Intent::MarkInvalid => self.on_invalid_click(),
            Intent::BeginEdit => self.on_edit_click(),
            Intent::CancelEdit => self.on_cancel_click(),
            Intent::AddTouchedPage => self.on_add_touched_page(),
            Intent::ClearTouchedPages => self.on_clear_touched_pages(),
        }
    }
}
