//! Per-annotation data attributes and the panels they drive.
//!
//! Categories define an attribute schema; each annotation keeps its own
//! entered values. Looking an annotation up merges the two: the schema
//! decides which fields exist, earlier values fill them in. Attribute types
//! listed as external-viewer types open a side panel with the value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationId, Category, DataAttribute, DataAttributeSchema};

/// Tab shown in the detail sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetailTab {
    #[default]
    Categories,
    Data,
}

/// State of the external viewer side panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalViewerState {
    pub is_open: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: String,
}

impl ExternalViewerState {
    fn open(attribute: &DataAttribute) -> Self {
        Self {
            is_open: true,
            kind: attribute.kind.clone(),
            name: attribute.name.clone(),
            value: attribute.value.clone(),
        }
    }
}

/// What the caller should do with the annotation selection after a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEffect {
    Select,
    Deselect,
}

/// Find the attribute schema of the category named (or identified) by `key`.
///
/// `None` when categories are not loaded yet or no category matches.
pub fn category_attributes<'a>(
    key: &str,
    categories: Option<&'a [Category]>,
) -> Option<&'a [DataAttributeSchema]> {
    categories?
        .iter()
        .find(|category| category.name == key || category.id == key)
        .map(|category| category.data_attributes.as_slice())
}

/// Schema fields filled with previously entered values where name and type match.
pub fn merge_attributes(
    schema: &[DataAttributeSchema],
    previous: Option<&[DataAttribute]>,
) -> Vec<DataAttribute> {
    schema
        .iter()
        .map(|field| {
            let value = previous
                .and_then(|prev| {
                    prev.iter()
                        .find(|attr| attr.name == field.name && attr.kind == field.kind)
                })
                .map(|attr| attr.value.clone())
                .unwrap_or_default();
            DataAttribute::new(&field.name, &field.kind, value)
        })
        .collect()
}

/// Attribute values per annotation plus detail-panel state.
#[derive(Debug, Clone)]
pub struct DataAttributeSync {
    values: HashMap<AnnotationId, Vec<DataAttribute>>,
    tab: DetailTab,
    data_tab_disabled: bool,
    category_data_empty: bool,
    external_viewer: ExternalViewerState,
    viewer_types: Vec<String>,
}

impl DataAttributeSync {
    pub fn new(viewer_types: Vec<String>) -> Self {
        Self {
            values: HashMap::new(),
            tab: DetailTab::Categories,
            data_tab_disabled: true,
            category_data_empty: false,
            external_viewer: ExternalViewerState::default(),
            viewer_types,
        }
    }

    pub fn tab(&self) -> DetailTab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: DetailTab) {
        self.tab = tab;
    }

    pub fn is_data_tab_disabled(&self) -> bool {
        self.data_tab_disabled
    }

    pub fn enable_data_tab(&mut self) {
        self.data_tab_disabled = false;
    }

    pub fn is_category_data_empty(&self) -> bool {
        self.category_data_empty
    }

    pub fn external_viewer(&self) -> &ExternalViewerState {
        &self.external_viewer
    }

    /// Entered values of one annotation.
    pub fn values(&self, id: AnnotationId) -> Option<&[DataAttribute]> {
        self.values.get(&id).map(Vec::as_slice)
    }

    pub fn all_values(&self) -> &HashMap<AnnotationId, Vec<DataAttribute>> {
        &self.values
    }

    /// Replace every stored value, e.g. after loading from the backend.
    pub fn replace_values(&mut self, values: HashMap<AnnotationId, Vec<DataAttribute>>) {
        self.values = values;
    }

    pub fn is_viewer_type(&self, kind: &str) -> bool {
        self.viewer_types.iter().any(|t| t == kind)
    }

    /// Selection path (creation, single click).
    pub fn on_select(
        &mut self,
        annotation: &Annotation,
        categories: Option<&[Category]>,
    ) -> SelectionEffect {
        let schema = category_attributes(annotation.category_key(), categories);
        self.data_tab_disabled = matches!(schema, Some(fields) if fields.is_empty());

        match schema {
            Some(fields) if !fields.is_empty() => {
                self.merge_for(annotation.id, fields);
                self.tab = DetailTab::Data;
                self.category_data_empty = false;
                SelectionEffect::Select
            }
            _ => {
                self.tab = DetailTab::Categories;
                self.category_data_empty = true;
                SelectionEffect::Deselect
            }
        }
    }

    /// Double-activation path for non-table annotations: the selection path,
    /// then the external-viewer check on the merged values.
    pub fn on_double_activate(
        &mut self,
        annotation: &Annotation,
        categories: Option<&[Category]>,
    ) -> SelectionEffect {
        let effect = self.on_select(annotation, categories);
        if effect == SelectionEffect::Select {
            let viewer = self
                .values(annotation.id)
                .and_then(|attrs| attrs.iter().find(|attr| self.is_viewer_type(&attr.kind)))
                .map(ExternalViewerState::open);
            if let Some(viewer) = viewer {
                self.external_viewer = viewer;
            }
        }
        effect
    }

    /// Edit one value of an annotation in place.
    ///
    /// Returns `false` when there is no such attribute.
    pub fn set_value(&mut self, id: AnnotationId, index: usize, value: impl Into<String>) -> bool {
        let Some(attribute) = self.values.get_mut(&id).and_then(|attrs| attrs.get_mut(index))
        else {
            return false;
        };
        attribute.value = value.into();

        let attribute = attribute.clone();
        if self.is_viewer_type(&attribute.kind) {
            self.external_viewer = ExternalViewerState::open(&attribute);
        }
        true
    }

    pub fn close_external_viewer(&mut self) {
        self.external_viewer = ExternalViewerState::default();
    }

    /// Back to the categories tab with the data tab disabled and the viewer closed.
    pub fn close_data_tab(&mut self) {
        self.tab = DetailTab::Categories;
        self.data_tab_disabled = true;
        self.close_external_viewer();
    }

    /// Clicking outside any annotation hides the data panel.
    pub fn on_empty_area(&mut self) {
        self.data_tab_disabled = true;
        self.category_data_empty = true;
        self.tab = DetailTab::Categories;
    }

    fn merge_for(&mut self, id: AnnotationId, schema: &[DataAttributeSchema]) {
        let merged = merge_attributes(schema, self.values(id));
        self.values.insert(id, merged);
    }
}
