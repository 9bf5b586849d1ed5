//! Category data model: annotation categories and their data-attribute schema.

use serde::{Deserialize, Serialize};

/// Category identifier as issued by the backend.
pub type CategoryId = String;

/// Display metadata of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMetadata {
    /// CSS color string, e.g. `#ff0000`.
    #[serde(default)]
    pub color: Option<String>,
}

/// One attribute definition of a category's data schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAttributeSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// An annotation category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<CategoryMetadata>,
    #[serde(default)]
    pub data_attributes: Vec<DataAttributeSchema>,
}

impl Category {
    /// Create a new category with the given ID and name.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata: None,
            data_attributes: Vec::new(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.metadata = Some(CategoryMetadata {
            color: Some(color.into()),
        });
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.data_attributes.push(DataAttributeSchema {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }

    pub fn color(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.color.as_deref())
    }
}

/// A data attribute with the value entered for one annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

impl DataAttribute {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            value: value.into(),
        }
    }
}
