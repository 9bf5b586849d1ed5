//! Annotation types and data structures.

use serde::{Deserialize, Serialize};

use super::category::CategoryId;

/// Unique identifier for an annotation, unique across the whole document.
pub type AnnotationId = u64;

/// 1-based page number within a document.
pub type PageNumber = u32;

/// Geometric/semantic kind of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BoundType {
    #[serde(rename = "box")]
    Box,
    /// Free-form box, the default drawing mode.
    #[default]
    #[serde(rename = "free-box")]
    FreeBox,
    #[serde(rename = "text")]
    Text,
    /// A table; owns its cells through `Annotation::children`.
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "table_cell")]
    TableCell,
    #[serde(rename = "polygon")]
    Polygon,
}

impl BoundType {
    /// Wire tag for this bound type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundType::Box => "box",
            BoundType::FreeBox => "free-box",
            BoundType::Text => "text",
            BoundType::Table => "table",
            BoundType::TableCell => "table_cell",
            BoundType::Polygon => "polygon",
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "box" => Some(BoundType::Box),
            "free-box" => Some(BoundType::FreeBox),
            "text" => Some(BoundType::Text),
            "table" => Some(BoundType::Table),
            "table_cell" => Some(BoundType::TableCell),
            "polygon" => Some(BoundType::Polygon),
            _ => None,
        }
    }

    /// Whether token text under the bound is collected on save.
    pub fn collects_text(&self) -> bool {
        matches!(self, BoundType::Box | BoundType::FreeBox | BoundType::Text)
    }
}

/// Link-drawing modes offered next to the bound types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinksBoundType {
    #[serde(rename = "Chain")]
    Chain,
    #[serde(rename = "All to all")]
    AllToAll,
}

/// Raster/paper tools for image-type annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTool {
    #[default]
    Pen,
    Brush,
    Eraser,
    Wand,
    Dextr,
    Rectangle,
    Select,
}

impl ImageTool {
    /// Get all available image tools.
    pub fn all() -> &'static [ImageTool] {
        &[
            ImageTool::Pen,
            ImageTool::Brush,
            ImageTool::Eraser,
            ImageTool::Wand,
            ImageTool::Dextr,
            ImageTool::Rectangle,
            ImageTool::Select,
        ]
    }

    /// Get the tool name.
    pub fn name(&self) -> &'static str {
        match self {
            ImageTool::Pen => "pen",
            ImageTool::Brush => "brush",
            ImageTool::Eraser => "eraser",
            ImageTool::Wand => "wand",
            ImageTool::Dextr => "dextr",
            ImageTool::Rectangle => "rectangle",
            ImageTool::Select => "select",
        }
    }
}

/// The active selection-type tag: a bound type, a link mode or an image tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionType {
    Bound(BoundType),
    Links(LinksBoundType),
    Tool(ImageTool),
}

impl Default for SelectionType {
    fn default() -> Self {
        SelectionType::Bound(BoundType::FreeBox)
    }
}

/// Axis-aligned geometry of an annotation (top-left corner + size).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bound {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bound {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from a `[x1, y1, x2, y2]` corner box.
    pub fn from_bbox(bbox: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = bbox;
        Self::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    /// Convert to a `[x1, y1, x2, y2]` corner box.
    pub fn to_bbox(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Check if `other` lies fully inside this bound (edges inclusive).
    pub fn contains(&self, other: &Bound) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Same size, positioned so its center is the center of a `width` x `height` area.
    pub fn centered_in(&self, width: f32, height: f32) -> Self {
        Self::new(
            width / 2.0 - self.width / 2.0,
            height / 2.0 - self.height / 2.0,
            self.width,
            self.height,
        )
    }
}

/// Direction semantics of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    #[default]
    Directional,
    Undirectional,
    Omnidirectional,
}

/// A directed relation from one annotation to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub category_id: CategoryId,
    /// Target annotation id.
    pub to: AnnotationId,
    /// Page of the target annotation.
    pub page_num: PageNumber,
    #[serde(rename = "type")]
    pub kind: LinkType,
}

impl Link {
    pub fn new(
        category_id: impl Into<CategoryId>,
        to: AnnotationId,
        page_num: PageNumber,
        kind: LinkType,
    ) -> Self {
        Self {
            category_id: category_id.into(),
            to,
            page_num,
            kind,
        }
    }

    /// Whether this link differs from `other` on every one of its four fields.
    ///
    /// Link removal keeps a link unless this holds, so a link matching the
    /// removal target on any single field survives.
    pub fn differs_entirely_from(&self, other: &Link) -> bool {
        self.category_id != other.category_id
            && self.page_num != other.page_num
            && self.to != other.to
            && self.kind != other.kind
    }
}

/// One drawn object on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub bound_type: BoundType,
    pub bound: Bound,
    /// Category id.
    pub category: CategoryId,
    /// Category name, denormalized at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Category color, denormalized at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Polygon outline for polygon/image-tool bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<(f32, f32)>>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// For tables: ids of the `table_cell` annotations it owns.
    #[serde(default)]
    pub children: Vec<AnnotationId>,
}

impl Annotation {
    /// Create a new annotation with the given geometry and category.
    pub fn new(
        id: AnnotationId,
        bound_type: BoundType,
        bound: Bound,
        category: impl Into<CategoryId>,
    ) -> Self {
        Self {
            id,
            bound_type,
            bound,
            category: category.into(),
            label: None,
            color: None,
            text: None,
            segments: None,
            links: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    pub fn with_children(mut self, children: Vec<AnnotationId>) -> Self {
        self.children = children;
        self
    }

    /// Whether deleting this annotation cascades onto table cells.
    pub fn owns_cells(&self) -> bool {
        self.bound_type == BoundType::Table && !self.children.is_empty()
    }

    /// Name used to look up the category schema (label first, then category id).
    pub fn category_key(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.category)
    }
}

/// A partial update merged shallowly into an annotation. The id is never touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationChanges {
    pub bound_type: Option<BoundType>,
    pub bound: Option<Bound>,
    pub category: Option<CategoryId>,
    pub label: Option<String>,
    pub color: Option<String>,
    pub text: Option<String>,
    pub segments: Option<Vec<(f32, f32)>>,
    pub links: Option<Vec<Link>>,
    pub children: Option<Vec<AnnotationId>>,
}

impl AnnotationChanges {
    pub fn bound(bound: Bound) -> Self {
        Self {
            bound: Some(bound),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the present fields into `annotation`.
    pub fn apply_to(&self, annotation: &mut Annotation) {
        if let Some(bound_type) = self.bound_type {
            annotation.bound_type = bound_type;
        }
        if let Some(bound) = self.bound {
            annotation.bound = bound;
        }
        if let Some(category) = &self.category {
            annotation.category = category.clone();
        }
        if let Some(label) = &self.label {
            annotation.label = Some(label.clone());
        }
        if let Some(color) = &self.color {
            annotation.color = Some(color.clone());
        }
        if let Some(text) = &self.text {
            annotation.text = Some(text.clone());
        }
        if let Some(segments) = &self.segments {
            annotation.segments = Some(segments.clone());
        }
        if let Some(links) = &self.links {
            annotation.links = links.clone();
        }
        if let Some(children) = &self.children {
            annotation.children = children.clone();
        }
    }
}
