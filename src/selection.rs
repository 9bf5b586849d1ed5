//! Selection, tool and clipboard state.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationId, Category, CategoryId, ImageTool, Link, SelectionType};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Inclusive range of a slider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderBounds {
    pub min: f32,
    pub max: f32,
}

/// One slider value with its range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderValue {
    pub value: f32,
    pub bounds: SliderBounds,
}

/// Kind of parameter panel a tool shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolParamsKind {
    #[serde(rename = "slider-number")]
    SliderNumber,
}

/// Parameter panel of a tool: named sliders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParams {
    #[serde(rename = "type")]
    pub kind: ToolParamsKind,
    pub values: BTreeMap<String, SliderValue>,
}

impl ToolParams {
    /// Slider panel with every slider sharing the same bounds.
    pub fn sliders(values: &[(&str, f32)], min: f32, max: f32) -> Self {
        Self {
            kind: ToolParamsKind::SliderNumber,
            values: values
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        SliderValue {
                            value: *value,
                            bounds: SliderBounds { min, max },
                        },
                    )
                })
                .collect(),
        }
    }

    /// Current value of a slider.
    pub fn value(&self, name: &str) -> Option<f32> {
        self.values.get(name).map(|slider| slider.value)
    }

    /// Set a slider value, clamped to its bounds. Returns `false` for unknown sliders.
    pub fn set_value(&mut self, name: &str, value: f32) -> bool {
        match self.values.get_mut(name) {
            Some(slider) => {
                slider.value = value.clamp(slider.bounds.min, slider.bounds.max);
                true
            }
            None => false,
        }
    }
}

/// Built-in default panels: radius for eraser/brush, threshold/deviation for wand.
pub fn builtin_tool_defaults() -> HashMap<ImageTool, ToolParams> {
    let radius = ToolParams::sliders(&[("radius", 40.0)], 0.0, 150.0);
    HashMap::from([
        (ImageTool::Eraser, radius.clone()),
        (ImageTool::Brush, radius),
        (
            ImageTool::Wand,
            ToolParams::sliders(&[("threshold", 35.0), ("deviation", 15.0)], 0.0, 150.0),
        ),
    ])
}

// ============================================================================
// Tool State
// ============================================================================

/// Active tool plus per-tool memory of the last used parameters.
#[derive(Debug, Clone)]
pub struct ToolState {
    selected: ImageTool,
    params: Option<ToolParams>,
    cache: HashMap<ImageTool, ToolParams>,
    defaults: HashMap<ImageTool, ToolParams>,
}

impl ToolState {
    pub fn new(initial: ImageTool, defaults: HashMap<ImageTool, ToolParams>) -> Self {
        let mut state = Self {
            selected: initial,
            params: None,
            cache: HashMap::new(),
            defaults,
        };
        state.select(initial);
        state
    }

    pub fn selected(&self) -> ImageTool {
        self.selected
    }

    /// Parameters of the active tool, `None` for tools without a panel.
    pub fn params(&self) -> Option<&ToolParams> {
        self.params.as_ref()
    }

    /// Switch tools, restoring the last used parameters or seeding the defaults.
    pub fn select(&mut self, tool: ImageTool) {
        self.selected = tool;
        if !self.cache.contains_key(&tool) {
            if let Some(defaults) = self.defaults.get(&tool) {
                self.cache.insert(tool, defaults.clone());
            }
        }
        self.params = self.cache.get(&tool).cloned();
        log::debug!("Tool selected: {}", tool.name());
    }

    /// Replace the active tool's parameters and remember them for this tool.
    pub fn set_params(&mut self, params: ToolParams) {
        self.cache.insert(self.selected, params.clone());
        self.params = Some(params);
    }

    /// Last remembered parameters of any tool.
    pub fn cached(&self, tool: ImageTool) -> Option<&ToolParams> {
        self.cache.get(&tool)
    }
}

// ============================================================================
// Selection
// ============================================================================

/// What the user currently has selected.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub category: Option<Category>,
    pub link: Option<Link>,
    pub annotation: Option<AnnotationId>,
    pub selection_type: SelectionType,
    /// Editing a table's structure.
    pub table_mode: bool,
    /// Category applied to new table cells.
    pub table_cell_category: Option<CategoryId>,
}

impl SelectionState {
    pub fn new(selection_type: SelectionType) -> Self {
        Self {
            selection_type,
            ..Default::default()
        }
    }
}

// ============================================================================
// Clipboard
// ============================================================================

/// Holds at most one copied annotation.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    copied: Option<Annotation>,
}

impl Clipboard {
    pub fn copy(&mut self, annotation: Annotation) {
        log::debug!("Clipboard: copied annotation {}", annotation.id);
        self.copied = Some(annotation);
    }

    pub fn get(&self) -> Option<&Annotation> {
        self.copied.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.copied.is_none()
    }
}

// ============================================================================
// Id Minting
// ============================================================================

/// Mints annotation ids from the wall clock, strictly increasing per session.
#[derive(Debug, Clone, Default)]
pub struct IdMinter {
    last: AnnotationId,
}

impl IdMinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id that is larger than every id minted so far and not `taken`.
    pub fn next(&mut self, taken: impl Fn(AnnotationId) -> bool) -> AnnotationId {
        let mut id = now_millis().max(self.last + 1);
        while taken(id) {
            id += 1;
        }
        self.last = id;
        id
    }
}

fn now_millis() -> AnnotationId {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as AnnotationId)
        .unwrap_or_default()
}
