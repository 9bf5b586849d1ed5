//! Backend page format.
//!
//! Pages are exchanged as `{page_num, size, objs}` where each object carries
//! its geometry as an `[x1, y1, x2, y2]` box in the token source's native
//! coordinates. The engine works in display coordinates, so conversion in
//! both directions takes the token scale (see [`super::token_scale`]).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::error::FormatError;
use super::tokens::text_inside;
use crate::model::{
    Annotation, AnnotationId, Bound, BoundType, Category, CategoryId, DataAttribute, Link, PageNumber,
    PageSize, PageToken,
};
use crate::store::AnnotationStore;

/// One page of annotations as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    /// 1-based page number.
    pub page_num: PageNumber,

    /// Native page size.
    #[serde(default)]
    pub size: PageSize,

    /// Objects drawn on this page, in insertion order.
    #[serde(default)]
    pub objs: Vec<ObjectEntry>,
}

impl PageEntry {
    pub fn new(page_num: PageNumber, size: PageSize) -> Self {
        Self {
            page_num,
            size,
            objs: Vec::new(),
        }
    }
}

/// Attribute values attached to an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    #[serde(rename = "dataAttributes", default)]
    pub data_attributes: Vec<DataAttribute>,
}

/// One annotation as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub id: AnnotationId,

    /// Bound type tag (`box`, `table_cell`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// `[x1, y1, x2, y2]` in native coordinates.
    pub bbox: [f32; 4],

    /// Category id.
    pub category: CategoryId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Flat polygon outline `[x1, y1, x2, y2, ...]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ObjectData>,

    /// Cell ids, for tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<AnnotationId>>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl ObjectEntry {
    /// Create from an engine annotation, scaling display geometry back to native.
    pub fn from_annotation(
        annotation: &Annotation,
        scale: f32,
        attributes: Option<&[DataAttribute]>,
    ) -> Self {
        let inverse = 1.0 / scale;
        Self {
            id: annotation.id,
            kind: annotation.bound_type.as_str().to_string(),
            bbox: annotation.bound.scaled(inverse).to_bbox(),
            category: annotation.category.clone(),
            text: annotation.text.clone(),
            segmentation: annotation.segments.as_ref().map(|points| {
                points
                    .iter()
                    .flat_map(|(x, y)| [x * inverse, y * inverse])
                    .collect()
            }),
            data: attributes
                .filter(|attrs| !attrs.is_empty())
                .map(|attrs| ObjectData {
                    data_attributes: attrs.to_vec(),
                }),
            children: (!annotation.children.is_empty()).then(|| annotation.children.clone()),
            links: annotation.links.clone(),
        }
    }

    /// Convert to an engine annotation, denormalizing label and color from
    /// the matching category.
    pub fn to_annotation(
        &self,
        scale: f32,
        categories: &[Category],
    ) -> Result<Annotation, FormatError> {
        let bound_type = BoundType::from_tag(&self.kind)
            .ok_or_else(|| FormatError::unknown_bound_type(&self.kind, self.id))?;

        let segments = match &self.segmentation {
            Some(flat) if flat.len() % 2 != 0 => {
                return Err(FormatError::invalid_coordinates(format!(
                    "object {} has an odd number of segmentation values",
                    self.id
                )));
            }
            Some(flat) => Some(
                flat.chunks_exact(2)
                    .map(|pair| (pair[0] * scale, pair[1] * scale))
                    .collect(),
            ),
            None => None,
        };

        let category = categories.iter().find(|c| c.id == self.category);
        let mut annotation = Annotation::new(
            self.id,
            bound_type,
            Bound::from_bbox(self.bbox).scaled(scale),
            self.category.clone(),
        );
        annotation.label = category.map(|c| c.name.clone());
        annotation.color = category.and_then(|c| c.color().map(str::to_string));
        annotation.text = self.text.clone();
        annotation.segments = segments;
        annotation.links = self.links.clone();
        annotation.children = self.children.clone().unwrap_or_default();
        Ok(annotation)
    }
}

// ============================================================================
// Page conversion
// ============================================================================

/// Build the page mapping from backend pages.
///
/// Object ids must be unique across the whole document.
pub fn pages_from_api(
    pages: &[PageEntry],
    categories: &[Category],
    scale: f32,
) -> Result<BTreeMap<PageNumber, Vec<Annotation>>, FormatError> {
    let mut seen = std::collections::HashSet::new();
    let mut result = BTreeMap::new();
    for page in pages {
        let mut annotations = Vec::with_capacity(page.objs.len());
        for obj in &page.objs {
            if !seen.insert(obj.id) {
                return Err(FormatError::invalid_format(format!(
                    "object id {} appears more than once",
                    obj.id
                )));
            }
            annotations.push(obj.to_annotation(scale, categories)?);
        }
        result.insert(page.page_num, annotations);
    }
    Ok(result)
}

/// Collect entered attribute values per object id.
pub fn data_attributes_from_api(pages: &[PageEntry]) -> HashMap<AnnotationId, Vec<DataAttribute>> {
    pages
        .iter()
        .flat_map(|page| &page.objs)
        .filter_map(|obj| {
            obj.data
                .as_ref()
                .map(|data| (obj.id, data.data_attributes.clone()))
        })
        .collect()
}

/// Everything needed to turn live pages back into backend pages.
pub struct PageSerializer<'a> {
    pub store: &'a AnnotationStore,
    /// Tokens in display coordinates.
    pub tokens: &'a BTreeMap<PageNumber, Vec<PageToken>>,
    /// Native size per page.
    pub native_sizes: &'a BTreeMap<PageNumber, PageSize>,
    pub attributes: &'a HashMap<AnnotationId, Vec<DataAttribute>>,
    /// Display size, used when a page has no known native size.
    pub display_size: Option<PageSize>,
    pub scale: f32,
}

impl PageSerializer<'_> {
    /// Serialize one page.
    pub fn page(&self, page: PageNumber) -> PageEntry {
        let size = self
            .native_sizes
            .get(&page)
            .copied()
            .filter(PageSize::is_known)
            .or_else(|| {
                self.display_size
                    .map(|s| PageSize::new(s.width / self.scale, s.height / self.scale))
            })
            .unwrap_or_default();

        let tokens = self.tokens.get(&page).map(Vec::as_slice).unwrap_or(&[]);
        let mut entry = PageEntry::new(page, size);
        entry.objs = self
            .store
            .page(page)
            .iter()
            .map(|annotation| {
                let mut obj = ObjectEntry::from_annotation(
                    annotation,
                    self.scale,
                    self.attributes.get(&annotation.id).map(Vec::as_slice),
                );
                if annotation.bound_type.collects_text() && !tokens.is_empty() {
                    obj.text = Some(text_inside(&annotation.bound, tokens));
                }
                obj
            })
            .collect();
        entry
    }

    /// Serialize the given pages in order.
    pub fn pages<'p>(&self, pages: impl IntoIterator<Item = &'p PageNumber>) -> Vec<PageEntry> {
        pages.into_iter().map(|page| self.page(*page)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkType;

    fn categories() -> Vec<Category> {
        vec![Category::new("7", "Name").with_color("#ff0000")]
    }

    fn object(id: AnnotationId, kind: &str) -> ObjectEntry {
        ObjectEntry {
            id,
            kind: kind.to_string(),
            bbox: [10.0, 10.0, 30.0, 50.0],
            category: "7".to_string(),
            text: None,
            segmentation: None,
            data: None,
            children: None,
            links: Vec::new(),
        }
    }

    #[test]
    fn test_object_json_shape() {
        let json = r#"{
            "id": 3,
            "type": "table",
            "bbox": [0, 0, 100, 40],
            "category": "7",
            "data": {"dataAttributes": [{"name": "n", "type": "text", "value": "v"}]},
            "children": [4, 5],
            "links": [{"category_id": "7", "to": 9, "page_num": 2, "type": "directional"}]
        }"#;
        let obj: ObjectEntry = serde_json::from_str(json).unwrap();
        assert_eq!(obj.children, Some(vec![4, 5]));
        assert_eq!(obj.links[0].kind, LinkType::Directional);

        let annotation = obj.to_annotation(1.0, &categories()).unwrap();
        assert_eq!(annotation.bound_type, BoundType::Table);
        assert_eq!(annotation.label.as_deref(), Some("Name"));
        assert_eq!(annotation.color.as_deref(), Some("#ff0000"));
        assert_eq!(annotation.children, vec![4, 5]);
    }

    #[test]
    fn test_scale_applies_both_ways() {
        let annotation = object(1, "box").to_annotation(2.0, &categories()).unwrap();
        assert_eq!(annotation.bound, Bound::new(20.0, 20.0, 40.0, 80.0));

        let back = ObjectEntry::from_annotation(&annotation, 2.0, None);
        assert_eq!(back.bbox, [10.0, 10.0, 30.0, 50.0]);
        assert!(back.data.is_none());
        assert!(back.children.is_none());
    }

    #[test]
    fn test_unknown_type_and_bad_segmentation_rejected() {
        let err = object(1, "ellipse").to_annotation(1.0, &[]).unwrap_err();
        assert!(matches!(err, FormatError::UnknownBoundType { id: 1, .. }));

        let mut obj = object(2, "polygon");
        obj.segmentation = Some(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            obj.to_annotation(1.0, &[]),
            Err(FormatError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_across_pages_rejected() {
        let mut first = PageEntry::new(1, PageSize::default());
        first.objs.push(object(1, "box"));
        let mut second = PageEntry::new(2, PageSize::default());
        second.objs.push(object(1, "box"));

        let result = pages_from_api(&[first, second], &categories(), 1.0);
        assert!(matches!(result, Err(FormatError::InvalidFormat { .. })));
    }

    #[test]
    fn test_serializer_fills_text_and_sizes() {
        let mut store = AnnotationStore::new();
        store.create(
            1,
            Annotation::new(1, BoundType::Box, Bound::new(0.0, 0.0, 100.0, 20.0), "7"),
        );
        store.create(
            1,
            Annotation::new(2, BoundType::Table, Bound::new(0.0, 0.0, 100.0, 20.0), "7"),
        );
        let tokens = BTreeMap::from([(
            1,
            vec![
                PageToken {
                    text: "hello".to_string(),
                    bound: Bound::new(0.0, 0.0, 40.0, 10.0),
                },
                PageToken {
                    text: "world".to_string(),
                    bound: Bound::new(50.0, 0.0, 40.0, 10.0),
                },
                PageToken {
                    text: "outside".to_string(),
                    bound: Bound::new(0.0, 30.0, 40.0, 10.0),
                },
            ],
        )]);
        let native_sizes = BTreeMap::from([(1, PageSize::new(50.0, 100.0))]);
        let attributes = HashMap::from([(1, vec![DataAttribute::new("n", "text", "v")])]);

        let serializer = PageSerializer {
            store: &store,
            tokens: &tokens,
            native_sizes: &native_sizes,
            attributes: &attributes,
            display_size: Some(PageSize::new(100.0, 200.0)),
            scale: 2.0,
        };
        let pages = serializer.pages(&[1, 3]);

        assert_eq!(pages[0].size, PageSize::new(50.0, 100.0));
        assert_eq!(pages[0].objs[0].text.as_deref(), Some("hello world"));
        assert_eq!(pages[0].objs[0].bbox, [0.0, 0.0, 50.0, 10.0]);
        assert!(pages[0].objs[0].data.is_some());
        assert_eq!(pages[0].objs[1].text, None);

        // No native size known: derived from the display size
        assert_eq!(pages[1].size, PageSize::new(50.0, 100.0));
        assert!(pages[1].objs.is_empty());
    }
}
