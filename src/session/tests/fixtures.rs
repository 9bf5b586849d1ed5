//! Shared fixture for session tests.

use crate::backend::{Fixture, InMemoryBackend, LatestAnnotations};
use crate::config::EngineConfig;
use crate::format::{ObjectData, ObjectEntry, PageEntry};
use crate::model::{
    Annotation, AnnotationId, Bound, BoundType, Category, DataAttribute, Document, FileRef,
    JobRef, PageSize, Task, Token, TokenPage,
};
use crate::{AnnotatorSession, LoadSource};

pub const TASK_ID: u64 = 10;

pub fn categories() -> Vec<Category> {
    vec![
        Category::new("1", "Name").with_color("#ff0000"),
        Category::new("2", "Formula")
            .with_color("#00ff00")
            .with_attribute("caption", "text")
            .with_attribute("structure", "molecule"),
        Category::new("3", "Table").with_color("#0000ff"),
    ]
}

pub fn task(is_validation: bool) -> Task {
    Task {
        id: TASK_ID,
        job: JobRef { id: 1 },
        file: FileRef { id: 2 },
        pages: vec![1, 2],
        is_validation,
        user_id: "annotator".to_string(),
    }
}

pub fn object(id: AnnotationId, kind: &str, bbox: [f32; 4], category: &str) -> ObjectEntry {
    ObjectEntry {
        id,
        kind: kind.to_string(),
        bbox,
        category: category.to_string(),
        text: None,
        segmentation: None,
        data: None,
        children: None,
        links: Vec::new(),
    }
}

/// Two pages of 200x200; page 1 holds a box with a formula attribute, page 2 is empty.
pub fn fixture(is_validation: bool) -> Fixture {
    let mut formula = object(100, "box", [10.0, 10.0, 60.0, 30.0], "2");
    formula.data = Some(ObjectData {
        data_attributes: vec![DataAttribute::new("caption", "text", "benzene")],
    });

    let mut page1 = PageEntry::new(1, PageSize::new(200.0, 200.0));
    page1.objs.push(formula);
    let page2 = PageEntry::new(2, PageSize::new(200.0, 200.0));

    Fixture {
        tasks: vec![task(is_validation)],
        categories: categories(),
        document: Some(Document {
            id: 2,
            name: "paper.pdf".to_string(),
            pages: 2,
        }),
        tokens: vec![
            TokenPage {
                page_num: 1,
                size: PageSize::new(200.0, 200.0),
                objs: vec![
                    Token {
                        text: "hello".to_string(),
                        bbox: [12.0, 12.0, 30.0, 20.0],
                    },
                    Token {
                        text: "world".to_string(),
                        bbox: [32.0, 12.0, 55.0, 20.0],
                    },
                ],
            },
            TokenPage {
                page_num: 2,
                size: PageSize::new(200.0, 200.0),
                objs: Vec::new(),
            },
        ],
        annotations: LatestAnnotations {
            revision: "rev-0".to_string(),
            pages: vec![page1, page2],
            validated: Vec::new(),
            failed_validation_pages: vec![2],
        },
    }
}

pub fn backend() -> InMemoryBackend {
    InMemoryBackend::new(fixture(false))
}

pub fn load(backend: &InMemoryBackend) -> AnnotatorSession {
    pollster::block_on(AnnotatorSession::load(
        backend,
        LoadSource::Task(TASK_ID),
        EngineConfig::default(),
    ))
    .expect("session loads")
}

/// Empty session, nothing fetched.
pub fn offline() -> AnnotatorSession {
    AnnotatorSession::new(EngineConfig::default())
}

pub fn boxed(id: AnnotationId, bound: Bound) -> Annotation {
    Annotation::new(id, BoundType::Box, bound, "1")
}
