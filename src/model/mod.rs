//! Data models for the annotation engine.

mod annotation;
mod category;
mod task;

pub use annotation::{
    Annotation, AnnotationChanges, AnnotationId, Bound, BoundType, ImageTool, Link, LinkType,
    LinksBoundType, PageNumber, SelectionType,
};
pub use category::{Category, CategoryId, CategoryMetadata, DataAttribute, DataAttributeSchema};
pub use task::{
    Document, FileId, FileRef, JobId, JobRef, PageSize, PageToken, Task, TaskId, Token, TokenPage,
};
