//! Remote collaborators of the editing engine.
//!
//! The engine only awaits these calls; it never spawns. Fetch failures are
//! tolerated during load, save failures are handed back to the caller.

mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::PageEntry;
use crate::model::{
    Category, Document, FileId, JobId, PageNumber, Task, TaskId, TokenPage,
};

pub use memory::{Fixture, InMemoryBackend};

/// Opaque revision token used for optimistic concurrency.
pub type Revision = String;

/// Failures reported by a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The save was based on an outdated revision
    #[error("Revision conflict: latest is '{expected}', request was based on '{found}'")]
    RevisionConflict { expected: Revision, found: Revision },

    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The backend refused the request
    #[error("Rejected: {message}")]
    Rejected { message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Which annotations to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestAnnotationsQuery {
    pub job_id: JobId,
    pub file_id: FileId,
    /// `None` for the latest revision.
    pub revision: Option<Revision>,
    pub page_numbers: Vec<PageNumber>,
}

/// Annotation state of a file at one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestAnnotations {
    pub revision: Revision,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
    #[serde(default)]
    pub validated: Vec<PageNumber>,
    #[serde(default)]
    pub failed_validation_pages: Vec<PageNumber>,
}

/// Body of the persistence call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub task_id: TaskId,
    pub pages: Vec<PageEntry>,
    pub user_id: String,
    /// Revision the edits are based on.
    pub revision: Revision,
    pub valid_pages: BTreeSet<PageNumber>,
    pub invalid_pages: BTreeSet<PageNumber>,
}

/// Data source of an annotation session.
#[async_trait]
pub trait AnnotationBackend: Send + Sync {
    async fn task(&self, task_id: TaskId) -> Result<Task, BackendError>;

    async fn categories(&self, job_id: JobId) -> Result<Vec<Category>, BackendError>;

    async fn document(&self, file_id: FileId) -> Result<Document, BackendError>;

    async fn tokens(
        &self,
        file_id: FileId,
        page_numbers: &[PageNumber],
    ) -> Result<Vec<TokenPage>, BackendError>;

    async fn latest_annotations(
        &self,
        query: &LatestAnnotationsQuery,
    ) -> Result<LatestAnnotations, BackendError>;

    /// Persist a page batch. Returns the new revision.
    async fn save_annotations(&self, request: &SaveRequest) -> Result<Revision, BackendError>;

    async fn finish_task(&self, task_id: TaskId) -> Result<(), BackendError>;
}
