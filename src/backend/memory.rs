//! Backend over fixture data held in memory.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    AnnotationBackend, BackendError, LatestAnnotations, LatestAnnotationsQuery, Revision,
    SaveRequest,
};
use crate::model::{Category, Document, FileId, JobId, PageNumber, Task, TaskId, TokenPage};

/// Everything the in-memory backend serves, for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub tokens: Vec<TokenPage>,
    #[serde(default)]
    pub annotations: LatestAnnotations,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug)]
struct MemoryState {
    fixture: Fixture,
    finished: BTreeSet<TaskId>,
    saves: Vec<SaveRequest>,
    next_revision: u64,
    reject_next_save: Option<String>,
}

/// Serves a [`Fixture`] and checks revisions on save.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                fixture,
                finished: BTreeSet::new(),
                saves: Vec::new(),
                next_revision: 1,
                reject_next_save: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Transport("backend state poisoned".to_string()))
    }

    /// Make the next save fail with `Rejected`.
    pub fn reject_next_save(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.lock() {
            state.reject_next_save = Some(message.into());
        }
    }

    /// Current latest revision.
    pub fn latest_revision(&self) -> Option<Revision> {
        self.lock()
            .ok()
            .map(|state| state.fixture.annotations.revision.clone())
    }

    /// Every accepted save request, oldest first.
    pub fn saved_requests(&self) -> Vec<SaveRequest> {
        self.lock()
            .map(|state| state.saves.clone())
            .unwrap_or_default()
    }

    pub fn is_finished(&self, task_id: TaskId) -> bool {
        self.lock()
            .map(|state| state.finished.contains(&task_id))
            .unwrap_or(false)
    }

    /// Copy of the data currently served.
    pub fn snapshot(&self) -> Option<Fixture> {
        self.lock().ok().map(|state| state.fixture.clone())
    }
}

fn filter_pages<T: Clone>(
    items: &[T],
    page_numbers: &[PageNumber],
    page_of: impl Fn(&T) -> PageNumber,
) -> Vec<T> {
    items
        .iter()
        .filter(|item| page_numbers.is_empty() || page_numbers.contains(&page_of(item)))
        .cloned()
        .collect()
}

#[async_trait]
impl AnnotationBackend for InMemoryBackend {
    async fn task(&self, task_id: TaskId) -> Result<Task, BackendError> {
        let state = self.lock()?;
        state
            .fixture
            .tasks
            .iter()
            .find(|task| task.id == task_id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("task {task_id}")))
    }

    async fn categories(&self, _job_id: JobId) -> Result<Vec<Category>, BackendError> {
        Ok(self.lock()?.fixture.categories.clone())
    }

    async fn document(&self, file_id: FileId) -> Result<Document, BackendError> {
        let state = self.lock()?;
        state
            .fixture
            .document
            .clone()
            .filter(|document| document.id == file_id)
            .ok_or_else(|| BackendError::not_found(format!("document for file {file_id}")))
    }

    async fn tokens(
        &self,
        _file_id: FileId,
        page_numbers: &[PageNumber],
    ) -> Result<Vec<TokenPage>, BackendError> {
        let state = self.lock()?;
        Ok(filter_pages(&state.fixture.tokens, page_numbers, |page| {
            page.page_num
        }))
    }

    async fn latest_annotations(
        &self,
        query: &LatestAnnotationsQuery,
    ) -> Result<LatestAnnotations, BackendError> {
        let state = self.lock()?;
        let latest = &state.fixture.annotations;
        if let Some(revision) = &query.revision {
            if *revision != latest.revision {
                return Err(BackendError::not_found(format!("revision {revision}")));
            }
        }
        Ok(LatestAnnotations {
            revision: latest.revision.clone(),
            pages: filter_pages(&latest.pages, &query.page_numbers, |page| page.page_num),
            validated: latest.validated.clone(),
            failed_validation_pages: latest.failed_validation_pages.clone(),
        })
    }

    async fn save_annotations(&self, request: &SaveRequest) -> Result<Revision, BackendError> {
        let mut state = self.lock()?;
        if let Some(message) = state.reject_next_save.take() {
            log::warn!("Save for task {} rejected: {}", request.task_id, message);
            return Err(BackendError::Rejected { message });
        }

        let latest = state.fixture.annotations.revision.clone();
        if request.revision != latest {
            return Err(BackendError::RevisionConflict {
                expected: latest,
                found: request.revision.clone(),
            });
        }

        let revision = format!("rev-{}", state.next_revision);
        state.next_revision += 1;

        let annotations = &mut state.fixture.annotations;
        for page in &request.pages {
            match annotations
                .pages
                .iter_mut()
                .find(|existing| existing.page_num == page.page_num)
            {
                Some(existing) => *existing = page.clone(),
                None => annotations.pages.push(page.clone()),
            }
        }
        annotations.pages.sort_by_key(|page| page.page_num);
        annotations.validated = request.valid_pages.iter().copied().collect();
        annotations.failed_validation_pages = request.invalid_pages.iter().copied().collect();
        annotations.revision = revision.clone();

        state.saves.push(request.clone());
        log::info!(
            "Saved {} page(s) for task {} as revision {}",
            request.pages.len(),
            request.task_id,
            revision
        );
        Ok(revision)
    }

    async fn finish_task(&self, task_id: TaskId) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        if !state.fixture.tasks.iter().any(|task| task.id == task_id) {
            return Err(BackendError::not_found(format!("task {task_id}")));
        }
        state.finished.insert(task_id);
        Ok(())
    }
}
