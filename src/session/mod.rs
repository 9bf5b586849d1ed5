//! The annotation session: every piece of editing state for one document,
//! plus the intents that change it.
//!
//! A session is loaded from an [`AnnotationBackend`], mutated synchronously
//! by intents, and flushed back with [`AnnotatorSession::save_task`] or
//! [`AnnotatorSession::save_edit`]. Only load, reload, save and finish
//! await the backend. Nothing guards against overlapping saves; callers
//! that need it can drive the two halves themselves with
//! [`AnnotatorSession::build_save_request`] and
//! [`AnnotatorSession::complete_save`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::{
    AnnotationBackend, BackendError, LatestAnnotations, LatestAnnotationsQuery, Revision,
    SaveRequest,
};
use crate::config::EngineConfig;
use crate::data_attrs::{DataAttributeSync, DetailTab, SelectionEffect};
use crate::error::{EngineError, Result};
use crate::format::{self, PageSerializer};
use crate::model::{
    Annotation, AnnotationChanges, AnnotationId, BoundType, Category, CategoryId, Document,
    FileId, ImageTool, JobId, Link, PageNumber, PageSize, PageToken, SelectionType, Task, TaskId,
    TokenPage,
};
use crate::selection::{Clipboard, IdMinter, SelectionState, ToolParams, ToolState};
use crate::store::AnnotationStore;
use crate::undo::{UndoEntry, UndoLog, UndoStep};
use crate::validation::ValiditySets;

/// What a session is opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// An assigned task; job, file and pages come from the task.
    Task(TaskId),
    /// A file of a job, without a task. All document pages are loaded.
    Job {
        job_id: JobId,
        file_id: FileId,
        #[serde(default)]
        revision: Option<Revision>,
    },
}

/// Which pages a save persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Every modified page, or only validity for validation tasks.
    Full,
    /// Only the pages in edit mode.
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Required data was not loaded; nothing was sent.
    Skipped,
    /// Accepted by the backend. `refreshed` is false when the refetch afterwards failed.
    Saved { revision: Revision, refreshed: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// No task loaded.
    Skipped,
    Finished { save: SaveOutcome },
}

/// Editing state of one document.
#[derive(Debug)]
pub struct AnnotatorSession {
    config: EngineConfig,

    task: Option<Task>,
    job_id: Option<JobId>,
    file_id: Option<FileId>,
    /// Revision requested on load; cleared once a save makes it stale.
    pinned_revision: Option<Revision>,
    categories: Option<Vec<Category>>,
    document: Option<Document>,
    token_pages: Option<Vec<TokenPage>>,
    latest: Option<LatestAnnotations>,
    page_numbers: Vec<PageNumber>,

    current_page: PageNumber,
    page_size: PageSize,

    store: AnnotationStore,
    undo: UndoLog,
    selection: SelectionState,
    tools: ToolState,
    clipboard: Clipboard,
    minter: IdMinter,
    attrs: DataAttributeSync,
    validity: ValiditySets,
}

impl AnnotatorSession {
    /// Empty session with nothing loaded.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            task: None,
            job_id: None,
            file_id: None,
            pinned_revision: None,
            categories: None,
            document: None,
            token_pages: None,
            latest: None,
            page_numbers: Vec::new(),
            current_page: 1,
            page_size: PageSize::default(),
            store: AnnotationStore::new(),
            undo: UndoLog::new(),
            selection: SelectionState::new(config.default_selection_type),
            tools: ToolState::new(config.default_tool, config.tool_defaults.clone()),
            clipboard: Clipboard::default(),
            minter: IdMinter::new(),
            attrs: DataAttributeSync::new(config.external_viewer_types.clone()),
            validity: ValiditySets::new(),
            config,
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Open a session and fetch everything it needs.
    ///
    /// Only a failed task lookup is fatal. Other fetch failures are logged
    /// and leave that piece of data absent; operations depending on it
    /// then do nothing.
    pub async fn load(
        backend: &dyn AnnotationBackend,
        source: LoadSource,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut session = Self::new(config);

        match source {
            LoadSource::Task(task_id) => {
                let task = backend.task(task_id).await?;
                session.job_id = Some(task.job.id);
                session.file_id = Some(task.file.id);
                session.task = Some(task);
            }
            LoadSource::Job {
                job_id,
                file_id,
                revision,
            } => {
                session.job_id = Some(job_id);
                session.file_id = Some(file_id);
                session.pinned_revision = revision;
            }
        }

        let (Some(job_id), Some(file_id)) = (session.job_id, session.file_id) else {
            return Err(EngineError::NothingToLoad("no job or file".to_string()));
        };

        session.document = fetched("document", backend.document(file_id).await);
        session.page_numbers = match (&session.task, &session.document) {
            (Some(task), _) => task.pages.clone(),
            (None, Some(document)) => document.page_numbers(),
            (None, None) => Vec::new(),
        };
        if let Some(first) = session.page_numbers.first() {
            session.current_page = *first;
        }

        session.categories = fetched("categories", backend.categories(job_id).await);
        session.token_pages = fetched(
            "tokens",
            backend.tokens(file_id, &session.page_numbers).await,
        );
        session.latest = fetched(
            "annotations",
            backend.latest_annotations(&session.latest_query(job_id, file_id)).await,
        );
        session.apply_latest()?;

        log::info!(
            "Loaded session for file {} ({} page(s), {} annotation(s))",
            file_id,
            session.page_numbers.len(),
            session.store.len()
        );
        Ok(session)
    }

    /// Refetch the task and the latest annotations and repopulate the
    /// annotation state. The undo log is kept.
    pub async fn reload(&mut self, backend: &dyn AnnotationBackend) -> Result<()> {
        if let Some(task_id) = self.task.as_ref().map(|task| task.id) {
            self.task = Some(backend.task(task_id).await?);
        }
        self.refetch_annotations(backend).await
    }

    async fn refetch_annotations(&mut self, backend: &dyn AnnotationBackend) -> Result<()> {
        let (Some(job_id), Some(file_id)) = (self.job_id, self.file_id) else {
            return Ok(());
        };
        let latest = backend
            .latest_annotations(&self.latest_query(job_id, file_id))
            .await?;
        self.latest = Some(latest);
        self.apply_latest()
    }

    fn latest_query(&self, job_id: JobId, file_id: FileId) -> LatestAnnotationsQuery {
        LatestAnnotationsQuery {
            job_id,
            file_id,
            revision: self.pinned_revision.clone(),
            page_numbers: self.page_numbers.clone(),
        }
    }

    /// Populate store, attribute values, validity and page size from the
    /// fetched annotations. Needs both annotations and categories.
    fn apply_latest(&mut self) -> Result<()> {
        let (Some(latest), Some(categories)) = (&self.latest, &self.categories) else {
            return Ok(());
        };

        if let Some(first) = latest.pages.first() {
            if first.size.is_known() {
                self.page_size = first.size;
            }
        }
        let scale = format::token_scale(
            Some(self.page_size),
            self.token_pages.as_deref().unwrap_or(&[]),
        );

        let pages = format::pages_from_api(&latest.pages, categories, scale)?;
        let values = format::data_attributes_from_api(&latest.pages);
        self.validity.replace_validity(
            latest.validated.iter().copied(),
            latest.failed_validation_pages.iter().copied(),
        );
        self.store = AnnotationStore::from_pages(pages);
        self.attrs.replace_values(values);
        self.drop_stale_selection();
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn categories(&self) -> Option<&[Category]> {
        self.categories.as_deref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn page_numbers(&self) -> &[PageNumber] {
        &self.page_numbers
    }

    /// Revision the next save will be based on.
    pub fn revision(&self) -> Option<&str> {
        self.latest.as_ref().map(|latest| latest.revision.as_str())
    }

    pub fn current_page(&self) -> PageNumber {
        self.current_page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Shorthand for the page mapping.
    pub fn all_annotations(&self) -> &BTreeMap<PageNumber, Vec<Annotation>> {
        self.store.pages()
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// The selected annotation, if it still exists.
    pub fn selected_annotation(&self) -> Option<&Annotation> {
        let id = self.selection.annotation?;
        self.store.find(id).map(|(_, annotation)| annotation)
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn data_attributes(&self) -> &DataAttributeSync {
        &self.attrs
    }

    pub fn validity(&self) -> &ValiditySets {
        &self.validity
    }

    /// Display width over the token source's native width.
    pub fn token_scale(&self) -> f32 {
        format::token_scale(
            Some(self.page_size),
            self.token_pages.as_deref().unwrap_or(&[]),
        )
    }

    /// Tokens of every page in display coordinates.
    pub fn tokens_by_pages(&self) -> BTreeMap<PageNumber, Vec<PageToken>> {
        format::tokens_by_pages(
            self.token_pages.as_deref().unwrap_or(&[]),
            self.token_scale(),
        )
    }

    // ========================================================================
    // Annotation Intents
    // ========================================================================

    /// Add a drawn annotation and select it. Returns its id, which differs
    /// from the given one if that id was already taken.
    pub fn on_annotation_created(
        &mut self,
        page: PageNumber,
        mut annotation: Annotation,
    ) -> AnnotationId {
        if self.id_taken(annotation.id) {
            let fresh = self.mint_id();
            log::warn!(
                "Annotation id {} already in use, assigned {}",
                annotation.id,
                fresh
            );
            annotation.id = fresh;
        }
        if let Some(category) = &self.selection.category {
            annotation.color = category.color().map(str::to_string);
            annotation.label = Some(category.name.clone());
        }

        let id = annotation.id;
        self.store.create(page, annotation.clone());
        self.validity.mark_modified(page);
        self.selection.table_mode = annotation.bound_type == BoundType::Table;
        self.selection.annotation = Some(id);
        self.attrs.enable_data_tab();
        self.select_with_attributes(&annotation);

        self.undo.record(UndoEntry::add(page, annotation));
        id
    }

    /// Delete an annotation with its table cells. Returns `false` if it was not on `page`.
    pub fn on_annotation_deleted(&mut self, page: PageNumber, id: AnnotationId) -> bool {
        let Some(removal) = self.store.delete(page, id) else {
            return false;
        };
        self.validity.mark_modified(page);
        for trim in &removal.trimmed_links {
            self.validity.mark_modified(trim.page);
        }
        if let Some(entry) = UndoEntry::delete(page, id, removal) {
            self.undo.record(entry);
        }
        self.drop_stale_selection();
        true
    }

    /// Merge `changes` into an annotation. With `page` unknown the owning
    /// page is looked up first. Returns `false` if the annotation does not
    /// exist or `changes` is empty.
    pub fn on_annotation_edited(
        &mut self,
        page: Option<PageNumber>,
        id: AnnotationId,
        changes: &AnnotationChanges,
    ) -> bool {
        if changes.is_empty() {
            return false;
        }
        let Some(page) = page.or_else(|| self.store.locate(id)) else {
            return false;
        };
        let Some(before) = self.store.edit(page, id, changes) else {
            return false;
        };
        self.validity.mark_modified(page);
        self.undo.record(UndoEntry::edit(page, before));
        true
    }

    /// Remove links from an annotation; see [`AnnotationStore::delete_link`]
    /// for which links go.
    pub fn on_link_deleted(&mut self, page: PageNumber, id: AnnotationId, link: &Link) -> bool {
        let Some(before) = self.store.get(page, id).cloned() else {
            return false;
        };
        if !self.store.delete_link(page, id, link) {
            return false;
        }
        self.validity.mark_modified(page);
        self.undo.record(UndoEntry::edit(page, before));
        true
    }

    pub fn undo(&mut self) -> Option<UndoStep> {
        let step = self.undo.undo(&mut self.store)?;
        self.after_replay(&step);
        Some(step)
    }

    pub fn redo(&mut self) -> Option<UndoStep> {
        let step = self.undo.redo(&mut self.store)?;
        self.after_replay(&step);
        Some(step)
    }

    /// An id is taken while the annotation, a history entry or its
    /// attribute values still refer to it.
    fn id_taken(&self, id: AnnotationId) -> bool {
        self.store.contains(id) || self.undo.references(id) || self.attrs.values(id).is_some()
    }

    fn mint_id(&mut self) -> AnnotationId {
        let (store, undo, attrs) = (&self.store, &self.undo, &self.attrs);
        self.minter.next(|id| {
            store.contains(id) || undo.references(id) || attrs.values(id).is_some()
        })
    }

    fn after_replay(&mut self, step: &UndoStep) {
        for page in &step.affected_pages {
            self.validity.mark_modified(*page);
        }
        self.drop_stale_selection();
    }

    pub fn on_annotation_copy(&mut self, page: PageNumber, id: AnnotationId) -> bool {
        match self.store.get(page, id) {
            Some(annotation) => {
                self.clipboard.copy(annotation.clone());
                true
            }
            None => false,
        }
    }

    pub fn on_annotation_cut(&mut self, page: PageNumber, id: AnnotationId) -> bool {
        self.on_annotation_copy(page, id) && self.on_annotation_deleted(page, id)
    }

    /// Paste the clipboard annotation centered on a page of `page_size`.
    /// Returns the new annotation's id.
    pub fn on_annotation_paste(
        &mut self,
        page_size: PageSize,
        page: PageNumber,
    ) -> Option<AnnotationId> {
        let mut annotation = self.clipboard.get()?.clone();
        annotation.id = self.mint_id();
        annotation.bound = annotation
            .bound
            .centered_in(page_size.width, page_size.height);

        let id = annotation.id;
        self.store.create(page, annotation.clone());
        self.validity.mark_modified(page);
        self.undo.record(UndoEntry::add(page, annotation));
        Some(id)
    }

    // ========================================================================
    // Selection Intents
    // ========================================================================

    pub fn on_category_selected(&mut self, category: Category) {
        log::debug!("Category selected: {}", category.name);
        self.selection.category = Some(category);
    }

    /// Select a loaded category by id. Returns `false` if there is none.
    pub fn select_category_by_id(&mut self, id: &str) -> bool {
        let found = self
            .categories
            .as_ref()
            .and_then(|categories| categories.iter().find(|c| c.id == id))
            .cloned();
        match found {
            Some(category) => {
                self.on_category_selected(category);
                true
            }
            None => false,
        }
    }

    pub fn on_link_selected(&mut self, link: Link) {
        self.selection.link = Some(link);
    }

    pub fn on_change_selection_type(&mut self, selection_type: SelectionType) {
        self.selection.selection_type = selection_type;
    }

    /// Switch image tools. Image tools draw polygons.
    pub fn on_change_selected_tool(&mut self, tool: ImageTool) {
        self.tools.select(tool);
        self.selection.selection_type = SelectionType::Bound(BoundType::Polygon);
    }

    pub fn set_selected_tool_params(&mut self, params: ToolParams) {
        self.tools.set_params(params);
    }

    pub fn set_table_mode(&mut self, table_mode: bool) {
        self.selection.table_mode = table_mode;
    }

    pub fn set_table_cell_category(&mut self, category: Option<CategoryId>) {
        self.selection.table_cell_category = category;
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
    }

    pub fn on_current_page_change(&mut self, page: PageNumber) {
        self.current_page = page;
    }

    // ========================================================================
    // Data Attribute Intents
    // ========================================================================

    pub fn on_annotation_click(&mut self, id: AnnotationId) -> bool {
        let Some((_, annotation)) = self.store.find(id) else {
            return false;
        };
        let annotation = annotation.clone();
        self.select_with_attributes(&annotation);
        true
    }

    /// Tables enter table mode; other annotations open their attributes
    /// and, for external-viewer types, the viewer.
    pub fn on_annotation_double_click(&mut self, id: AnnotationId) -> bool {
        let Some((_, annotation)) = self.store.find(id) else {
            return false;
        };
        let annotation = annotation.clone();

        if annotation.bound_type == BoundType::Table {
            self.selection.table_mode = true;
            self.attrs.set_tab(DetailTab::Data);
            self.selection.annotation = Some(annotation.id);
            return true;
        }
        self.selection.table_mode = false;

        let effect = self
            .attrs
            .on_double_activate(&annotation, self.categories.as_deref());
        self.apply_selection_effect(effect, annotation.id);
        true
    }

    /// Change one attribute value of the selected annotation.
    pub fn on_data_attributes_change(&mut self, index: usize, value: impl Into<String>) -> bool {
        match self.selection.annotation {
            Some(id) => self.attrs.set_value(id, index, value),
            None => false,
        }
    }

    pub fn on_empty_area_click(&mut self) {
        self.attrs.on_empty_area();
        self.selection.annotation = None;
    }

    pub fn on_external_viewer_close(&mut self) {
        self.attrs.close_external_viewer();
    }

    pub fn on_close_data_tab(&mut self) {
        self.attrs.close_data_tab();
    }

    pub fn set_tab(&mut self, tab: DetailTab) {
        self.attrs.set_tab(tab);
    }

    fn select_with_attributes(&mut self, annotation: &Annotation) {
        let effect = self.attrs.on_select(annotation, self.categories.as_deref());
        self.apply_selection_effect(effect, annotation.id);
    }

    fn apply_selection_effect(&mut self, effect: SelectionEffect, id: AnnotationId) {
        self.selection.annotation = match effect {
            SelectionEffect::Select => Some(id),
            SelectionEffect::Deselect => None,
        };
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = self.selection.annotation {
            if !self.store.contains(id) {
                self.selection.annotation = None;
            }
        }
    }

    // ========================================================================
    // Validation Intents
    // ========================================================================

    pub fn on_valid_click(&mut self) {
        self.validity.mark_valid(self.current_page);
    }

    pub fn on_invalid_click(&mut self) {
        self.validity.mark_invalid(self.current_page);
    }

    pub fn on_edit_click(&mut self) {
        self.validity.begin_edit(self.current_page);
    }

    pub fn on_cancel_click(&mut self) {
        self.attrs.close_data_tab();
        self.validity.cancel_edit(self.current_page);
    }

    pub fn on_add_touched_page(&mut self) {
        self.validity.touch(self.current_page);
    }

    pub fn on_clear_touched_pages(&mut self) {
        self.validity.clear_touched();
    }

    // ========================================================================
    // Saving
    // ========================================================================

    /// Build the persistence request for `mode`, closing the data tab.
    ///
    /// `None` when the task or the annotations are not loaded, or, for edit
    /// saves, when tokens are not loaded.
    pub fn build_save_request(&mut self, mode: SaveMode) -> Option<SaveRequest> {
        let task = self.task.as_ref()?;
        let latest = self.latest.as_ref()?;
        if mode == SaveMode::Edit && self.token_pages.is_none() {
            return None;
        }

        let pages = if mode == SaveMode::Full && task.is_validation {
            let reviewed = self.validity.reviewed_pages();
            latest
                .pages
                .iter()
                .filter(|page| reviewed.contains(&page.page_num))
                .cloned()
                .collect()
        } else {
            let tokens = self.tokens_by_pages();
            let native_sizes = match self.token_pages.as_deref() {
                Some(token_pages) if !token_pages.is_empty() => format::native_sizes(token_pages),
                _ => latest
                    .pages
                    .iter()
                    .map(|page| (page.page_num, page.size))
                    .collect(),
            };
            let serializer = PageSerializer {
                store: &self.store,
                tokens: &tokens,
                native_sizes: &native_sizes,
                attributes: self.attrs.all_values(),
                display_size: Some(self.page_size).filter(PageSize::is_known),
                scale: self.token_scale(),
            };
            match mode {
                SaveMode::Full => serializer.pages(&self.validity.modified_pages),
                SaveMode::Edit => serializer.pages(&self.validity.edited_pages),
            }
        };

        let request = SaveRequest {
            task_id: task.id,
            pages,
            user_id: task.user_id.clone(),
            revision: latest.revision.clone(),
            valid_pages: self.validity.valid_pages.clone(),
            invalid_pages: self.validity.invalid_pages.clone(),
        };
        self.attrs.close_data_tab();
        log::debug!(
            "Save request for task {}: {} page(s) on revision {}",
            request.task_id,
            request.pages.len(),
            request.revision
        );
        Some(request)
    }

    /// Apply the backend's answer to a request built by
    /// [`Self::build_save_request`].
    ///
    /// A failure is returned as is and leaves local state untouched. On
    /// success the annotations are refetched; edit saves also leave edit
    /// mode for the current page.
    pub async fn complete_save(
        &mut self,
        backend: &dyn AnnotationBackend,
        mode: SaveMode,
        request: &SaveRequest,
        result: std::result::Result<Revision, BackendError>,
    ) -> Result<SaveOutcome> {
        let revision = match result {
            Ok(revision) => revision,
            Err(err) => {
                log::warn!("Save for task {} failed: {}", request.task_id, err);
                return Err(err.into());
            }
        };
        log::info!(
            "Saved {} page(s) for task {}, new revision {}",
            request.pages.len(),
            request.task_id,
            revision
        );

        if mode == SaveMode::Edit {
            self.on_cancel_click();
        }
        self.pinned_revision = None;

        let refreshed = match mode {
            SaveMode::Full => self.reload(backend).await,
            SaveMode::Edit => self.refetch_annotations(backend).await,
        };
        let refreshed = match refreshed {
            Ok(()) => {
                if mode == SaveMode::Full {
                    self.validity
                        .clear_modified(request.pages.iter().map(|page| &page.page_num));
                }
                true
            }
            Err(err) => {
                log::warn!("Refetch after save failed: {}", err);
                false
            }
        };
        Ok(SaveOutcome::Saved {
            revision,
            refreshed,
        })
    }

    /// Persist modified pages (or validity only, for validation tasks).
    pub async fn save_task(&mut self, backend: &dyn AnnotationBackend) -> Result<SaveOutcome> {
        self.save(backend, SaveMode::Full).await
    }

    /// Persist the pages in edit mode and leave edit mode.
    pub async fn save_edit(&mut self, backend: &dyn AnnotationBackend) -> Result<SaveOutcome> {
        self.save(backend, SaveMode::Edit).await
    }

    async fn save(
        &mut self,
        backend: &dyn AnnotationBackend,
        mode: SaveMode,
    ) -> Result<SaveOutcome> {
        let Some(request) = self.build_save_request(mode) else {
            log::debug!("Save skipped: task data not loaded");
            return Ok(SaveOutcome::Skipped);
        };
        let result = backend.save_annotations(&request).await;
        self.complete_save(backend, mode, &request, result).await
    }

    /// Save, then mark the task finished. Stops at the first failure.
    pub async fn finish_task(&mut self, backend: &dyn AnnotationBackend) -> Result<FinishOutcome> {
        let Some(task_id) = self.task.as_ref().map(|task| task.id) else {
            return Ok(FinishOutcome::Skipped);
        };
        let save = self.save_task(backend).await?;
        backend.finish_task(task_id).await?;
        log::info!("Task {} finished", task_id);
        Ok(FinishOutcome::Finished { save })
    }
}

/// Keep a fetched value, logging and dropping a failure.
fn fetched<T>(what: &str, result: std::result::Result<T, BackendError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Failed to fetch {}: {}", what, err);
            None
        }
    }
}

#[cfg(test)]
mod tests;
