//! Task Annotator - annotation editing engine
//!
//! Holds the annotations drawn on the pages of a document together with the
//! selection, tool, undo and page-validation state of one editing session,
//! and reconciles local edits with a remote backend through revisioned saves.
//!
//! [`session::AnnotatorSession`] is the entry point: load it from an
//! [`backend::AnnotationBackend`], drive it with intents, save it back.

pub mod backend;
pub mod config;
pub mod data_attrs;
pub mod error;
pub mod format;
pub mod intent;
pub mod model;
pub mod selection;
pub mod session;
pub mod store;
pub mod undo;
pub mod validation;

pub use error::{EngineError, Result};
pub use session::{AnnotatorSession, FinishOutcome, LoadSource, SaveMode, SaveOutcome};
