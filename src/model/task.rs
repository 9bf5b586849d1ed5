//! Task, document and token layout records fetched from the backend.

use serde::{Deserialize, Serialize};

use super::annotation::{Bound, PageNumber};

pub type TaskId = u64;
pub type JobId = u64;
pub type FileId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: JobId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: FileId,
}

/// An annotation or validation task assigned to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job: JobRef,
    pub file: FileRef,
    pub pages: Vec<PageNumber>,
    #[serde(default)]
    pub is_validation: bool,
    pub user_id: String,
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: FileId,
    #[serde(default)]
    pub name: String,
    /// Page count.
    pub pages: u32,
}

impl Document {
    /// 1-based page numbers of the whole document.
    pub fn page_numbers(&self) -> Vec<PageNumber> {
        (1..=self.pages).collect()
    }
}

/// Page dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are non-zero.
    pub fn is_known(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// One text token on a page, in the token source's native coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub bbox: [f32; 4],
}

/// Token layout of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPage {
    pub page_num: PageNumber,
    pub size: PageSize,
    #[serde(default)]
    pub objs: Vec<Token>,
}

/// A token positioned in display coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PageToken {
    pub text: String,
    pub bound: Bound,
}
