//! Per-page validity flags.
//!
//! `valid` and `invalid` exclude each other; the other sets are independent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::PageNumber;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValiditySets {
    pub valid_pages: BTreeSet<PageNumber>,
    pub invalid_pages: BTreeSet<PageNumber>,
    pub edited_pages: BTreeSet<PageNumber>,
    pub touched_pages: BTreeSet<PageNumber>,
    /// Pages with any annotation mutation since the last full save.
    pub modified_pages: BTreeSet<PageNumber>,
}

impl ValiditySets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_valid(&mut self, page: PageNumber) {
        self.invalid_pages.remove(&page);
        self.valid_pages.insert(page);
        log::debug!("Page {} marked valid", page);
    }

    pub fn mark_invalid(&mut self, page: PageNumber) {
        self.valid_pages.remove(&page);
        self.invalid_pages.insert(page);
        log::debug!("Page {} marked invalid", page);
    }

    /// Start editing a page: it is no longer considered invalid.
    pub fn begin_edit(&mut self, page: PageNumber) {
        self.edited_pages.insert(page);
        self.invalid_pages.remove(&page);
    }

    /// Abandon the edit of a page, returning it to the invalid set.
    pub fn cancel_edit(&mut self, page: PageNumber) {
        self.edited_pages.remove(&page);
        self.valid_pages.remove(&page);
        self.invalid_pages.insert(page);
    }

    pub fn touch(&mut self, page: PageNumber) {
        self.touched_pages.insert(page);
    }

    pub fn clear_touched(&mut self) {
        self.touched_pages.clear();
    }

    pub fn mark_modified(&mut self, page: PageNumber) {
        self.modified_pages.insert(page);
    }

    pub fn is_valid(&self, page: PageNumber) -> bool {
        self.valid_pages.contains(&page)
    }

    pub fn is_invalid(&self, page: PageNumber) -> bool {
        self.invalid_pages.contains(&page)
    }

    pub fn is_edited(&self, page: PageNumber) -> bool {
        self.edited_pages.contains(&page)
    }

    /// Replace valid/invalid with the server's view. Pages listed as both
    /// are treated as invalid.
    pub fn replace_validity(
        &mut self,
        valid: impl IntoIterator<Item = PageNumber>,
        invalid: impl IntoIterator<Item = PageNumber>,
    ) {
        self.invalid_pages = invalid.into_iter().collect();
        self.valid_pages = valid
            .into_iter()
            .filter(|page| !self.invalid_pages.contains(page))
            .collect();
    }

    /// Forget modifications of the given pages.
    pub fn clear_modified<'a>(&mut self, pages: impl IntoIterator<Item = &'a PageNumber>) {
        for page in pages {
            self.modified_pages.remove(page);
        }
    }

    /// Pages whose validity should be posted: valid and invalid combined.
    pub fn reviewed_pages(&self) -> BTreeSet<PageNumber> {
        self.valid_pages.union(&self.invalid_pages).copied().collect()
    }
}
