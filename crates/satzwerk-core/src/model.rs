// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory document model: ordered pages keyed by page index.
//
// `merge` is the only mutation point.  Pages are stored by index, so the
// order in which workers finish never affects the order of the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Page, PageResult};

/// The structural representation of the whole output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pages: BTreeMap<u32, Page>,
}

/// What a call to [`DocumentModel::merge`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    /// A page already existed at that index and was replaced.
    Replaced,
}

impl DocumentModel {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a page result at its index.
    ///
    /// A failed result becomes a placeholder page, so every merged index
    /// holds exactly one page.  Merging the same index again overwrites.
    pub fn merge(&mut self, result: PageResult) -> MergeOutcome {
        let page = match result {
            PageResult::Ok(page) => page,
            PageResult::Failed {
                page_index,
                kind,
                detail,
            } => Page::placeholder(page_index, kind, detail),
        };
        let index = page.index;
        match self.pages.insert(index, page) {
            Some(_) => {
                debug!(page_index = index, "page replaced in document model");
                MergeOutcome::Replaced
            }
            None => MergeOutcome::Inserted,
        }
    }

    /// Whether a page (recognised or placeholder) exists at `index`.
    pub fn contains(&self, index: u32) -> bool {
        self.pages.contains_key(&index)
    }

    pub fn get(&self, index: u32) -> Option<&Page> {
        self.pages.get(&index)
    }

    /// Pages in ascending page-index order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Pages of either kind.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages holding recognised content (not placeholders).
    pub fn recognized_count(&self) -> usize {
        self.pages.values().filter(|p| !p.is_placeholder()).count()
    }

    /// Pages standing in for failures.
    pub fn placeholder_count(&self) -> usize {
        self.pages.values().filter(|p| p.is_placeholder()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geometry::PageSize;

    fn page(index: u32) -> Page {
        Page::recognized(index, PageSize::new(1000.0, 1400.0), Vec::new())
    }

    #[test]
    fn pages_are_ordered_by_index_not_merge_order() {
        let mut model = DocumentModel::new();
        for index in [3, 0, 2, 1] {
            model.merge(PageResult::Ok(page(index)));
        }
        let order: Vec<u32> = model.pages().map(|p| p.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failed_result_becomes_placeholder() {
        let mut model = DocumentModel::new();
        model.merge(PageResult::Ok(page(0)));
        model.merge(PageResult::Failed {
            page_index: 1,
            kind: ErrorKind::PageCorrupt,
            detail: "unreadable".into(),
        });
        model.merge(PageResult::Ok(page(2)));

        assert_eq!(model.page_count(), 3);
        assert_eq!(model.placeholder_count(), 1);
        assert_eq!(model.recognized_count(), 2);
        assert!(model.get(1).is_some_and(Page::is_placeholder));
    }

    #[test]
    fn merge_same_index_overwrites() {
        let mut model = DocumentModel::new();
        assert_eq!(
            model.merge(PageResult::Failed {
                page_index: 5,
                kind: ErrorKind::RecognitionUnavailable,
                detail: "busy".into(),
            }),
            MergeOutcome::Inserted
        );
        assert_eq!(model.merge(PageResult::Ok(page(5))), MergeOutcome::Replaced);
        assert_eq!(model.page_count(), 1);
        assert!(!model.get(5).is_some_and(Page::is_placeholder));
    }
}
