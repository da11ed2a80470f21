// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The recognition boundary: anything that can hand over a page's fragments.

use satzwerk_core::{Fragment, PageSize, SatzwerkError};
use thiserror::Error;

/// Raw recognition output for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    /// Page extent in source pixels.
    pub size: PageSize,
    /// Fragments in any order.
    pub fragments: Vec<Fragment>,
}

/// Why a source could not deliver a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Busy or unreachable; worth another attempt later.
    #[error("recognition unavailable: {0}")]
    Unavailable(String),
    /// The page data itself is unusable; retrying cannot help.
    #[error("page corrupt: {0}")]
    Corrupt(String),
}

impl From<SourceError> for SatzwerkError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(reason) => Self::RecognitionUnavailable(reason),
            SourceError::Corrupt(reason) => Self::PageCorrupt(reason),
        }
    }
}

/// Supplies recognised fragments per page.
///
/// Calls are synchronous and may block on I/O or inference; the pipeline
/// runs them on the blocking thread pool.
pub trait FragmentSource: Send + Sync {
    /// Fetch every fragment recognised on `page_index`.
    fn get_fragments(&self, page_index: u32) -> Result<PageScan, SourceError>;
}
