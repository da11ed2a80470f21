// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Aggregate outcome of a conversion job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::model::DocumentModel;
use crate::types::{JobId, PageWarning};

/// A page that ended in a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page_index: u32,
    pub kind: ErrorKind,
    /// Message of the last error seen for the page.
    pub detail: String,
    /// Attempts made before giving up.
    pub attempts: u32,
}

/// Everything that went wrong (or was skipped) during a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<PageFailure>,
    /// Pages never scheduled because the job was cancelled.
    pub skipped: Vec<u32>,
    /// Page-level warnings raised by the classifiers across all pages.
    pub warnings: usize,
    /// Lines dropped as malformed, a subset of `warnings`.
    #[serde(default)]
    pub malformed_lines: usize,
}

impl FailureReport {
    /// An empty report stamped with the current time.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            started_at: Utc::now(),
            finished_at: None,
            failures: Vec::new(),
            skipped: Vec::new(),
            warnings: 0,
            malformed_lines: 0,
        }
    }

    /// Count the classifier annotations of a finished page.
    pub fn record_warnings(&mut self, warnings: &[PageWarning]) {
        self.warnings += warnings.len();
        self.malformed_lines += warnings
            .iter()
            .filter(|w| w.kind() == Some(ErrorKind::MalformedLine))
            .count();
    }

    /// Record a failed page, replacing any earlier failure of the same page.
    pub fn record_failure(&mut self, failure: PageFailure) {
        self.failures.retain(|f| f.page_index != failure.page_index);
        self.failures.push(failure);
        self.failures.sort_by_key(|f| f.page_index);
    }

    /// Record a page dropped by cancellation; kept sorted and unique.
    pub fn record_skipped(&mut self, page_index: u32) {
        if let Err(pos) = self.skipped.binary_search(&page_index) {
            self.skipped.insert(pos, page_index);
        }
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// No page failed and none was skipped.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// The result of a finished (or cancelled) job: the document plus its
/// failure report.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub model: DocumentModel,
    pub report: FailureReport,
    /// Number of distinct page indices submitted.
    pub submitted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_stay_sorted_and_unique() {
        let mut report = FailureReport::new(JobId::new());
        for (index, attempts) in [(7, 1), (2, 3), (7, 2)] {
            report.record_failure(PageFailure {
                page_index: index,
                kind: ErrorKind::PageCorrupt,
                detail: "bad".into(),
                attempts,
            });
        }
        let indices: Vec<u32> = report.failures.iter().map(|f| f.page_index).collect();
        assert_eq!(indices, vec![2, 7]);
        assert_eq!(report.failures[1].attempts, 2);
    }

    #[test]
    fn skipped_pages_are_deduplicated() {
        let mut report = FailureReport::new(JobId::new());
        report.record_skipped(4);
        report.record_skipped(1);
        report.record_skipped(4);
        assert_eq!(report.skipped, vec![1, 4]);
        assert!(!report.is_clean());
    }

    #[test]
    fn malformed_lines_are_counted_among_warnings() {
        let mut report = FailureReport::new(JobId::new());
        report.record_warnings(&[
            PageWarning::MalformedLine { position: 0 },
            PageWarning::LowConfidence { fragments: 4 },
        ]);
        report.record_warnings(&[PageWarning::MalformedLine { position: 5 }]);
        assert_eq!(report.warnings, 3);
        assert_eq!(report.malformed_lines, 2);
    }
}
