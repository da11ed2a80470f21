// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page progress events.  Emission is fire-and-forget: a slow or closed
// sink never holds up the pipeline.

use chrono::{DateTime, Utc};
use satzwerk_core::JobId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How a page reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Merged after the first attempt.
    Ok,
    /// Merged after more than one attempt.
    Retried,
    /// Replaced by a placeholder.
    Failed,
}

/// One page reaching a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub page_index: u32,
    pub status: ProgressStatus,
    /// Attempts made, including the first.
    pub attempt_count: u32,
    /// When the page was merged.
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Event stamped with the current time.
    pub fn new(job_id: JobId, page_index: u32, status: ProgressStatus, attempt_count: u32) -> Self {
        Self {
            job_id,
            page_index,
            status,
            attempt_count,
            at: Utc::now(),
        }
    }
}

/// Receives progress events.  Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        if self.send(event).is_err() {
            debug!("progress receiver closed");
        }
    }
}

impl ProgressSink for mpsc::Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        if let Err(err) = self.try_send(event) {
            debug!(%err, "progress event dropped");
        }
    }
}

/// Writes each event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event.status {
            ProgressStatus::Failed => warn!(
                job_id = %event.job_id,
                page_index = event.page_index,
                attempts = event.attempt_count,
                "page replaced by placeholder"
            ),
            status => info!(
                job_id = %event.job_id,
                page_index = event.page_index,
                attempts = event.attempt_count,
                ?status,
                "page merged"
            ),
        }
    }
}
