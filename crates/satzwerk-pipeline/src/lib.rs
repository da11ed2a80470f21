// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-pipeline: fans pages out to a bounded worker pool and merges the
// results back into one ordered document.

pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod source;
pub mod worker;

pub use orchestrator::{CancelHandle, PipelineOrchestrator};
pub use progress::{LogProgress, ProgressEvent, ProgressSink, ProgressStatus};
pub use retry::{RetryDecision, RetryPolicy};
pub use source::{FragmentSource, PageScan, SourceError};
pub use worker::{PageOutcome, PageWorker};
