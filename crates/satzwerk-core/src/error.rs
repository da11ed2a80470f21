// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Satzwerk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::Conversion;

/// Top-level error type for all Satzwerk operations.
#[derive(Debug, Error)]
pub enum SatzwerkError {
    // -- Recognition / page errors --
    #[error("recognition engine unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("page data corrupt: {0}")]
    PageCorrupt(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    // -- Orchestration --
    #[error("conversion cancelled after {} of {} pages", .0.model.recognized_count(), .0.submitted)]
    OrchestrationCancelled(Box<Conversion>),

    #[error("worker task failed: {0}")]
    Worker(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Output --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("ODT packaging failed: {0}")]
    OdtError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SatzwerkError {
    /// The page-level failure category this error maps to, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::RecognitionUnavailable(_) => Some(ErrorKind::RecognitionUnavailable),
            Self::PageCorrupt(_) | Self::InvalidGeometry(_) => Some(ErrorKind::PageCorrupt),
            Self::OrchestrationCancelled(_) => Some(ErrorKind::OrchestrationCancelled),
            Self::Worker(_) => Some(ErrorKind::WorkerCrashed),
            _ => None,
        }
    }
}

/// Page-level failure categories, as recorded in `PageResult::Failed` and
/// the failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The recognition engine was busy or unreachable; retried with backoff.
    RecognitionUnavailable,
    /// The page data cannot be recognised at all; never retried.
    PageCorrupt,
    /// A single line had no usable content and was dropped.
    MalformedLine,
    /// The job was cancelled before this page was processed.
    OrchestrationCancelled,
    /// The page worker panicked.
    WorkerCrashed,
}

impl ErrorKind {
    /// Whether a failure of this kind may succeed on a later attempt.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RecognitionUnavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::RecognitionUnavailable => "recognition unavailable",
            Self::PageCorrupt => "page corrupt",
            Self::MalformedLine => "malformed line",
            Self::OrchestrationCancelled => "cancelled",
            Self::WorkerCrashed => "worker crashed",
        };
        f.write_str(label)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SatzwerkError>;
