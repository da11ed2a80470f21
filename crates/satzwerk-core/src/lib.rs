// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-core: document model, error definitions and configuration shared
// across all crates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod report;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ErrorKind, Result, SatzwerkError};
pub use geometry::{PageSize, Rect};
pub use model::DocumentModel;
pub use report::{Conversion, FailureReport, PageFailure};
pub use types::*;
