// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-layout: rebuilds page structure from recognised fragments.
//
// Fragments are grouped into lines by vertical band, lines into blocks by
// spacing, indentation, and edge alignment.  All thresholds are ratios of
// locally measured heights; see `satzwerk_core::config`.

pub mod heading;
pub mod line;
pub mod paragraph;
pub mod stats;

pub use line::{LineClassifier, LineSet};
pub use paragraph::{BlockSet, PageMetrics, ParagraphClassifier};
