// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fragment sources: Tesseract TSV files, and the `ocrs` engine when the
// `ocr` feature is enabled.

use std::io;

use satzwerk_pipeline::SourceError;

#[cfg(feature = "ocr")]
pub mod ocr;
pub mod tsv;

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrFragmentSource};
pub use tsv::TesseractTsvSource;

/// Map a read failure to the retry class it belongs to.
pub(crate) fn classify_io(context: &str, err: &io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            SourceError::Unavailable(format!("{context}: {err}"))
        }
        _ => SourceError::Corrupt(format!("{context}: {err}")),
    }
}
