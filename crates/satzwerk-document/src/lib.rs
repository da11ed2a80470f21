// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// satzwerk-document: the edges of a conversion.
//
// Finds page inputs on disk, turns them into fragments for the pipeline
// (Tesseract TSV, or `ocrs` behind the `ocr` feature), and serialises the
// finished document model as PDF, ODT, plain text, TSV or JSON.

pub mod assemble;
pub mod discovery;
pub mod source;

pub use assemble::{
    DocumentAssembler, JsonAssembler, OdtAssembler, PdfAssembler, TextAssembler, TsvAssembler,
    assembler_for,
};
pub use discovery::{PageInput, discover_pages};
pub use source::TesseractTsvSource;
pub use source::tsv::parse_tsv;

#[cfg(feature = "ocr")]
pub use source::{OcrConfig, OcrFragmentSource};
