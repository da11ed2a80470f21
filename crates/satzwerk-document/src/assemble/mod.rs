// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serialisation of a finished `DocumentModel` into an output format.

use std::path::Path;

use satzwerk_core::config::{OutputConfig, OutputFormat};
use satzwerk_core::{DocumentModel, Result};
use tracing::info;

pub mod json;
pub mod odt;
pub mod pdf;
pub mod text;
pub mod tsv;

pub use json::JsonAssembler;
pub use odt::OdtAssembler;
pub use pdf::PdfAssembler;
pub use text::TextAssembler;
pub use tsv::TsvAssembler;

/// Turns a document model into file bytes.
///
/// Assemblers accept placeholder pages like any other page.
pub trait DocumentAssembler: Send + Sync {
    /// Serialise the whole model.
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>>;

    /// File extension of the produced format, without a dot.
    fn extension(&self) -> &'static str;

    /// Assemble and write to `path`, creating parent directories.
    fn write_to(&self, model: &DocumentModel, path: &Path) -> Result<()> {
        let bytes = self.assemble(model)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "document written");
        Ok(())
    }
}

/// Metadata title for paginated formats: the output file's stem.
fn document_title(output: &OutputConfig) -> Option<String> {
    let stem = output.file.file_stem()?.to_str()?.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}

/// The assembler for the configured output format.
pub fn assembler_for(output: &OutputConfig) -> Box<dyn DocumentAssembler> {
    let title = document_title(output);
    match output.format {
        OutputFormat::Pdf => {
            let assembler = PdfAssembler::new(output.clone());
            Box::new(match title {
                Some(title) => assembler.with_title(title),
                None => assembler,
            })
        }
        OutputFormat::Odt => {
            let assembler = OdtAssembler::new(output.clone());
            Box::new(match title {
                Some(title) => assembler.with_title(title),
                None => assembler,
            })
        }
        OutputFormat::Txt => Box::new(TextAssembler),
        OutputFormat::Tsv => Box::new(TsvAssembler),
        OutputFormat::Json => Box::new(JsonAssembler),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use satzwerk_core::{
        Alignment, Block, BlockRole, DocumentModel, ErrorKind, Line, Page, PageResult, PageSize,
        Rect, Run,
    };

    pub fn line(text: &str, left: f32, top: f32) -> Line {
        let bbox = Rect::new(left, top, 400.0, 20.0).expect("rect");
        Line {
            runs: vec![Run {
                text: text.into(),
                bbox,
                confidence: 0.9,
                low_confidence: false,
            }],
            bbox,
            baseline_y: top + 16.0,
        }
    }

    pub fn block(role: BlockRole, alignment: Alignment, lines: Vec<Line>) -> Block {
        Block {
            lines,
            indent_level: 0,
            alignment,
            role,
        }
    }

    /// Three pages: a heading and a paragraph, a failed page, a quote.
    pub fn model() -> DocumentModel {
        let mut model = DocumentModel::new();
        model.merge(PageResult::Ok(Page::recognized(
            1,
            PageSize::new(1000.0, 1400.0),
            vec![
                block(BlockRole::Heading, Alignment::Center, vec![line("CHAPTER ONE", 300.0, 80.0)]),
                block(
                    BlockRole::Paragraph,
                    Alignment::Justified,
                    vec![
                        line("The scan was long and hy-", 100.0, 140.0),
                        line("phenated across lines.", 100.0, 170.0),
                    ],
                ),
            ],
        )));
        model.merge(PageResult::Failed {
            page_index: 2,
            kind: ErrorKind::PageCorrupt,
            detail: "unreadable scan".into(),
        });
        let mut quote = block(
            BlockRole::Paragraph,
            Alignment::Left,
            vec![line("An indented\tquote", 180.0, 100.0)],
        );
        quote.indent_level = 1;
        model.merge(PageResult::Ok(Page::recognized(
            3,
            PageSize::new(1000.0, 1400.0),
            vec![quote],
        )));
        model
    }
}
