// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text output: one paragraph per block, blank line between blocks,
// form feed between pages.

use satzwerk_core::{DocumentModel, Result};

use super::DocumentAssembler;

const PAGE_SEPARATOR: &str = "\u{000C}\n";
const INDENT: &str = "    ";

/// Plain UTF-8 text, indented by block level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAssembler;

impl TextAssembler {
    /// The whole document as one string.
    pub fn render(&self, model: &DocumentModel) -> String {
        let pages: Vec<String> = model
            .pages()
            .map(|page| {
                page.blocks
                    .iter()
                    .map(|block| {
                        let indent = INDENT.repeat(block.indent_level as usize);
                        format!("{indent}{}\n", block.text())
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect();
        pages.join(PAGE_SEPARATOR)
    }
}

impl DocumentAssembler for TextAssembler {
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>> {
        Ok(self.render(model).into_bytes())
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}
