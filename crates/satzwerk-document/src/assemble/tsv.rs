// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-line TSV output: `page  line_no  text  bbox`, one row per line with
// line numbers restarting on every page.

use std::fmt::Write;

use satzwerk_core::{DocumentModel, Rect, Result};

use super::DocumentAssembler;

const HEADER: &str = "page\tline_no\ttext\tbbox\n";

/// One row per line, for diffing against the recognition input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvAssembler;

impl TsvAssembler {
    pub fn render(&self, model: &DocumentModel) -> String {
        let mut out = String::from(HEADER);
        for page in model.pages() {
            for (line_no, line) in page.lines().enumerate() {
                // Placeholder geometry is synthetic; leave it out.
                let bbox = if page.is_placeholder() {
                    String::new()
                } else {
                    format_bbox(&line.bbox)
                };
                let _ = writeln!(out, "{}\t{line_no}\t{}\t{bbox}", page.index, clean(&line.text()));
            }
        }
        out
    }
}

impl DocumentAssembler for TsvAssembler {
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>> {
        Ok(self.render(model).into_bytes())
    }

    fn extension(&self) -> &'static str {
        "tsv"
    }
}

/// `[left, top, right, bottom]` in whole pixels.
fn format_bbox(rect: &Rect) -> String {
    format!(
        "[{}, {}, {}, {}]",
        rect.left().round(),
        rect.top().round(),
        rect.right().round(),
        rect.bottom().round()
    )
}

/// Keep a cell on one row and in one column.
fn clean(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
