// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fragment source over Tesseract `image_to_data` TSV output.
//
// Columns are located by header name, so files from Tesseract versions with
// extra or reordered columns still parse.  Level-1 rows carry the page
// geometry; level-5 rows are words.

use std::collections::BTreeMap;
use std::path::PathBuf;

use satzwerk_core::{Fragment, PageSize, Rect};
use satzwerk_pipeline::{FragmentSource, PageScan, SourceError};
use tracing::{debug, instrument};

use super::classify_io;
use crate::discovery::PageInput;

const PAGE_LEVEL: u32 = 1;
const WORD_LEVEL: u32 = 5;

/// Reads one Tesseract TSV file per page.
#[derive(Debug, Clone, Default)]
pub struct TesseractTsvSource {
    pages: BTreeMap<u32, PathBuf>,
}

impl TesseractTsvSource {
    /// One TSV file per discovered page.
    pub fn new(inputs: impl IntoIterator<Item = PageInput>) -> Self {
        Self {
            pages: inputs
                .into_iter()
                .map(|input| (input.page_index, input.path))
                .collect(),
        }
    }
}

impl FragmentSource for TesseractTsvSource {
    #[instrument(skip(self))]
    fn get_fragments(&self, page_index: u32) -> Result<PageScan, SourceError> {
        let path = self
            .pages
            .get(&page_index)
            .ok_or_else(|| SourceError::Corrupt(format!("no input file for page {page_index}")))?;
        let text = std::fs::read_to_string(path)
            .map_err(|err| classify_io(&path.display().to_string(), &err))?;
        let scan = parse_tsv(&text, page_index)?;
        debug!(page_index, fragments = scan.fragments.len(), "TSV page parsed");
        Ok(scan)
    }
}

/// Column positions resolved from the header row.
struct Columns {
    level: usize,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    conf: usize,
    text: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, SourceError> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| SourceError::Corrupt(format!("TSV header lacks `{name}` column")))
        };
        Ok(Self {
            level: find("level")?,
            left: find("left")?,
            top: find("top")?,
            width: find("width")?,
            height: find("height")?,
            conf: find("conf")?,
            text: find("text")?,
        })
    }
}

/// Parse one page of Tesseract TSV into fragments.
pub fn parse_tsv(text: &str, page_index: u32) -> Result<PageScan, SourceError> {
    let mut rows = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
    let (_, header) = rows
        .next()
        .ok_or_else(|| SourceError::Corrupt("empty TSV file".into()))?;
    let columns = Columns::from_header(header)?;

    let mut size = None;
    let mut fragments = Vec::new();
    for (line_no, row) in rows {
        let cells: Vec<&str> = row.split('\t').collect();
        let number = |index: usize, name: &str| -> Result<f32, SourceError> {
            let cell = cells.get(index).map(|c| c.trim()).unwrap_or_default();
            cell.parse::<f32>().map_err(|_| {
                SourceError::Corrupt(format!("line {}: bad {name} value `{cell}`", line_no + 1))
            })
        };

        let level = number(columns.level, "level")? as u32;
        match level {
            PAGE_LEVEL => {
                size = Some(PageSize::new(
                    number(columns.width, "width")?,
                    number(columns.height, "height")?,
                ));
            }
            WORD_LEVEL => {
                let word = cells.get(columns.text).map(|t| t.trim()).unwrap_or_default();
                let (width, height) = (number(columns.width, "width")?, number(columns.height, "height")?);
                if word.is_empty() || width <= 0.0 || height <= 0.0 {
                    continue;
                }
                let bbox = Rect::new(number(columns.left, "left")?, number(columns.top, "top")?, width, height)
                    .map_err(|err| SourceError::Corrupt(format!("line {}: {err}", line_no + 1)))?;
                let confidence = number(columns.conf, "conf")? / 100.0;
                fragments.push(Fragment::new(word, bbox, confidence, page_index));
            }
            _ => {}
        }
    }

    let size = size
        .or_else(|| extent(&fragments))
        .ok_or_else(|| SourceError::Corrupt("TSV has neither a page row nor words".into()))?;
    Ok(PageScan { size, fragments })
}

/// Smallest page anchored at the origin that holds every fragment.
fn extent(fragments: &[Fragment]) -> Option<PageSize> {
    let first = fragments.first()?;
    let (right, bottom) = fragments.iter().fold(
        (first.bbox.right(), first.bbox.bottom()),
        |(r, b), f| (r.max(f.bbox.right()), b.max(f.bbox.bottom())),
    );
    Some(PageSize::new(right, bottom))
}
