// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input discovery: page files are numbered by the digits their names start
// with (`0001.tsv`, `12-scan.png`), which also fixes the page order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use satzwerk_core::Result;
use tracing::{debug, info, instrument, warn};

/// One page's input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInput {
    pub page_index: u32,
    pub path: PathBuf,
}

/// The page number a file name starts with, if any.
pub fn leading_number(file_name: &str) -> Option<u32> {
    let digits: &str = {
        let end = file_name
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(file_name.len(), |(i, _)| i);
        &file_name[..end]
    };
    digits.parse().ok()
}

/// List page inputs in `dir` whose extension is one of `extensions`
/// (lower-case, no dot), ordered by page number.
///
/// Files without a leading number are skipped.  When two files share a
/// number, the one whose name sorts first wins.
#[instrument(skip(extensions), fields(dir = %dir.display()))]
pub fn discover_pages(dir: &Path, extensions: &[String]) -> Result<Vec<PageInput>> {
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if matches {
            names.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    names.sort();

    let mut pages: BTreeMap<u32, PathBuf> = BTreeMap::new();
    for (name, path) in names {
        let Some(page_index) = leading_number(&name) else {
            warn!(file = %name, "skipping input without a leading page number");
            continue;
        };
        if let Some(kept) = pages.get(&page_index) {
            warn!(file = %name, kept = %kept.display(), page_index, "duplicate page number");
            continue;
        }
        debug!(file = %name, page_index, "page input found");
        pages.insert(page_index, path);
    }

    info!(pages = pages.len(), "input discovery complete");
    Ok(pages
        .into_iter()
        .map(|(page_index, path)| PageInput { page_index, path })
        .collect())
}
