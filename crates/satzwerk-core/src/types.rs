// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: recognised fragments and the page structure rebuilt
// from them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::geometry::{PageSize, Rect};

/// Unique identifier for one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// A fresh random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single recognised text span as emitted by the recognition stage.
///
/// Fragments are transient: they live only while their page is being
/// classified and are folded into [`Run`]s afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub bbox: Rect,
    /// Estimated from the box bottom when the source reports none.
    pub baseline_y: f32,
    /// Recognition confidence in `0.0..=1.0`.
    pub confidence: f32,
    pub page_index: u32,
}

impl Fragment {
    /// Confidence is clamped into `0.0..=1.0`.
    pub fn new(text: impl Into<String>, bbox: Rect, confidence: f32, page_index: u32) -> Self {
        Self {
            text: text.into(),
            baseline_y: bbox.bottom(),
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            page_index,
        }
    }
}

/// A run of text within a line: one or more fragments glued together
/// because no word space separated them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub bbox: Rect,
    /// Lowest confidence among the fragments merged into this run.
    pub confidence: f32,
    /// Set when any merged fragment fell below the confidence floor.
    pub low_confidence: bool,
}

/// Fragments on the same visual text row, ordered left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub runs: Vec<Run>,
    pub bbox: Rect,
    pub baseline_y: f32,
}

impl Line {
    /// Line text with a single space between runs.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&run.text);
        }
        out
    }

    /// A line with no runs or only whitespace cannot be placed in a block.
    pub fn is_malformed(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }

    /// Whether the last run ends in a hyphen, ignoring trailing spaces.
    pub fn ends_with_hyphen(&self) -> bool {
        self.runs
            .last()
            .is_some_and(|run| run.text.trim_end().ends_with('-'))
    }
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
    Center,
    Justified,
}

/// What a block represents in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    Paragraph,
    Heading,
    /// Stands in for a page whose processing failed.
    Placeholder,
}

/// Contiguous lines belonging to one paragraph, ordered top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub lines: Vec<Line>,
    /// Indent steps relative to the column's left edge.
    pub indent_level: u32,
    pub alignment: Alignment,
    pub role: BlockRole,
}

impl Block {
    /// Block text as a flowing paragraph.
    ///
    /// Lines are joined with a space. A line ending in a hyphen is glued to
    /// the next one; the hyphen itself is dropped when the continuation
    /// starts in lower case.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut pending_hyphen = false;
        for line in &self.lines {
            let text = line.text();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            if pending_hyphen {
                if text.chars().next().is_some_and(char::is_lowercase) {
                    out.pop();
                }
            } else if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
            pending_hyphen = line.ends_with_hyphen();
        }
        out
    }
}

/// Annotations attached to a page by the classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageWarning {
    /// A line without usable content was dropped.
    MalformedLine { position: usize },
    /// Fragments below the confidence floor were kept but flagged.
    LowConfidence { fragments: usize },
}

impl PageWarning {
    /// The failure category of a dropped line; flags on kept content have none.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::MalformedLine { .. } => Some(ErrorKind::MalformedLine),
            Self::LowConfidence { .. } => None,
        }
    }
}

/// Whether a page holds recognised content or stands in for a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    Recognized,
    Placeholder { kind: ErrorKind, detail: String },
}

/// One output page, produced exactly once per input page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub index: u32,
    /// Pixel size of the source page; unknown for placeholders.
    pub size: Option<PageSize>,
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PageWarning>,
    pub status: PageStatus,
}

impl Page {
    /// A successfully reconstructed page, without warnings yet.
    pub fn recognized(index: u32, size: PageSize, blocks: Vec<Block>) -> Self {
        Self {
            index,
            size: Some(size),
            blocks,
            warnings: Vec::new(),
            status: PageStatus::Recognized,
        }
    }

    /// Synthetic page standing in for a terminal failure, holding a single
    /// block that reads `page N failed: <reason>`.
    pub fn placeholder(index: u32, kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let text = format!("page {index} failed: {kind}: {detail}");
        let run = Run {
            text,
            bbox: Rect::unit(),
            confidence: 1.0,
            low_confidence: false,
        };
        let line = Line {
            runs: vec![run],
            bbox: Rect::unit(),
            baseline_y: 1.0,
        };
        Self {
            index,
            size: None,
            blocks: vec![Block {
                lines: vec![line],
                indent_level: 0,
                alignment: Alignment::Left,
                role: BlockRole::Placeholder,
            }],
            warnings: Vec::new(),
            status: PageStatus::Placeholder { kind, detail },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.status, PageStatus::Placeholder { .. })
    }

    /// Lines across all blocks.
    pub fn line_count(&self) -> usize {
        self.blocks.iter().map(|b| b.lines.len()).sum()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.blocks.iter().flat_map(|b| b.lines.iter())
    }
}

/// Outcome of processing one page, handed from a worker to the merge step.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Ok(Page),
    Failed {
        page_index: u32,
        kind: ErrorKind,
        detail: String,
    },
}

impl PageResult {
    pub fn page_index(&self) -> u32 {
        match self {
            Self::Ok(page) => page.index,
            Self::Failed { page_index, .. } => *page_index,
        }
    }
}
