// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-to-block grouping and alignment classification.
//
// Spacing decisions are normalised by the page's dominant line height (the
// median line height), so the same thresholds hold at any scan resolution.
// A new block starts when the vertical gap to the previous line is large, or
// when the previous line ended short of the text column and the left edge
// then jumps in (first-line indent) or back out (end of a short indented or
// centred block).
//
// Block boundaries depend on the page metrics, so a block's lines re-run
// through [`ParagraphClassifier::classify_in`] with the metrics recorded in
// the [`BlockSet`] come back as the same block.

use satzwerk_core::config::{HeadingThresholds, ParagraphThresholds};
use satzwerk_core::{Alignment, Block, Line, PageWarning};
use tracing::{debug, instrument, warn};

use crate::heading::classify_role;
use crate::stats::{mean, median, quantile, spread};

/// Quantiles used to locate the text column, robust to a few indented or
/// overhanging lines.
const COLUMN_LEFT_QUANTILE: f32 = 0.1;
const COLUMN_RIGHT_QUANTILE: f32 = 0.9;

/// Page-wide measurements every spacing decision is normalised by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    /// Median line height.
    pub dominant_height: f32,
    /// Left column edge, robust to a few protruding lines.
    pub column_left: f32,
    /// Right column edge; at least one line height right of `column_left`.
    pub column_right: f32,
}

impl PageMetrics {
    /// Measure the given lines, or `None` if there are none.
    pub fn measure(lines: &[Line]) -> Option<Self> {
        let heights: Vec<f32> = lines.iter().map(|l| l.bbox.height()).collect();
        let lefts: Vec<f32> = lines.iter().map(|l| l.bbox.left()).collect();
        let rights: Vec<f32> = lines.iter().map(|l| l.bbox.right()).collect();

        let dominant_height = median(&heights)?;
        let column_left = quantile(&lefts, COLUMN_LEFT_QUANTILE)?;
        let column_right = quantile(&rights, COLUMN_RIGHT_QUANTILE)?
            .max(column_left + dominant_height);
        Some(Self {
            dominant_height,
            column_left,
            column_right,
        })
    }

    /// Distance between the column edges.
    pub fn column_width(&self) -> f32 {
        self.column_right - self.column_left
    }

    /// Horizontal axis of the text column.
    pub fn column_center(&self) -> f32 {
        (self.column_left + self.column_right) / 2.0
    }
}

/// Blocks recovered from one page plus the warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSet {
    /// Blocks in reading order.
    pub blocks: Vec<Block>,
    /// One [`PageWarning::MalformedLine`] per dropped line.
    pub warnings: Vec<PageWarning>,
    /// Metrics the blocks were cut with; `None` when no usable line was left.
    pub metrics: Option<PageMetrics>,
}

impl BlockSet {
    /// Lines across all blocks.
    pub fn line_count(&self) -> usize {
        self.blocks.iter().map(|b| b.lines.len()).sum()
    }
}

/// Groups a page's ordered lines into paragraphs.
#[derive(Debug, Clone, Default)]
pub struct ParagraphClassifier {
    paragraphs: ParagraphThresholds,
    headings: HeadingThresholds,
}

impl ParagraphClassifier {
    /// Classifier with the given paragraph and heading thresholds.
    pub fn new(paragraphs: ParagraphThresholds, headings: HeadingThresholds) -> Self {
        Self {
            paragraphs,
            headings,
        }
    }

    /// Group top-to-bottom `lines` into blocks, measuring the page metrics
    /// from the lines themselves.
    ///
    /// Lines without content are skipped and reported as
    /// [`PageWarning::MalformedLine`]; they never fail the page.
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub fn classify(&self, lines: Vec<Line>) -> BlockSet {
        self.classify_measured(lines, None)
    }

    /// Group `lines` against known page metrics, e.g. to re-run a subset of
    /// a page with the metrics from its [`BlockSet`].
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub fn classify_in(&self, lines: Vec<Line>, metrics: &PageMetrics) -> BlockSet {
        self.classify_measured(lines, Some(metrics))
    }

    fn classify_measured(&self, lines: Vec<Line>, known: Option<&PageMetrics>) -> BlockSet {
        let mut warnings = Vec::new();
        let mut usable = Vec::with_capacity(lines.len());
        for (position, line) in lines.into_iter().enumerate() {
            if line.is_malformed() {
                warn!(position, "skipping line without content");
                warnings.push(PageWarning::MalformedLine { position });
            } else {
                usable.push(line);
            }
        }

        let metrics = match known {
            Some(metrics) => *metrics,
            None => match PageMetrics::measure(&usable) {
                Some(metrics) => metrics,
                None => {
                    return BlockSet {
                        blocks: Vec::new(),
                        warnings,
                        metrics: None,
                    };
                }
            },
        };
        debug!(?metrics, "page metrics");

        BlockSet {
            blocks: self.classify_with(usable, &metrics),
            warnings,
            metrics: Some(metrics),
        }
    }

    /// Group well-formed lines using precomputed page metrics.
    pub fn classify_with(&self, lines: Vec<Line>, metrics: &PageMetrics) -> Vec<Block> {
        let mut groups: Vec<Vec<Line>> = Vec::new();
        for line in lines {
            match groups.last_mut() {
                Some(group)
                    if group
                        .last()
                        .is_some_and(|prev| !self.starts_block(prev, &line, metrics)) =>
                {
                    group.push(line)
                }
                _ => groups.push(vec![line]),
            }
        }

        groups
            .into_iter()
            .map(|lines| {
                let alignment = self.alignment(&lines, metrics);
                let indent_level = self.indent_level(&lines, alignment, metrics);
                let role = classify_role(&lines, alignment, &self.headings);
                Block {
                    lines,
                    indent_level,
                    alignment,
                    role,
                }
            })
            .collect()
    }

    /// Whether `line` opens a new block after `prev`.
    fn starts_block(&self, prev: &Line, line: &Line, m: &PageMetrics) -> bool {
        let dominant = m.dominant_height;
        let gap = line.bbox.top() - prev.bbox.bottom();
        if gap > self.paragraphs.break_gap_ratio * dominant {
            return true;
        }

        let prev_short =
            prev.bbox.right() < m.column_left + self.paragraphs.short_line_ratio * m.column_width();
        if !prev_short {
            return false;
        }

        let tolerance = self.paragraphs.indent_tolerance_ratio * dominant;
        let shift = line.bbox.left() - prev.bbox.left();
        if shift.abs() <= tolerance {
            return false;
        }

        // Successive lines of a centred block share an axis but not a left edge.
        let same_axis = (line.bbox.center_x() - prev.bbox.center_x()).abs()
            <= self.paragraphs.alignment_tolerance_ratio * dominant;
        let line_short =
            line.bbox.right() < m.column_left + self.paragraphs.short_line_ratio * m.column_width();
        !(same_axis && line_short)
    }

    fn alignment(&self, lines: &[Line], m: &PageMetrics) -> Alignment {
        let n = lines.len();
        let tolerance = self.paragraphs.alignment_tolerance_ratio * m.dominant_height;

        // The first line may carry an indent and the last may end short.
        let body_lefts: Vec<f32> = lines
            .iter()
            .skip(usize::from(n >= 2))
            .map(|l| l.bbox.left())
            .collect();
        let body_rights: Vec<f32> = lines
            .iter()
            .take(if n >= 2 { n - 1 } else { n })
            .map(|l| l.bbox.right())
            .collect();
        let widths: Vec<f32> = lines
            .iter()
            .take(if n >= 2 { n - 1 } else { n })
            .map(|l| l.bbox.width())
            .collect();
        let centers: Vec<f32> = lines.iter().map(|l| l.bbox.center_x()).collect();

        let left_tight = spread(&body_lefts) <= tolerance;
        let right_tight = spread(&body_rights) <= tolerance;
        let full_width = mean(&widths)
            .is_some_and(|w| w >= self.paragraphs.full_width_ratio * m.column_width());
        let centered = spread(&centers) <= tolerance
            && mean(&centers).is_some_and(|c| (c - m.column_center()).abs() <= tolerance);
        let left_flush = mean(&body_lefts).is_some_and(|l| (l - m.column_left).abs() <= tolerance);
        let right_flush =
            mean(&body_rights).is_some_and(|r| (r - m.column_right).abs() <= tolerance);

        if left_tight && right_tight && full_width {
            return if n >= self.paragraphs.min_justified_lines {
                Alignment::Justified
            } else {
                Alignment::Left
            };
        }
        if centered && !full_width {
            return Alignment::Center;
        }
        if right_tight && (!left_tight || (right_flush && !left_flush)) {
            return Alignment::Right;
        }
        Alignment::Left
    }

    fn indent_level(&self, lines: &[Line], alignment: Alignment, m: &PageMetrics) -> u32 {
        if matches!(alignment, Alignment::Center | Alignment::Right) {
            return 0;
        }
        let body_lefts: Vec<f32> = lines
            .iter()
            .skip(usize::from(lines.len() >= 2))
            .map(|l| l.bbox.left())
            .collect();
        let Some(body_left) = mean(&body_lefts) else {
            return 0;
        };
        let step = self.paragraphs.indent_step_ratio * m.dominant_height;
        ((body_left - m.column_left) / step).round().max(0.0) as u32
    }
}
