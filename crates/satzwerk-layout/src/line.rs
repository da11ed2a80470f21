// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fragment-to-line grouping.
//
// Fragments are put into a total order by vertical centre first, so the
// result does not depend on the order the recognition engine emitted them.
// Regular-height fragments are swept top to bottom; a new line opens when a
// fragment's centre leaves the current line's band, whose half-width is a
// fraction of the line's median fragment height.  Height outliers
// (superscripts, footnote markers) are attached afterwards to the nearest
// line whose band contains them, and only form lines of their own when no
// band does.

use std::cmp::Ordering;

use satzwerk_core::config::LineThresholds;
use satzwerk_core::{Fragment, Line, Run};
use tracing::{debug, instrument};

use crate::stats::median;

/// Lines recovered from one page plus the annotations raised on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSet {
    /// Lines ordered top to bottom.
    pub lines: Vec<Line>,
    /// Fragments kept despite falling below the confidence floor.
    pub low_confidence: usize,
}

/// Groups a page's fragments into ordered text lines.
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    thresholds: LineThresholds,
}

impl LineClassifier {
    /// Classifier using `thresholds` for every page.
    pub fn new(thresholds: LineThresholds) -> Self {
        Self { thresholds }
    }

    /// Group `fragments` (in any order) into lines.
    ///
    /// An empty page yields an empty set.  Fragments are never dropped; low
    /// confidence ones are flagged on their run.
    #[instrument(skip_all, fields(fragments = fragments.len()))]
    pub fn classify(&self, mut fragments: Vec<Fragment>) -> LineSet {
        if fragments.is_empty() {
            return LineSet::default();
        }

        fragments.sort_by(vertical_order);

        let heights: Vec<f32> = fragments.iter().map(|f| f.bbox.height()).collect();
        let page_height = median(&heights).unwrap_or(1.0);
        let outlier_cutoff = page_height * self.thresholds.outlier_height_ratio;

        let (regular, outliers): (Vec<Fragment>, Vec<Fragment>) = fragments
            .into_iter()
            .partition(|f| f.bbox.height() >= outlier_cutoff);

        let mut builders = self.sweep(regular);
        let mut orphans = Vec::new();
        for fragment in outliers {
            match self.nearest_band(&builders, &fragment) {
                Some(i) => builders[i].attached.push(fragment),
                None => orphans.push(fragment),
            }
        }
        if !orphans.is_empty() {
            debug!(count = orphans.len(), "outlier fragments form their own lines");
            builders.extend(self.sweep(orphans));
        }

        builders.sort_by(|a, b| {
            a.center()
                .total_cmp(&b.center())
                .then_with(|| a.left().total_cmp(&b.left()))
        });

        let min_confidence = self.thresholds.min_confidence;
        let low_confidence = builders
            .iter()
            .flat_map(|b| b.members.iter().chain(&b.attached))
            .filter(|f| f.confidence < min_confidence)
            .count();
        if low_confidence > 0 {
            debug!(low_confidence, "fragments below confidence floor kept and flagged");
        }

        let lines = builders
            .into_iter()
            .map(|b| b.build(self.thresholds.word_gap_ratio, min_confidence))
            .collect();
        LineSet {
            lines,
            low_confidence,
        }
    }

    /// Sweep fragments (already in vertical order) into line builders.
    fn sweep(&self, fragments: Vec<Fragment>) -> Vec<LineBuilder> {
        let mut builders: Vec<LineBuilder> = Vec::new();
        for fragment in fragments {
            match builders.last_mut() {
                Some(current) if self.in_band(current, &fragment) => current.members.push(fragment),
                _ => builders.push(LineBuilder::start(fragment)),
            }
        }
        builders
    }

    fn in_band(&self, line: &LineBuilder, fragment: &Fragment) -> bool {
        (fragment.bbox.center_y() - line.center()).abs()
            <= self.thresholds.band_tolerance_ratio * line.reference_height()
    }

    fn nearest_band(&self, builders: &[LineBuilder], fragment: &Fragment) -> Option<usize> {
        builders
            .iter()
            .enumerate()
            .filter(|(_, b)| self.in_band(b, fragment))
            .min_by(|(_, a), (_, b)| {
                let da = (fragment.bbox.center_y() - a.center()).abs();
                let db = (fragment.bbox.center_y() - b.center()).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
    }
}

/// A line under construction.  `members` define the band; `attached`
/// outliers ride along without moving it.
#[derive(Debug)]
struct LineBuilder {
    members: Vec<Fragment>,
    attached: Vec<Fragment>,
}

impl LineBuilder {
    fn start(fragment: Fragment) -> Self {
        Self {
            members: vec![fragment],
            attached: Vec::new(),
        }
    }

    fn center(&self) -> f32 {
        let sum: f32 = self.members.iter().map(|f| f.bbox.center_y()).sum();
        sum / self.members.len() as f32
    }

    fn reference_height(&self) -> f32 {
        let heights: Vec<f32> = self.members.iter().map(|f| f.bbox.height()).collect();
        median(&heights).unwrap_or(1.0)
    }

    fn left(&self) -> f32 {
        self.members
            .iter()
            .map(|f| f.bbox.left())
            .fold(f32::INFINITY, f32::min)
    }

    fn build(self, word_gap_ratio: f32, min_confidence: f32) -> Line {
        let height = self.reference_height();
        let baselines: Vec<f32> = self.members.iter().map(|f| f.baseline_y).collect();
        let baseline_y = median(&baselines).unwrap_or(0.0);

        let mut fragments = self.members;
        fragments.extend(self.attached);
        fragments.sort_by(horizontal_order);

        let max_gap = word_gap_ratio * height;
        let mut runs: Vec<Run> = Vec::new();
        let mut bbox = fragments[0].bbox;

        for fragment in fragments {
            // Measured against everything placed so far, so a wide earlier
            // fragment still counts as covering the space.
            let gap = bbox.gap_to(&fragment.bbox);
            bbox = bbox.union(&fragment.bbox);
            let flagged = fragment.confidence < min_confidence;
            match runs.last_mut() {
                Some(run) if gap < max_gap => {
                    run.text.push_str(&fragment.text);
                    run.bbox = run.bbox.union(&fragment.bbox);
                    run.confidence = run.confidence.min(fragment.confidence);
                    run.low_confidence |= flagged;
                }
                _ => runs.push(Run {
                    text: fragment.text,
                    bbox: fragment.bbox,
                    confidence: fragment.confidence,
                    low_confidence: flagged,
                }),
            }
        }

        Line {
            runs,
            bbox,
            baseline_y,
        }
    }
}

/// Total order: vertical centre, then left edge, then the remaining fields
/// so that equal-looking fragments still sort deterministically.
fn vertical_order(a: &Fragment, b: &Fragment) -> Ordering {
    a.bbox
        .center_y()
        .total_cmp(&b.bbox.center_y())
        .then_with(|| a.bbox.left().total_cmp(&b.bbox.left()))
        .then_with(|| tie_break(a, b))
}

fn horizontal_order(a: &Fragment, b: &Fragment) -> Ordering {
    a.bbox
        .left()
        .total_cmp(&b.bbox.left())
        .then_with(|| a.bbox.center_y().total_cmp(&b.bbox.center_y()))
        .then_with(|| tie_break(a, b))
}

fn tie_break(a: &Fragment, b: &Fragment) -> Ordering {
    a.bbox
        .top()
        .total_cmp(&b.bbox.top())
        .then_with(|| a.bbox.width().total_cmp(&b.bbox.width()))
        .then_with(|| a.bbox.height().total_cmp(&b.bbox.height()))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.confidence.total_cmp(&b.confidence))
        .then_with(|| a.baseline_y.total_cmp(&b.baseline_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use satzwerk_core::Rect;

    /// Fragment with the given vertical centre and height.
    fn frag(text: &str, x: f32, center_y: f32, w: f32, h: f32) -> Fragment {
        let rect = Rect::new(x, center_y - h / 2.0, w, h).expect("rect");
        Fragment::new(text, rect, 0.95, 0)
    }

    fn texts(set: &LineSet) -> Vec<String> {
        set.lines.iter().map(Line::text).collect()
    }

    /// Deterministic permutation without an RNG.
    fn permute<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
        let n = items.len();
        for i in (1..n).rev() {
            let j = ((i as u64 + 1).wrapping_mul(6364136223846793005) ^ seed) as usize % (i + 1);
            items.swap(i, j);
        }
        items
    }

    #[test]
    fn empty_page_yields_no_lines() {
        let set = LineClassifier::default().classify(Vec::new());
        assert!(set.lines.is_empty());
        assert_eq!(set.low_confidence, 0);
    }

    #[test]
    fn three_plus_one_fragments_make_two_lines() {
        let fragments = vec![
            frag("three", 100.0, 100.0, 60.0, 20.0),
            frag("one", 10.0, 102.0, 50.0, 20.0),
            frag("two", 65.0, 101.0, 30.0, 20.0),
            frag("four", 10.0, 140.0, 50.0, 20.0),
        ];
        let set = LineClassifier::default().classify(fragments);
        assert_eq!(set.lines.len(), 2);
        assert_eq!(set.lines[0].runs.len(), 3);
        assert_eq!(set.lines[1].runs.len(), 1);
        assert_eq!(texts(&set), vec!["one two three", "four"]);
    }

    #[test]
    fn shuffled_input_gives_identical_lines() {
        let mut fragments = Vec::new();
        for row in 0..6 {
            for col in 0..5 {
                let jitter = ((row * 7 + col * 3) % 5) as f32 - 2.0;
                fragments.push(frag(
                    &format!("w{row}{col}"),
                    20.0 + col as f32 * 70.0,
                    100.0 + row as f32 * 32.0 + jitter,
                    55.0,
                    20.0 + (col % 2) as f32,
                ));
            }
        }
        fragments.push(frag("1", 370.0, 92.0, 6.0, 9.0));

        let classifier = LineClassifier::default();
        let reference = classifier.classify(fragments.clone());
        assert_eq!(reference.lines.len(), 6);
        for seed in [1, 17, 4242, 99_991] {
            let shuffled = permute(fragments.clone(), seed);
            assert_eq!(classifier.classify(shuffled), reference, "seed {seed}");
        }
    }

    #[test]
    fn superscript_joins_line_instead_of_opening_one() {
        let fragments = vec![
            frag("Footnote", 10.0, 100.0, 90.0, 20.0),
            frag("2", 102.0, 93.0, 6.0, 8.0),
            frag("here", 120.0, 101.0, 40.0, 20.0),
        ];
        let set = LineClassifier::default().classify(fragments);
        assert_eq!(set.lines.len(), 1);
        assert_eq!(set.lines[0].text(), "Footnote2 here");
    }

    #[test]
    fn small_fragments_far_from_any_line_form_their_own() {
        let fragments = vec![
            frag("Body", 10.0, 100.0, 60.0, 20.0),
            frag("text", 80.0, 100.0, 50.0, 20.0),
            frag("tiny", 10.0, 300.0, 30.0, 8.0),
            frag("note", 45.0, 300.0, 30.0, 8.0),
        ];
        let set = LineClassifier::default().classify(fragments);
        assert_eq!(texts(&set), vec!["Body text", "tiny note"]);
    }

    #[test]
    fn touching_fragments_merge_into_one_run() {
        let fragments = vec![
            frag("recog", 10.0, 100.0, 50.0, 20.0),
            frag("nised", 61.0, 100.0, 50.0, 20.0),
            frag("text", 130.0, 100.0, 40.0, 20.0),
        ];
        let set = LineClassifier::default().classify(fragments);
        let line = &set.lines[0];
        assert_eq!(line.runs.len(), 2);
        assert_eq!(line.runs[0].text, "recognised");
        assert_eq!(line.text(), "recognised text");
        assert_eq!(line.bbox.left(), 10.0);
        assert_eq!(line.bbox.right(), 170.0);
    }

    #[test]
    fn low_confidence_fragments_are_flagged_not_dropped() {
        let mut weak = frag("blurry", 80.0, 100.0, 50.0, 20.0);
        weak.confidence = 0.1;
        let fragments = vec![frag("clear", 10.0, 100.0, 50.0, 20.0), weak];
        let set = LineClassifier::default().classify(fragments);
        assert_eq!(set.low_confidence, 1);
        let line = &set.lines[0];
        assert_eq!(line.text(), "clear blurry");
        assert!(!line.runs[0].low_confidence);
        assert!(line.runs[1].low_confidence);
    }

    #[test]
    fn band_scales_with_fragment_height() {
        // Same relative layout at two resolutions must group the same way.
        for scale in [1.0_f32, 3.0] {
            let fragments = vec![
                frag("a", 10.0 * scale, 100.0 * scale, 40.0 * scale, 20.0 * scale),
                frag("b", 60.0 * scale, 108.0 * scale, 40.0 * scale, 20.0 * scale),
                frag("c", 10.0 * scale, 125.0 * scale, 40.0 * scale, 20.0 * scale),
            ];
            let set = LineClassifier::default().classify(fragments);
            assert_eq!(texts(&set), vec!["a b", "c"], "scale {scale}");
        }
    }

    #[test]
    fn baseline_is_median_of_members() {
        let fragments: Vec<Fragment> = [
            ("a", 10.0, 100.0, 108.0),
            ("b", 60.0, 101.0, 109.0),
            ("c", 110.0, 99.0, 107.0),
        ]
        .into_iter()
        .map(|(text, x, center_y, baseline_y)| Fragment {
            baseline_y,
            ..frag(text, x, center_y, 40.0, 20.0)
        })
        .collect();
        let set = LineClassifier::default().classify(fragments);
        assert_eq!(set.lines[0].baseline_y, 108.0);
    }
}
