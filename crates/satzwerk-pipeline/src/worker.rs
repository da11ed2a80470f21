// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One page, end to end: fetch fragments, group them into lines, group lines
// into blocks.

use std::sync::Arc;

use satzwerk_core::config::LayoutConfig;
use satzwerk_core::{ErrorKind, Page, PageWarning, SatzwerkError};
use satzwerk_layout::{LineClassifier, ParagraphClassifier};
use tracing::{debug, instrument, warn};

use crate::source::FragmentSource;

/// Result of a single attempt at a page.
///
/// Failure policy lives in the orchestrator; the worker only reports what
/// went wrong, and the [`ErrorKind`] says whether another attempt could help.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// The page was reconstructed.
    Ready(Page),
    /// The attempt failed.
    Failed { kind: ErrorKind, reason: String },
}

impl From<SatzwerkError> for PageOutcome {
    fn from(err: SatzwerkError) -> Self {
        Self::Failed {
            kind: err.kind().unwrap_or(ErrorKind::PageCorrupt),
            reason: err.to_string(),
        }
    }
}

/// Runs the recognition and layout stages for single pages.
pub struct PageWorker {
    source: Arc<dyn FragmentSource>,
    lines: LineClassifier,
    paragraphs: ParagraphClassifier,
}

impl PageWorker {
    /// Build the line and paragraph classifiers from `layout`.
    pub fn new(source: Arc<dyn FragmentSource>, layout: &LayoutConfig) -> Self {
        Self {
            source,
            lines: LineClassifier::new(layout.lines.clone()),
            paragraphs: ParagraphClassifier::new(layout.paragraphs.clone(), layout.headings.clone()),
        }
    }

    /// Make one attempt at `page_index`.  Blocks on the fragment source.
    #[instrument(skip(self))]
    pub fn process(&self, page_index: u32) -> PageOutcome {
        let scan = match self.source.get_fragments(page_index) {
            Ok(scan) => scan,
            Err(err) => return SatzwerkError::from(err).into(),
        };

        if let Some(stray) = scan.fragments.iter().find(|f| f.page_index != page_index) {
            return SatzwerkError::PageCorrupt(format!(
                "source returned a fragment of page {} for page {page_index}",
                stray.page_index
            ))
            .into();
        }

        let fragment_count = scan.fragments.len();
        let line_set = self.lines.classify(scan.fragments);
        let block_set = self.paragraphs.classify(line_set.lines);

        let mut page = Page::recognized(page_index, scan.size, block_set.blocks);
        if line_set.low_confidence > 0 {
            debug!(page_index, count = line_set.low_confidence, "low-confidence fragments kept");
            page.warnings.push(PageWarning::LowConfidence {
                fragments: line_set.low_confidence,
            });
        }
        for kind in block_set.warnings.iter().filter_map(PageWarning::kind) {
            warn!(page_index, %kind, "line dropped");
        }
        page.warnings.extend(block_set.warnings);

        debug!(
            page_index,
            fragments = fragment_count,
            lines = page.line_count(),
            blocks = page.blocks.len(),
            line_height = block_set.metrics.map(|m| m.dominant_height),
            "page reconstructed"
        );
        PageOutcome::Ready(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satzwerk_core::{Fragment, PageSize, Rect};

    use crate::source::{PageScan, SourceError};

    enum Script {
        Text(Vec<(&'static str, f32, f32)>),
        Busy,
        Broken,
    }

    impl FragmentSource for Script {
        fn get_fragments(&self, page_index: u32) -> Result<PageScan, SourceError> {
            match self {
                Self::Busy => Err(SourceError::Unavailable("engine busy".into())),
                Self::Broken => Err(SourceError::Corrupt("truncated scan".into())),
                Self::Text(words) => Ok(PageScan {
                    size: PageSize::new(1000.0, 1400.0),
                    fragments: words
                        .iter()
                        .map(|&(text, x, y)| {
                            let bbox = Rect::new(x, y, 60.0, 20.0).expect("rect");
                            let confidence = if text.starts_with('?') { 0.1 } else { 0.9 };
                            Fragment::new(text, bbox, confidence, page_index)
                        })
                        .collect(),
                }),
            }
        }
    }

    fn worker(script: Script) -> PageWorker {
        PageWorker::new(Arc::new(script), &LayoutConfig::default())
    }

    #[test]
    fn builds_page_from_fragments() {
        let script = Script::Text(vec![
            ("world", 180.0, 100.0),
            ("hello", 100.0, 101.0),
            ("again", 100.0, 130.0),
        ]);
        let PageOutcome::Ready(page) = worker(script).process(5) else {
            panic!("expected a page");
        };
        assert_eq!(page.index, 5);
        assert_eq!(page.line_count(), 2);
        assert_eq!(page.blocks[0].text(), "hello world again");
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn empty_page_is_valid() {
        let PageOutcome::Ready(page) = worker(Script::Text(Vec::new())).process(0) else {
            panic!("expected a page");
        };
        assert!(page.blocks.is_empty());
        assert!(!page.is_placeholder());
    }

    #[test]
    fn annotations_carry_over_to_page() {
        let script = Script::Text(vec![
            ("?smudge", 100.0, 100.0),
            ("clear", 180.0, 100.0),
            ("  ", 100.0, 130.0),
        ]);
        let PageOutcome::Ready(page) = worker(script).process(1) else {
            panic!("expected a page");
        };
        assert_eq!(page.line_count(), 1);
        assert!(page.warnings.contains(&PageWarning::LowConfidence { fragments: 1 }));
        assert!(page.warnings.contains(&PageWarning::MalformedLine { position: 1 }));
    }

    #[test]
    fn source_errors_map_to_outcomes() {
        let busy = worker(Script::Busy).process(0);
        assert_eq!(
            busy,
            PageOutcome::Failed {
                kind: ErrorKind::RecognitionUnavailable,
                reason: "recognition engine unavailable: engine busy".into(),
            }
        );

        let broken = worker(Script::Broken).process(0);
        assert!(matches!(broken, PageOutcome::Failed { kind: ErrorKind::PageCorrupt, .. }));
    }

    #[test]
    fn errors_without_a_page_kind_are_terminal() {
        let outcome = PageOutcome::from(SatzwerkError::Config("bad layout".into()));
        assert_eq!(
            outcome,
            PageOutcome::Failed {
                kind: ErrorKind::PageCorrupt,
                reason: "invalid configuration: bad layout".into(),
            }
        );
    }

    #[test]
    fn fragments_of_another_page_are_terminal() {
        struct Mixed;
        impl FragmentSource for Mixed {
            fn get_fragments(&self, _page_index: u32) -> Result<PageScan, SourceError> {
                let bbox = Rect::new(0.0, 0.0, 10.0, 10.0).expect("rect");
                Ok(PageScan {
                    size: PageSize::new(100.0, 100.0),
                    fragments: vec![Fragment::new("x", bbox, 1.0, 9)],
                })
            }
        }
        let worker = PageWorker::new(Arc::new(Mixed), &LayoutConfig::default());
        let PageOutcome::Failed { kind, reason } = worker.process(2) else {
            panic!("expected a failure");
        };
        assert_eq!(kind, ErrorKind::PageCorrupt);
        assert!(reason.contains("page 9"));
    }
}
