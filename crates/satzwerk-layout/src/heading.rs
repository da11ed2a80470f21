// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Heading detection: short blocks set in capitals or centred.

use satzwerk_core::config::HeadingThresholds;
use satzwerk_core::{Alignment, BlockRole, Line};

/// Share of upper-case letters among the cased letters of `text`, or `None`
/// when fewer than two cased letters are present.
pub fn caps_ratio(text: &str) -> Option<f32> {
    let (upper, cased) = text.chars().fold((0usize, 0usize), |(upper, cased), c| {
        if c.is_uppercase() {
            (upper + 1, cased + 1)
        } else if c.is_lowercase() {
            (upper, cased + 1)
        } else {
            (upper, cased)
        }
    });
    (cased >= 2).then(|| upper as f32 / cased as f32)
}

/// Decide whether a block reads as a heading or body text.
pub fn classify_role(lines: &[Line], alignment: Alignment, thresholds: &HeadingThresholds) -> BlockRole {
    if lines.is_empty() || lines.len() > thresholds.max_lines {
        return BlockRole::Paragraph;
    }
    let text: String = lines.iter().map(Line::text).collect::<Vec<_>>().join(" ");
    let Some(ratio) = caps_ratio(&text) else {
        return BlockRole::Paragraph;
    };
    if ratio >= thresholds.caps_ratio || alignment == Alignment::Center {
        BlockRole::Heading
    } else {
        BlockRole::Paragraph
    }
}
