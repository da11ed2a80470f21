// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page geometry in pixel coordinates (origin top-left, y grows downward).

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatzwerkError};

/// Axis-aligned box in page pixel coordinates.
///
/// Width and height are always strictly positive; construct through
/// [`Rect::new`] to uphold that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

impl Rect {
    /// Create a rectangle, rejecting non-finite values and empty extents.
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Result<Self> {
        if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
            return Err(SatzwerkError::InvalidGeometry(format!(
                "non-finite rect ({x}, {y}, {w}, {h})"
            )));
        }
        if w <= 0.0 || h <= 0.0 {
            return Err(SatzwerkError::InvalidGeometry(format!(
                "rect must have positive size, got {w}x{h}"
            )));
        }
        Ok(Self { x, y, w, h })
    }

    /// A 1x1 box at the origin, used for synthetic content.
    pub fn unit() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.w
    }

    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h / 2.0
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x: left,
            y: top,
            w: right - left,
            h: bottom - top,
        }
    }

    /// Horizontal distance from this box's right edge to `other`'s left edge.
    /// Negative when the boxes overlap horizontally.
    pub fn gap_to(&self, other: &Rect) -> f32 {
        other.left() - self.right()
    }
}

/// Pixel dimensions of a recognised page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}
