//! Percent and pixel placement rules shared by every stage.
//!
//! All functions here are total: out-of-range or non-finite input is clamped or
//! replaced by a default, never rejected.

use crate::types::{CanvasSize, PercentPoint, PixelPoint, PixelRect, clamp_percent};

pub const DEFAULT_ELEMENT_SIZE: f64 = 100.0;

/// Rectangle as it appears in a document, before resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RectSpec {
    /// Absolute pixels.
    Pixels {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Percentages of the canvas.
    Percent {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl RectSpec {
    /// Unresolved `(x, y, width, height)` in canvas pixels, without clamping.
    pub fn to_pixels(self, canvas: CanvasSize) -> (f64, f64, f64, f64) {
        match self {
            RectSpec::Pixels {
                x,
                y,
                width,
                height,
            } => (x, y, width, height),
            RectSpec::Percent {
                x,
                y,
                width,
                height,
            } => (
                x / 100.0 * canvas.width as f64,
                y / 100.0 * canvas.height as f64,
                width / 100.0 * canvas.width as f64,
                height / 100.0 * canvas.height as f64,
            ),
        }
    }

    /// Moves the origin to a pixel position, keeping the rect's own units.
    pub fn set_origin_px(&mut self, px: f64, py: f64, canvas: CanvasSize) {
        match self {
            RectSpec::Pixels { x, y, .. } => {
                *x = px;
                *y = py;
            }
            RectSpec::Percent { x, y, .. } => {
                *x = px / canvas.width.max(1) as f64 * 100.0;
                *y = py / canvas.height.max(1) as f64 * 100.0;
            }
        }
    }
}

/// Rounds half away from zero, the same way for both signs.
pub fn round_half_away(value: f64) -> i64 {
    value.round() as i64
}

/// `percent / 100 * dimension` rounded to the nearest pixel.
pub fn percent_to_px(percent: f64, dimension: u32) -> i64 {
    round_half_away(percent / 100.0 * dimension as f64)
}

/// Resolves a text anchor. The point is clamped to [2, 98] before conversion.
pub fn resolve_point(point: PercentPoint, canvas: CanvasSize) -> PixelPoint {
    let p = point.clamped();
    PixelPoint {
        x: percent_to_px(p.x, canvas.width),
        y: percent_to_px(p.y, canvas.height),
    }
}

/// Resolves a rectangle into canvas pixels.
///
/// The rect is intersected with the canvas: an origin outside the canvas is pulled
/// to the nearest edge and the size shrinks by the overflow, the far edges never
/// cross `canvas.width` / `canvas.height`.
pub fn resolve_rect(rect: RectSpec, canvas: CanvasSize) -> PixelRect {
    let (x, y, width, height) = match rect {
        RectSpec::Pixels {
            x,
            y,
            width,
            height,
        } => (
            finite_or(x, 0.0).round(),
            finite_or(y, 0.0).round(),
            size_or_default(width).round(),
            size_or_default(height).round(),
        ),
        RectSpec::Percent {
            x,
            y,
            width,
            height,
        } => (
            percent_to_px(finite_or(x, 0.0), canvas.width) as f64,
            percent_to_px(finite_or(y, 0.0), canvas.height) as f64,
            percent_to_px(finite_or(width, 0.0).max(0.0), canvas.width) as f64,
            percent_to_px(finite_or(height, 0.0).max(0.0), canvas.height) as f64,
        ),
    };
    let (x, width) = clamp_span(x, width, canvas.width);
    let (y, height) = clamp_span(y, height, canvas.height);
    PixelRect {
        x,
        y,
        width,
        height,
    }
}

/// Pixel width of `percent` of the canvas width, used for text wrap limits.
pub fn percent_of_width(percent: f64, canvas: CanvasSize) -> f32 {
    let pct = finite_or(percent, 90.0).clamp(0.0, 100.0);
    (pct / 100.0 * canvas.width as f64) as f32
}

/// Clamps an element origin so the whole element stays on the canvas.
pub fn clamp_drag(value: f64, size: f64, dimension: u32) -> f64 {
    let max = (dimension as f64 - size).max(0.0);
    finite_or(value, 0.0).clamp(0.0, max)
}

/// Clamps a percent coordinate the same way the resolver does.
pub fn clamp_position(value: f64) -> f64 {
    clamp_percent(value)
}

fn clamp_span(start: f64, len: f64, dimension: u32) -> (u32, u32) {
    let dim = dimension as f64;
    let mut start = start;
    let mut len = len.max(0.0);
    if start < 0.0 {
        len = (len + start).max(0.0);
        start = 0.0;
    }
    let start = start.min(dim);
    let len = len.min(dim - start);
    (start as u32, len as u32)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn size_or_default(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        DEFAULT_ELEMENT_SIZE
    }
}
