//! Test doubles shared across module tests.

use crate::font::{FontRef, TextMeasurer, VerticalMetrics};
use crate::text::FontWeight;

/// Every character advances half an em; ascent 0.8em, descent 0.2em.
#[derive(Debug, Clone)]
pub(crate) struct FixedMeasurer {
    has_fonts: bool,
}

impl Default for FixedMeasurer {
    fn default() -> Self {
        Self { has_fonts: true }
    }
}

impl FixedMeasurer {
    pub(crate) fn without_fonts() -> Self {
        Self { has_fonts: false }
    }
}

impl TextMeasurer for FixedMeasurer {
    fn resolve_font(&self, family: &str, weight: FontWeight) -> Option<FontRef> {
        self.has_fonts
            .then(|| FontRef::new(format!("fixed:{family}:{}", weight.0)))
    }

    fn text_width(&self, _font: &FontRef, size: f32, text: &str, letter_spacing: f32) -> f32 {
        text.chars().count() as f32 * (size * 0.5 + letter_spacing)
    }

    fn vertical_metrics(&self, _font: &FontRef, size: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: size * 0.8,
            descent: size * 0.2,
        }
    }
}
