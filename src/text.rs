//! Text layout and text effects.
//!
//! `layout` turns a [`TextSpec`] into positioned lines centered on an anchor. Width
//! comes from the [`TextMeasurer`], and line widths are the sum of word widths plus
//! inter-word spaces. That keeps re-wrapping a wrapped block stable: the same words
//! always measure the same way no matter which line they land on.

use crate::error::LayoutError;
use crate::font::{FontRef, TextMeasurer};
use crate::geometry::percent_of_width;
use crate::types::{CanvasSize, Color, PixelPoint, RectF, Shading};

pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;
pub const DEFAULT_MAX_WIDTH_PERCENT: f64 = 90.0;
pub const ANIMATION_DURATION_MS: u64 = 1000;

pub const GRADIENT_FROM: Color = Color::rgb(0x66 as f32 / 255.0, 0x7e as f32 / 255.0, 0xea as f32 / 255.0);
pub const GRADIENT_TO: Color = Color::rgb(0x76 as f32 / 255.0, 0x4b as f32 / 255.0, 0xa2 as f32 / 255.0);
const GRADIENT_ANGLE_DEG: f32 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);

    pub fn from_number(value: f64) -> Self {
        if !value.is_finite() {
            return Self::NORMAL;
        }
        FontWeight(value.round().clamp(100.0, 900.0) as u16)
    }

    /// Parses CSS keywords and numeric weights.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" | "regular" => Some(Self::NORMAL),
            "bold" | "bolder" => Some(Self::BOLD),
            "lighter" | "light" => Some(FontWeight(300)),
            other => other.parse::<f64>().ok().map(Self::from_number),
        }
    }

    pub fn is_bold(self) -> bool {
        self.0 >= 600
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" | "end" => Some(Self::Right),
            "justify" => Some(Self::Justify),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationKind {
    #[default]
    None,
    FadeIn,
    SlideInUp,
    SlideInLeft,
    SlideInRight,
    BounceIn,
    ZoomIn,
    Pulse,
    Typewriter,
}

impl AnimationKind {
    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value.trim() {
            "" | "none" => Self::None,
            "fadeIn" => Self::FadeIn,
            "slideInUp" => Self::SlideInUp,
            "slideInLeft" => Self::SlideInLeft,
            "slideInRight" => Self::SlideInRight,
            "bounceIn" => Self::BounceIn,
            "zoomIn" => Self::ZoomIn,
            "pulse" => Self::Pulse,
            "typewriter" => Self::Typewriter,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FadeIn => "fadeIn",
            Self::SlideInUp => "slideInUp",
            Self::SlideInLeft => "slideInLeft",
            Self::SlideInRight => "slideInRight",
            Self::BounceIn => "bounceIn",
            Self::ZoomIn => "zoomIn",
            Self::Pulse => "pulse",
            Self::Typewriter => "typewriter",
        }
    }

    /// Samples the animation at `time_ms`. `None` is the settled frame.
    pub fn frame_at(self, time_ms: Option<u64>) -> AnimationFrame {
        let Some(time_ms) = time_ms else {
            return AnimationFrame::SETTLED;
        };
        if self == Self::Pulse {
            // Pulse loops; every other kind holds its last keyframe.
            let phase = (time_ms % ANIMATION_DURATION_MS) as f32 / ANIMATION_DURATION_MS as f32;
            let scale = if phase < 0.5 {
                lerp(1.0, 1.1, ease_in_out(phase / 0.5))
            } else {
                lerp(1.1, 1.0, ease_in_out((phase - 0.5) / 0.5))
            };
            return AnimationFrame {
                scale,
                ..AnimationFrame::SETTLED
            };
        }
        if time_ms >= ANIMATION_DURATION_MS {
            return AnimationFrame::SETTLED;
        }
        let p = time_ms as f32 / ANIMATION_DURATION_MS as f32;
        let e = ease_in_out(p);
        let settled = AnimationFrame::SETTLED;
        match self {
            Self::None => settled,
            Self::FadeIn => AnimationFrame {
                opacity: e,
                ..settled
            },
            Self::SlideInUp => AnimationFrame {
                opacity: e,
                translate_y: 1.0 - e,
                ..settled
            },
            Self::SlideInLeft => AnimationFrame {
                opacity: e,
                translate_x: -(1.0 - e),
                ..settled
            },
            Self::SlideInRight => AnimationFrame {
                opacity: e,
                translate_x: 1.0 - e,
                ..settled
            },
            Self::BounceIn => {
                // Scale has keyframes at 0/50/70/100%; opacity only at 0 and 100%.
                let scale = if p < 0.5 {
                    lerp(0.3, 1.05, ease_in_out(p / 0.5))
                } else if p < 0.7 {
                    lerp(1.05, 0.9, ease_in_out((p - 0.5) / 0.2))
                } else {
                    lerp(0.9, 1.0, ease_in_out((p - 0.7) / 0.3))
                };
                AnimationFrame {
                    opacity: e,
                    scale,
                    ..settled
                }
            }
            Self::ZoomIn => AnimationFrame {
                opacity: e,
                scale: lerp(0.0, 1.0, e),
                ..settled
            },
            Self::Typewriter => AnimationFrame {
                reveal: p,
                ..settled
            },
            Self::Pulse => settled,
        }
    }
}

/// CSS `ease-in-out`, i.e. `cubic-bezier(0.42, 0, 0.58, 1)`.
fn ease_in_out(t: f32) -> f32 {
    const X1: f32 = 0.42;
    const X2: f32 = 0.58;
    let t = t.clamp(0.0, 1.0);
    if t == 0.0 || t == 1.0 {
        return t;
    }
    // Solve x(u) = t for the curve parameter, then evaluate y(u). x is monotonic.
    let bezier = |a: f32, b: f32, u: f32| {
        let v = 1.0 - u;
        3.0 * v * v * u * a + 3.0 * v * u * u * b + u * u * u
    };
    let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
    let mut u = t;
    for _ in 0..32 {
        let x = bezier(X1, X2, u);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = u;
        } else {
            hi = u;
        }
        u = 0.5 * (lo + hi);
    }
    bezier(0.0, 1.0, u)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Presentation transform for one animation sample. Translation is a fraction of
/// the block size, scale is about the block center, `reveal` is the visible
/// fraction of the block measured from its left edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub opacity: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
    pub reveal: f32,
}

impl AnimationFrame {
    pub const SETTLED: AnimationFrame = AnimationFrame {
        opacity: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
        reveal: 1.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::SETTLED
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub color: Color,
    pub shadow: bool,
    pub outline: bool,
    pub gradient_fill: bool,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub letter_spacing: f32,
    pub animation: AnimationKind,
}

impl TextStyle {
    pub fn new(font_size: f32) -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size,
            font_weight: FontWeight::NORMAL,
            color: Color::WHITE,
            shadow: false,
            outline: false,
            gradient_fill: false,
            text_align: TextAlign::Center,
            line_height: DEFAULT_LINE_HEIGHT,
            letter_spacing: 0.0,
            animation: AnimationKind::None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextSpec<'a> {
    pub content: &'a str,
    pub style: &'a TextStyle,
    pub max_width_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub start_x: f32,
    pub baseline_y: f32,
    pub width: f32,
    pub words: Vec<PlacedWord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
    pub bounding_box: RectF,
    pub font: FontRef,
    pub font_size: f32,
    pub line_height: f32,
    pub letter_spacing: f32,
}

impl TextBlock {
    /// Line texts joined with single spaces.
    pub fn joined_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

struct MeasuredWord<'a> {
    text: &'a str,
    width: f32,
}

struct WrappedLine<'a> {
    words: Vec<MeasuredWord<'a>>,
    ends_paragraph: bool,
}

/// Lays out `spec` centered on `anchor`.
pub fn layout(
    spec: TextSpec<'_>,
    anchor: PixelPoint,
    canvas: CanvasSize,
    measurer: &dyn TextMeasurer,
) -> Result<TextBlock, LayoutError> {
    let style = spec.style;
    let size = style.font_size;
    if !size.is_finite() || size <= 0.0 {
        return Err(LayoutError::NonPositiveFontSize(size));
    }
    let font = measurer
        .resolve_font(&style.font_family, style.font_weight)
        .ok_or_else(|| LayoutError::NoFont {
            family: style.font_family.clone(),
        })?;
    let spacing = if style.letter_spacing.is_finite() {
        style.letter_spacing
    } else {
        0.0
    };
    let line_factor = if style.line_height.is_finite() && style.line_height > 0.0 {
        style.line_height
    } else {
        DEFAULT_LINE_HEIGHT
    };

    let max_width = percent_of_width(spec.max_width_percent, canvas);
    let space = measurer.text_width(&font, size, " ", spacing);
    let wrapped = wrap_words(spec.content, max_width, space, |word| {
        measurer.text_width(&font, size, word, spacing)
    });

    let line_widths: Vec<f32> = wrapped
        .iter()
        .map(|line| natural_width(&line.words, space))
        .collect();
    let block_width = line_widths.iter().copied().fold(0.0f32, f32::max);
    let line_px = size * line_factor;
    let block_height = line_px * wrapped.len() as f32;
    let left = anchor.x as f32 - block_width / 2.0;
    let top = anchor.y as f32 - block_height / 2.0;

    let metrics = measurer.vertical_metrics(&font, size);
    let half_leading = (line_px - (metrics.ascent + metrics.descent)) / 2.0;

    let mut lines = Vec::with_capacity(wrapped.len());
    for (idx, (line, natural)) in wrapped.iter().zip(line_widths.iter().copied()).enumerate() {
        let baseline_y = top + idx as f32 * line_px + half_leading + metrics.ascent;
        let justify = style.text_align == TextAlign::Justify
            && !line.ends_paragraph
            && line.words.len() > 1;
        let (start_x, gap, width) = if justify {
            let words_width: f32 = line.words.iter().map(|w| w.width).sum();
            let gap = (block_width - words_width) / (line.words.len() - 1) as f32;
            (left, gap, block_width)
        } else {
            let start = match style.text_align {
                TextAlign::Left | TextAlign::Justify => left,
                TextAlign::Center => left + (block_width - natural) / 2.0,
                TextAlign::Right => left + block_width - natural,
            };
            (start, space, natural)
        };

        let mut words = Vec::with_capacity(line.words.len());
        let mut pen = start_x;
        for word in &line.words {
            words.push(PlacedWord {
                text: word.text.to_string(),
                x: pen,
            });
            pen += word.width + gap;
        }
        lines.push(TextLine {
            text: line
                .words
                .iter()
                .map(|w| w.text)
                .collect::<Vec<_>>()
                .join(" "),
            start_x,
            baseline_y,
            width,
            words,
        });
    }

    Ok(TextBlock {
        lines,
        bounding_box: RectF {
            x: left,
            y: top,
            width: block_width,
            height: block_height,
        },
        font,
        font_size: size,
        line_height: line_px,
        letter_spacing: spacing,
    })
}

fn natural_width(words: &[MeasuredWord<'_>], space: f32) -> f32 {
    let sum: f32 = words.iter().map(|w| w.width).sum();
    sum + space * words.len().saturating_sub(1) as f32
}

// Greedy wrap; a word wider than the limit sits alone on its line.
fn wrap_words<'a>(
    content: &'a str,
    max_width: f32,
    space: f32,
    mut measure: impl FnMut(&str) -> f32,
) -> Vec<WrappedLine<'a>> {
    let mut lines = Vec::new();
    for paragraph in content.split('\n') {
        let mut current: Vec<MeasuredWord<'a>> = Vec::new();
        let mut current_width = 0.0f32;
        for word in paragraph.split_whitespace() {
            let width = measure(word);
            if current.is_empty() {
                current_width = width;
                current.push(MeasuredWord { text: word, width });
                continue;
            }
            let candidate = current_width + space + width;
            if candidate > max_width {
                lines.push(WrappedLine {
                    words: std::mem::take(&mut current),
                    ends_paragraph: false,
                });
                current_width = width;
            } else {
                current_width = candidate;
            }
            current.push(MeasuredWord { text: word, width });
        }
        lines.push(WrappedLine {
            words: current,
            ends_paragraph: true,
        });
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextFill {
    Solid(Color),
    Gradient(Shading),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShadow {
    pub dx: f32,
    pub dy: f32,
    pub blur: f32,
    pub color: Color,
}

impl TextShadow {
    pub const DEFAULT: TextShadow = TextShadow {
        dx: 3.0,
        dy: 3.0,
        blur: 6.0,
        color: Color::rgba(0.0, 0.0, 0.0, 0.7),
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOutline {
    pub width: f32,
    pub color: Color,
}

impl TextOutline {
    pub const DEFAULT: TextOutline = TextOutline {
        width: 2.0,
        color: Color::rgba(0.0, 0.0, 0.0, 0.8),
    };
}

/// How a laid-out block is painted. Shadow, outline and fill combine freely.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPaint {
    pub fill: TextFill,
    pub shadow: Option<TextShadow>,
    pub outline: Option<TextOutline>,
    pub opacity: f32,
    pub frame: AnimationFrame,
}

pub fn paint(
    style: &TextStyle,
    opacity: f32,
    block: &TextBlock,
    animation_time_ms: Option<u64>,
) -> TextPaint {
    let fill = if style.gradient_fill {
        TextFill::Gradient(Shading::css_linear(
            block.bounding_box,
            GRADIENT_ANGLE_DEG,
            GRADIENT_FROM,
            GRADIENT_TO,
        ))
    } else {
        TextFill::Solid(style.color)
    };
    let opacity = if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    };
    TextPaint {
        fill,
        shadow: style.shadow.then_some(TextShadow::DEFAULT),
        outline: style.outline.then_some(TextOutline::DEFAULT),
        opacity,
        frame: style.animation.frame_at(animation_time_ms),
    }
}
