use serde::{Deserialize, Serialize};

/// Canvas dimensions in whole pixels. Both sides are positive once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn min_side(self) -> u32 {
        self.width.min(self.height)
    }

    pub fn full_rect(self) -> RectF {
        RectF {
            x: 0.0,
            y: 0.0,
            width: self.width as f32,
            height: self.height as f32,
        }
    }
}

/// Position expressed as percentages of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentPoint {
    pub x: f64,
    pub y: f64,
}

impl PercentPoint {
    pub const MIN: f64 = 2.0;
    pub const MAX: f64 = 98.0;
    pub const CENTER: PercentPoint = PercentPoint { x: 50.0, y: 50.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Keeps both axes inside the reserved 2% edge margin. NaN maps to the center.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }
}

pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 50.0;
    }
    value.clamp(PercentPoint::MIN, PercentPoint::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn center(self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    pub fn to_f32(self) -> RectF {
        RectF {
            x: self.x as f32,
            y: self.y as f32,
            width: self.width as f32,
            height: self.height as f32,
        }
    }
}

/// Sub-pixel rectangle used by layout and draw operations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub fn center(self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(self) -> f32 {
        self.y + self.height
    }
}

/// Straight (non-premultiplied) RGBA color with channels in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Parses a CSS color, returning `None` for anything unrecognized.
    pub fn parse(input: &str) -> Option<Self> {
        parse_color(input)
    }

    pub fn to_hex(self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!(
                "#{:02x}{:02x}{:02x}",
                channel(self.r),
                channel(self.g),
                channel(self.b)
            )
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                channel(self.r),
                channel(self.g),
                channel(self.b),
                channel(self.a)
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingStop {
    pub offset: f32, // 0..=1
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shading {
    // Axial (linear) shading: (x0,y0) -> (x1,y1), with 0..1 stops.
    Axial {
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        stops: Vec<ShadingStop>,
    },
}

impl Shading {
    /// Two-stop gradient following CSS `linear-gradient(<angle>deg, from, to)` over `rect`.
    ///
    /// 0deg points up and angles grow clockwise. The gradient line passes through the
    /// rect center and is long enough that the corners get the end colors.
    pub fn css_linear(rect: RectF, angle_deg: f32, from: Color, to: Color) -> Self {
        let rad = angle_deg.to_radians();
        let dx = libm::sinf(rad);
        let dy = -libm::cosf(rad);
        let half_len = (rect.width * dx.abs() + rect.height * dy.abs()) / 2.0;
        let (cx, cy) = rect.center();
        Shading::Axial {
            x0: cx - dx * half_len,
            y0: cy - dy * half_len,
            x1: cx + dx * half_len,
            y1: cy + dy * half_len,
            stops: vec![
                ShadingStop {
                    offset: 0.0,
                    color: from,
                },
                ShadingStop {
                    offset: 1.0,
                    color: to,
                },
            ],
        }
    }
}

fn parse_color(input: &str) -> Option<Color> {
    let v = input.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    let lower = v.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(args);
    }
    let named = match lower.as_str() {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "transparent" => Color::TRANSPARENT,
        "red" => Color::from_rgb8(255, 0, 0),
        "green" => Color::from_rgb8(0, 128, 0),
        "blue" => Color::from_rgb8(0, 0, 255),
        "yellow" => Color::from_rgb8(255, 255, 0),
        "orange" => Color::from_rgb8(255, 165, 0),
        "purple" => Color::from_rgb8(128, 0, 128),
        "pink" => Color::from_rgb8(255, 192, 203),
        "gray" | "grey" => Color::from_rgb8(128, 128, 128),
        "gold" => Color::from_rgb8(255, 215, 0),
        "navy" => Color::from_rgb8(0, 0, 128),
        _ => return None,
    };
    Some(named)
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    let nibble = |s: &str| byte(s).map(|v| v * 17);
    match hex.len() {
        3 => Some(Color::from_rgb8(
            nibble(&hex[0..1])?,
            nibble(&hex[1..2])?,
            nibble(&hex[2..3])?,
        )),
        6 => Some(Color::from_rgb8(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
        )),
        8 => Some(
            Color::from_rgb8(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)
                .with_alpha(byte(&hex[6..8])? as f32 / 255.0),
        ),
        _ => None,
    }
}

fn parse_rgb_function(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<f32> {
        if let Some(pct) = s.strip_suffix('%') {
            return pct.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0));
        }
        s.parse::<f32>().ok().map(|v| (v / 255.0).clamp(0.0, 1.0))
    };
    let alpha = match parts.get(3) {
        Some(s) => {
            if let Some(pct) = s.strip_suffix('%') {
                pct.parse::<f32>().ok()? / 100.0
            } else {
                s.parse::<f32>().ok()?
            }
        }
        None => 1.0,
    };
    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha.clamp(0.0, 1.0),
    ))
}
