//! Typed design document and its JSON wire shape.
//!
//! The wire shape is loose: every field is optional and colors, weights and
//! positions arrive as whatever the editor produced. [`DesignDocument::from_wire`]
//! is the single place that applies defaults, clamps positions and enforces the
//! document invariants (positive canvas, unique ids, positive font sizes). Past
//! this point every stage works on fully-populated typed values.

use crate::error::ValidationError;
use crate::geometry::RectSpec;
use crate::primitive::{
    DecorationKind, FillStrokeStyle, IconKind, Primitive, PrimitiveDescriptor, ShapeKind,
};
use crate::text::{
    AnimationKind, DEFAULT_LINE_HEIGHT, DEFAULT_MAX_WIDTH_PERCENT, FontWeight, GRADIENT_FROM,
    GRADIENT_TO, TextAlign, TextStyle,
};
use crate::types::{CanvasSize, Color, PercentPoint, clamp_percent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.4;
pub const DEFAULT_TEXT_BOX_FONT_SIZE: f32 = 24.0;
/// Where the editor places a newly added text box.
pub const DEFAULT_TEXT_BOX_POSITION: PercentPoint = PercentPoint { x: 50.0, y: 30.0 };

/// Base z values for the three stacking groups.
pub const ELEMENT_Z_BASE: i64 = 10;
pub const MAIN_TEXT_Z: i64 = 50;
pub const TEXT_BOX_Z_BASE: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientColors {
    pub from: Color,
    pub to: Color,
}

impl Default for GradientColors {
    fn default() -> Self {
        Self {
            from: GRADIENT_FROM,
            to: GRADIENT_TO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub url: String,
    pub overlay_opacity: f32,
    pub description: Option<String>,
    pub photographer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Gradient(GradientColors),
    /// `fallback` is drawn instead when the image cannot be loaded.
    Image {
        image: BackgroundImage,
        fallback: GradientColors,
    },
}

impl Background {
    pub fn gradient_colors(&self) -> GradientColors {
        match self {
            Background::Gradient(colors) => *colors,
            Background::Image { fallback, .. } => *fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainText {
    pub content: String,
    pub style: TextStyle,
    pub position: PercentPoint,
    pub max_width_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub id: String,
    pub content: String,
    pub style: TextStyle,
    pub position: PercentPoint,
    pub max_width_percent: f64,
    pub opacity: f32,
    /// Explicit stacking value; `None` stacks by array position. A wire `zIndex`
    /// of 0 counts as unset, so such boxes keep their `60 + index` slot.
    pub z_index: Option<i64>,
}

impl TextBox {
    pub fn effective_z(&self, index: usize) -> i64 {
        self.z_index.unwrap_or(TEXT_BOX_Z_BASE + index as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignElement {
    pub id: String,
    pub descriptor: PrimitiveDescriptor,
    pub rect: RectSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignDocument {
    pub canvas: CanvasSize,
    pub background: Background,
    pub main_text: Option<MainText>,
    pub text_boxes: Vec<TextBox>,
    pub design_elements: Vec<DesignElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_style: Option<WireTextStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<WireBackgroundImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_elements: Option<Vec<WireDesignElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_elements: Option<Vec<WireTextElement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireFontWeight {
    Number(f64),
    Keyword(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<WireFontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBackgroundImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_opacity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDesignElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// `"percent"` makes the rect relative to the canvas; pixels otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTextElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub style: WireTextStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
}

impl DesignDocument {
    /// Parses the wire JSON for one document.
    pub fn from_json(json: &str, canvas: CanvasSize) -> Result<Self, ValidationError> {
        let wire: WireDocument = serde_json::from_str(json)?;
        Self::from_wire(&wire, canvas)
    }

    /// Normalizes a wire document: fills defaults, clamps positions, checks invariants.
    pub fn from_wire(wire: &WireDocument, canvas: CanvasSize) -> Result<Self, ValidationError> {
        validate_canvas(canvas)?;

        let colors = gradient_colors(wire.colors.as_deref());
        let background = match wire
            .background_image
            .as_ref()
            .and_then(|img| img.url.as_deref().map(|url| (img, url.trim())))
        {
            Some((img, url)) if !url.is_empty() => Background::Image {
                image: BackgroundImage {
                    url: url.to_string(),
                    overlay_opacity: unit_interval(img.overlay_opacity, DEFAULT_OVERLAY_OPACITY),
                    description: img.description.clone(),
                    photographer: img.photographer.clone(),
                },
                fallback: colors,
            },
            _ => Background::Gradient(colors),
        };

        let main_text = match wire.main_text.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => {
                let ws = wire.text_style.clone().unwrap_or_default();
                let default_size = canvas.min_side() as f32 * 0.08;
                let mut style = text_style(&ws, "mainText", default_size)?;
                if ws.font_weight.is_none() {
                    style.font_weight = FontWeight::BOLD;
                }
                Some(MainText {
                    content: content.to_string(),
                    style,
                    position: percent_position("mainText", ws.x, ws.y, PercentPoint::CENTER),
                    max_width_percent: max_width_percent(ws.max_width_percent),
                })
            }
            _ => None,
        };

        let text_elements: Vec<&WireTextElement> = wire.text_elements.iter().flatten().collect();
        let mut text_ids = explicit_ids(text_elements.iter().map(|wt| wt.id.as_deref()));
        let mut seen = HashSet::new();
        let mut text_boxes = Vec::new();
        for (index, wt) in text_elements.into_iter().enumerate() {
            let id = match explicit_id(wt.id.as_deref()) {
                Some(id) => id.to_string(),
                None => generated_id("text", index + 1, &mut text_ids),
            };
            if !seen.insert(id.clone()) {
                return Err(ValidationError::DuplicateId {
                    collection: "textElements",
                    id,
                });
            }
            let style = text_style(&wt.style, &id, DEFAULT_TEXT_BOX_FONT_SIZE)?;
            text_boxes.push(TextBox {
                position: percent_position(&id, wt.style.x, wt.style.y, PercentPoint::CENTER),
                content: wt.content.clone().unwrap_or_default(),
                style,
                max_width_percent: max_width_percent(wt.style.max_width_percent),
                opacity: unit_interval(wt.opacity, 1.0),
                z_index: wt.z_index.filter(|z| *z != 0),
                id,
            });
        }

        let wire_elements: Vec<&WireDesignElement> =
            wire.design_elements.iter().flatten().collect();
        let mut element_ids = explicit_ids(wire_elements.iter().map(|we| we.id.as_deref()));
        let mut seen = HashSet::new();
        let mut design_elements = Vec::new();
        for (index, we) in wire_elements.into_iter().enumerate() {
            let id = match explicit_id(we.id.as_deref()) {
                Some(id) => id.to_string(),
                None => generated_id("element", index + 1, &mut element_ids),
            };
            if !seen.insert(id.clone()) {
                return Err(ValidationError::DuplicateId {
                    collection: "designElements",
                    id,
                });
            }
            design_elements.push(design_element(id, we));
        }

        Ok(Self {
            canvas,
            background,
            main_text,
            text_boxes,
            design_elements,
        })
    }

    /// Serializes back into the wire shape.
    pub fn to_wire(&self) -> WireDocument {
        let colors = self.background.gradient_colors();
        let background_image = match &self.background {
            Background::Gradient(_) => None,
            Background::Image { image, .. } => Some(WireBackgroundImage {
                url: Some(image.url.clone()),
                description: image.description.clone(),
                photographer: image.photographer.clone(),
                overlay_opacity: Some(image.overlay_opacity as f64),
            }),
        };
        let (main_text, text_style) = match &self.main_text {
            Some(main) => {
                let mut ws = wire_text_style(&main.style, main.position, main.max_width_percent);
                ws.font_weight = Some(WireFontWeight::Number(main.style.font_weight.0 as f64));
                (Some(main.content.clone()), Some(ws))
            }
            None => (None, None),
        };
        WireDocument {
            main_text,
            text_style,
            colors: Some(vec![colors.from.to_hex(), colors.to.to_hex()]),
            background_image,
            design_elements: Some(
                self.design_elements
                    .iter()
                    .map(wire_design_element)
                    .collect(),
            ),
            text_elements: Some(
                self.text_boxes
                    .iter()
                    .map(|tb| WireTextElement {
                        id: Some(tb.id.clone()),
                        content: Some(tb.content.clone()),
                        style: wire_text_style(&tb.style, tb.position, tb.max_width_percent),
                        opacity: Some(tb.opacity as f64),
                        z_index: tb.z_index,
                    })
                    .collect(),
            ),
        }
    }

    pub fn element(&self, id: &str) -> Option<&DesignElement> {
        self.design_elements.iter().find(|el| el.id == id)
    }

    pub fn text_box(&self, id: &str) -> Option<&TextBox> {
        self.text_boxes.iter().find(|tb| tb.id == id)
    }
}

fn explicit_id(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.trim().is_empty())
}

fn explicit_ids<'a>(ids: impl Iterator<Item = Option<&'a str>>) -> HashSet<String> {
    ids.filter_map(explicit_id).map(str::to_string).collect()
}

/// `<prefix>-<n>` for the first `n >= start` not in `taken`; the result is added to `taken`.
pub(crate) fn generated_id(prefix: &str, start: usize, taken: &mut HashSet<String>) -> String {
    let mut n = start;
    loop {
        let candidate = format!("{prefix}-{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

pub(crate) fn validate_canvas(canvas: CanvasSize) -> Result<(), ValidationError> {
    if canvas.width == 0 || canvas.height == 0 {
        return Err(ValidationError::InvalidCanvas {
            width: canvas.width as i64,
            height: canvas.height as i64,
        });
    }
    Ok(())
}

fn gradient_colors(colors: Option<&[String]>) -> GradientColors {
    let defaults = GradientColors::default();
    let pick = |idx: usize, fallback: Color| {
        colors
            .and_then(|c| c.get(idx))
            .map(|raw| parse_color_or("colors", raw, fallback))
            .unwrap_or(fallback)
    };
    GradientColors {
        from: pick(0, defaults.from),
        to: pick(1, defaults.to),
    }
}

fn parse_color_or(field: &str, raw: &str, fallback: Color) -> Color {
    if raw.trim().is_empty() {
        return fallback;
    }
    Color::parse(raw).unwrap_or_else(|| {
        log::warn!("{field}: unrecognized color '{raw}', using {}", fallback.to_hex());
        fallback
    })
}

fn unit_interval(value: Option<f64>, default: f32) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0) as f32,
        _ => default,
    }
}

fn max_width_percent(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.min(100.0),
        _ => DEFAULT_MAX_WIDTH_PERCENT,
    }
}

fn percent_position(target: &str, x: Option<f64>, y: Option<f64>, default: PercentPoint) -> PercentPoint {
    let raw = PercentPoint::new(x.unwrap_or(default.x), y.unwrap_or(default.y));
    let clamped = PercentPoint::new(clamp_percent(raw.x), clamp_percent(raw.y));
    if clamped != raw {
        log::warn!(
            "{target}: position ({}, {}) clamped to ({}, {})",
            raw.x,
            raw.y,
            clamped.x,
            clamped.y
        );
    }
    clamped
}

fn text_style(ws: &WireTextStyle, target: &str, default_size: f32) -> Result<TextStyle, ValidationError> {
    let font_size = match ws.font_size {
        Some(v) if !v.is_finite() || v <= 0.0 => {
            return Err(ValidationError::InvalidFontSize {
                target: target.to_string(),
                value: v,
            });
        }
        Some(v) => v as f32,
        None => default_size,
    };
    let font_weight = match &ws.font_weight {
        Some(WireFontWeight::Number(n)) => FontWeight::from_number(*n),
        Some(WireFontWeight::Keyword(k)) => FontWeight::parse(k).unwrap_or_else(|| {
            log::warn!("{target}: unknown font weight '{k}'");
            FontWeight::NORMAL
        }),
        None => FontWeight::NORMAL,
    };
    let text_align = match ws.text_align.as_deref() {
        Some(raw) => TextAlign::parse(raw).unwrap_or_else(|| {
            log::warn!("{target}: unknown text alignment '{raw}'");
            TextAlign::Center
        }),
        None => TextAlign::Center,
    };
    let animation = match ws.animation.as_deref() {
        Some(raw) => AnimationKind::parse(raw).unwrap_or_else(|| {
            log::warn!("{target}: unknown animation '{raw}'");
            AnimationKind::None
        }),
        None => AnimationKind::None,
    };
    let line_height = match ws.line_height {
        Some(v) if v.is_finite() && v > 0.0 => v as f32,
        _ => DEFAULT_LINE_HEIGHT,
    };
    let letter_spacing = match ws.letter_spacing {
        Some(v) if v.is_finite() => v as f32,
        _ => 0.0,
    };
    let font_family = ws
        .font_family
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or("Inter")
        .to_string();

    Ok(TextStyle {
        font_family,
        font_size,
        font_weight,
        color: ws
            .color
            .as_deref()
            .map(|raw| parse_color_or(target, raw, Color::WHITE))
            .unwrap_or(Color::WHITE),
        shadow: ws.shadow.unwrap_or(false),
        outline: ws.outline.unwrap_or(false),
        gradient_fill: ws.gradient.unwrap_or(false),
        text_align,
        line_height,
        letter_spacing,
        animation,
    })
}

fn design_element(id: String, we: &WireDesignElement) -> DesignElement {
    let family = we.kind.as_deref().unwrap_or("shape").trim().to_ascii_lowercase();
    let primitive = match family.as_str() {
        "icon" => Primitive::Icon(IconKind::from_name_or_default(
            we.icon.as_deref().unwrap_or("star"),
        )),
        "decorative" | "decoration" => Primitive::Decoration(DecorationKind::from_name_or_default(
            we.element.as_deref().unwrap_or("sparkle"),
        )),
        "shape" => Primitive::Shape(ShapeKind::from_name_or_default(
            we.shape.as_deref().unwrap_or("rectangle"),
        )),
        other => {
            log::warn!("{id}: unknown element type '{other}', drawing a rectangle");
            Primitive::Shape(ShapeKind::Rectangle)
        }
    };

    let style = FillStrokeStyle {
        fill: we
            .fill
            .as_deref()
            .map(|raw| parse_color_or(&id, raw, FillStrokeStyle::DEFAULT_FILL))
            .unwrap_or(FillStrokeStyle::DEFAULT_FILL),
        stroke: we
            .stroke
            .as_deref()
            .map(|raw| parse_color_or(&id, raw, FillStrokeStyle::DEFAULT_STROKE))
            .unwrap_or(FillStrokeStyle::DEFAULT_STROKE),
        stroke_width: match we.stroke_width {
            Some(v) if v.is_finite() && v >= 0.0 => v as f32,
            _ => 1.0,
        },
    };

    let x = we.x.unwrap_or(0.0);
    let y = we.y.unwrap_or(0.0);
    let width = we.width.unwrap_or(crate::geometry::DEFAULT_ELEMENT_SIZE);
    let height = we.height.unwrap_or(crate::geometry::DEFAULT_ELEMENT_SIZE);
    let percent = matches!(
        we.unit.as_deref().map(str::trim),
        Some("percent") | Some("%")
    );
    let rect = if percent {
        RectSpec::Percent {
            x,
            y,
            width,
            height,
        }
    } else {
        RectSpec::Pixels {
            x,
            y,
            width,
            height,
        }
    };

    DesignElement {
        descriptor: PrimitiveDescriptor {
            primitive,
            style,
            opacity: unit_interval(we.opacity, 1.0),
            rotation_deg: we
                .rotation
                .filter(|r| r.is_finite())
                .unwrap_or(0.0) as f32,
        },
        rect,
        id,
    }
}

fn wire_text_style(style: &TextStyle, position: PercentPoint, max_width: f64) -> WireTextStyle {
    WireTextStyle {
        font_size: Some(style.font_size as f64),
        font_family: Some(style.font_family.clone()),
        font_weight: Some(WireFontWeight::Number(style.font_weight.0 as f64)),
        color: Some(style.color.to_hex()),
        shadow: Some(style.shadow),
        outline: Some(style.outline),
        gradient: Some(style.gradient_fill),
        x: Some(position.x),
        y: Some(position.y),
        text_align: Some(style.text_align.as_str().to_string()),
        line_height: Some(style.line_height as f64),
        letter_spacing: Some(style.letter_spacing as f64),
        animation: Some(style.animation.as_str().to_string()),
        max_width_percent: Some(max_width),
    }
}

fn wire_design_element(el: &DesignElement) -> WireDesignElement {
    let primitive = el.descriptor.primitive;
    let (unit, x, y, width, height) = match el.rect {
        RectSpec::Pixels {
            x,
            y,
            width,
            height,
        } => (None, x, y, width, height),
        RectSpec::Percent {
            x,
            y,
            width,
            height,
        } => (Some("percent".to_string()), x, y, width, height),
    };
    let name = Some(primitive.name().to_string());
    WireDesignElement {
        id: Some(el.id.clone()),
        kind: Some(primitive.family().to_string()),
        shape: matches!(primitive, Primitive::Shape(_)).then(|| name.clone()).flatten(),
        icon: matches!(primitive, Primitive::Icon(_)).then(|| name.clone()).flatten(),
        element: matches!(primitive, Primitive::Decoration(_)).then(|| name.clone()).flatten(),
        unit,
        x: Some(x),
        y: Some(y),
        width: Some(width),
        height: Some(height),
        fill: Some(el.descriptor.style.fill.to_hex()),
        stroke: Some(el.descriptor.style.stroke.to_hex()),
        stroke_width: Some(el.descriptor.style.stroke_width as f64),
        opacity: Some(el.descriptor.opacity as f64),
        rotation: Some(el.descriptor.rotation_deg as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: CanvasSize = CanvasSize::new(1200, 630);

    #[test]
    fn empty_document_gets_gradient_defaults() {
        let doc = DesignDocument::from_json("{}", BANNER).unwrap();
        assert_eq!(doc.background, Background::Gradient(GradientColors::default()));
        assert!(doc.main_text.is_none());
        assert!(doc.text_boxes.is_empty() && doc.design_elements.is_empty());
    }

    #[test]
    fn main_text_defaults_follow_canvas() {
        let doc = DesignDocument::from_json(r#"{"mainText":"Hello"}"#, BANNER).unwrap();
        let main = doc.main_text.unwrap();
        assert!((main.style.font_size - 630.0 * 0.08).abs() < 1e-3);
        assert_eq!(main.style.font_weight, FontWeight::BOLD);
        assert_eq!(main.style.font_family, "Inter");
        assert_eq!(main.position, PercentPoint::CENTER);
        assert_eq!(main.max_width_percent, 90.0);
    }

    #[test]
    fn blank_main_text_is_dropped() {
        let doc = DesignDocument::from_json(r#"{"mainText":"   "}"#, BANNER).unwrap();
        assert!(doc.main_text.is_none());
    }

    #[test]
    fn out_of_range_position_is_stored_clamped() {
        let doc = DesignDocument::from_json(
            r#"{"mainText":"Hi","textStyle":{"x":150,"y":-10}}"#,
            BANNER,
        )
        .unwrap();
        assert_eq!(doc.main_text.unwrap().position, PercentPoint::new(98.0, 2.0));
    }

    #[test]
    fn negative_font_size_is_rejected() {
        let err = DesignDocument::from_json(
            r#"{"mainText":"Hi","textStyle":{"fontSize":-4}}"#,
            BANNER,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFontSize { .. }));
    }

    #[test]
    fn zero_canvas_is_rejected() {
        let err = DesignDocument::from_json("{}", CanvasSize::new(0, 630)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCanvas { width: 0, .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let json = r#"{"designElements":[{"id":"a"},{"id":"a"}]}"#;
        let err = DesignDocument::from_json(json, BANNER).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DuplicateId {
                collection: "designElements",
                ..
            }
        ));
        let json = r#"{"textElements":[{"id":"t","content":"a"},{"id":"t","content":"b"}]}"#;
        assert!(DesignDocument::from_json(json, BANNER).is_err());
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = DesignDocument::from_json("{not json", BANNER).unwrap_err();
        assert!(matches!(err, ValidationError::Json(_)));
    }

    #[test]
    fn elements_parse_kind_style_and_units() {
        let json = r##"{"designElements":[
            {"id":"s","type":"shape","shape":"star","x":10,"y":20,"fill":"#ff0000","opacity":0.5,"rotation":30},
            {"id":"i","type":"icon","icon":"shopping-cart","unit":"percent","x":50,"y":50,"width":10,"height":10},
            {"id":"d","type":"decorative","element":"mystery"},
            {"id":"w","type":"widget"}
        ]}"##;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        let s = &doc.design_elements[0];
        assert_eq!(s.descriptor.primitive, Primitive::Shape(ShapeKind::Star));
        assert_eq!(s.descriptor.style.fill, Color::from_rgb8(255, 0, 0));
        assert_eq!(s.descriptor.style.stroke, FillStrokeStyle::DEFAULT_STROKE);
        assert_eq!(s.descriptor.opacity, 0.5);
        assert_eq!(
            s.rect,
            RectSpec::Pixels {
                x: 10.0,
                y: 20.0,
                width: 100.0,
                height: 100.0
            }
        );
        assert_eq!(doc.design_elements[1].descriptor.primitive, Primitive::Icon(IconKind::Cart));
        assert!(matches!(doc.design_elements[1].rect, RectSpec::Percent { .. }));
        assert_eq!(
            doc.design_elements[2].descriptor.primitive,
            Primitive::Decoration(DecorationKind::Dot)
        );
        assert_eq!(
            doc.design_elements[3].descriptor.primitive,
            Primitive::Shape(ShapeKind::Rectangle)
        );
    }

    #[test]
    fn text_boxes_stack_by_index_unless_explicit() {
        let json = r#"{"textElements":[{"content":"a"},{"content":"b","zIndex":5}]}"#;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        assert_eq!(doc.text_boxes[0].id, "text-1");
        assert_eq!(doc.text_boxes[0].effective_z(0), 60);
        assert_eq!(doc.text_boxes[1].effective_z(1), 5);
        assert_eq!(doc.text_boxes[0].style.font_size, 24.0);
    }

    #[test]
    fn zero_z_index_stacks_by_index() {
        let json = r#"{"textElements":[{"content":"a"},{"content":"b","zIndex":0}]}"#;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        assert_eq!(doc.text_boxes[1].z_index, None);
        assert_eq!(doc.text_boxes[1].effective_z(1), 61);
    }

    #[test]
    fn text_box_without_position_is_centered() {
        let json = r#"{"textElements":[{"content":"hi","style":{}},{"content":"there"}]}"#;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        assert_eq!(doc.text_boxes[0].position, PercentPoint::CENTER);
        assert_eq!(doc.text_boxes[1].position, PercentPoint::CENTER);
    }

    #[test]
    fn generated_ids_skip_explicit_ones() {
        let json = r#"{
            "designElements":[{"type":"shape"},{"id":"element-1","type":"shape"},{"type":"icon"}],
            "textElements":[{"content":"a"},{"id":"text-1","content":"b"}]
        }"#;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        let element_ids: Vec<_> = doc.design_elements.iter().map(|el| el.id.as_str()).collect();
        assert_eq!(element_ids, ["element-2", "element-1", "element-3"]);
        let text_ids: Vec<_> = doc.text_boxes.iter().map(|tb| tb.id.as_str()).collect();
        assert_eq!(text_ids, ["text-2", "text-1"]);
    }

    #[test]
    fn background_image_keeps_gradient_fallback() {
        let json = r##"{"colors":["#000000","not-a-color"],"backgroundImage":{"url":"https://img.test/a.jpg"}}"##;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        match &doc.background {
            Background::Image { image, fallback } => {
                assert_eq!(image.overlay_opacity, DEFAULT_OVERLAY_OPACITY);
                assert_eq!(fallback.from, Color::BLACK);
                assert_eq!(fallback.to, GRADIENT_TO);
            }
            other => panic!("expected image background, got {other:?}"),
        }
    }

    #[test]
    fn wire_round_trip_preserves_normalized_document() {
        let json = r##"{"mainText":"Sale","textStyle":{"fontSize":40,"color":"#112233","shadow":true},
            "textElements":[{"id":"t1","content":"Now","x":30,"y":70,"zIndex":80}],
            "designElements":[{"id":"e1","type":"icon","icon":"heart","x":5,"y":6,"width":40,"height":50}]}"##;
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        let again = DesignDocument::from_wire(&doc.to_wire(), BANNER).unwrap();
        assert_eq!(doc, again);
    }
}
