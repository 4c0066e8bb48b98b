//! Shape, icon and decoration catalog and the draw instructions they produce.

use crate::path::{self, PathSeg, Placement};
use crate::types::{Color, PixelRect};

const SHAPE_VIEW_BOX: f32 = 100.0;
const ICON_VIEW_BOX: f32 = 24.0;

const STAR_SHAPE: &str = "M50,5 L60,35 L95,35 L68,57 L78,91 L50,70 L22,91 L32,57 L5,35 L40,35 Z";
const ARROW_SHAPE: &str = "M10,50 L70,50 L60,40 L80,50 L60,60 Z";
const SPARKLE: &str = "M50 10 L55 35 L80 30 L60 50 L85 55 L60 70 L80 70 L55 65 L50 90 L45 65 L20 70 L40 50 L15 45 L40 30 L20 30 L45 35 Z";
const RIBBON: &str = "M10 30 L90 30 L85 50 L90 70 L10 70 L15 50 Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Shape(ShapeKind),
    Icon(IconKind),
    Decoration(DecorationKind),
}

impl Primitive {
    /// Wire name of the element family (`shape`, `icon`, `decorative`).
    pub fn family(self) -> &'static str {
        match self {
            Primitive::Shape(_) => "shape",
            Primitive::Icon(_) => "icon",
            Primitive::Decoration(_) => "decorative",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Shape(kind) => kind.name(),
            Primitive::Icon(kind) => kind.name(),
            Primitive::Decoration(kind) => kind.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    Diamond,
    Star,
    Arrow,
}

impl ShapeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" | "square" => ShapeKind::Rectangle,
            "circle" => ShapeKind::Circle,
            "triangle" => ShapeKind::Triangle,
            "diamond" => ShapeKind::Diamond,
            "star" => ShapeKind::Star,
            "arrow" => ShapeKind::Arrow,
            _ => return None,
        };
        Some(kind)
    }

    /// Unknown names draw a rectangle.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown shape '{name}', drawing a rectangle");
            ShapeKind::Rectangle
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Diamond => "diamond",
            ShapeKind::Star => "star",
            ShapeKind::Arrow => "arrow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconKind {
    Chart,
    Trending,
    Users,
    Cart,
    Target,
    Shield,
    Star,
    Heart,
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
}

impl IconKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "chart" | "chart-bar" => IconKind::Chart,
            "trending" | "trending-up" => IconKind::Trending,
            "users" => IconKind::Users,
            "cart" | "shopping-cart" => IconKind::Cart,
            "target" => IconKind::Target,
            "shield" | "shield-check" => IconKind::Shield,
            "star" | "star-icon" => IconKind::Star,
            "heart" => IconKind::Heart,
            "facebook" => IconKind::Facebook,
            "instagram" => IconKind::Instagram,
            "twitter" => IconKind::Twitter,
            "linkedin" => IconKind::Linkedin,
            _ => return None,
        };
        Some(kind)
    }

    /// Unknown icons draw the star glyph.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown icon '{name}', drawing the star icon");
            IconKind::Star
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            IconKind::Chart => "chart",
            IconKind::Trending => "trending",
            IconKind::Users => "users",
            IconKind::Cart => "cart",
            IconKind::Target => "target",
            IconKind::Shield => "shield",
            IconKind::Star => "star",
            IconKind::Heart => "heart",
            IconKind::Facebook => "facebook",
            IconKind::Instagram => "instagram",
            IconKind::Twitter => "twitter",
            IconKind::Linkedin => "linkedin",
        }
    }

    // 24x24 glyph outlines.
    fn path_data(self) -> &'static str {
        match self {
            IconKind::Chart => "M3 13h8V3H3v10zm0 8h8v-6H3v6zm10 0h8V11h-8v10zm0-18v6h8V3h-8z",
            IconKind::Trending => {
                "m16 6 2.29 2.29-4.88 4.88-4-4L2 16.59 3.41 18l6-6 4 4 6.3-6.29L22 12V6z"
            }
            IconKind::Users => {
                "M16 4c0-1.11.89-2 2-2s2 .89 2 2-.89 2-2 2-2-.89-2-2zm4 18v-6h2.5l-2.54-7.63A3.01 3.01 0 0 0 16.8 6.8L15 8.4V12h-2V7c0-.35.18-.68.49-.86l4.4-2.2A2 2 0 0 1 20 4.5h1c1.66 0 3 1.34 3 3v6c0 .55-.45 1-1 1h-3v8h-2z"
            }
            IconKind::Cart => {
                "M7 18c-1.1 0-2 .9-2 2s.9 2 2 2 2-.9 2-2-.9-2-2-2zM1 2v2h2l3.6 7.59-1.35 2.45c-.16.28-.25.61-.25.96 0 1.1.9 2 2 2h12v-2H7.42c-.14 0-.25-.11-.25-.25l.03-.12L8.1 13h7.45c.75 0 1.41-.41 1.75-1.03L21.7 4H5.21l-.94-2H1zm16 16c-1.1 0-2 .9-2 2s.9 2 2 2 2-.9 2-2-.9-2-2-2z"
            }
            IconKind::Target => {
                "M12 2C6.48 2 2 6.48 2 12s4.48 10 10 10 10-4.48 10-10S17.52 2 12 2zm0 18c-4.42 0-8-3.58-8-8s3.58-8 8-8 8 3.58 8 8-3.58 8-8 8zm-3-8c0 1.66 1.34 3 3 3s3-1.34 3-3-1.34-3-3-3-3 1.34-3 3z"
            }
            IconKind::Shield => {
                "M12,1L3,5V11C3,16.55 6.84,21.74 12,23C17.16,21.74 21,16.55 21,11V5L12,1M12,7C13.4,7 14.8,8.6 14.8,10V11H16V16H8V11H9.2V10C9.2,8.6 10.6,7 12,7M12,8.2C11.2,8.2 10.4,8.7 10.4,10V11H13.6V10C13.6,8.7 12.8,8.2 12,8.2Z"
            }
            IconKind::Star => {
                "M12 2l3.09 6.26L22 9.27l-5 4.87 1.18 6.88L12 17.77l-6.18 3.25L7 14.14 2 9.27l6.91-1.01L12 2z"
            }
            IconKind::Heart => {
                "M12 21.35l-1.45-1.32C5.4 15.36 2 12.28 2 8.5 2 5.42 4.42 3 7.5 3c1.74 0 3.41.81 4.5 2.09C13.09 3.81 14.76 3 16.5 3 19.58 3 22 5.42 22 8.5c0 3.78-3.4 6.86-8.55 11.54L12 21.35z"
            }
            IconKind::Facebook => {
                "M24 12.073c0-6.627-5.373-12-12-12s-12 5.373-12 12c0 5.99 4.388 10.954 10.125 11.854v-8.385H7.078v-3.47h3.047V9.43c0-3.007 1.792-4.669 4.533-4.669 1.312 0 2.686.235 2.686.235v2.953H15.83c-1.491 0-1.956.925-1.956 1.874v2.25h3.328l-.532 3.47h-2.796v8.385C19.612 23.027 24 18.062 24 12.073z"
            }
            IconKind::Instagram => {
                "M12 2.163c3.204 0 3.584.012 4.85.07 3.252.148 4.771 1.691 4.919 4.919.058 1.265.069 1.645.069 4.849 0 3.205-.012 3.584-.069 4.849-.149 3.225-1.664 4.771-4.919 4.919-1.266.058-1.644.07-4.85.07-3.204 0-3.584-.012-4.849-.07-3.26-.149-4.771-1.699-4.919-4.92-.058-1.265-.07-1.644-.07-4.849 0-3.204.013-3.583.07-4.849.149-3.227 1.664-4.771 4.919-4.919 1.266-.057 1.645-.069 4.849-.069zm0-2.163c-3.259 0-3.667.014-4.947.072-4.358.2-6.78 2.618-6.98 6.98-.059 1.281-.073 1.689-.073 4.948 0 3.259.014 3.668.072 4.948.2 4.358 2.618 6.78 6.98 6.98 1.281.058 1.689.072 4.948.072 3.259 0 3.668-.014 4.948-.072 4.354-.2 6.782-2.618 6.979-6.98.059-1.28.073-1.689.073-4.948 0-3.259-.014-3.667-.072-4.947-.196-4.354-2.617-6.78-6.979-6.98-1.281-.059-1.69-.073-4.949-.073zm0 5.838c-3.403 0-6.162 2.759-6.162 6.162s2.759 6.163 6.162 6.163 6.162-2.759 6.162-6.163c0-3.403-2.759-6.162-6.162-6.162zm0 10.162c-2.209 0-4-1.79-4-4 0-2.209 1.791-4 4-4s4 1.791 4 4c0 2.21-1.791 4-4 4zm6.406-11.845c-.796 0-1.441.645-1.441 1.44s.645 1.44 1.441 1.44c.795 0 1.439-.645 1.439-1.44s-.644-1.44-1.439-1.44z"
            }
            IconKind::Twitter => {
                "M23.953 4.57a10 10 0 01-2.825.775 4.958 4.958 0 002.163-2.723c-.951.555-2.005.959-3.127 1.184a4.92 4.92 0 00-8.384 4.482C7.69 8.095 4.067 6.13 1.64 3.162a4.822 4.822 0 00-.666 2.475c0 1.71.87 3.213 2.188 4.096a4.904 4.904 0 01-2.228-.616v.06a4.923 4.923 0 003.946 4.827 4.996 4.996 0 01-2.212.085 4.936 4.936 0 004.604 3.417 9.867 9.867 0 01-6.102 2.105c-.39 0-.779-.023-1.17-.067a13.995 13.995 0 007.557 2.209c9.053 0 13.998-7.496 13.998-13.985 0-.21 0-.42-.015-.63A9.935 9.935 0 0024 4.59z"
            }
            IconKind::Linkedin => {
                "M20.447 20.452h-3.554v-5.569c0-1.328-.027-3.037-1.852-3.037-1.853 0-2.136 1.445-2.136 2.939v5.667H9.351V9h3.414v1.561h.046c.477-.9 1.637-1.85 3.37-1.85 3.601 0 4.267 2.37 4.267 5.455v6.286zM5.337 7.433c-1.144 0-2.063-.926-2.063-2.065 0-1.138.92-2.063 2.063-2.063 1.14 0 2.064.925 2.064 2.063 0 1.139-.925 2.065-2.064 2.065zm1.782 13.019H3.555V9h3.564v11.452zM22.225 0H1.771C.792 0 0 .774 0 1.729v20.542C0 23.227.792 24 1.771 24h20.451C23.2 24 24 23.227 24 22.271V1.729C24 .774 23.2 0 22.222 0h.003z"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    Sparkle,
    Burst,
    Ribbon,
    /// Soft ellipse used for unrecognized decoration names.
    Dot,
}

impl DecorationKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "sparkle" => DecorationKind::Sparkle,
            "burst" => DecorationKind::Burst,
            "ribbon" => DecorationKind::Ribbon,
            "dot" => DecorationKind::Dot,
            _ => return None,
        };
        Some(kind)
    }

    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown decoration '{name}', drawing a dot");
            DecorationKind::Dot
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DecorationKind::Sparkle => "sparkle",
            DecorationKind::Burst => "burst",
            DecorationKind::Ribbon => "ribbon",
            DecorationKind::Dot => "dot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillStrokeStyle {
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
}

impl FillStrokeStyle {
    pub const DEFAULT_FILL: Color = Color::rgb(0x66 as f32 / 255.0, 0x7e as f32 / 255.0, 0xea as f32 / 255.0);
    pub const DEFAULT_STROKE: Color = Color::rgb(0x4f as f32 / 255.0, 0x46 as f32 / 255.0, 0xe5 as f32 / 255.0);
}

impl Default for FillStrokeStyle {
    fn default() -> Self {
        Self {
            fill: Self::DEFAULT_FILL,
            stroke: Self::DEFAULT_STROKE,
            stroke_width: 1.0,
        }
    }
}

/// Everything needed to draw one element apart from where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDescriptor {
    pub primitive: Primitive,
    pub style: FillStrokeStyle,
    pub opacity: f32,
    pub rotation_deg: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePaint {
    pub color: Color,
    pub width: f32,
}

/// One path painted with its own fill, stroke and opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintedPath {
    pub segs: Vec<PathSeg>,
    pub fill: Option<Color>,
    pub stroke: Option<StrokePaint>,
    pub opacity: f32,
}

/// Device-space drawing for one element.
///
/// `opacity` applies to the element as a group; `rotation_deg` is clockwise about
/// `pivot`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub paths: Vec<PaintedPath>,
    pub opacity: f32,
    pub rotation_deg: f32,
    pub pivot: (f32, f32),
}

pub fn render(descriptor: &PrimitiveDescriptor, bounds: PixelRect) -> DrawInstruction {
    let b = bounds.to_f32();
    let style = &descriptor.style;
    let stroke_width = if style.stroke_width.is_finite() {
        style.stroke_width.max(0.0)
    } else {
        1.0
    };
    let mut extra_rotation = 0.0;

    let paths = match descriptor.primitive {
        Primitive::Shape(kind) => match kind {
            ShapeKind::Rectangle | ShapeKind::Diamond => {
                if kind == ShapeKind::Diamond {
                    extra_rotation = 45.0;
                }
                let inset = (stroke_width / 2.0).min(b.width / 2.0).min(b.height / 2.0);
                vec![bordered(
                    path::rect(
                        b.x + inset,
                        b.y + inset,
                        b.width - 2.0 * inset,
                        b.height - 2.0 * inset,
                    ),
                    style,
                    stroke_width,
                )]
            }
            ShapeKind::Circle => {
                let inset = (stroke_width / 2.0).min(b.width / 2.0).min(b.height / 2.0);
                let (cx, cy) = b.center();
                vec![bordered(
                    path::ellipse(cx, cy, b.width / 2.0 - inset, b.height / 2.0 - inset),
                    style,
                    stroke_width,
                )]
            }
            ShapeKind::Triangle => vec![filled(
                vec![
                    PathSeg::MoveTo(b.x + b.width / 2.0, b.y),
                    PathSeg::LineTo(b.right(), b.bottom()),
                    PathSeg::LineTo(b.x, b.bottom()),
                    PathSeg::Close,
                ],
                style.fill,
                1.0,
            )],
            ShapeKind::Star | ShapeKind::Arrow => {
                let data = if kind == ShapeKind::Star {
                    STAR_SHAPE
                } else {
                    ARROW_SHAPE
                };
                let placement = Placement::meet(SHAPE_VIEW_BOX, b.x, b.y, b.width, b.height);
                vec![bordered(
                    placement.apply(&path::parse_path_data(data)),
                    style,
                    stroke_width * placement.scale,
                )]
            }
        },
        Primitive::Icon(kind) => {
            let placement = Placement::meet(ICON_VIEW_BOX, b.x, b.y, b.width, b.height);
            vec![filled(
                placement.apply(&path::parse_path_data(kind.path_data())),
                style.fill,
                1.0,
            )]
        }
        Primitive::Decoration(kind) => {
            let placement = Placement::meet(SHAPE_VIEW_BOX, b.x, b.y, b.width, b.height);
            match kind {
                DecorationKind::Sparkle => vec![filled(
                    placement.apply(&path::parse_path_data(SPARKLE)),
                    style.fill,
                    0.8,
                )],
                DecorationKind::Ribbon => vec![filled(
                    placement.apply(&path::parse_path_data(RIBBON)),
                    style.fill,
                    0.9,
                )],
                DecorationKind::Burst => [(30.0, 0.6), (20.0, 0.8), (10.0, 1.0)]
                    .into_iter()
                    .map(|(r, opacity)| {
                        filled(
                            placement.apply(&path::ellipse(50.0, 50.0, r, r)),
                            style.fill,
                            opacity,
                        )
                    })
                    .collect(),
                DecorationKind::Dot => {
                    let (cx, cy) = b.center();
                    vec![filled(
                        path::ellipse(cx, cy, b.width / 2.0, b.height / 2.0),
                        style.fill,
                        0.7,
                    )]
                }
            }
        }
    };

    DrawInstruction {
        paths,
        opacity: unit_or_one(descriptor.opacity),
        rotation_deg: normalize_degrees(descriptor.rotation_deg + extra_rotation),
        pivot: b.center(),
    }
}

fn bordered(segs: Vec<PathSeg>, style: &FillStrokeStyle, width: f32) -> PaintedPath {
    PaintedPath {
        segs,
        fill: Some(style.fill),
        stroke: (width > 0.0).then_some(StrokePaint {
            color: style.stroke,
            width,
        }),
        opacity: 1.0,
    }
}

fn filled(segs: Vec<PathSeg>, fill: Color, opacity: f32) -> PaintedPath {
    PaintedPath {
        segs,
        fill: Some(fill),
        stroke: None,
        opacity,
    }
}

fn unit_or_one(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn normalize_degrees(value: f32) -> f32 {
    if value.is_finite() {
        value.rem_euclid(360.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(primitive: Primitive) -> PrimitiveDescriptor {
        PrimitiveDescriptor {
            primitive,
            style: FillStrokeStyle::default(),
            opacity: 1.0,
            rotation_deg: 0.0,
        }
    }

    fn bounds(x: u32, y: u32, width: u32, height: u32) -> PixelRect {
        PixelRect {
            x,
            y,
            width,
            height,
        }
    }

    fn points(segs: &[PathSeg]) -> Vec<(f32, f32)> {
        segs.iter()
            .flat_map(|seg| match *seg {
                PathSeg::MoveTo(x, y) | PathSeg::LineTo(x, y) => vec![(x, y)],
                PathSeg::CurveTo(x1, y1, x2, y2, x, y) => vec![(x1, y1), (x2, y2), (x, y)],
                PathSeg::Close => Vec::new(),
            })
            .collect()
    }

    #[test]
    fn unknown_names_fall_back_without_failing() {
        assert_eq!(ShapeKind::from_name_or_default("hexagon"), ShapeKind::Rectangle);
        assert_eq!(IconKind::from_name_or_default("rocket"), IconKind::Star);
        assert_eq!(DecorationKind::from_name_or_default("confetti"), DecorationKind::Dot);
    }

    #[test]
    fn library_aliases_resolve_to_catalog_icons() {
        assert_eq!(IconKind::from_name("chart-bar"), Some(IconKind::Chart));
        assert_eq!(IconKind::from_name("Shopping-Cart"), Some(IconKind::Cart));
        assert_eq!(IconKind::from_name("star-icon"), Some(IconKind::Star));
    }

    #[test]
    fn every_icon_path_stays_inside_its_bounds() {
        let all = [
            IconKind::Chart,
            IconKind::Trending,
            IconKind::Users,
            IconKind::Cart,
            IconKind::Target,
            IconKind::Shield,
            IconKind::Star,
            IconKind::Heart,
            IconKind::Facebook,
            IconKind::Instagram,
            IconKind::Twitter,
            IconKind::Linkedin,
        ];
        for icon in all {
            let instr = render(&descriptor(Primitive::Icon(icon)), bounds(100, 100, 48, 48));
            assert_eq!(instr.paths.len(), 1);
            let pts = points(&instr.paths[0].segs);
            assert!(pts.len() > 3, "{} parsed too few points", icon.name());
            for (x, y) in pts {
                assert!(
                    (98.0..=150.0).contains(&x) && (98.0..=150.0).contains(&y),
                    "{} escapes bounds at ({x},{y})",
                    icon.name()
                );
            }
        }
    }

    #[test]
    fn star_is_fitted_and_centered_in_wide_bounds() {
        let instr = render(
            &descriptor(Primitive::Shape(ShapeKind::Star)),
            bounds(0, 0, 200, 100),
        );
        let pts = points(&instr.paths[0].segs);
        // view box point (50,5) lands at x = 50 (centering offset) + 50.
        assert_eq!(pts[0], (100.0, 5.0));
        assert!(instr.paths[0].stroke.is_some());
    }

    #[test]
    fn rectangle_border_stays_inside_box() {
        let mut d = descriptor(Primitive::Shape(ShapeKind::Rectangle));
        d.style.stroke_width = 4.0;
        let instr = render(&d, bounds(10, 10, 100, 50));
        let pts = points(&instr.paths[0].segs);
        assert_eq!(pts[0], (12.0, 12.0));
        assert_eq!(pts[2], (108.0, 58.0));
        assert_eq!(instr.paths[0].stroke.map(|s| s.width), Some(4.0));
    }

    #[test]
    fn diamond_adds_quarter_turn_to_rotation() {
        let mut d = descriptor(Primitive::Shape(ShapeKind::Diamond));
        d.rotation_deg = 330.0;
        let instr = render(&d, bounds(0, 0, 40, 40));
        assert_eq!(instr.rotation_deg, 15.0);
        assert_eq!(instr.pivot, (20.0, 20.0));
    }

    #[test]
    fn burst_stacks_three_rings_with_rising_opacity() {
        let instr = render(
            &descriptor(Primitive::Decoration(DecorationKind::Burst)),
            bounds(0, 0, 100, 100),
        );
        let opacities: Vec<f32> = instr.paths.iter().map(|p| p.opacity).collect();
        assert_eq!(opacities, vec![0.6, 0.8, 1.0]);
    }

    #[test]
    fn opacity_and_rotation_are_sanitized() {
        let mut d = descriptor(Primitive::Shape(ShapeKind::Circle));
        d.opacity = 3.0;
        d.rotation_deg = f32::NAN;
        let instr = render(&d, bounds(0, 0, 10, 10));
        assert_eq!(instr.opacity, 1.0);
        assert_eq!(instr.rotation_deg, 0.0);
    }
}
