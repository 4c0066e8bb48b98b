use crate::error::RenderFailure;
use crate::font::{FontRegistry, shape_run};
use crate::path::PathSeg;
use crate::pool::CancelToken;
use crate::primitive::{DrawInstruction, PaintedPath};
use crate::scene::{BackgroundOp, DrawOp, SceneGraph};
use crate::text::{AnimationFrame, TextBlock, TextFill, TextPaint};
use crate::types::{CanvasSize, Color, RectF, Shading, ShadingStop};
use rayon::prelude::*;
use std::sync::Arc;
use tiny_skia::{
    FillRule, FilterQuality, GradientStop, LineJoin, LinearGradient, Mask, Paint, Path,
    PathBuilder, Pixmap, PixmapPaint, Point, Rect, Shader, SpreadMode, Stroke, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

/// Encoded render result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterOutput {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub draw_ops: usize,
}

// Canvas plus scratch layers, reused across renders of the same size.
struct Surfaces {
    canvas: Pixmap,
    layer: Pixmap,
    shadow: Pixmap,
}

impl Surfaces {
    fn new(size: CanvasSize) -> Option<Self> {
        Some(Self {
            canvas: Pixmap::new(size.width, size.height)?,
            layer: Pixmap::new(size.width, size.height)?,
            shadow: Pixmap::new(size.width, size.height)?,
        })
    }

    fn fits(&self, size: CanvasSize) -> bool {
        self.canvas.width() == size.width && self.canvas.height() == size.height
    }
}

/// One rasterizer instance. Not shared: the pool hands it to one render at a time.
pub struct RasterBackend {
    id: usize,
    fonts: Arc<FontRegistry>,
    surfaces: Option<Surfaces>,
    renders: u64,
}

impl std::fmt::Debug for RasterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBackend")
            .field("id", &self.id)
            .field("renders", &self.renders)
            .field("warm", &self.surfaces.is_some())
            .finish()
    }
}

impl RasterBackend {
    pub fn new(id: usize, fonts: Arc<FontRegistry>) -> Self {
        Self {
            id,
            fonts,
            surfaces: None,
            renders: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Completed renders since creation.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn is_warm(&self) -> bool {
        self.surfaces.is_some()
    }

    /// Drops any in-flight surfaces so the next render starts clean.
    pub fn reset(&mut self) {
        self.surfaces = None;
    }

    /// Renders `scene` to PNG. `cancel` is polled between draw operations; on any
    /// failure the backend is reset before returning.
    pub fn render(
        &mut self,
        scene: &SceneGraph,
        cancel: &CancelToken,
    ) -> Result<RasterOutput, RenderFailure> {
        let result = self.render_inner(scene, cancel);
        match &result {
            Ok(_) => self.renders += 1,
            Err(err) => {
                log::debug!("backend {} reset after failed render: {}", self.id, err);
                self.reset();
            }
        }
        result
    }

    fn render_inner(
        &mut self,
        scene: &SceneGraph,
        cancel: &CancelToken,
    ) -> Result<RasterOutput, RenderFailure> {
        let size = scene.canvas;
        let mut surfaces = match self.surfaces.take() {
            Some(existing) if existing.fits(size) => existing,
            _ => Surfaces::new(size).ok_or_else(|| {
                RenderFailure::Backend(format!(
                    "invalid raster size {}x{}",
                    size.width, size.height
                ))
            })?,
        };
        surfaces.canvas.fill(tiny_skia::Color::TRANSPARENT);

        for op in &scene.ops {
            if cancel.is_cancelled() {
                return Err(RenderFailure::Cancelled);
            }
            match op {
                DrawOp::Background(background) => {
                    draw_background(&mut surfaces.canvas, background, size)
                }
                DrawOp::Primitive { instruction, .. } => {
                    draw_primitive(&mut surfaces, instruction)
                }
                DrawOp::Text { block, paint, .. } => {
                    let Some(path) = self.block_path(block)? else {
                        continue;
                    };
                    draw_text(&mut surfaces, &path, block, paint, size);
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(RenderFailure::Cancelled);
        }

        let png = surfaces
            .canvas
            .encode_png()
            .map_err(|e| RenderFailure::Backend(format!("png encode failed: {e}")))?;
        self.surfaces = Some(surfaces);
        Ok(RasterOutput {
            png,
            width: size.width,
            height: size.height,
            draw_ops: scene.ops.len(),
        })
    }

    /// Glyph outlines for a whole block in canvas space. `None` when nothing is visible.
    fn block_path(&self, block: &TextBlock) -> Result<Option<Path>, RenderFailure> {
        let font = self.fonts.loaded(&block.font).ok_or_else(|| {
            RenderFailure::Backend(format!("font '{}' is not loaded", block.font.key()))
        })?;
        let face = ttf_parser::Face::parse(&font.data, 0).map_err(|e| {
            RenderFailure::Backend(format!("font '{}' failed to parse: {e}", font.name))
        })?;
        let scale = block.font_size / face.units_per_em().max(1) as f32;
        let mut builder = GlyphPathBuilder::new(scale);
        for line in &block.lines {
            for word in &line.words {
                let run = shape_run(&font.data, &word.text, block.font_size, block.letter_spacing);
                for glyph in &run.glyphs {
                    builder.set_origin(word.x + glyph.x, line.baseline_y + glyph.y);
                    // Outline-less glyphs (spaces) are fine to skip.
                    let _ = face.outline_glyph(GlyphId(glyph.glyph_id), &mut builder);
                }
            }
        }
        Ok(builder.finish())
    }
}

fn draw_background(canvas: &mut Pixmap, background: &BackgroundOp, size: CanvasSize) {
    let full = size.full_rect();
    let Some(rect) = Rect::from_xywh(full.x, full.y, full.width, full.height) else {
        return;
    };
    match background {
        BackgroundOp::Gradient {
            from,
            to,
            angle_deg,
        } => {
            let shading = Shading::css_linear(full, *angle_deg, *from, *to);
            let mut paint = Paint::default();
            paint.shader = build_shading_shader(&shading, 1.0);
            paint.anti_alias = false;
            canvas.fill_rect(rect, &paint, Transform::identity(), None);
        }
        BackgroundOp::Image {
            image,
            crop,
            overlay_opacity,
        } => {
            let s = crop.scale;
            let transform = Transform::from_row(s, 0.0, 0.0, s, -crop.src.x * s, -crop.src.y * s);
            let paint = PixmapPaint {
                quality: FilterQuality::Bicubic,
                ..PixmapPaint::default()
            };
            canvas.draw_pixmap(0, 0, image.pixmap().as_ref(), &paint, transform, None);
            if *overlay_opacity > 0.0 {
                let overlay = fill_paint(Color::BLACK, *overlay_opacity);
                canvas.fill_rect(rect, &overlay, Transform::identity(), None);
            }
        }
    }
}

fn draw_primitive(surfaces: &mut Surfaces, instruction: &DrawInstruction) {
    if instruction.opacity <= 0.0 || instruction.paths.is_empty() {
        return;
    }
    let transform = if instruction.rotation_deg == 0.0 {
        Transform::identity()
    } else {
        let (px, py) = instruction.pivot;
        Transform::from_rotate_at(instruction.rotation_deg, px, py)
    };
    if instruction.opacity >= 1.0 {
        paint_paths(&mut surfaces.canvas, &instruction.paths, transform);
        return;
    }
    // Group opacity: paint the element alone, then composite it once.
    surfaces.layer.fill(tiny_skia::Color::TRANSPARENT);
    paint_paths(&mut surfaces.layer, &instruction.paths, transform);
    let paint = PixmapPaint {
        opacity: instruction.opacity,
        ..PixmapPaint::default()
    };
    surfaces.canvas.draw_pixmap(
        0,
        0,
        surfaces.layer.as_ref(),
        &paint,
        Transform::identity(),
        None,
    );
}

fn paint_paths(target: &mut Pixmap, paths: &[PaintedPath], transform: Transform) {
    for painted in paths {
        let Some(path) = build_path(&painted.segs) else {
            continue;
        };
        if let Some(fill) = painted.fill {
            let paint = fill_paint(fill, fill.a * painted.opacity);
            target.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
        if let Some(stroke) = painted.stroke {
            let paint = fill_paint(stroke.color, stroke.color.a * painted.opacity);
            let sk_stroke = Stroke {
                width: stroke.width,
                line_join: LineJoin::Miter,
                ..Stroke::default()
            };
            target.stroke_path(&path, &paint, &sk_stroke, transform, None);
        }
    }
}

fn draw_text(
    surfaces: &mut Surfaces,
    path: &Path,
    block: &TextBlock,
    paint: &TextPaint,
    size: CanvasSize,
) {
    let frame = paint.frame;
    let opacity = (paint.opacity * frame.opacity).clamp(0.0, 1.0);
    if opacity <= 0.0 || frame.reveal <= 0.0 {
        return;
    }
    let transform = frame_transform(block.bounding_box, &frame);

    surfaces.layer.fill(tiny_skia::Color::TRANSPARENT);
    if let Some(shadow) = paint.shadow {
        surfaces.shadow.fill(tiny_skia::Color::TRANSPARENT);
        let shadow_paint = fill_paint(shadow.color, shadow.color.a);
        let offset = Transform::from_translate(shadow.dx, shadow.dy).pre_concat(transform);
        surfaces
            .shadow
            .fill_path(path, &shadow_paint, FillRule::Winding, offset, None);
        // CSS blur radius is twice the gaussian sigma.
        gaussian_blur(&mut surfaces.shadow, shadow.blur / 2.0);
        surfaces.layer.draw_pixmap(
            0,
            0,
            surfaces.shadow.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    let fill = match &paint.fill {
        TextFill::Solid(color) => fill_paint(*color, color.a),
        TextFill::Gradient(shading) => {
            let mut gradient = Paint::default();
            gradient.shader = build_shading_shader(shading, 1.0);
            gradient.anti_alias = true;
            gradient
        }
    };
    surfaces
        .layer
        .fill_path(path, &fill, FillRule::Winding, transform, None);

    if let Some(outline) = paint.outline {
        let stroke = Stroke {
            width: outline.width,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        surfaces.layer.stroke_path(
            path,
            &fill_paint(outline.color, outline.color.a),
            &stroke,
            transform,
            None,
        );
    }

    let mask = if frame.reveal < 1.0 {
        reveal_mask(block.bounding_box, frame.reveal, transform, size)
    } else {
        None
    };
    let composite = PixmapPaint {
        opacity,
        ..PixmapPaint::default()
    };
    surfaces.canvas.draw_pixmap(
        0,
        0,
        surfaces.layer.as_ref(),
        &composite,
        Transform::identity(),
        mask.as_ref(),
    );
}

fn frame_transform(bbox: RectF, frame: &AnimationFrame) -> Transform {
    if frame.translate_x == 0.0 && frame.translate_y == 0.0 && frame.scale == 1.0 {
        return Transform::identity();
    }
    let (cx, cy) = bbox.center();
    let tx = frame.translate_x * bbox.width;
    let ty = frame.translate_y * bbox.height;
    let s = frame.scale.max(0.01);
    Transform::from_translate(cx + tx, cy + ty)
        .pre_scale(s, s)
        .pre_translate(-cx, -cy)
}

// Everything left of the typing cursor, with generous vertical slack for shadows.
fn reveal_mask(bbox: RectF, reveal: f32, transform: Transform, size: CanvasSize) -> Option<Mask> {
    let mut mask = Mask::new(size.width, size.height)?;
    let w = size.width as f32;
    let h = size.height as f32;
    let cut = bbox.x + bbox.width * reveal.clamp(0.0, 1.0);
    let rect = Rect::from_ltrb(-w, -h, cut, 2.0 * h)?;
    mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, false, transform);
    Some(mask)
}

fn build_path(segs: &[PathSeg]) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for seg in segs {
        match *seg {
            PathSeg::MoveTo(x, y) => builder.move_to(x, y),
            PathSeg::LineTo(x, y) => builder.line_to(x, y),
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => builder.cubic_to(x1, y1, x2, y2, x, y),
            PathSeg::Close => builder.close(),
        }
    }
    builder.finish()
}

fn build_shading_shader(shading: &Shading, opacity: f32) -> Shader<'static> {
    match shading {
        Shading::Axial {
            x0,
            y0,
            x1,
            y1,
            stops,
        } => {
            let start = Point::from_xy(*x0, *y0);
            let end = Point::from_xy(*x1, *y1);
            let sk_stops = shading_stops(stops, opacity);
            let first = stops.first().map(|s| s.color).unwrap_or(Color::BLACK);
            let fallback = to_sk_color(first, first.a * opacity);
            LinearGradient::new(start, end, sk_stops, SpreadMode::Pad, Transform::identity())
                .unwrap_or(Shader::SolidColor(fallback))
        }
    }
}

fn shading_stops(stops: &[ShadingStop], opacity: f32) -> Vec<GradientStop> {
    if stops.is_empty() {
        return vec![
            GradientStop::new(0.0, to_sk_color(Color::BLACK, opacity)),
            GradientStop::new(1.0, to_sk_color(Color::BLACK, opacity)),
        ];
    }
    stops
        .iter()
        .map(|stop| {
            GradientStop::new(
                stop.offset.clamp(0.0, 1.0),
                to_sk_color(stop.color, stop.color.a * opacity),
            )
        })
        .collect()
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color, opacity));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    };
    tiny_skia::Color::from_rgba(r, g, b, a).unwrap_or(tiny_skia::Color::BLACK)
}

/// Three box blurs approximating a gaussian of `sigma`, rows and columns in parallel.
fn gaussian_blur(pixmap: &mut Pixmap, sigma: f32) {
    if sigma.is_nan() || sigma <= 0.0 {
        return;
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let mut scratch = vec![0u8; width * height * 4];
    for radius in box_radii(sigma, 3) {
        if radius == 0 {
            continue;
        }
        box_blur_rows(pixmap.data(), &mut scratch, width, radius);
        box_blur_cols(&scratch, pixmap.data_mut(), width, height, radius);
    }
}

// Box radii whose successive passes approximate a gaussian (W. Jarosz, "Fast image convolutions").
fn box_radii(sigma: f32, passes: usize) -> Vec<usize> {
    let n = passes as f32;
    let ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
    let mut lower = ideal.floor() as i64;
    if lower % 2 == 0 {
        lower -= 1;
    }
    let lower = lower.max(1);
    let upper = lower + 2;
    let lw = lower as f32;
    let m = ((12.0 * sigma * sigma - n * lw * lw - 4.0 * n * lw - 3.0 * n) / (-4.0 * lw - 4.0))
        .round()
        .max(0.0) as usize;
    (0..passes)
        .map(|i| {
            let size = if i < m { lower } else { upper };
            ((size - 1) / 2) as usize
        })
        .collect()
}

// Pixels outside the image count as transparent.
fn box_blur_rows(src: &[u8], dst: &mut [u8], width: usize, radius: usize) {
    let stride = width * 4;
    let window = (2 * radius + 1) as u32;
    dst.par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .for_each(|(out, row)| {
            for c in 0..4 {
                let mut sum: u32 = 0;
                for x in 0..=radius.min(width - 1) {
                    sum += row[x * 4 + c] as u32;
                }
                for x in 0..width {
                    out[x * 4 + c] = ((sum + window / 2) / window) as u8;
                    let add = x + radius + 1;
                    if add < width {
                        sum += row[add * 4 + c] as u32;
                    }
                    if x >= radius {
                        sum -= row[(x - radius) * 4 + c] as u32;
                    }
                }
            }
        });
}

fn box_blur_cols(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize) {
    let stride = width * 4;
    let window = (2 * radius + 1) as u32;
    dst.par_chunks_mut(stride).enumerate().for_each(|(y, out)| {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(height - 1);
        for (i, value) in out.iter_mut().enumerate() {
            let mut sum: u32 = 0;
            for yy in y0..=y1 {
                sum += src[yy * stride + i] as u32;
            }
            *value = ((sum + window / 2) / window) as u8;
        }
    });
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x: 0.0,
            origin_y: 0.0,
            scale,
        }
    }

    fn set_origin(&mut self, x: f32, y: f32) {
        self.origin_x = x;
        self.origin_y = y;
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    // Font units are y-up; the canvas is y-down.
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
