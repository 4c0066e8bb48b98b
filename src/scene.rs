//! Scene assembly: a design document becomes an ordered list of draw operations.
//!
//! Stacking is decided here and nowhere else. Every drawable gets a z value
//! (elements `index + 10`, main text `50`, text boxes their `zIndex` or
//! `index + 60`) and the list `[elements.., mainText, textBoxes..]` is stably
//! sorted by it, so equal z values keep document order and the later one draws on
//! top. The rasterizer just walks `ops` front to back.

use crate::document::{
    Background, DesignDocument, ELEMENT_Z_BASE, GradientColors, MAIN_TEXT_Z,
};
use crate::error::{LayoutError, ResourceFetchError};
use crate::fetch::RasterImage;
use crate::font::TextMeasurer;
use crate::geometry::{resolve_point, resolve_rect};
use crate::primitive::{self, DrawInstruction};
use crate::text::{self, TextBlock, TextPaint, TextSpec};
use crate::types::{CanvasSize, Color, RectF};
use serde::Serialize;
use std::sync::Arc;

pub const BACKGROUND_GRADIENT_ANGLE: f32 = 135.0;
pub const MAIN_TEXT_ID: &str = "mainText";

/// Source region of an image scaled to cover the canvas, centered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverCrop {
    pub src: RectF,
    pub scale: f32,
}

impl CoverCrop {
    pub fn compute(image_w: u32, image_h: u32, canvas: CanvasSize) -> Self {
        let iw = image_w.max(1) as f32;
        let ih = image_h.max(1) as f32;
        let scale = (canvas.width as f32 / iw).max(canvas.height as f32 / ih);
        let sw = (canvas.width as f32 / scale).min(iw);
        let sh = (canvas.height as f32 / scale).min(ih);
        Self {
            src: RectF {
                x: (iw - sw) / 2.0,
                y: (ih - sh) / 2.0,
                width: sw,
                height: sh,
            },
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundOp {
    Gradient {
        from: Color,
        to: Color,
        angle_deg: f32,
    },
    Image {
        image: Arc<RasterImage>,
        crop: CoverCrop,
        overlay_opacity: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Background(BackgroundOp),
    Primitive {
        id: String,
        z: i64,
        instruction: DrawInstruction,
    },
    Text {
        id: String,
        z: i64,
        block: TextBlock,
        paint: TextPaint,
    },
}

impl DrawOp {
    pub fn id(&self) -> Option<&str> {
        match self {
            DrawOp::Background(_) => None,
            DrawOp::Primitive { id, .. } | DrawOp::Text { id, .. } => Some(id.as_str()),
        }
    }
}

/// A fallback substituted during a render that still succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Degradation {
    #[serde(rename_all = "camelCase")]
    BackgroundImageDropped { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub canvas: CanvasSize,
    pub ops: Vec<DrawOp>,
    pub degradations: Vec<Degradation>,
}

impl SceneGraph {
    pub fn background(&self) -> Option<&BackgroundOp> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Background(bg) => Some(bg),
            _ => None,
        })
    }

    /// Ids of the non-background operations in draw order.
    pub fn draw_order(&self) -> Vec<&str> {
        self.ops.iter().filter_map(DrawOp::id).collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Outcome of loading the document's background image, if it has one.
#[derive(Debug)]
pub enum BackgroundImageState {
    NotRequested,
    Loaded(Arc<RasterImage>),
    Failed(ResourceFetchError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssembleOptions {
    /// Samples text animations at this time instead of the settled frame.
    pub animation_time_ms: Option<u64>,
}

pub fn assemble(
    doc: &DesignDocument,
    background: BackgroundImageState,
    measurer: &dyn TextMeasurer,
    options: &AssembleOptions,
) -> Result<SceneGraph, LayoutError> {
    let canvas = doc.canvas;
    let mut degradations = Vec::new();
    let background_op = resolve_background(&doc.background, background, canvas, &mut degradations);

    let mut layered: Vec<(i64, DrawOp)> = Vec::with_capacity(
        doc.design_elements.len() + doc.text_boxes.len() + 1,
    );

    for (index, element) in doc.design_elements.iter().enumerate() {
        let z = ELEMENT_Z_BASE + index as i64;
        let bounds = resolve_rect(element.rect, canvas);
        if bounds.width == 0 || bounds.height == 0 {
            log::debug!("element {} is fully off canvas, skipping", element.id);
            continue;
        }
        layered.push((
            z,
            DrawOp::Primitive {
                id: element.id.clone(),
                z,
                instruction: primitive::render(&element.descriptor, bounds),
            },
        ));
    }

    if let Some(main) = doc.main_text.as_ref() {
        let block = text::layout(
            TextSpec {
                content: &main.content,
                style: &main.style,
                max_width_percent: main.max_width_percent,
            },
            resolve_point(main.position, canvas),
            canvas,
            measurer,
        )?;
        let paint = text::paint(&main.style, 1.0, &block, options.animation_time_ms);
        layered.push((
            MAIN_TEXT_Z,
            DrawOp::Text {
                id: MAIN_TEXT_ID.to_string(),
                z: MAIN_TEXT_Z,
                block,
                paint,
            },
        ));
    }

    for (index, text_box) in doc.text_boxes.iter().enumerate() {
        if text_box.content.trim().is_empty() {
            continue;
        }
        let z = text_box.effective_z(index);
        let block = text::layout(
            TextSpec {
                content: &text_box.content,
                style: &text_box.style,
                max_width_percent: text_box.max_width_percent,
            },
            resolve_point(text_box.position, canvas),
            canvas,
            measurer,
        )?;
        let paint = text::paint(
            &text_box.style,
            text_box.opacity,
            &block,
            options.animation_time_ms,
        );
        layered.push((
            z,
            DrawOp::Text {
                id: text_box.id.clone(),
                z,
                block,
                paint,
            },
        ));
    }

    // Stable: equal z keeps concatenation order.
    layered.sort_by_key(|(z, _)| *z);

    let mut ops = Vec::with_capacity(layered.len() + 1);
    ops.push(DrawOp::Background(background_op));
    ops.extend(layered.into_iter().map(|(_, op)| op));

    Ok(SceneGraph {
        canvas,
        ops,
        degradations,
    })
}

fn resolve_background(
    background: &Background,
    state: BackgroundImageState,
    canvas: CanvasSize,
    degradations: &mut Vec<Degradation>,
) -> BackgroundOp {
    let gradient = |colors: GradientColors| BackgroundOp::Gradient {
        from: colors.from,
        to: colors.to,
        angle_deg: BACKGROUND_GRADIENT_ANGLE,
    };
    match background {
        Background::Gradient(colors) => gradient(*colors),
        Background::Image { image, fallback } => {
            let reason = match state {
                BackgroundImageState::Loaded(raster) => {
                    return BackgroundOp::Image {
                        crop: CoverCrop::compute(raster.width(), raster.height(), canvas),
                        image: raster,
                        overlay_opacity: image.overlay_opacity,
                    };
                }
                BackgroundImageState::Failed(err) => err.to_string(),
                BackgroundImageState::NotRequested => "image was not fetched".to_string(),
            };
            log::warn!(
                "background image {} dropped, drawing gradient instead: {}",
                image.url,
                reason
            );
            degradations.push(Degradation::BackgroundImageDropped {
                url: image.url.clone(),
                reason,
            });
            gradient(*fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedMeasurer;
    use crate::text::GRADIENT_TO;

    const BANNER: CanvasSize = CanvasSize::new(1200, 630);

    fn assemble_json(json: &str, state: BackgroundImageState) -> SceneGraph {
        let doc = DesignDocument::from_json(json, BANNER).unwrap();
        assemble(&doc, state, &FixedMeasurer::default(), &AssembleOptions::default()).unwrap()
    }

    #[test]
    fn background_is_always_first() {
        let scene = assemble_json(
            r#"{"mainText":"Hi","designElements":[{"id":"a"}]}"#,
            BackgroundImageState::NotRequested,
        );
        assert!(matches!(scene.ops[0], DrawOp::Background(_)));
        assert_eq!(scene.draw_order(), vec!["a", MAIN_TEXT_ID]);
    }

    #[test]
    fn explicit_z_sorts_stably() {
        let json = r#"{"textElements":[
            {"id":"A","content":"a","zIndex":10},
            {"id":"B","content":"b","zIndex":5},
            {"id":"C","content":"c","zIndex":10}
        ]}"#;
        let scene = assemble_json(json, BackgroundImageState::NotRequested);
        assert_eq!(scene.draw_order(), vec!["B", "A", "C"]);
    }

    #[test]
    fn main_text_interleaves_by_z() {
        let json = r#"{"mainText":"Head",
            "designElements":[{"id":"e0"},{"id":"e1"}],
            "textElements":[{"id":"low","content":"x","zIndex":40},{"id":"tie","content":"y","zIndex":50},{"id":"top","content":"z"}]}"#;
        let scene = assemble_json(json, BackgroundImageState::NotRequested);
        assert_eq!(
            scene.draw_order(),
            vec!["e0", "e1", "low", MAIN_TEXT_ID, "tie", "top"]
        );
    }

    #[test]
    fn reordered_elements_restack() {
        let mut doc = DesignDocument::from_json(
            r#"{"designElements":[{"id":"old0"},{"id":"old1"},{"id":"old2"}]}"#,
            BANNER,
        )
        .unwrap();
        crate::edit::move_layer(&mut doc, "old0", crate::edit::LayerMove::Top).unwrap();
        let scene = assemble(
            &doc,
            BackgroundImageState::NotRequested,
            &FixedMeasurer::default(),
            &AssembleOptions::default(),
        )
        .unwrap();
        assert_eq!(scene.draw_order(), vec!["old1", "old2", "old0"]);
    }

    #[test]
    fn failed_fetch_falls_back_to_document_gradient() {
        let json = r##"{"colors":["#000000"],"backgroundImage":{"url":"https://img.test/missing.jpg"}}"##;
        let err = ResourceFetchError::Status {
            url: "https://img.test/missing.jpg".to_string(),
            status: 404,
        };
        let scene = assemble_json(json, BackgroundImageState::Failed(err));
        assert_eq!(
            scene.background(),
            Some(&BackgroundOp::Gradient {
                from: Color::BLACK,
                to: GRADIENT_TO,
                angle_deg: 135.0
            })
        );
        assert!(scene.is_degraded());
        let Degradation::BackgroundImageDropped { url, reason } = &scene.degradations[0];
        assert_eq!(url, "https://img.test/missing.jpg");
        assert!(reason.contains("404"));
    }

    #[test]
    fn loaded_image_draws_with_overlay() {
        let pixmap = tiny_skia::Pixmap::new(400, 100).unwrap();
        let image = Arc::new(RasterImage::from_pixmap(pixmap));
        let json = r#"{"backgroundImage":{"url":"bg.png"}}"#;
        let scene = assemble_json(json, BackgroundImageState::Loaded(image));
        match scene.background() {
            Some(BackgroundOp::Image {
                overlay_opacity,
                crop,
                ..
            }) => {
                assert_eq!(*overlay_opacity, 0.4);
                assert!(crop.scale > 0.0);
            }
            other => panic!("expected image background, got {other:?}"),
        }
        assert!(!scene.is_degraded());
    }

    #[test]
    fn cover_crop_centers_overflow() {
        // 400x100 onto 1200x630: height-bound, scale 6.3
        let crop = CoverCrop::compute(400, 100, BANNER);
        assert!((crop.scale - 6.3).abs() < 1e-4);
        assert!((crop.src.height - 100.0).abs() < 1e-3);
        let visible_w = 1200.0 / 6.3;
        assert!((crop.src.width - visible_w).abs() < 1e-2);
        assert!((crop.src.x - (400.0 - visible_w) / 2.0).abs() < 1e-2);
        assert_eq!(crop.src.y, 0.0);
    }

    #[test]
    fn off_canvas_elements_are_skipped() {
        let scene = assemble_json(
            r#"{"designElements":[{"id":"gone","x":5000,"y":10}]}"#,
            BackgroundImageState::NotRequested,
        );
        assert!(scene.draw_order().is_empty());
    }

    #[test]
    fn layout_errors_abort_assembly() {
        let doc = DesignDocument::from_json(r#"{"mainText":"Hi"}"#, BANNER).unwrap();
        let err = assemble(
            &doc,
            BackgroundImageState::NotRequested,
            &FixedMeasurer::without_fonts(),
            &AssembleOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::NoFont { .. }));
    }

    #[test]
    fn assembly_is_deterministic() {
        let json = r#"{"mainText":"Same every time","textStyle":{"shadow":true,"gradient":true},
            "designElements":[{"id":"s","type":"shape","shape":"star","rotation":15}]}"#;
        let a = assemble_json(json, BackgroundImageState::NotRequested);
        let b = assemble_json(json, BackgroundImageState::NotRequested);
        assert_eq!(a, b);
    }
}
