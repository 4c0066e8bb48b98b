//! In-place editor mutations of a [`DesignDocument`].
//!
//! Positions written here obey the same rules the resolver applies, so a document
//! edited through these functions never stores a value rendering would have to clamp.

use crate::document::{
    DEFAULT_TEXT_BOX_FONT_SIZE, DEFAULT_TEXT_BOX_POSITION, DesignDocument, DesignElement,
    MainText, TextBox, generated_id,
};
use crate::error::ValidationError;
use crate::geometry::{RectSpec, clamp_drag, clamp_position};
use crate::primitive::{
    DecorationKind, FillStrokeStyle, IconKind, Primitive, PrimitiveDescriptor, ShapeKind,
};
use crate::text::{DEFAULT_MAX_WIDTH_PERCENT, TextStyle};
use crate::types::PercentPoint;
use std::collections::HashSet;

pub const DEFAULT_GRID: f64 = 20.0;
const NUDGE_STEP: f64 = 1.0;
const NUDGE_STEP_COARSE: f64 = 10.0;
const DUPLICATE_OFFSET: f64 = 5.0;
const DUPLICATE_MAX: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMove {
    Up,
    Down,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    CenterHorizontal,
    CenterVertical,
    DistributeHorizontal,
    DistributeVertical,
}

impl Alignment {
    pub fn parse(value: &str) -> Option<Self> {
        let alignment = match value.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "center-horizontal" => Self::CenterHorizontal,
            "center-vertical" => Self::CenterVertical,
            "distribute-horizontal" => Self::DistributeHorizontal,
            "distribute-vertical" => Self::DistributeVertical,
            _ => return None,
        };
        Some(alignment)
    }
}

/// Moves the main text, clamping into the [2, 98] margin. `None` when the
/// document has no main text.
pub fn set_main_text_position(doc: &mut DesignDocument, x: f64, y: f64) -> Option<PercentPoint> {
    let main = doc.main_text.as_mut()?;
    main.position = PercentPoint::new(clamp_position(x), clamp_position(y));
    Some(main.position)
}

pub fn set_text_box_position(
    doc: &mut DesignDocument,
    id: &str,
    x: f64,
    y: f64,
) -> Result<PercentPoint, ValidationError> {
    let text_box = text_box_mut(doc, id)?;
    text_box.position = PercentPoint::new(clamp_position(x), clamp_position(y));
    Ok(text_box.position)
}

/// Keyboard nudge: one percent per step, ten when `coarse`.
pub fn nudge_main_text(doc: &mut DesignDocument, direction: Direction, coarse: bool) -> Option<PercentPoint> {
    let step = if coarse { NUDGE_STEP_COARSE } else { NUDGE_STEP };
    let current = doc.main_text.as_ref()?.position;
    let (x, y) = match direction {
        Direction::Left => (current.x - step, current.y),
        Direction::Right => (current.x + step, current.y),
        Direction::Up => (current.x, current.y - step),
        Direction::Down => (current.x, current.y + step),
    };
    set_main_text_position(doc, x, y)
}

pub fn center_main_text(doc: &mut DesignDocument) -> Option<PercentPoint> {
    set_main_text_position(doc, 50.0, 50.0)
}

/// Reorders `designElements`; the array order is the stacking order.
pub fn move_layer(doc: &mut DesignDocument, id: &str, movement: LayerMove) -> Result<usize, ValidationError> {
    let current = element_index(doc, id)?;
    let last = doc.design_elements.len() - 1;
    let target = match movement {
        LayerMove::Up => (current + 1).min(last),
        LayerMove::Down => current.saturating_sub(1),
        LayerMove::Top => last,
        LayerMove::Bottom => 0,
    };
    if target != current {
        let element = doc.design_elements.remove(current);
        doc.design_elements.insert(target, element);
    }
    Ok(target)
}

/// Aligns every other element against `selected`. Array order is preserved.
pub fn align_elements(
    doc: &mut DesignDocument,
    selected: &str,
    alignment: Alignment,
) -> Result<(), ValidationError> {
    let anchor_idx = element_index(doc, selected)?;
    let canvas = doc.canvas;
    let (sx, sy, sw, sh) = doc.design_elements[anchor_idx].rect.to_pixels(canvas);
    let others = doc.design_elements.len() - 1;

    let mut slot = 0usize;
    for (idx, element) in doc.design_elements.iter_mut().enumerate() {
        if idx == anchor_idx {
            continue;
        }
        slot += 1;
        let (x, y, w, h) = element.rect.to_pixels(canvas);
        let (nx, ny) = match alignment {
            Alignment::Left => (sx, y),
            Alignment::Right => (sx + sw - w, y),
            Alignment::Top => (x, sy),
            Alignment::Bottom => (x, sy + sh - h),
            Alignment::CenterHorizontal => (sx + (sw - w) / 2.0, y),
            Alignment::CenterVertical => (x, sy + (sh - h) / 2.0),
            Alignment::DistributeHorizontal => {
                let spacing = (canvas.width as f64 - w) / (others + 1) as f64;
                (spacing * slot as f64, y)
            }
            Alignment::DistributeVertical => {
                let spacing = (canvas.height as f64 - h) / (others + 1) as f64;
                (x, spacing * slot as f64)
            }
        };
        element.rect.set_origin_px(nx, ny, canvas);
    }
    Ok(())
}

/// `round(value / grid) * grid`; a non-positive grid leaves the value alone.
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if !(grid.is_finite() && grid > 0.0) {
        return value;
    }
    (value / grid).round() * grid
}

pub fn snap_element(doc: &mut DesignDocument, id: &str, grid: f64) -> Result<(), ValidationError> {
    let canvas = doc.canvas;
    let idx = element_index(doc, id)?;
    let rect = &mut doc.design_elements[idx].rect;
    let (x, y, _, _) = rect.to_pixels(canvas);
    rect.set_origin_px(snap_to_grid(x, grid), snap_to_grid(y, grid), canvas);
    Ok(())
}

/// Drops an element at a pixel origin, snapped first when `grid` is set, then
/// clamped so the element stays fully on the canvas.
pub fn drag_element(
    doc: &mut DesignDocument,
    id: &str,
    x: f64,
    y: f64,
    grid: Option<f64>,
) -> Result<(f64, f64), ValidationError> {
    let canvas = doc.canvas;
    let idx = element_index(doc, id)?;
    let rect = &mut doc.design_elements[idx].rect;
    let (_, _, w, h) = rect.to_pixels(canvas);
    let (x, y) = match grid {
        Some(grid) => (snap_to_grid(x, grid), snap_to_grid(y, grid)),
        None => (x, y),
    };
    let nx = clamp_drag(x, w, canvas.width);
    let ny = clamp_drag(y, h, canvas.height);
    rect.set_origin_px(nx, ny, canvas);
    Ok((nx, ny))
}

/// Appends a text box with default styling and returns its id.
pub fn add_text_box(doc: &mut DesignDocument, content: &str) -> String {
    let id = fresh_id("text", doc.text_boxes.iter().map(|tb| tb.id.as_str()));
    doc.text_boxes.push(TextBox {
        id: id.clone(),
        content: content.to_string(),
        style: TextStyle::new(DEFAULT_TEXT_BOX_FONT_SIZE),
        position: DEFAULT_TEXT_BOX_POSITION,
        max_width_percent: DEFAULT_MAX_WIDTH_PERCENT,
        opacity: 1.0,
        z_index: None,
    });
    id
}

/// Copies a text box, offset by 5% on each axis (capped at 90) with a " Copy" suffix.
pub fn duplicate_text_box(doc: &mut DesignDocument, id: &str) -> Result<String, ValidationError> {
    let source = doc
        .text_box(id)
        .cloned()
        .ok_or_else(|| ValidationError::UnknownElement { id: id.to_string() })?;
    let new_id = fresh_id("text", doc.text_boxes.iter().map(|tb| tb.id.as_str()));
    let offset = |v: f64| (v + DUPLICATE_OFFSET).min(DUPLICATE_MAX);
    doc.text_boxes.push(TextBox {
        id: new_id.clone(),
        content: format!("{} Copy", source.content),
        position: PercentPoint::new(offset(source.position.x), offset(source.position.y)),
        ..source
    });
    Ok(new_id)
}

pub fn remove_text_box(doc: &mut DesignDocument, id: &str) -> Result<TextBox, ValidationError> {
    let idx = doc
        .text_boxes
        .iter()
        .position(|tb| tb.id == id)
        .ok_or_else(|| ValidationError::UnknownElement { id: id.to_string() })?;
    Ok(doc.text_boxes.remove(idx))
}

/// Appends a library element at (50, 50) px with its catalog size.
pub fn add_design_element(doc: &mut DesignDocument, primitive: Primitive) -> String {
    let id = fresh_id(
        primitive.name(),
        doc.design_elements.iter().map(|el| el.id.as_str()),
    );
    let (width, height) = library_size(primitive);
    doc.design_elements.push(DesignElement {
        id: id.clone(),
        descriptor: PrimitiveDescriptor {
            primitive,
            style: FillStrokeStyle::default(),
            opacity: 1.0,
            rotation_deg: 0.0,
        },
        rect: RectSpec::Pixels {
            x: 50.0,
            y: 50.0,
            width,
            height,
        },
    });
    id
}

pub fn remove_design_element(doc: &mut DesignDocument, id: &str) -> Result<DesignElement, ValidationError> {
    let idx = element_index(doc, id)?;
    Ok(doc.design_elements.remove(idx))
}

/// Replaces (or creates) the headline, keeping the current style and position.
pub fn set_main_text(doc: &mut DesignDocument, content: &str) {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        doc.main_text = None;
        return;
    }
    match doc.main_text.as_mut() {
        Some(main) => main.content = trimmed.to_string(),
        None => {
            let mut style = TextStyle::new(doc.canvas.min_side() as f32 * 0.08);
            style.font_weight = crate::text::FontWeight::BOLD;
            doc.main_text = Some(MainText {
                content: trimmed.to_string(),
                style,
                position: PercentPoint::CENTER,
                max_width_percent: DEFAULT_MAX_WIDTH_PERCENT,
            });
        }
    }
}

/// Size the element library gives new elements.
pub fn library_size(primitive: Primitive) -> (f64, f64) {
    match primitive {
        Primitive::Shape(ShapeKind::Rectangle) => (150.0, 100.0),
        Primitive::Shape(ShapeKind::Arrow) => (120.0, 60.0),
        Primitive::Shape(_) => (100.0, 100.0),
        Primitive::Icon(
            IconKind::Facebook | IconKind::Instagram | IconKind::Twitter | IconKind::Linkedin,
        ) => (50.0, 50.0),
        Primitive::Icon(_) => (60.0, 60.0),
        Primitive::Decoration(DecorationKind::Sparkle) => (80.0, 80.0),
        Primitive::Decoration(DecorationKind::Ribbon) => (120.0, 60.0),
        Primitive::Decoration(_) => (100.0, 100.0),
    }
}

fn fresh_id<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let mut taken: HashSet<String> = existing.map(str::to_string).collect();
    let start = taken.len() + 1;
    generated_id(prefix, start, &mut taken)
}

fn element_index(doc: &DesignDocument, id: &str) -> Result<usize, ValidationError> {
    doc.design_elements
        .iter()
        .position(|el| el.id == id)
        .ok_or_else(|| ValidationError::UnknownElement { id: id.to_string() })
}

fn text_box_mut<'a>(doc: &'a mut DesignDocument, id: &str) -> Result<&'a mut TextBox, ValidationError> {
    doc.text_boxes
        .iter_mut()
        .find(|tb| tb.id == id)
        .ok_or_else(|| ValidationError::UnknownElement { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanvasSize;

    const BANNER: CanvasSize = CanvasSize::new(1200, 630);

    fn doc_with_elements(n: usize) -> DesignDocument {
        let mut doc = DesignDocument::from_json(r#"{"mainText":"Hi"}"#, BANNER).unwrap();
        for _ in 0..n {
            add_design_element(&mut doc, Primitive::Shape(ShapeKind::Circle));
        }
        doc
    }

    fn ids(doc: &DesignDocument) -> Vec<&str> {
        doc.design_elements.iter().map(|el| el.id.as_str()).collect()
    }

    #[test]
    fn clamped_drag_of_text_stores_margin_values() {
        let mut doc = doc_with_elements(0);
        let stored = set_main_text_position(&mut doc, 150.0, -10.0);
        assert_eq!(stored, Some(PercentPoint::new(98.0, 2.0)));
        assert_eq!(doc.main_text.unwrap().position, PercentPoint::new(98.0, 2.0));
    }

    #[test]
    fn positioning_without_main_text_reports_none() {
        let mut doc = DesignDocument::from_json("{}", BANNER).unwrap();
        assert!(doc.main_text.is_none());
        assert_eq!(set_main_text_position(&mut doc, 10.0, 10.0), None);
        assert_eq!(center_main_text(&mut doc), None);
        assert!(doc.main_text.is_none());
    }

    #[test]
    fn nudges_step_and_clamp() {
        let mut doc = doc_with_elements(0);
        assert_eq!(
            nudge_main_text(&mut doc, Direction::Right, false),
            Some(PercentPoint::new(51.0, 50.0))
        );
        assert_eq!(
            nudge_main_text(&mut doc, Direction::Up, true),
            Some(PercentPoint::new(51.0, 40.0))
        );
        for _ in 0..10 {
            nudge_main_text(&mut doc, Direction::Up, true);
        }
        assert_eq!(doc.main_text.as_ref().unwrap().position.y, 2.0);
        assert_eq!(center_main_text(&mut doc), Some(PercentPoint::CENTER));
    }

    #[test]
    fn move_to_top_reorders_array() {
        let mut doc = doc_with_elements(3);
        let before: Vec<String> = ids(&doc).iter().map(|s| s.to_string()).collect();
        move_layer(&mut doc, &before[0], LayerMove::Top).unwrap();
        assert_eq!(ids(&doc), vec![before[1].as_str(), before[2].as_str(), before[0].as_str()]);
        move_layer(&mut doc, &before[0], LayerMove::Down).unwrap();
        assert_eq!(ids(&doc), vec![before[1].as_str(), before[0].as_str(), before[2].as_str()]);
        move_layer(&mut doc, &before[0], LayerMove::Bottom).unwrap();
        assert_eq!(ids(&doc)[0], before[0]);
        assert!(move_layer(&mut doc, "nope", LayerMove::Up).is_err());
    }

    #[test]
    fn align_left_preserves_array_order() {
        let mut doc = doc_with_elements(3);
        let order: Vec<String> = ids(&doc).iter().map(|s| s.to_string()).collect();
        drag_element(&mut doc, &order[1], 300.0, 200.0, None).unwrap();
        align_elements(&mut doc, &order[1], Alignment::Left).unwrap();
        let xs: Vec<f64> = doc
            .design_elements
            .iter()
            .map(|el| el.rect.to_pixels(BANNER).0)
            .collect();
        assert_eq!(xs, vec![300.0, 300.0, 300.0]);
        assert_eq!(ids(&doc), order.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn distribute_spreads_other_elements() {
        let mut doc = doc_with_elements(3);
        let anchor = doc.design_elements[0].id.clone();
        align_elements(&mut doc, &anchor, Alignment::DistributeHorizontal).unwrap();
        // (1200 - 100) / 3
        let xs: Vec<f64> = doc.design_elements[1..]
            .iter()
            .map(|el| el.rect.to_pixels(BANNER).0)
            .collect();
        assert!((xs[0] - 1100.0 / 3.0).abs() < 1e-9);
        assert!((xs[1] - 2.0 * 1100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn snapping_rounds_to_grid() {
        assert_eq!(snap_to_grid(29.0, DEFAULT_GRID), 20.0);
        assert_eq!(snap_to_grid(30.0, DEFAULT_GRID), 40.0);
        assert_eq!(snap_to_grid(7.0, 0.0), 7.0);
    }

    #[test]
    fn drag_snaps_then_clamps_inside_canvas() {
        let mut doc = doc_with_elements(1);
        let id = doc.design_elements[0].id.clone();
        assert_eq!(drag_element(&mut doc, &id, 1195.0, -30.0, None).unwrap(), (1100.0, 0.0));
        assert_eq!(
            drag_element(&mut doc, &id, 207.0, 191.0, Some(DEFAULT_GRID)).unwrap(),
            (200.0, 200.0)
        );
    }

    #[test]
    fn duplicate_offsets_and_caps() {
        let mut doc = doc_with_elements(0);
        let id = add_text_box(&mut doc, "Hello");
        set_text_box_position(&mut doc, &id, 88.0, 30.0).unwrap();
        let copy = duplicate_text_box(&mut doc, &id).unwrap();
        assert_ne!(copy, id);
        let dup = doc.text_box(&copy).unwrap();
        assert_eq!(dup.content, "Hello Copy");
        assert_eq!(dup.position, PercentPoint::new(90.0, 35.0));
        remove_text_box(&mut doc, &id).unwrap();
        assert!(doc.text_box(&id).is_none());
        let again = add_text_box(&mut doc, "x");
        assert!(doc.text_boxes.iter().filter(|tb| tb.id == again).count() == 1);
    }

    #[test]
    fn added_elements_get_unique_ids_and_library_sizes() {
        let mut doc = doc_with_elements(0);
        let a = add_design_element(&mut doc, Primitive::Shape(ShapeKind::Rectangle));
        let b = add_design_element(&mut doc, Primitive::Shape(ShapeKind::Rectangle));
        assert_ne!(a, b);
        assert_eq!(
            doc.element(&a).unwrap().rect,
            RectSpec::Pixels {
                x: 50.0,
                y: 50.0,
                width: 150.0,
                height: 100.0
            }
        );
        remove_design_element(&mut doc, &a).unwrap();
        assert!(doc.element(&a).is_none());
        assert!(matches!(
            remove_design_element(&mut doc, &a),
            Err(ValidationError::UnknownElement { .. })
        ));
    }

    #[test]
    fn set_main_text_creates_and_clears() {
        let mut doc = DesignDocument::from_json("{}", BANNER).unwrap();
        set_main_text(&mut doc, "New headline");
        assert_eq!(doc.main_text.as_ref().unwrap().content, "New headline");
        set_main_text(&mut doc, "  ");
        assert!(doc.main_text.is_none());
    }
}
