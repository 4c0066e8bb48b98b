//! Vector path segments and an SVG path-data parser.

/// Absolute path segment. Quadratics and arcs are normalized to cubics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSeg {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    CurveTo(f32, f32, f32, f32, f32, f32),
    Close,
}

impl PathSeg {
    fn map(self, f: impl Fn(f32, f32) -> (f32, f32)) -> Self {
        match self {
            PathSeg::MoveTo(x, y) => {
                let (x, y) = f(x, y);
                PathSeg::MoveTo(x, y)
            }
            PathSeg::LineTo(x, y) => {
                let (x, y) = f(x, y);
                PathSeg::LineTo(x, y)
            }
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => {
                let (x1, y1) = f(x1, y1);
                let (x2, y2) = f(x2, y2);
                let (x, y) = f(x, y);
                PathSeg::CurveTo(x1, y1, x2, y2, x, y)
            }
            PathSeg::Close => PathSeg::Close,
        }
    }
}

/// Uniform scale plus offset, as produced by fitting a view box into bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Placement {
    /// Fits a square `view_box` into `(x, y, w, h)` keeping the aspect ratio, centered
    /// on both axes (SVG `xMidYMid meet`).
    pub fn meet(view_box: f32, x: f32, y: f32, w: f32, h: f32) -> Self {
        let view_box = view_box.max(f32::EPSILON);
        let scale = (w / view_box).min(h / view_box).max(0.0);
        Self {
            scale,
            dx: x + (w - view_box * scale) / 2.0,
            dy: y + (h - view_box * scale) / 2.0,
        }
    }

    pub fn apply(&self, segs: &[PathSeg]) -> Vec<PathSeg> {
        segs.iter()
            .map(|seg| seg.map(|x, y| (self.dx + x * self.scale, self.dy + y * self.scale)))
            .collect()
    }
}

pub fn rect(x: f32, y: f32, w: f32, h: f32) -> Vec<PathSeg> {
    vec![
        PathSeg::MoveTo(x, y),
        PathSeg::LineTo(x + w, y),
        PathSeg::LineTo(x + w, y + h),
        PathSeg::LineTo(x, y + h),
        PathSeg::Close,
    ]
}

/// Ellipse from four cubic quarter arcs.
pub fn ellipse(cx: f32, cy: f32, rx: f32, ry: f32) -> Vec<PathSeg> {
    const KAPPA: f32 = 0.552_284_75;
    let ox = rx * KAPPA;
    let oy = ry * KAPPA;
    vec![
        PathSeg::MoveTo(cx + rx, cy),
        PathSeg::CurveTo(cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry),
        PathSeg::CurveTo(cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy),
        PathSeg::CurveTo(cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry),
        PathSeg::CurveTo(cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy),
        PathSeg::Close,
    ]
}

pub fn parse_path_data(d: &str) -> Vec<PathSeg> {
    let mut segs = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur_x = 0.0;
    let mut cur_y = 0.0;
    let mut start_x = 0.0;
    let mut start_y = 0.0;
    let mut last_cubic_ctrl2: Option<(f32, f32)> = None;
    let mut last_quad_ctrl: Option<(f32, f32)> = None;

    loop {
        p.skip_ws();
        let before = p.i;
        let Some(c) = p.next_command_or_number(&mut cmd) else {
            break;
        };
        match c {
            'M' | 'm' => {
                let rel = c == 'm';
                if let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::MoveTo(x, y));
                    cur_x = x;
                    cur_y = y;
                    start_x = x;
                    start_y = y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;

                    // Extra pairs after a moveto are implicit linetos.
                    while let Some((x2, y2)) = p.next_pair() {
                        let (x2, y2) = if rel {
                            (cur_x + x2, cur_y + y2)
                        } else {
                            (x2, y2)
                        };
                        segs.push(PathSeg::LineTo(x2, y2));
                        cur_x = x2;
                        cur_y = y2;
                    }
                }
            }
            'L' | 'l' => {
                let rel = c == 'l';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::LineTo(x, y));
                    cur_x = x;
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' | 'h' => {
                let rel = c == 'h';
                while let Some(x) = p.next_number() {
                    let x = if rel { cur_x + x } else { x };
                    segs.push(PathSeg::LineTo(x, cur_y));
                    cur_x = x;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' | 'v' => {
                let rel = c == 'v';
                while let Some(y) = p.next_number() {
                    let y = if rel { cur_y + y } else { y };
                    segs.push(PathSeg::LineTo(cur_x, y));
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' | 'c' => {
                let rel = c == 'c';
                while let (Some(x1), Some(y1), Some(x2), Some(y2), Some(x), Some(y)) = (
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                ) {
                    let (x1, y1, x2, y2, x, y) = if rel {
                        (
                            cur_x + x1,
                            cur_y + y1,
                            cur_x + x2,
                            cur_y + y2,
                            cur_x + x,
                            cur_y + y,
                        )
                    } else {
                        (x1, y1, x2, y2, x, y)
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'S' | 's' => {
                let rel = c == 's';
                while let (Some(x2), Some(y2), Some(x), Some(y)) = (
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                ) {
                    let (x2, y2, x, y) = if rel {
                        (cur_x + x2, cur_y + y2, cur_x + x, cur_y + y)
                    } else {
                        (x2, y2, x, y)
                    };
                    let (x1, y1) = match last_cubic_ctrl2 {
                        Some((px2, py2)) => (2.0 * cur_x - px2, 2.0 * cur_y - py2),
                        None => (cur_x, cur_y),
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'Q' | 'q' => {
                let rel = c == 'q';
                while let (Some(x1), Some(y1), Some(x), Some(y)) = (
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                ) {
                    let (x1, y1, x, y) = if rel {
                        (cur_x + x1, cur_y + y1, cur_x + x, cur_y + y)
                    } else {
                        (x1, y1, x, y)
                    };
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, x1, y1, x, y);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((x1, y1));
                    last_cubic_ctrl2 = Some((c2x, c2y));
                }
            }
            'T' | 't' => {
                let rel = c == 't';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    let (qx, qy) = match last_quad_ctrl {
                        Some((px1, py1)) => (2.0 * cur_x - px1, 2.0 * cur_y - py1),
                        None => (cur_x, cur_y),
                    };
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, qx, qy, x, y);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((qx, qy));
                    last_cubic_ctrl2 = Some((c2x, c2y));
                }
            }
            'A' | 'a' => {
                let rel = c == 'a';
                while let (
                    Some(rx),
                    Some(ry),
                    Some(rot),
                    Some(large),
                    Some(sweep),
                    Some(x),
                    Some(y),
                ) = (
                    p.next_number(),
                    p.next_number(),
                    p.next_number(),
                    p.next_arc_flag(),
                    p.next_arc_flag(),
                    p.next_number(),
                    p.next_number(),
                ) {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    let curves = arc_to_cubics(cur_x, cur_y, rx, ry, rot, large, sweep, x, y);
                    last_cubic_ctrl2 = curves.iter().rev().find_map(|seg| match *seg {
                        PathSeg::CurveTo(_, _, x2, y2, _, _) => Some((x2, y2)),
                        _ => None,
                    });
                    segs.extend(curves);
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = None;
                }
            }
            'Z' | 'z' => {
                segs.push(PathSeg::Close);
                cur_x = start_x;
                cur_y = start_y;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            _ => {}
        }
        // Neither a command nor a usable number: skip the byte.
        if p.i == before {
            p.i += 1;
        }
    }

    segs
}

fn quad_to_cubic(x0: f32, y0: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
    let c1x = x0 + (2.0 / 3.0) * (x1 - x0);
    let c1y = y0 + (2.0 / 3.0) * (y1 - y0);
    let c2x = x2 + (2.0 / 3.0) * (x1 - x2);
    let c2y = y2 + (2.0 / 3.0) * (y1 - y2);
    (c1x, c1y, c2x, c2y)
}

// Elliptical arc to cubics via the center parameterization (SVG 1.1 implementation notes).
#[allow(clippy::too_many_arguments)]
fn arc_to_cubics(
    x0: f32,
    y0: f32,
    rx_in: f32,
    ry_in: f32,
    x_axis_rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
    x1: f32,
    y1: f32,
) -> Vec<PathSeg> {
    use std::f32::consts::PI;

    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 || (x0 == x1 && y0 == y1) {
        return vec![PathSeg::LineTo(x1, y1)];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sinf(phi);
    let cos_phi = libm::cosf(phi);

    let dx2 = (x0 - x1) / 2.0;
    let dy2 = (y0 - y1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Scale radii up when they cannot span the endpoints.
    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrtf(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let mut coef = 0.0;
    if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        coef = sign * libm::sqrtf((num / den).max(0.0));
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

    fn angle(ux: f32, uy: f32, vx: f32, vy: f32) -> f32 {
        libm::atan2f(ux * vy - uy * vx, ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    // Quarter turns at most per cubic.
    let count = libm::ceilf(dtheta.abs() / (PI / 2.0)).max(1.0) as i32;
    let delta = dtheta / count as f32;
    let k = (4.0 / 3.0) * libm::tanf(delta / 4.0);
    let map = |x: f32, y: f32| -> (f32, f32) {
        let x = rx * x;
        let y = ry * y;
        (cx + cos_phi * x - sin_phi * y, cy + sin_phi * x + cos_phi * y)
    };

    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (s1, c1) = (libm::sinf(theta), libm::cosf(theta));
        let t2 = theta + delta;
        let (s2, c2) = (libm::sinf(t2), libm::cosf(t2));
        let (c1x, c1y) = map(c1 - k * s1, s1 + k * c1);
        let (c2x, c2y) = map(c2 + k * s2, s2 - k * c2);
        let (ex, ey) = map(c2, s2);
        out.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, ex, ey));
        theta = t2;
    }
    out
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b' ' | b'\n' | b'\r' | b'\t' | b',' => self.i += 1,
                _ => break,
            }
        }
    }

    fn next_command_or_number(&mut self, current: &mut char) -> Option<char> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let c = self.bytes[self.i] as char;
        if c.is_ascii_alphabetic() && c != 'e' && c != 'E' {
            *current = c;
            self.i += 1;
            return Some(c);
        }
        // No new command; the previous one repeats.
        Some(*current)
    }

    fn next_number(&mut self) -> Option<f32> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let start = self.i;
        let mut has = false;

        if matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has = true;
            }
        }
        if has && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
            }
        }

        if !has {
            self.i = start;
            return None;
        }

        let s = std::str::from_utf8(&self.bytes[start..self.i]).ok()?;
        s.parse::<f32>().ok()
    }

    // Arc flags may be packed without separators ("a1 1 0 014 4").
    fn next_arc_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        match self.bytes.get(self.i)? {
            b'0' => {
                self.i += 1;
                Some(false)
            }
            b'1' => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    fn next_pair(&mut self) -> Option<(f32, f32)> {
        let start = self.i;
        let Some(x) = self.next_number() else {
            self.i = start;
            return None;
        };
        let Some(y) = self.next_number() else {
            self.i = start;
            return None;
        };
        Some((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_star_outline() {
        let segs = parse_path_data("M50,5 L60,35 L95,35 L68,57 L78,91 L50,70 Z");
        assert_eq!(segs.len(), 7);
        assert_eq!(segs[0], PathSeg::MoveTo(50.0, 5.0));
        assert_eq!(segs[5], PathSeg::LineTo(50.0, 70.0));
        assert_eq!(segs[6], PathSeg::Close);
    }

    #[test]
    fn relative_commands_accumulate() {
        let segs = parse_path_data("M3 13h8V3H3v10z");
        assert_eq!(
            segs,
            vec![
                PathSeg::MoveTo(3.0, 13.0),
                PathSeg::LineTo(11.0, 13.0),
                PathSeg::LineTo(11.0, 3.0),
                PathSeg::LineTo(3.0, 3.0),
                PathSeg::LineTo(3.0, 13.0),
                PathSeg::Close,
            ]
        );
    }

    #[test]
    fn parses_compact_arc_flags_without_separator() {
        let segs = parse_path_data("M10 10 a10 10 0 014 4");
        assert!(matches!(segs[0], PathSeg::MoveTo(10.0, 10.0)));
        let Some(PathSeg::CurveTo(.., x, y)) = segs.last().copied() else {
            panic!("expected arc to end with a cubic");
        };
        assert!((x - 14.0).abs() < 1e-3 && (y - 14.0).abs() < 1e-3);
    }

    #[test]
    fn implicit_repeats_and_minus_separators() {
        let segs = parse_path_data("m16 6 2.29 2.29-4.88 4.88");
        assert_eq!(segs.len(), 3);
        let PathSeg::LineTo(x, y) = segs[2] else {
            panic!("expected lineto");
        };
        assert!((x - 13.41).abs() < 1e-3 && (y - 13.17).abs() < 1e-3);
    }

    #[test]
    fn garbage_does_not_hang_the_parser() {
        let segs = parse_path_data("M0 0 L10 10 # ! Z ?");
        assert!(segs.contains(&PathSeg::LineTo(10.0, 10.0)));
    }

    #[test]
    fn meet_centers_square_view_box_in_wide_bounds() {
        let placement = Placement::meet(100.0, 0.0, 0.0, 200.0, 100.0);
        assert_eq!(placement.scale, 1.0);
        assert_eq!(placement.dx, 50.0);
        assert_eq!(placement.dy, 0.0);
        let mapped = placement.apply(&[PathSeg::MoveTo(0.0, 0.0)]);
        assert_eq!(mapped, vec![PathSeg::MoveTo(50.0, 0.0)]);
    }
}
