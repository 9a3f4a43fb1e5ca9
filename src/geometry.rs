//! Wrapped-space geometry for the toroidal battlefield (spec §4.2).
//!
//! `angle`'s `atan2(dx, dy)` argument order is deliberate and must never be
//! "fixed" to the more common `atan2(dy, dx)` — clients observe it bit for
//! bit via `detect` and `hit`.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, half-open on both axes: `[x1, x2) x [y1, y2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x1 && p.x < self.x2 && p.y >= self.y1 && p.y < self.y2
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// Mathematical modulo — always returns a value in `[0, m)`, unlike `%`.
pub fn modulo(a: f64, m: f64) -> f64 {
    let r = a % m;
    if r < 0.0 { r + m } else { r }
}

/// Bearing from `a` to `b`, in `[0, 2*PI)`. `0` points along `+y`, angle
/// increases clockwise (screen convention) — note the `atan2(dx, dy)` order.
pub fn angle(a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    modulo(dx.atan2(dy), 2.0 * PI)
}

/// Non-wrapped Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Moves `from` by `distance` along `angle`, wrapping both axes modulo
/// `(width, height)`.
pub fn move_wrapped(from: Point, angle: f64, distance: f64, width: f64, height: f64) -> Point {
    let x = modulo(from.x + angle.sin() * distance, width);
    let y = modulo(from.y + angle.cos() * distance, height);
    Point::new(x, y)
}

/// Splits the wrapped image of `[a, b)` (a range of length `b - a`, which
/// may exceed `size`) into 1 or 2 sub-ranges inside `[0, size)` whose union
/// is that image.
fn wrap_segments(a: f64, b: f64, size: f64) -> Vec<(f64, f64)> {
    let len = b - a;
    if len >= size {
        return vec![(0.0, size)];
    }
    if len <= 0.0 {
        return vec![];
    }
    let a0 = modulo(a, size);
    let b0 = a0 + len;
    if b0 <= size {
        vec![(a0, b0)]
    } else {
        vec![(a0, size), (0.0, b0 - size)]
    }
}

/// Enumerates sub-rectangles, each fully inside `field`, whose union covers
/// the wrapped image of `target` (spec §4.2, "wrapped bounding-box
/// enumeration"). `target` may extend past any edge of `field`; the result
/// has between 1 and 4 rectangles (one per combination of an x wrap segment
/// and a y wrap segment).
pub fn generate_wrapped_bounds(field: Rect, target: Rect) -> Vec<Rect> {
    let xs = wrap_segments(target.x1, target.x2, field.width());
    let ys = wrap_segments(target.y1, target.y2, field.height());

    let mut out = Vec::with_capacity(xs.len() * ys.len());
    for &(x1, x2) in &xs {
        for &(y1, y2) in &ys {
            out.push(Rect::new(
                field.x1 + x1,
                field.y1 + y1,
                field.x1 + x2,
                field.y1 + y2,
            ));
        }
    }
    out
}

/// Answers spec §4.2's "wrapped radius containment": is `p` within `r` of
/// `center` under any of the 9 toroidal translates of `p`? Returns the
/// translate realizing the smallest such distance — the "short path" used
/// to report bearings in `detect`/`hit` — or `None` if no translate is
/// within `r`.
pub fn wrapped_radius_translate(
    center: Point,
    p: Point,
    r: f64,
    width: f64,
    height: f64,
) -> Option<Point> {
    let mut best: Option<(Point, f64)> = None;
    for i in [-1.0, 0.0, 1.0] {
        for j in [-1.0, 0.0, 1.0] {
            let translate = Point::new(p.x + i * width, p.y + j * height);
            let d = distance(center, translate);
            if d <= r {
                match best {
                    Some((_, best_d)) if best_d <= d => {}
                    _ => best = Some((translate, d)),
                }
            }
        }
    }
    best.map(|(p, _)| p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_zero_points_along_plus_y() {
        let a = angle(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        assert!((a - 0.0).abs() < 1e-9);
    }

    #[test]
    fn angle_quarter_turn_clockwise_is_plus_x() {
        let a = angle(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((a - PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn angle_is_always_non_negative() {
        let a = angle(Point::new(0.0, 0.0), Point::new(-1.0, 0.0));
        assert!(a >= 0.0 && a < 2.0 * PI);
    }

    #[test]
    fn move_wrapped_no_op_at_zero_distance() {
        let p = Point::new(0.5, 0.5);
        let moved = move_wrapped(p, 1.23, 0.0, 2.0, 2.0);
        assert!((moved.x - p.x).abs() < 1e-12);
        assert!((moved.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn move_wrapped_wraps_past_edge() {
        let p = Point::new(1.9, 0.0);
        let moved = move_wrapped(p, PI / 2.0, 0.2, 2.0, 2.0);
        assert!((moved.x - 0.1).abs() < 1e-9, "got {}", moved.x);
    }

    #[test]
    fn modulo_handles_exact_multiple() {
        assert_eq!(modulo(2.0, 2.0), 0.0);
        assert_eq!(modulo(-0.0001, 2.0) > 0.0, true);
    }

    #[test]
    fn wrap_bounds_cover_interior_target_unchanged() {
        let field = Rect::new(0.0, 0.0, 2.0, 2.0);
        let target = Rect::new(0.5, 0.5, 1.0, 1.0);
        let bounds = generate_wrapped_bounds(field, target);
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0], target);
    }

    #[test]
    fn wrap_bounds_split_on_edge_spillover() {
        let field = Rect::new(0.0, 0.0, 2.0, 2.0);
        // x range [1.9, 2.1) wraps to [1.9,2.0) plus [0.0,0.1)
        let target = Rect::new(1.9, 0.5, 2.1, 1.0);
        let bounds = generate_wrapped_bounds(field, target);
        assert_eq!(bounds.len(), 2);
        for b in &bounds {
            assert!(b.x1 >= 0.0 && b.x2 <= 2.0);
        }
    }

    #[test]
    fn wrap_bounds_split_on_corner_spillover() {
        let field = Rect::new(0.0, 0.0, 2.0, 2.0);
        let target = Rect::new(1.9, 1.9, 2.1, 2.1);
        let bounds = generate_wrapped_bounds(field, target);
        assert_eq!(bounds.len(), 4);
        for b in &bounds {
            assert!(b.x1 >= 0.0 && b.x2 <= 2.0);
            assert!(b.y1 >= 0.0 && b.y2 <= 2.0);
        }
    }

    #[test]
    fn wrapped_radius_finds_short_path_across_seam() {
        let center = Point::new(0.0, 0.0);
        let target = Point::new(1.95, 0.0);
        let hit = wrapped_radius_translate(center, target, 0.3, 2.0, 2.0);
        let translate = hit.expect("should be within wrapped radius");
        assert!((translate.x - (-0.05)).abs() < 1e-9, "got {}", translate.x);
        assert!((distance(center, translate) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn wrapped_radius_none_when_too_far() {
        let center = Point::new(0.0, 0.0);
        let target = Point::new(1.0, 1.0);
        assert!(wrapped_radius_translate(center, target, 0.1, 2.0, 2.0).is_none());
    }
}
