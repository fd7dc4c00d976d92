//! Port geometry: distribution along a side, rotation, and flipping.
//!
//! Everything here is pure and infallible. Positions are top-left corners
//! in the owning node's local frame; the node's own origin is `(0, 0)`.

use crate::model::Side;
use kurbo::{Point, Size};

/// Fixed footprint of a port, in logical units.
pub const PORT_SIZE: f64 = 16.0;

/// Half of `PORT_SIZE`: how far a port overhangs the node edge it sits on.
pub const PORT_HALF: f64 = PORT_SIZE / 2.0;

/// Offset of the `index`-th port's leading edge along a side of length
/// `side_length` shared by `total_on_side` ports.
///
/// A lone port is centred; otherwise ports are spread evenly from one end
/// of the side to the other.
///
/// Precondition: `index < total_on_side`.
pub fn distribute_along_side(index: usize, total_on_side: usize, side_length: f64) -> f64 {
    if total_on_side <= 1 {
        return (side_length - PORT_SIZE) / 2.0;
    }
    index as f64 * (side_length - PORT_SIZE) / (total_on_side - 1) as f64
}

/// Top-left corner of the `index`-th of `total_on_side` ports on `side`.
pub fn port_position_for_side(side: Side, index: usize, total_on_side: usize, node: Size) -> Point {
    match side {
        Side::Left => Point::new(
            -PORT_HALF,
            distribute_along_side(index, total_on_side, node.height),
        ),
        Side::Right => Point::new(
            node.width - PORT_HALF,
            distribute_along_side(index, total_on_side, node.height),
        ),
        Side::Top => Point::new(
            distribute_along_side(index, total_on_side, node.width),
            -PORT_HALF,
        ),
        Side::Bottom => Point::new(
            distribute_along_side(index, total_on_side, node.width),
            node.height - PORT_HALF,
        ),
    }
}

/// Rotate `(x, y)` about `(cx, cy)` by `degrees`.
///
/// Uses the SVG `rotate()` convention in a y-down frame, so the result
/// matches `translate(c) rotate(a) translate(-c)` applied by the renderer.
pub fn rotate_point(x: f64, y: f64, cx: f64, cy: f64, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = x - cx;
    let dy = y - cy;
    Point::new(cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
}

/// `true` for the neutral rotation band `{0, 360, -360}` and only those.
pub fn is_neutral_rotation(degrees: f64) -> bool {
    degrees == 0.0 || degrees == 360.0 || degrees == -360.0
}

/// Where a `width` × `height` port box at `(x, y)` ends up after the node
/// rotates by `rotation` degrees about `(cx, cy)`.
///
/// The box's centre is rotated, then translated back to a top-left corner.
/// Neutral rotations return the input unchanged.
pub fn rotated_port_position(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation: f64,
    cx: f64,
    cy: f64,
) -> Point {
    if is_neutral_rotation(rotation) {
        return Point::new(x, y);
    }
    let center = rotate_point(x + width / 2.0, y + height / 2.0, cx, cy, rotation);
    Point::new(center.x - width / 2.0, center.y - height / 2.0)
}

/// Mirror a box of `extent` starting at `coord` about a flip offset.
///
/// The renderer flips a node body with `translate(offset) scale(-1)`, which
/// maps `c` to `offset - c`; the box's leading edge is then its old
/// trailing edge.
pub fn flip_coordinate(coord: f64, extent: f64, offset: f64) -> f64 {
    offset - coord - extent
}

/// Orthogonal horizontal–vertical–horizontal route from `from` to `to`,
/// breaking at the horizontal midpoint.
pub fn orthogonal_route(from: Point, to: Point) -> [Point; 4] {
    let mid_x = (from.x + to.x) / 2.0;
    [from, Point::new(mid_x, from.y), Point::new(mid_x, to.y), to]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    #[test]
    fn single_port_is_centred() {
        assert_eq!(distribute_along_side(0, 1, 60.0), 22.0);
    }

    #[test]
    fn three_ports_span_the_side() {
        let offsets: Vec<f64> = (0..3).map(|i| distribute_along_side(i, 3, 60.0)).collect();
        assert_eq!(offsets, vec![0.0, 22.0, 44.0]);
    }

    #[test]
    fn distribution_is_monotonic() {
        for total in 1..12 {
            for len in [16.0, 40.0, 60.0, 333.5] {
                let mut prev = f64::MIN;
                for i in 0..total {
                    let v = distribute_along_side(i, total, len);
                    assert!(v >= prev, "total={total} len={len} i={i}");
                    prev = v;
                }
            }
        }
    }

    #[test]
    fn side_positions_for_120x60() {
        let size = Size::new(120.0, 60.0);
        assert_eq!(
            port_position_for_side(Side::Left, 0, 1, size),
            Point::new(-8.0, 22.0)
        );
        assert_eq!(
            port_position_for_side(Side::Right, 0, 1, size),
            Point::new(112.0, 22.0)
        );
        assert_eq!(
            port_position_for_side(Side::Top, 0, 1, size),
            Point::new(52.0, -8.0)
        );
        assert_eq!(
            port_position_for_side(Side::Bottom, 1, 2, size),
            Point::new(104.0, 52.0)
        );
    }

    #[test]
    fn rotate_point_quarter_turn_is_clockwise_on_screen() {
        // (10, 0) around the origin by 90° lands on +y (down on screen).
        assert!(close(rotate_point(10.0, 0.0, 0.0, 0.0, 90.0), Point::new(0.0, 10.0)));
    }

    #[test]
    fn rotate_point_inverse_with_negated_angle() {
        for angle in [-270.0, -45.0, 13.0, 90.0, 181.5, 300.0] {
            let p = rotate_point(37.0, -12.5, 60.0, 30.0, angle);
            let back = rotate_point(p.x, p.y, 60.0, 30.0, -angle);
            assert!(close(back, Point::new(37.0, -12.5)), "angle {angle}");
        }
    }

    #[test]
    fn neutral_band_is_exact() {
        for r in [0.0, 360.0, -360.0] {
            assert_eq!(
                rotated_port_position(-8.0, 22.0, 16.0, 16.0, r, 60.0, 30.0),
                Point::new(-8.0, 22.0)
            );
        }
        for r in [720.0, 359.0, 0.5] {
            assert!(!is_neutral_rotation(r));
        }
        for r in [90.0, 180.0, -90.0] {
            assert_ne!(
                rotated_port_position(-8.0, 22.0, 16.0, 16.0, r, 60.0, 30.0),
                Point::new(-8.0, 22.0)
            );
        }
    }

    #[test]
    fn left_port_moves_to_top_after_quarter_turn() {
        // 120x60 node, left port centred at (0, 30). A 90° turn about (60, 30)
        // brings its centre to (60, -30).
        let p = rotated_port_position(-8.0, 22.0, 16.0, 16.0, 90.0, 60.0, 30.0);
        assert!(close(p, Point::new(52.0, -38.0)));
    }

    #[test]
    fn flip_mirrors_about_offset() {
        // Left port on a 120-wide node flips onto the right edge.
        assert_eq!(flip_coordinate(-8.0, 16.0, 120.0), 112.0);
        assert_eq!(flip_coordinate(112.0, 16.0, 120.0), -8.0);
    }

    #[test]
    fn route_breaks_at_midpoint() {
        let route = orthogonal_route(Point::new(0.0, 0.0), Point::new(100.0, 40.0));
        assert_eq!(route[1], Point::new(50.0, 0.0));
        assert_eq!(route[2], Point::new(50.0, 40.0));
    }
}
