//! Planar intersection primitives used by the ToF ring.
//!
//! Every function here is total: degenerate input (parallel lines, a ray that
//! misses a circle) yields `None`, so callers can fold a running minimum over
//! many obstacles without special cases.

use nalgebra::Point2;

/// Euclidean distance between two points
#[inline]
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Infinite line through two points in implicit form `a*x + b*y = c`
#[derive(Debug, Clone, Copy)]
struct ImplicitLine {
    a: f64,
    b: f64,
    c: f64,
}

impl ImplicitLine {
    fn through(p1: &Point2<f64>, p2: &Point2<f64>) -> Self {
        Self {
            a: p1.y - p2.y,
            b: p2.x - p1.x,
            c: -(p1.x * p2.y - p2.x * p1.y),
        }
    }
}

/// Intersection of the infinite lines through (p1, p2) and (p3, p4).
///
/// Returns `None` only when the determinant is exactly zero (parallel or
/// coincident lines). No tolerance is applied, so nearly parallel lines
/// intersect far away.
pub fn line_intersection(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    p3: &Point2<f64>,
    p4: &Point2<f64>,
) -> Option<Point2<f64>> {
    let l1 = ImplicitLine::through(p1, p2);
    let l2 = ImplicitLine::through(p3, p4);

    let d = l1.a * l2.b - l1.b * l2.a;
    if d == 0.0 {
        return None;
    }

    let dx = l1.c * l2.b - l1.b * l2.c;
    let dy = l1.a * l2.c - l1.c * l2.a;
    Some(Point2::new(dx / d, dy / d))
}

/// Distance from `sensor` to where its ray towards `far` crosses the segment
/// `start`-`end`.
///
/// The crossing must lie strictly inside both the segment and the sensor ray:
/// the vectors from the crossing to both endpoints of each pair have to point
/// in opposite directions. Touching an endpoint counts as a miss.
pub fn visible_hit_on_segment(
    start: &Point2<f64>,
    end: &Point2<f64>,
    sensor: &Point2<f64>,
    far: &Point2<f64>,
) -> Option<f64> {
    let hit = line_intersection(start, end, sensor, far)?;

    let along_ray = (hit - sensor).dot(&(hit - far));
    let along_segment = (hit - start).dot(&(hit - end));
    if along_ray >= 0.0 || along_segment >= 0.0 {
        return None;
    }

    Some(distance(&hit, sensor))
}

/// Distance from `sensor` to the near surface of a circle along the ray
/// towards `far`.
///
/// Solved in circle-centred coordinates. A tangent ray (zero discriminant)
/// misses. Of the two crossings the one closer to the sensor is the visible
/// one; it must also lie in front of the sensor.
pub fn circle_line_intersection(
    center: &Point2<f64>,
    radius: f64,
    sensor: &Point2<f64>,
    far: &Point2<f64>,
) -> Option<f64> {
    let p1 = sensor - center;
    let p2 = far - center;

    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let dr2 = dx * dx + dy * dy;
    let det = p1.x * p2.y - p2.x * p1.y;

    let discriminant = radius * radius * dr2 - det * det;
    if !(discriminant > 0.0) {
        return None;
    }

    let sgn = if dy < 0.0 { -1.0 } else { 1.0 };
    let s = discriminant.sqrt();
    let hit1 = Point2::new(
        (det * dy + sgn * dx * s) / dr2 + center.x,
        (-det * dx + dy.abs() * s) / dr2 + center.y,
    );
    let hit2 = Point2::new(
        (det * dy - sgn * dx * s) / dr2 + center.x,
        (-det * dx - dy.abs() * s) / dr2 + center.y,
    );

    let dist1 = distance(&hit1, sensor);
    let dist2 = distance(&hit2, sensor);
    let (dist, hit) = if dist1 < dist2 {
        (dist1, hit1)
    } else {
        (dist2, hit2)
    };

    // A hit behind the sensor points against the facing direction
    let facing = far - sensor;
    if dist > 0.0 && facing.dot(&(hit - sensor)) > 0.0 {
        Some(dist)
    } else {
        None
    }
}
