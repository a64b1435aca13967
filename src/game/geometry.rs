//! Geometry primitives: swept segment vs circle, border projection, reflection
//!
//! Projectiles and the ball move several units per tick, so a plain
//! point-in-circle test at the end of the step lets fast shots tunnel through
//! a player. Every collision in the engine instead tests the segment swept
//! during the tick.

use super::vector::Vec2;

/// Errors raised by geometric constructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("direction towards the target has zero length")]
    ZeroLengthDirection,
}

/// How a segment `p1 -> p2` relates to a circle.
///
/// `t` below is the parameter along `p1 + t * (p2 - p1)`; `t1 <= t2` are the
/// two roots where the infinite line crosses the circle border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentHit {
    /// Enters and exits within the segment (`0 <= t1 <= t2 <= 1`)
    Impale,
    /// Enters and ends inside (`0 <= t1 <= 1 < t2`)
    Poke,
    /// Starts inside and exits (`t1 < 0 <= t2 <= 1`)
    ExitWound,
    /// Both endpoints inside (`t1 < 0`, `t2 > 1`)
    CompletelyInside,
    /// The circle lies ahead of the segment end (`t1 > 1`)
    FallShort,
    /// The circle lies behind the segment start (`t2 < 0`)
    Past,
    /// The line never touches the circle
    Miss,
}

impl SegmentHit {
    pub fn is_hit(self) -> bool {
        matches!(
            self,
            SegmentHit::Impale | SegmentHit::Poke | SegmentHit::ExitWound | SegmentHit::CompletelyInside
        )
    }
}

/// Classify the segment `p1 -> p2` against the circle at `center`.
pub fn segment_circle(p1: Vec2, p2: Vec2, center: Vec2, radius: f32) -> SegmentHit {
    let d = p2 - p1;
    let f = p1 - center;

    let a = d.dot(d);
    if a <= f32::EPSILON {
        // Degenerate segment, e.g. a ball at rest
        return if f.length_squared() <= radius * radius {
            SegmentHit::CompletelyInside
        } else {
            SegmentHit::Miss
        };
    }

    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return SegmentHit::Miss;
    }

    let root = discriminant.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);

    if (0.0..=1.0).contains(&t1) {
        if t2 <= 1.0 {
            SegmentHit::Impale
        } else {
            SegmentHit::Poke
        }
    } else if (0.0..=1.0).contains(&t2) {
        SegmentHit::ExitWound
    } else if t1 > 1.0 {
        SegmentHit::FallShort
    } else if t2 < 0.0 {
        SegmentHit::Past
    } else {
        SegmentHit::CompletelyInside
    }
}

pub fn segment_intersects_circle(p1: Vec2, p2: Vec2, center: Vec2, radius: f32) -> bool {
    segment_circle(p1, p2, center, radius).is_hit()
}

/// The point on the circle border along the ray from `center` to `toward`.
pub fn point_on_circle_towards(center: Vec2, radius: f32, toward: Vec2) -> Result<Vec2, GeometryError> {
    let direction = (toward - center)
        .try_normalize()
        .ok_or(GeometryError::ZeroLengthDirection)?;
    Ok(center + direction * radius)
}

/// Reflect `d` about the unit normal `n`: `d - 2 (d . n) n`
pub fn reflect(d: Vec2, n: Vec2) -> Vec2 {
    d - n * (2.0 * d.dot(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn classify_all() -> Vec<(Vec2, Vec2, Vec2, f32, SegmentHit)> {
        let c = Vec2::new(0.0, 0.0);
        vec![
            (Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0), c, 10.0, SegmentHit::Impale),
            (Vec2::new(-20.0, 0.0), Vec2::new(0.0, 0.0), c, 10.0, SegmentHit::Poke),
            (Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0), c, 10.0, SegmentHit::ExitWound),
            (Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0), c, 10.0, SegmentHit::CompletelyInside),
            (Vec2::new(-40.0, 0.0), Vec2::new(-20.0, 0.0), c, 10.0, SegmentHit::FallShort),
            (Vec2::new(20.0, 0.0), Vec2::new(40.0, 0.0), c, 10.0, SegmentHit::Past),
            (Vec2::new(-20.0, 15.0), Vec2::new(20.0, 15.0), c, 10.0, SegmentHit::Miss),
        ]
    }

    #[test]
    fn test_segment_classification() {
        for (p1, p2, center, r, expected) in classify_all() {
            assert_eq!(segment_circle(p1, p2, center, r), expected, "{p1:?} -> {p2:?}");
        }
    }

    #[test]
    fn test_intersection_symmetric_under_endpoint_swap() {
        for (p1, p2, center, r, _) in classify_all() {
            assert_eq!(
                segment_intersects_circle(p1, p2, center, r),
                segment_intersects_circle(p2, p1, center, r)
            );
        }
    }

    #[test]
    fn test_intersection_invariant_under_translation() {
        let offset = Vec2::new(312.0, -41.5);
        for (p1, p2, center, r, _) in classify_all() {
            assert_eq!(
                segment_intersects_circle(p1, p2, center, r),
                segment_intersects_circle(p1 + offset, p2 + offset, center + offset, r)
            );
        }
    }

    #[test]
    fn test_fast_segment_does_not_tunnel() {
        // Both endpoints are outside the circle, the body passes straight through
        let hit = segment_circle(Vec2::new(95.0, 100.0), Vec2::new(125.0, 100.0), Vec2::new(110.0, 100.0), 10.0);
        assert_eq!(hit, SegmentHit::Impale);
    }

    #[test]
    fn test_degenerate_segment_is_point_test() {
        let c = Vec2::new(400.0, 300.0);
        assert!(segment_intersects_circle(c, c, Vec2::new(405.0, 300.0), 20.0));
        assert!(!segment_intersects_circle(c, c, Vec2::new(450.0, 300.0), 20.0));
    }

    #[test]
    fn test_point_on_circle_towards() {
        let p = point_on_circle_towards(Vec2::new(10.0, 10.0), 5.0, Vec2::new(30.0, 10.0)).unwrap();
        assert!((p.x - 15.0).abs() < EPS);
        assert!((p.y - 10.0).abs() < EPS);
    }

    #[test]
    fn test_point_on_circle_towards_center_fails() {
        let c = Vec2::new(10.0, 10.0);
        assert_eq!(point_on_circle_towards(c, 5.0, c), Err(GeometryError::ZeroLengthDirection));
    }

    #[test]
    fn test_reflection_law() {
        let normals = [Vec2::new(1.0, 0.0), Vec2::new(0.0, -1.0), Vec2::new(1.0, 1.0).normalize()];
        let directions = [Vec2::new(7.0, 0.0), Vec2::new(-3.0, 4.5), Vec2::new(0.2, -6.0)];
        for n in normals {
            for d in directions {
                let r = reflect(d, n);
                assert!((r.dot(n) + d.dot(n)).abs() < EPS);
                assert!((r.length() - d.length()).abs() < EPS);
            }
        }
    }
}
