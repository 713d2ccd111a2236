//! Intersection queries for points vs. colliders.

use super::{Collider, WorldShape};
use crate::math as m;

/// Check whether or not a point is inside a collider,
/// using the collider's cached world-space geometry.
///
/// Points exactly on the boundary are not considered inside.
/// Returns `None` if the collider has no cached geometry.
pub fn point_collider_bool(point: m::Vec2, coll: &Collider) -> Option<bool> {
    Some(match coll.world_shape()? {
        WorldShape::Circle { center, r } => (point - center).mag_sq() < r * r,
        WorldShape::Polygon { verts, normals } => verts
            .iter()
            .zip(normals)
            .all(|(v, n)| n.dot(point - *v) < 0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Angle, PoseBuilder};

    #[test]
    fn points_vs_shapes() {
        let mut circle = Collider::new_circle(1.0).unwrap();
        assert_eq!(point_collider_bool(m::Vec2::zero(), &circle), None);
        circle
            .refresh(&PoseBuilder::new().with_position([2.0, 0.0]).build())
            .unwrap();
        assert_eq!(point_collider_bool(m::Vec2::new(2.5, 0.5), &circle), Some(true));
        assert_eq!(point_collider_bool(m::Vec2::new(3.0, 0.0), &circle), Some(false));

        let mut rect = Collider::new_rect(2.0, 1.0).unwrap();
        rect.refresh(&PoseBuilder::new().with_rotation(Angle::Deg(90.0)).build())
            .unwrap();
        // rotated sideways, so tall instead of wide
        assert_eq!(point_collider_bool(m::Vec2::new(0.0, 0.9), &rect), Some(true));
        assert_eq!(point_collider_bool(m::Vec2::new(0.9, 0.0), &rect), Some(false));
    }
}
