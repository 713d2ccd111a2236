//! Exact intersection tests between pairs of world-space shapes.
//!
//! Every test produces a [`Manifold`] whose normal points from the first shape
//! towards the second, so that moving the second shape by `normal * depth`
//! separates the two.

use super::collider::{Collider, GeometryError, WorldShape};
use crate::math::{self as m, Unit};

/// Separating axis candidates from the second shape must beat the first shape's best
/// by this much to be chosen, so that near-ties resolve the same way every time.
const AXIS_TIE_TOLERANCE: f64 = 1e-6;
/// Clipped contact points this far outside the reference face are still accepted.
const CONTACT_EPSILON: f64 = 1e-9;

/// 1-2 points of contact can occur between two convex 2D objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContactPoints {
    One(m::Vec2),
    Two(m::Vec2, m::Vec2),
}

impl ContactPoints {
    pub fn iter(&self) -> ContactPointIter<'_> {
        ContactPointIter { cp: self, idx: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            ContactPoints::One(_) => 1,
            ContactPoints::Two(..) => 2,
        }
    }
}

/// An iterator over the points in a [`ContactPoints`].
pub struct ContactPointIter<'a> {
    cp: &'a ContactPoints,
    idx: u8,
}

impl<'a> Iterator for ContactPointIter<'a> {
    type Item = m::Vec2;

    fn next(&mut self) -> Option<Self::Item> {
        self.idx += 1;
        use ContactPoints::*;
        match (self.cp, self.idx - 1) {
            (One(p), 0) => Some(*p),
            (One(_), _) => None,
            (Two(p1, _), 0) => Some(*p1),
            (Two(_, p2), 1) => Some(*p2),
            (Two(_, _), _) => None,
        }
    }
}

/// Description of an intersection between two shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Manifold {
    /// Direction of least penetration, pointing away from the first shape.
    pub normal: Unit<m::Vec2>,
    /// How far the shapes overlap along the normal. Always positive.
    pub depth: f64,
    /// Points of contact in world space.
    pub points: ContactPoints,
    /// Set when the shapes were so close to coincident that no direction could be
    /// computed and an arbitrary normal was used instead.
    pub fallback_normal: bool,
}

impl Manifold {
    /// Swap the roles of the two shapes. Contact points are shared and stay as they are.
    #[inline]
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Check two world-space shapes for intersection.
///
/// Returns `None` if the shapes are separated or only touching.
pub fn collide(a: &WorldShape<'_>, b: &WorldShape<'_>) -> Option<Manifold> {
    use WorldShape::*;
    match (*a, *b) {
        (Circle { center: c1, r: r1 }, Circle { center: c2, r: r2 }) => {
            circle_circle(c1, r1, c2, r2)
        }
        (Polygon { verts, normals }, Circle { center, r }) => {
            polygon_circle(verts, normals, center, r)
        }
        (Circle { center, r }, Polygon { verts, normals }) => {
            polygon_circle(verts, normals, center, r).map(Manifold::flipped)
        }
        (
            Polygon {
                verts: v1,
                normals: n1,
            },
            Polygon {
                verts: v2,
                normals: n2,
            },
        ) => polygon_polygon(v1, n1, v2, n2),
    }
}

/// Check two colliders for intersection at the given world poses,
/// refreshing their cached world-space geometry first if needed.
pub fn test_collision(
    coll1: &mut Collider,
    pose1: &m::Pose,
    coll2: &mut Collider,
    pose2: &m::Pose,
) -> Result<Option<Manifold>, GeometryError> {
    coll1.refresh(pose1)?;
    coll2.refresh(pose2)?;
    match (coll1.world_shape(), coll2.world_shape()) {
        (Some(s1), Some(s2)) => Ok(collide(&s1, &s2)),
        _ => Err(GeometryError::NonFinite),
    }
}

//
// CIRCLE <-> CIRCLE
//

fn circle_circle(c1: m::Vec2, r1: f64, c2: m::Vec2, r2: f64) -> Option<Manifold> {
    let dist = c2 - c1;
    let dist_sq = dist.mag_sq();
    let r_sum = r1 + r2;
    if dist_sq >= r_sum * r_sum {
        return None;
    }

    let (normal, fallback_normal) = Unit::new_normalize_or(dist, Unit::unit_x());
    if fallback_normal {
        log::trace!("Coincident circles at {:?}, using the x axis as normal", c1);
    }

    Some(Manifold {
        normal,
        depth: r_sum - dist_sq.sqrt(),
        points: ContactPoints::One(c1 + *normal * r1),
        fallback_normal,
    })
}

//
// POLYGON <-> CIRCLE
//

fn polygon_circle(
    verts: &[m::Vec2],
    normals: &[Unit<m::Vec2>],
    center: m::Vec2,
    r: f64,
) -> Option<Manifold> {
    if let ([start, end], [normal, _]) = (verts, normals) {
        return segment_circle(*start, *end, *normal, center, r);
    }

    // find the edge the circle center is furthest out from
    let mut best_edge = 0;
    let mut max_sep = f64::NEG_INFINITY;
    for (idx, (vert, normal)) in verts.iter().zip(normals).enumerate() {
        let sep = normal.dot(center - *vert);
        if sep >= r {
            return None;
        }
        if sep > max_sep {
            max_sep = sep;
            best_edge = idx;
        }
    }

    let face_contact = |normal: Unit<m::Vec2>, depth: f64| Manifold {
        normal,
        depth,
        points: ContactPoints::One(center - *normal * r),
        fallback_normal: false,
    };

    let face_normal = normals[best_edge];
    if max_sep <= 0.0 {
        // center is inside the polygon
        return Some(face_contact(face_normal, r - max_sep));
    }

    let v1 = verts[best_edge];
    let v2 = verts[(best_edge + 1) % verts.len()];
    let u1 = (center - v1).dot(v2 - v1);
    let u2 = (center - v2).dot(v1 - v2);
    let corner = if u1 <= 0.0 {
        Some(v1)
    } else if u2 <= 0.0 {
        Some(v2)
    } else {
        None
    };

    match corner {
        Some(corner) => {
            let dist = center - corner;
            let dist_sq = dist.mag_sq();
            if dist_sq >= r * r {
                return None;
            }
            let (normal, _) = Unit::new_normalize_or(dist, face_normal);
            Some(face_contact(normal, r - dist_sq.sqrt()))
        }
        None => Some(face_contact(face_normal, r - max_sep)),
    }
}

/// Flat polygons have no inside, so the circle is tested against the closest point
/// on the segment instead of the polygon's faces.
fn segment_circle(
    start: m::Vec2,
    end: m::Vec2,
    face_normal: Unit<m::Vec2>,
    center: m::Vec2,
    r: f64,
) -> Option<Manifold> {
    let dir = end - start;
    let t = ((center - start).dot(dir) / dir.mag_sq()).clamp(0.0, 1.0);
    let closest = start + dir * t;
    let dist = center - closest;
    let dist_sq = dist.mag_sq();
    if dist_sq >= r * r {
        return None;
    }

    let (normal, fallback_normal) = Unit::new_normalize_or(dist, face_normal);
    if fallback_normal {
        log::trace!("Circle centered on a line at {:?}, using the face normal", center);
    }
    Some(Manifold {
        normal,
        depth: r - dist_sq.sqrt(),
        points: ContactPoints::One(center - *normal * r),
        fallback_normal,
    })
}

//
// POLYGON <-> POLYGON
//

/// Project all vertices onto an axis, returning the (min, max) interval.
fn project(verts: &[m::Vec2], axis: m::Vec2) -> (f64, f64) {
    verts
        .iter()
        .map(|v| v.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), d| {
            (min.min(d), max.max(d))
        })
}

#[derive(Clone, Copy, Debug)]
struct AxisOverlap {
    depth: f64,
    /// Oriented to point from the first shape to the second.
    normal: Unit<m::Vec2>,
}

/// Overlap of the two shapes along a single axis, or `None` if the axis separates them.
fn axis_overlap(
    verts1: &[m::Vec2],
    verts2: &[m::Vec2],
    axis: Unit<m::Vec2>,
) -> Option<AxisOverlap> {
    let (min1, max1) = project(verts1, *axis);
    let (min2, max2) = project(verts2, *axis);
    let o1 = max1 - min2;
    let o2 = max2 - min1;
    if o1 <= 0.0 || o2 <= 0.0 {
        return None;
    }
    Some(if o1 <= o2 {
        AxisOverlap {
            depth: o1,
            normal: axis,
        }
    } else {
        AxisOverlap {
            depth: o2,
            normal: -axis,
        }
    })
}

fn polygon_polygon(
    verts1: &[m::Vec2],
    normals1: &[Unit<m::Vec2>],
    verts2: &[m::Vec2],
    normals2: &[Unit<m::Vec2>],
) -> Option<Manifold> {
    let mut best: Option<AxisOverlap> = None;
    for axis in normals1 {
        let overlap = axis_overlap(verts1, verts2, *axis)?;
        if best.map_or(true, |b| overlap.depth < b.depth) {
            best = Some(overlap);
        }
    }
    for axis in normals2 {
        let overlap = axis_overlap(verts1, verts2, *axis)?;
        if best.map_or(true, |b| overlap.depth < b.depth - AXIS_TIE_TOLERANCE) {
            best = Some(overlap);
        }
    }
    let AxisOverlap { depth, normal } = best?;

    let points = clip_contact_points(verts1, normals1, verts2, normals2, normal);
    Some(Manifold {
        normal,
        depth,
        points,
        fallback_normal: false,
    })
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    start: m::Vec2,
    end: m::Vec2,
    normal: Unit<m::Vec2>,
}

/// Find the edge of a polygon that is most aligned with the given direction.
/// This is one of the two edges adjacent to the vertex furthest along the direction.
fn best_edge(verts: &[m::Vec2], normals: &[Unit<m::Vec2>], dir: Unit<m::Vec2>) -> Edge {
    let mut furthest = 0;
    let mut max_dist = f64::NEG_INFINITY;
    for (idx, v) in verts.iter().enumerate() {
        let dist = v.dot(*dir);
        if dist > max_dist {
            max_dist = dist;
            furthest = idx;
        }
    }
    let prev = (furthest + verts.len() - 1) % verts.len();
    let edge_idx = if normals[prev].dot(*dir) > normals[furthest].dot(*dir) {
        prev
    } else {
        furthest
    };
    Edge {
        start: verts[edge_idx],
        end: verts[(edge_idx + 1) % verts.len()],
        normal: normals[edge_idx],
    }
}

/// Clip a segment to the half-plane `dir . p >= offset`.
/// Returns `None` if the whole segment is outside.
fn clip_segment(points: [m::Vec2; 2], dir: m::Vec2, offset: f64) -> Option<[m::Vec2; 2]> {
    let d0 = points[0].dot(dir) - offset;
    let d1 = points[1].dot(dir) - offset;
    match (d0 >= 0.0, d1 >= 0.0) {
        (true, true) => Some(points),
        (false, false) => None,
        (in0, _) => {
            let isect = points[0] + (points[1] - points[0]) * (d0 / (d0 - d1));
            Some(if in0 {
                [points[0], isect]
            } else {
                [isect, points[1]]
            })
        }
    }
}

/// Compute contact points for two intersecting polygons by clipping
/// the incident edge against the side planes of the reference edge.
fn clip_contact_points(
    verts1: &[m::Vec2],
    normals1: &[Unit<m::Vec2>],
    verts2: &[m::Vec2],
    normals2: &[Unit<m::Vec2>],
    normal: Unit<m::Vec2>,
) -> ContactPoints {
    let edge1 = best_edge(verts1, normals1, normal);
    let edge2 = best_edge(verts2, normals2, -normal);
    // the reference edge is the one whose face is more perpendicular to the normal
    let (reference, incident) =
        if edge2.normal.dot(-*normal) > edge1.normal.dot(*normal) + AXIS_TIE_TOLERANCE {
            (edge2, edge1)
        } else {
            (edge1, edge2)
        };

    let incident_pts = [incident.start, incident.end];
    let separation = |p: m::Vec2| reference.normal.dot(p - reference.start);
    let deepest_incident = || {
        if separation(incident_pts[0]) <= separation(incident_pts[1]) {
            ContactPoints::One(incident_pts[0])
        } else {
            ContactPoints::One(incident_pts[1])
        }
    };

    let tangent = reference.end - reference.start;
    let clipped = clip_segment(incident_pts, tangent, tangent.dot(reference.start))
        .and_then(|pts| clip_segment(pts, -tangent, -tangent.dot(reference.end)));
    let Some(clipped) = clipped else {
        return deepest_incident();
    };

    let inside = |p: &m::Vec2| separation(*p) <= CONTACT_EPSILON;
    match (inside(&clipped[0]), inside(&clipped[1])) {
        (true, true) => ContactPoints::Two(clipped[0], clipped[1]),
        (true, false) => ContactPoints::One(clipped[0]),
        (false, true) => ContactPoints::One(clipped[1]),
        (false, false) => deepest_incident(),
    }
}
