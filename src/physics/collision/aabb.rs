use crate::math as m;

/// An axis-aligned bounding box in world space.
///
/// `min` is always component-wise less than or equal to `max`.
/// Constructors enforce this by sorting the given corners,
/// which is why the fields are only readable through accessors.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "AabbCorners", into = "AabbCorners")
)]
pub struct AABB {
    min: m::Vec2,
    max: m::Vec2,
}

impl AABB {
    /// Create an AABB from any two opposite corners.
    #[inline]
    pub fn new(corner1: m::Vec2, corner2: m::Vec2) -> Self {
        Self {
            min: corner1.min_by_component(corner2),
            max: corner1.max_by_component(corner2),
        }
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    /// An AABB centered on a point. Negative extents are treated as positive.
    #[inline]
    pub fn from_center(center: m::Vec2, half_extents: m::Vec2) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// The smallest AABB containing every given point, or `None` if there are no points.
    pub fn around_points(points: impl IntoIterator<Item = m::Vec2>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |acc, p| Self {
            min: acc.min.min_by_component(p),
            max: acc.max.max_by_component(p),
        }))
    }

    #[inline]
    pub fn min(&self) -> m::Vec2 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> m::Vec2 {
        self.max
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn extents(&self) -> m::Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        m::is_finite(self.min) && m::is_finite(self.max)
    }

    /// The smallest AABB containing both this and another.
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// The overlapping area of two AABBs, if there is one.
    /// Boxes that only touch at an edge produce a zero-width intersection.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min = self.min.max_by_component(other.min);
        let max = self.max.min_by_component(other.max);
        if min.x <= max.x && min.y <= max.y {
            Some(Self { min, max })
        } else {
            None
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Grow the AABB by the given amount in every direction.
    #[inline]
    pub fn padded(&self, amount: f64) -> Self {
        Self::new(
            self.min - m::Vec2::broadcast(amount),
            self.max + m::Vec2::broadcast(amount),
        )
    }
}

/// Serialized form of an AABB. Goes through [`AABB::new`] on the way in
/// so that swapped corners in a config file still produce a valid box.
#[cfg(feature = "serde-types")]
#[derive(serde::Serialize, serde::Deserialize)]
struct AabbCorners {
    min: [f64; 2],
    max: [f64; 2],
}

#[cfg(feature = "serde-types")]
impl From<AabbCorners> for AABB {
    fn from(c: AabbCorners) -> Self {
        AABB::new(m::Vec2::from(c.min), m::Vec2::from(c.max))
    }
}

#[cfg(feature = "serde-types")]
impl From<AABB> for AabbCorners {
    fn from(aabb: AABB) -> Self {
        AabbCorners {
            min: [aabb.min.x, aabb.min.y],
            max: [aabb.max.x, aabb.max.y],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_sorted() {
        let aabb = AABB::new(m::Vec2::new(2.0, -1.0), m::Vec2::new(-3.0, 4.0));
        assert_eq!(aabb.min(), m::Vec2::new(-3.0, -1.0));
        assert_eq!(aabb.max(), m::Vec2::new(2.0, 4.0));
        assert_eq!(aabb.width(), 5.0);
        assert_eq!(aabb.height(), 5.0);
    }

    #[test]
    fn intersections() {
        let a = AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(2.0, 2.0));
        let b = AABB::new(m::Vec2::new(1.0, 1.0), m::Vec2::new(3.0, 3.0));
        let c = AABB::new(m::Vec2::new(2.5, 0.0), m::Vec2::new(3.0, 0.5));
        let isect = a.intersection(&b).expect("should overlap");
        assert_eq!(isect.min(), m::Vec2::new(1.0, 1.0));
        assert_eq!(isect.max(), m::Vec2::new(2.0, 2.0));
        assert!(a.intersection(&c).is_none());
        assert!(b.overlaps(&c));
        assert_eq!(a.union(&c).max(), m::Vec2::new(3.0, 2.0));
    }

    #[test]
    fn around_points() {
        assert!(AABB::around_points(std::iter::empty()).is_none());
        let aabb = AABB::around_points([
            m::Vec2::new(1.0, -1.0),
            m::Vec2::new(-2.0, 0.5),
            m::Vec2::new(0.0, 3.0),
        ])
        .unwrap();
        assert_eq!(aabb.min(), m::Vec2::new(-2.0, -1.0));
        assert_eq!(aabb.max(), m::Vec2::new(1.0, 3.0));
        assert!(aabb.contains_point(m::Vec2::new(0.0, 0.0)));
        assert!(!aabb.contains_point(m::Vec2::new(1.5, 0.0)));
    }
}
