use super::AABB;
use crate::math::{self as m, Unit};

/// Squared edge lengths at or below this count as duplicate vertices.
const DUPLICATE_VERTEX_EPSILON_SQ: f64 = 1e-24;
/// Polygons whose area is at most this fraction of their squared extent are lines.
const FLAT_AREA_TOLERANCE: f64 = 1e-12;

/// Error for shapes that can't be used for collision detection.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("A polygon needs at least 2 distinct vertices, got {count}")]
    TooFewVertices { count: usize },
    #[error("Geometry or its world transform contains non-finite coordinates")]
    NonFinite,
    #[error("Circle radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("Rect side lengths must be non-negative and finite, got {width}x{height}")]
    InvalidRectSize { width: f64, height: f64 },
}

/// Whether a collider takes part in physical contact resolution
/// or only reports overlaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ColliderType {
    /// Collides with things and produces contacts for the resolver.
    #[default]
    Solid,
    /// Detects overlaps, but its contacts are never handed to the resolver.
    Trigger,
}

/// Surface properties consumed by contact resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "MaterialParams", into = "MaterialParams")
)]
pub struct PhysicsMaterial {
    bounciness: f64,
    friction: f64,
}

impl PhysicsMaterial {
    /// Bounciness is clamped to [0, 1] and friction to non-negative values.
    /// Non-finite values are replaced with zero.
    pub fn new(bounciness: f64, friction: f64) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            bounciness: finite_or_zero(bounciness).clamp(0.0, 1.0),
            friction: finite_or_zero(friction).max(0.0),
        }
    }

    /// Coefficient of restitution, in [0, 1].
    #[inline]
    pub fn bounciness(&self) -> f64 {
        self.bounciness
    }

    #[inline]
    pub fn friction(&self) -> f64 {
        self.friction
    }
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            bounciness: 0.0,
            friction: 0.5,
        }
    }
}

#[cfg(feature = "serde-types")]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct MaterialParams {
    bounciness: f64,
    friction: f64,
}

#[cfg(feature = "serde-types")]
impl Default for MaterialParams {
    fn default() -> Self {
        let mat = PhysicsMaterial::default();
        Self {
            bounciness: mat.bounciness,
            friction: mat.friction,
        }
    }
}

#[cfg(feature = "serde-types")]
impl From<MaterialParams> for PhysicsMaterial {
    fn from(p: MaterialParams) -> Self {
        PhysicsMaterial::new(p.bounciness, p.friction)
    }
}

#[cfg(feature = "serde-types")]
impl From<PhysicsMaterial> for MaterialParams {
    fn from(mat: PhysicsMaterial) -> Self {
        Self {
            bounciness: mat.bounciness,
            friction: mat.friction,
        }
    }
}

/// A convex polygon in collider-local space.
///
/// Vertices are stored in counter-clockwise order with consecutive duplicates removed.
/// Convexity is assumed, not checked.
/// A polygon with no area is stored as the line segment between its two extreme vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct ColliderPolygon {
    verts: Vec<m::Vec2>,
    /// Outward normal of the edge from `verts[i]` to `verts[i + 1]`.
    normals: Vec<Unit<m::Vec2>>,
}

impl ColliderPolygon {
    pub fn new(verts: impl IntoIterator<Item = m::Vec2>) -> Result<Self, GeometryError> {
        let input: Vec<m::Vec2> = verts.into_iter().collect();
        if !input.iter().all(|v| m::is_finite(*v)) {
            return Err(GeometryError::NonFinite);
        }

        let mut verts: Vec<m::Vec2> = Vec::with_capacity(input.len());
        for v in &input {
            match verts.last() {
                Some(last) if (*v - *last).mag_sq() <= DUPLICATE_VERTEX_EPSILON_SQ => {}
                _ => verts.push(*v),
            }
        }
        while verts.len() > 1 {
            let (first, last) = (verts[0], verts[verts.len() - 1]);
            if (first - last).mag_sq() <= DUPLICATE_VERTEX_EPSILON_SQ {
                verts.pop();
            } else {
                break;
            }
        }
        if verts.len() < 2 {
            return Err(GeometryError::TooFewVertices { count: input.len() });
        }

        let area = signed_area(&verts);
        if area < 0.0 {
            verts.reverse();
        }
        if area.abs() <= FLAT_AREA_TOLERANCE * extent_sq(&verts) {
            log::warn!(
                "Polygon collider with {} vertices has zero area, treating it as a line",
                verts.len()
            );
            verts = extreme_points(&verts).to_vec();
        }

        let normals = edges(&verts)
            .map(|(start, end)| {
                // edges are non-degenerate after deduplication so this never falls back
                Unit::new_normalize_or(m::right_normal(end - start), Unit::unit_x()).0
            })
            .collect();

        Ok(Self { verts, normals })
    }

    #[inline]
    pub fn vertices(&self) -> &[m::Vec2] {
        &self.verts
    }

    #[inline]
    pub fn normals(&self) -> &[Unit<m::Vec2>] {
        &self.normals
    }

    pub fn area(&self) -> f64 {
        signed_area(&self.verts).abs()
    }

    /// Polar second moment of area around the local origin.
    pub fn second_moment_of_area(&self) -> f64 {
        // https://en.wikipedia.org/wiki/Second_moment_of_area#Any_polygon
        edges(&self.verts)
            .map(|(a, b)| {
                m::cross(a, b) * (a.mag_sq() + a.dot(b) + b.mag_sq())
            })
            .sum::<f64>()
            .abs()
            / 12.0
    }
}

fn edges(verts: &[m::Vec2]) -> impl '_ + Iterator<Item = (m::Vec2, m::Vec2)> {
    verts
        .iter()
        .zip(verts.iter().cycle().skip(1))
        .map(|(a, b)| (*a, *b))
}

fn signed_area(verts: &[m::Vec2]) -> f64 {
    edges(verts).map(|(a, b)| m::cross(a, b)).sum::<f64>() / 2.0
}

/// Squared length of the bounding box diagonal.
fn extent_sq(verts: &[m::Vec2]) -> f64 {
    AABB::around_points(verts.iter().copied())
        .map_or(0.0, |aabb| aabb.width().powi(2) + aabb.height().powi(2))
}

/// The two vertices furthest apart, which are the ends of a flat polygon.
fn extreme_points(verts: &[m::Vec2]) -> [m::Vec2; 2] {
    let furthest_from = |from: m::Vec2| {
        verts.iter().copied().fold(from, |best, v| {
            if (v - from).mag_sq() > (best - from).mag_sq() {
                v
            } else {
                best
            }
        })
    };
    let start = furthest_from(verts[0]);
    [start, furthest_from(start)]
}

/// The physical shape of a collider.
#[derive(Clone, Debug, PartialEq)]
pub enum ColliderShape {
    Circle {
        r: f64,
    },
    /// The rect collider stores its side lengths halved because this makes
    /// vertex generation easier.
    Rect {
        hw: f64,
        hh: f64,
    },
    Polygon(ColliderPolygon),
}

impl ColliderShape {
    pub fn area(&self) -> f64 {
        match self {
            ColliderShape::Circle { r } => std::f64::consts::PI * r * r,
            ColliderShape::Rect { hw, hh } => 4.0 * hw * hh,
            ColliderShape::Polygon(poly) => poly.area(),
        }
    }

    /// Polar second moment of area around the shape's origin,
    /// used to compute moments of inertia.
    pub fn second_moment_of_area(&self) -> f64 {
        // from https://en.wikipedia.org/wiki/List_of_second_moments_of_area
        match self {
            ColliderShape::Circle { r } => std::f64::consts::PI * r.powi(4) / 2.0,
            ColliderShape::Rect { hw, hh } => self.area() * (hw * hw + hh * hh) / 3.0,
            ColliderShape::Polygon(poly) => poly.second_moment_of_area(),
        }
    }
}

#[inline]
fn rect_normals() -> [Unit<m::Vec2>; 4] {
    [
        -Unit::unit_y(),
        Unit::unit_x(),
        Unit::unit_y(),
        -Unit::unit_x(),
    ]
}

#[inline]
fn rect_vertices(hw: f64, hh: f64) -> [m::Vec2; 4] {
    [
        m::Vec2::new(-hw, -hh),
        m::Vec2::new(hw, -hh),
        m::Vec2::new(hw, hh),
        m::Vec2::new(-hw, hh),
    ]
}

/// Collider geometry transformed to world space at a specific pose.
#[derive(Clone, Debug)]
struct WorldCache {
    pose: m::Pose,
    aabb: AABB,
    verts: Vec<m::Vec2>,
    normals: Vec<Unit<m::Vec2>>,
}

/// Whether refreshing the world-space cache had to recompute anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Recomputed,
}

/// A view of a collider's shape in world space, as seen by the narrow phase.
#[derive(Clone, Copy, Debug)]
pub enum WorldShape<'a> {
    Circle {
        center: m::Vec2,
        r: f64,
    },
    /// Rects and polygons. Vertices are counter-clockwise
    /// and `normals[i]` is the outward normal of the edge starting at `verts[i]`.
    Polygon {
        verts: &'a [m::Vec2],
        normals: &'a [Unit<m::Vec2>],
    },
}

/// A shape that takes part in collision detection.
///
/// The collider keeps a cache of its geometry in world space,
/// tagged with the pose it was computed at.
/// The cache is only valid while that pose equals the collider's current world pose;
/// [`aabb`][Self::aabb] and [`refresh`][Self::refresh] compare the two and recompute on mismatch.
#[derive(Clone, Debug)]
pub struct Collider {
    /// Pose relative to the attached body, or in world space if there is no body.
    pub pose: m::Pose,
    pub ty: ColliderType,
    pub material: PhysicsMaterial,
    /// Inactive colliders are left out of collision detection entirely.
    pub active: bool,
    shape: ColliderShape,
    cache: Option<WorldCache>,
    contact_points: Vec<m::Vec2>,
}

impl Collider {
    fn from_shape(shape: ColliderShape) -> Self {
        Self {
            pose: m::Pose::identity(),
            ty: ColliderType::default(),
            material: PhysicsMaterial::default(),
            active: true,
            shape,
            cache: None,
            contact_points: Vec::new(),
        }
    }

    /// Create a circle collider from a radius.
    pub fn new_circle(radius: f64) -> Result<Self, GeometryError> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(GeometryError::InvalidRadius(radius));
        }
        Ok(Self::from_shape(ColliderShape::Circle { r: radius }))
    }

    /// Create a rect collider with both sides set to the same length.
    pub fn new_square(side_length: f64) -> Result<Self, GeometryError> {
        Self::new_rect(side_length, side_length)
    }

    /// Create a rect collider with two different side lengths.
    /// One of the sides may be zero, which makes a line segment.
    pub fn new_rect(width: f64, height: f64) -> Result<Self, GeometryError> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(width) || !valid(height) {
            return Err(GeometryError::InvalidRectSize { width, height });
        }
        if width == 0.0 && height == 0.0 {
            return Err(GeometryError::TooFewVertices { count: 1 });
        }
        if width == 0.0 || height == 0.0 {
            // a flat rect can't use the four fixed rect normals
            return Self::new_polygon(rect_vertices(width / 2.0, height / 2.0));
        }
        Ok(Self::from_shape(ColliderShape::Rect {
            hw: width / 2.0,
            hh: height / 2.0,
        }))
    }

    /// Create a convex polygon collider. Vertices can be given in either winding order.
    pub fn new_polygon(verts: impl IntoIterator<Item = m::Vec2>) -> Result<Self, GeometryError> {
        Ok(Self::from_shape(ColliderShape::Polygon(ColliderPolygon::new(
            verts,
        )?)))
    }

    pub fn with_pose(mut self, pose: impl Into<m::PoseBuilder>) -> Self {
        self.pose = pose.into().build();
        self
    }

    pub fn with_type(mut self, ty: ColliderType) -> Self {
        self.ty = ty;
        self
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[inline]
    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    #[inline]
    pub fn is_trigger(&self) -> bool {
        self.ty == ColliderType::Trigger
    }

    /// Check whether the cached world geometry was computed at the given pose.
    #[inline]
    pub fn is_cache_valid(&self, world_pose: &m::Pose) -> bool {
        self.cache
            .as_ref()
            .map(|c| m::pose_eq(&c.pose, world_pose))
            .unwrap_or(false)
    }

    /// Make sure the cached world geometry matches the given world pose,
    /// recomputing it if the pose has changed since the last computation.
    ///
    /// On error the cache is left empty, so the collider can't be tested
    /// until a valid pose is given.
    pub fn refresh(&mut self, world_pose: &m::Pose) -> Result<CacheStatus, GeometryError> {
        if self.is_cache_valid(world_pose) {
            return Ok(CacheStatus::Hit);
        }
        // reuse the old allocations
        let (mut verts, mut normals) = match self.cache.take() {
            Some(cache) => (cache.verts, cache.normals),
            None => (Vec::new(), Vec::new()),
        };
        verts.clear();
        normals.clear();

        if !m::pose_is_finite(world_pose) {
            return Err(GeometryError::NonFinite);
        }

        let mut transform = |local_verts: &[m::Vec2], local_normals: &[Unit<m::Vec2>]| {
            verts.extend(local_verts.iter().map(|v| *world_pose * *v));
            normals.extend(local_normals.iter().map(|n| world_pose.rotation * *n));
        };
        match &self.shape {
            ColliderShape::Circle { .. } => {}
            ColliderShape::Rect { hw, hh } => transform(&rect_vertices(*hw, *hh), &rect_normals()),
            ColliderShape::Polygon(poly) => transform(&poly.verts, &poly.normals),
        }

        let aabb = match &self.shape {
            ColliderShape::Circle { r } => {
                AABB::from_center(world_pose.translation, m::Vec2::broadcast(*r))
            }
            ColliderShape::Rect { .. } | ColliderShape::Polygon(_) => {
                AABB::around_points(verts.iter().copied())
                    .ok_or(GeometryError::TooFewVertices { count: 0 })?
            }
        };
        if !aabb.is_finite() {
            return Err(GeometryError::NonFinite);
        }

        self.cache = Some(WorldCache {
            pose: *world_pose,
            aabb,
            verts,
            normals,
        });
        Ok(CacheStatus::Recomputed)
    }

    /// Get the world-space AABB of the collider at the given world pose,
    /// recomputing cached geometry first if the pose has changed.
    pub fn aabb(&mut self, world_pose: &m::Pose) -> Result<AABB, GeometryError> {
        self.refresh(world_pose)?;
        self.cached_aabb().ok_or(GeometryError::NonFinite)
    }

    /// The AABB from the last successful refresh, which may be stale.
    #[inline]
    pub fn cached_aabb(&self) -> Option<AABB> {
        self.cache.as_ref().map(|c| c.aabb)
    }

    /// The world-space shape from the last successful refresh, which may be stale.
    pub fn world_shape(&self) -> Option<WorldShape<'_>> {
        let cache = self.cache.as_ref()?;
        Some(match self.shape {
            ColliderShape::Circle { r } => WorldShape::Circle {
                center: cache.pose.translation,
                r,
            },
            ColliderShape::Rect { .. } | ColliderShape::Polygon(_) => WorldShape::Polygon {
                verts: &cache.verts,
                normals: &cache.normals,
            },
        })
    }

    /// Contact points found for this collider during the most recent collision step.
    #[inline]
    pub fn contact_points(&self) -> &[m::Vec2] {
        &self.contact_points
    }

    #[inline]
    pub(crate) fn clear_contact_points(&mut self) {
        self.contact_points.clear();
    }

    #[inline]
    pub(crate) fn add_contact_points(&mut self, points: impl IntoIterator<Item = m::Vec2>) {
        self.contact_points.extend(points);
    }
}
