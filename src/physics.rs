//! Collision detection for bodies and colliders.
//!
//! A [`CollisionWorld`] holds bodies and colliders in an [`EntitySet`] and finds
//! the pairs that intersect, using a uniform [`Grid`] as a broad phase
//! and exact shape tests as a narrow phase. Resolving the contacts is left to the user.

use crate::math as m;

mod body;
pub use body::{Body, Mass};

pub mod collision;
pub use collision::{
    query, Collider, ColliderPolygon, ColliderShape, ColliderType, ConfigurationError,
    ContactPoints, GeometryError, Grid, GridParams, Manifold, PairKey, PairSet,
    PhysicsMaterial, AABB,
};

mod entity_set;
pub use entity_set::{BodyKey, ColliderKey, EntitySet};

mod hecs_sync;
pub use hecs_sync::{HecsSyncManager, HecsSyncOptions, Inactive};

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: m::Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

/// Errors from operations on a [`CollisionWorld`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum CollisionError {
    #[error("Collider {0:?} does not exist")]
    MissingCollider(ColliderKey),
    #[error("Collider {0:?} has moved or has no world-space geometry, it must be rebuilt before testing")]
    StaleGeometry(ColliderKey),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Everything found during one [`CollisionWorld::step`].
#[derive(Clone, Debug, Default)]
pub struct StepReport {
    /// Intersections between two solid colliders,
    /// to be handed to contact resolution.
    pub contacts: Vec<(PairKey, Manifold)>,
    /// Intersections where at least one of the colliders is a trigger.
    pub trigger_overlaps: Vec<(PairKey, Manifold)>,
    /// Colliders that were left out of this step because their geometry was invalid.
    pub geometry_errors: Vec<(ColliderKey, GeometryError)>,
}

/// The collision detection pipeline.
///
/// Each [`step`][Self::step] rebuilds the broad phase grid from scratch,
/// gathers unique candidate pairs from it and tests each one exactly.
/// The individual stages are also available as separate methods.
#[derive(Debug)]
pub struct CollisionWorld {
    pub entity_set: EntitySet,
    grid: Grid,
    pairs: PairSet,
    geometry_errors: Vec<(ColliderKey, GeometryError)>,
}

impl CollisionWorld {
    pub fn new(grid_params: GridParams) -> Result<Self, ConfigurationError> {
        Ok(Self {
            entity_set: EntitySet::new(),
            grid: Grid::new(grid_params)?,
            pairs: PairSet::new(),
            geometry_errors: Vec::new(),
        })
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Change the area and resolution of the broad phase grid.
    /// Takes effect at the next rebuild.
    #[inline]
    pub fn configure_grid(
        &mut self,
        bounds: AABB,
        resolution: [usize; 2],
    ) -> Result<(), ConfigurationError> {
        self.grid.configure(bounds, resolution)
    }

    #[inline]
    pub fn set_grid_resolution(&mut self, resolution: [usize; 2]) -> Result<(), ConfigurationError> {
        self.grid.set_resolution(resolution)
    }

    /// Remove all bodies and colliders.
    pub fn clear(&mut self) {
        self.entity_set.clear();
        self.grid.clear();
        self.pairs.clear();
        self.geometry_errors.clear();
    }

    /// Get the world-space AABB of a collider at its current pose.
    pub fn collider_aabb(&mut self, coll: ColliderKey) -> Result<AABB, CollisionError> {
        let pose = self
            .entity_set
            .collider_world_pose(coll)
            .ok_or(CollisionError::MissingCollider(coll))?;
        let collider = self
            .entity_set
            .get_collider_mut(coll)
            .ok_or(CollisionError::MissingCollider(coll))?;
        Ok(collider.aabb(&pose)?)
    }

    /// Contact points found for a collider in the most recent step.
    #[inline]
    pub fn contact_points(&self, coll: ColliderKey) -> Option<&[m::Vec2]> {
        self.entity_set.get_collider(coll).map(|c| c.contact_points())
    }

    /// Bring every active collider's world-space geometry up to date
    /// and rebuild the broad phase grid from them.
    ///
    /// Colliders with invalid geometry are left out of the grid
    /// and returned along with their errors.
    pub fn rebuild(&mut self) -> &[(ColliderKey, GeometryError)] {
        self.entity_set.remove_orphan_colliders();
        self.geometry_errors.clear();

        let mut entries: Vec<(ColliderKey, AABB)> =
            Vec::with_capacity(self.entity_set.collider_count());
        for (key, pose, coll) in self.entity_set.iter_colliders_with_pose_mut() {
            coll.clear_contact_points();
            if !coll.active {
                continue;
            }
            match coll.aabb(&pose) {
                Ok(aabb) => entries.push((key, aabb)),
                Err(err) => {
                    log::warn!("Collider {:?} left out of collision detection: {}", key, err);
                    self.geometry_errors.push((key, err));
                }
            }
        }
        self.grid
            .rebuild(entries.iter().map(|(key, aabb)| (*key, aabb)));

        &self.geometry_errors
    }

    /// Gather the unique pairs of colliders that share a grid cell,
    /// leaving out pairs of colliders attached to the same body.
    ///
    /// Uses the grid as of the last [`rebuild`][Self::rebuild].
    pub fn candidate_pairs(&mut self) -> &[PairKey] {
        self.pairs.clear();
        for (c1, c2) in self.grid.candidate_pairs_per_cell() {
            let b1 = self.entity_set.get_collider_body_key(c1);
            let b2 = self.entity_set.get_collider_body_key(c2);
            if b1.is_some() && b1 == b2 {
                continue;
            }
            self.pairs.insert(PairKey::new(c1, b1, c2, b2));
        }
        self.pairs.as_slice()
    }

    /// Test a pair of colliders for intersection using their geometry
    /// as of the last [`rebuild`][Self::rebuild].
    ///
    /// Fails with [`CollisionError::StaleGeometry`] if either collider has moved
    /// since then. Inactive colliders never intersect anything.
    /// The manifold's normal points from the first collider of the pair to the second.
    pub fn test_collision(&self, pair: PairKey) -> Result<Option<Manifold>, CollisionError> {
        let [k1, k2] = pair.colliders();
        let get = |key| {
            let coll = self
                .entity_set
                .get_collider(key)
                .ok_or(CollisionError::MissingCollider(key))?;
            let pose = self
                .entity_set
                .collider_world_pose(key)
                .ok_or(CollisionError::MissingCollider(key))?;
            if coll.active && !coll.is_cache_valid(&pose) {
                return Err(CollisionError::StaleGeometry(key));
            }
            Ok(coll)
        };
        let (c1, c2) = (get(k1)?, get(k2)?);
        if !c1.active || !c2.active {
            return Ok(None);
        }
        let s1 = c1.world_shape().ok_or(CollisionError::StaleGeometry(k1))?;
        let s2 = c2.world_shape().ok_or(CollisionError::StaleGeometry(k2))?;

        if let (Some(aabb1), Some(aabb2)) = (c1.cached_aabb(), c2.cached_aabb()) {
            if !aabb1.overlaps(&aabb2) {
                return Ok(None);
            }
        }
        Ok(collision::narrowphase::collide(&s1, &s2))
    }

    fn narrow_phase_single(&self, pair: PairKey) -> Option<(PairKey, Manifold)> {
        match self.test_collision(pair) {
            Ok(result) => result.map(|man| (pair, man)),
            Err(err) => {
                log::debug!("Skipped pair {:?}: {}", pair, err);
                None
            }
        }
    }

    /// Run the whole collision detection pipeline once.
    pub fn step(&mut self) -> StepReport {
        self.rebuild();
        self.candidate_pairs();

        #[cfg(feature = "parallel")]
        let found: Vec<(PairKey, Manifold)> = {
            use rayon::prelude::*;
            self.pairs
                .as_slice()
                .par_iter()
                .filter_map(|&pair| self.narrow_phase_single(pair))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let found: Vec<(PairKey, Manifold)> = self
            .pairs
            .as_slice()
            .iter()
            .filter_map(|&pair| self.narrow_phase_single(pair))
            .collect();

        let mut report = StepReport {
            geometry_errors: self.geometry_errors.clone(),
            ..StepReport::default()
        };
        for (pair, manifold) in found {
            let mut is_trigger = false;
            for key in pair.colliders() {
                if let Some(coll) = self.entity_set.get_collider_mut(key) {
                    coll.add_contact_points(manifold.points.iter());
                    is_trigger |= coll.is_trigger();
                }
            }
            if is_trigger {
                report.trigger_overlaps.push((pair, manifold));
            } else {
                report.contacts.push((pair, manifold));
            }
        }
        report
    }

    /// Find all colliders containing the given point,
    /// as of the last [`rebuild`][Self::rebuild].
    pub fn colliders_at_point(&self, point: m::Vec2) -> Vec<ColliderKey> {
        let [col, row] = self.grid.cell_at_point(point);
        let Some(cell) = self.grid.cell(col, row) else { return Vec::new() };
        cell.iter()
            .copied()
            .filter(|key| {
                self.entity_set
                    .get_collider(*key)
                    .and_then(|c| query::point_collider_bool(point, c))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Find all colliders whose AABB overlaps the given one,
    /// as of the last [`rebuild`][Self::rebuild].
    pub fn colliders_in_aabb(&self, aabb: &AABB) -> Vec<ColliderKey> {
        let mut found: Vec<ColliderKey> = self
            .grid
            .colliders_near(aabb)
            .filter(|key| {
                self.entity_set
                    .get_collider(*key)
                    .and_then(|c| c.cached_aabb())
                    .map(|c_aabb| c_aabb.overlaps(aabb))
                    .unwrap_or(false)
            })
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PoseBuilder;

    fn small_world() -> CollisionWorld {
        CollisionWorld::new(GridParams {
            bounds: AABB::new(m::Vec2::new(-10.0, -10.0), m::Vec2::new(10.0, 10.0)),
            resolution: [10, 10],
        })
        .unwrap()
    }

    #[test]
    fn invalid_grid_is_rejected() {
        assert!(CollisionWorld::new(GridParams {
            resolution: [0, 0],
            ..GridParams::default()
        })
        .is_err());
        let mut world = small_world();
        assert_eq!(
            world.set_grid_resolution([3, 0]),
            Err(ConfigurationError::ZeroResolution {
                columns: 3,
                rows: 0
            })
        );
        assert_eq!(world.grid().resolution(), [10, 10]);
    }

    #[test]
    fn pairs_spanning_many_cells_are_tested_once() {
        let mut world = small_world();
        // two big overlapping boxes that share several cells
        let a = world
            .entity_set
            .insert_collider(Collider::new_rect(6.0, 6.0).unwrap());
        let b = world.entity_set.insert_collider(
            Collider::new_rect(6.0, 6.0)
                .unwrap()
                .with_pose([1.0, 0.0]),
        );
        world.rebuild();
        assert!(world.grid().occupied_cells().count() > 4);
        let pairs = world.candidate_pairs().to_vec();
        assert_eq!(pairs, vec![PairKey::new(a, None, b, None)]);

        let report = world.step();
        assert_eq!(report.contacts.len(), 1);
        assert!(report.trigger_overlaps.is_empty());
        let (pair, man) = report.contacts[0];
        // normal points from the first collider of the pair to the second
        let [first, _] = pair.colliders();
        let expected = if first == a { 1.0 } else { -1.0 };
        assert!((man.normal.x - expected).abs() < 1e-9);
        assert!((man.depth - 5.0).abs() < 1e-9);
        assert_eq!(world.contact_points(a).unwrap().len(), 2);
        assert_eq!(world.contact_points(b).unwrap().len(), 2);
    }

    #[test]
    fn same_body_and_inactive_colliders_are_skipped() {
        let mut world = small_world();
        let body = world.entity_set.insert_body(Body::new_kinematic());
        world
            .entity_set
            .attach_collider(body, Collider::new_circle(1.0).unwrap());
        world.entity_set.attach_collider(
            body,
            Collider::new_circle(1.0).unwrap().with_pose([0.5, 0.0]),
        );
        world.rebuild();
        assert!(world.candidate_pairs().is_empty());

        let other = world.entity_set.insert_collider(
            Collider::new_circle(1.0)
                .unwrap()
                .with_pose([1.0, 0.0])
                .with_active(false),
        );
        assert!(world.step().contacts.is_empty());
        world.entity_set.get_collider_mut(other).unwrap().active = true;
        assert_eq!(world.step().contacts.len(), 2);
    }

    #[test]
    fn triggers_are_reported_separately() {
        let mut world = small_world();
        world
            .entity_set
            .insert_collider(Collider::new_square(2.0).unwrap());
        world.entity_set.insert_collider(
            Collider::new_circle(1.0)
                .unwrap()
                .with_pose([1.5, 0.0])
                .with_type(ColliderType::Trigger),
        );
        let report = world.step();
        assert!(report.contacts.is_empty());
        assert_eq!(report.trigger_overlaps.len(), 1);
    }

    #[test]
    fn geometry_errors_are_isolated() {
        let mut world = small_world();
        let good1 = world
            .entity_set
            .insert_collider(Collider::new_circle(1.0).unwrap());
        let good2 = world.entity_set.insert_collider(
            Collider::new_circle(1.0).unwrap().with_pose([1.0, 0.0]),
        );
        let mut bad_pose = m::Pose::identity();
        bad_pose.translation.x = f64::NAN;
        let bad = world
            .entity_set
            .insert_collider(Collider::new_circle(1.0).unwrap().with_pose(bad_pose));

        let report = world.step();
        assert_eq!(report.geometry_errors, vec![(bad, GeometryError::NonFinite)]);
        assert_eq!(report.contacts.len(), 1);
        assert!(report.contacts[0].0.involves(good1) && report.contacts[0].0.involves(good2));
        assert_eq!(
            world.test_collision(PairKey::new(good1, None, bad, None)),
            Err(CollisionError::StaleGeometry(bad))
        );
        assert_eq!(
            world.collider_aabb(bad),
            Err(CollisionError::Geometry(GeometryError::NonFinite))
        );
    }

    #[test]
    fn moved_colliders_need_a_rebuild() {
        let mut world = small_world();
        let a = world
            .entity_set
            .insert_collider(Collider::new_circle(1.0).unwrap());
        let b = world.entity_set.insert_collider(
            Collider::new_circle(1.0).unwrap().with_pose([1.5, 0.0]),
        );
        world.rebuild();
        let pair = PairKey::new(a, None, b, None);
        assert!(world.test_collision(pair).unwrap().is_some());

        world.entity_set.get_collider_mut(b).unwrap().pose =
            PoseBuilder::new().with_position([8.0, 0.0]).build();
        assert_eq!(
            world.test_collision(pair),
            Err(CollisionError::StaleGeometry(b))
        );
        world.rebuild();
        assert_eq!(world.test_collision(pair), Ok(None));

        // moving the body a collider is attached to also invalidates it
        let body = world.entity_set.insert_body(Body::new_kinematic());
        let c = world
            .entity_set
            .attach_collider(body, Collider::new_circle(1.0).unwrap());
        world.rebuild();
        let pair = PairKey::new(a, None, c, Some(body));
        assert!(world.test_collision(pair).unwrap().is_some());
        world.entity_set.get_body_mut(body).unwrap().pose =
            PoseBuilder::new().with_position([0.0, 0.5]).build();
        assert_eq!(
            world.test_collision(pair),
            Err(CollisionError::StaleGeometry(c))
        );

        // an inactive collider is excluded even with a stale cache
        world.entity_set.get_collider_mut(c).unwrap().active = false;
        assert_eq!(world.test_collision(pair), Ok(None));
    }

    #[test]
    fn removing_a_body_removes_its_colliders() {
        let mut world = small_world();
        let body = world
            .entity_set
            .insert_body(Body::new_particle(1.0).with_pose([2.0, 2.0]));
        let coll = world
            .entity_set
            .attach_collider(body, Collider::new_circle(1.0).unwrap());
        assert_eq!(
            world.collider_aabb(coll).unwrap().center(),
            m::Vec2::new(2.0, 2.0)
        );
        world.entity_set.remove_body(body);
        world.step();
        assert!(world.entity_set.get_collider(coll).is_none());
        assert_eq!(
            world.collider_aabb(coll),
            Err(CollisionError::MissingCollider(coll))
        );
    }

    #[test]
    fn contact_points_reset_every_step() {
        let mut world = small_world();
        let a = world
            .entity_set
            .insert_collider(Collider::new_circle(1.0).unwrap());
        let b = world.entity_set.insert_collider(
            Collider::new_circle(1.0).unwrap().with_pose([1.5, 0.0]),
        );
        world.step();
        assert_eq!(world.contact_points(a).unwrap().len(), 1);
        world.entity_set.get_collider_mut(b).unwrap().pose =
            PoseBuilder::new().with_position([5.0, 0.0]).build();
        let report = world.step();
        assert!(report.contacts.is_empty());
        assert!(world.contact_points(a).unwrap().is_empty());
    }

    #[test]
    fn spatial_queries() {
        let mut world = small_world();
        let circle = world.entity_set.insert_collider(
            Collider::new_circle(1.0).unwrap().with_pose([-5.0, 0.0]),
        );
        let square = world.entity_set.insert_collider(
            Collider::new_square(2.0).unwrap().with_pose([5.0, 5.0]),
        );
        world.rebuild();
        assert_eq!(world.colliders_at_point(m::Vec2::new(-5.2, 0.3)), vec![circle]);
        assert_eq!(world.colliders_at_point(m::Vec2::new(5.9, 5.9)), vec![square]);
        assert!(world.colliders_at_point(m::Vec2::new(0.0, 0.0)).is_empty());

        let everything = AABB::new(m::Vec2::new(-9.0, -9.0), m::Vec2::new(9.0, 9.0));
        let mut expected = vec![circle, square];
        expected.sort_unstable();
        assert_eq!(world.colliders_in_aabb(&everything), expected);
        let right_half = AABB::new(m::Vec2::new(0.0, -9.0), m::Vec2::new(9.0, 9.0));
        assert_eq!(world.colliders_in_aabb(&right_half), vec![square]);
    }

    #[test]
    fn velocity_ops() {
        let vel = Velocity {
            linear: m::Vec2::new(1.0, 0.0),
            angular: 2.0,
        };
        let point_vel = vel.point_velocity(m::Vec2::new(0.0, 1.0));
        assert_eq!(point_vel, m::Vec2::new(-1.0, 0.0));
        assert_eq!((vel + vel * 2.0).angular, 6.0);
    }
}
