use super::{Body, Collider};
use crate::math as m;

use thunderdome as td;

/// Key type to look up a collider stored in the collision world.
///
/// When using a [`hecs`][crate::hecs] World, this type should be stored
/// in the world instead of [`Collider`][super::Collider].
///
/// Keys are ordered by their underlying index, which gives pairs of colliders
/// a stable canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderKey(pub(super) td::Index);

impl ColliderKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from colliders to other things
    /// such as [`hecs`][hecs] entities.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

impl PartialOrd for ColliderKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColliderKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.to_bits().cmp(&other.0.to_bits())
    }
}

/// Key type to look up a body stored in the collision world.
///
/// When using a [`hecs`][crate::hecs] World, this type should be stored
/// in the world instead of [`Body`][super::Body].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(super) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to other things
    /// such as [`hecs`][hecs] entities.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }
}

/// Storage for the objects in the collision world,
/// comprised of bodies and colliders.
///
/// Bodies can have multiple colliders attached,
/// and colliders can be attached to a body or stand alone in world space.
#[derive(Default, Debug)]
pub struct EntitySet {
    bodies: td::Arena<Body>,
    colliders: td::Arena<Collider>,
    coll_bodies: td::Arena<BodyKey>,
}

impl EntitySet {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Access a [`Body`][super::Body] in the collision world, if it still exists.
    #[inline]
    pub fn get_body(&self, body: BodyKey) -> Option<&Body> {
        self.bodies.get(body.0)
    }

    /// Mutably access a [`Body`][super::Body] in the collision world, if it still exists.
    #[inline]
    pub fn get_body_mut(&mut self, body: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(body.0)
    }

    /// Access a [`Collider`][super::Collider] in the collision world, if it still exists.
    #[inline]
    pub fn get_collider(&self, coll: ColliderKey) -> Option<&Collider> {
        self.colliders.get(coll.0)
    }

    /// Mutably access a [`Collider`][super::Collider] in the collision world, if it still exists.
    #[inline]
    pub fn get_collider_mut(&mut self, coll: ColliderKey) -> Option<&mut Collider> {
        self.colliders.get_mut(coll.0)
    }

    /// Get the key of the body the given collider is attached to, if any.
    #[inline]
    pub fn get_collider_body_key(&self, coll: ColliderKey) -> Option<BodyKey> {
        self.coll_bodies.get(coll.0).copied()
    }

    /// Access the Body connected to the given Collider, if both still exist.
    #[inline]
    pub fn get_collider_body(&self, coll: ColliderKey) -> Option<&Body> {
        self.coll_bodies
            .get(coll.0)
            .and_then(|b| self.bodies.get(b.0))
    }

    /// Mutably access the Body connected to the given Collider, if both still exist.
    #[inline]
    pub fn get_collider_body_mut(&mut self, coll: ColliderKey) -> Option<&mut Body> {
        self.coll_bodies
            .get(coll.0)
            .and_then(|b| self.bodies.get_mut(b.0))
    }

    /// The pose of a collider in world space, combining it with its body's pose if it has one.
    pub fn collider_world_pose(&self, coll: ColliderKey) -> Option<m::Pose> {
        let collider = self.colliders.get(coll.0)?;
        Some(match self.get_collider_body(coll) {
            Some(body) => body.pose * collider.pose,
            None => collider.pose,
        })
    }

    /// Insert a body into the world.
    #[inline]
    pub fn insert_body(&mut self, body: Body) -> BodyKey {
        BodyKey(self.bodies.insert(body))
    }

    /// Attach a collider to a body.
    /// The collider's pose is interpreted as relative to the body from now on.
    pub fn attach_collider(&mut self, body: BodyKey, coll: Collider) -> ColliderKey {
        let coll_key = self.insert_collider(coll);
        self.coll_bodies.insert_at(coll_key.0, body);
        coll_key
    }

    /// Attach an already existing collider to a body.
    /// If it was attached to another body before, that connection is removed.
    #[inline]
    pub fn attach_existing_collider(&mut self, body: BodyKey, coll: ColliderKey) {
        if self.colliders.contains(coll.0) {
            self.coll_bodies.insert_at(coll.0, body);
        }
    }

    /// Insert a collider that isn't attached to a body
    /// (typically a static collider or a trigger).
    /// Its pose is in world space.
    #[inline]
    pub fn insert_collider(&mut self, coll: Collider) -> ColliderKey {
        ColliderKey(self.colliders.insert(coll))
    }

    /// Remove a [`Body`][super::Body] from the collision world,
    /// returning it if it still existed.
    ///
    /// Colliders associated with this body will be automatically removed
    /// at the next rebuild.
    #[inline]
    pub fn remove_body(&mut self, body: BodyKey) -> Option<Body> {
        self.bodies.remove(body.0)
    }

    /// Remove a [`Collider`][super::Collider] from the collision world,
    /// returning it if it still existed.
    ///
    /// If a body is associated with this collider, it will not be automatically removed.
    /// In such cases, prefer to remove the body instead.
    #[inline]
    pub fn remove_collider(&mut self, coll: ColliderKey) -> Option<Collider> {
        self.coll_bodies.remove(coll.0);
        self.colliders.remove(coll.0)
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Iterate over all colliders and their keys.
    pub fn iter_colliders(&self) -> impl '_ + Iterator<Item = (ColliderKey, &Collider)> {
        self.colliders.iter().map(|(k, c)| (ColliderKey(k), c))
    }

    /// Mutably iterate over all colliders along with their current world poses.
    pub(super) fn iter_colliders_with_pose_mut(
        &mut self,
    ) -> impl '_ + Iterator<Item = (ColliderKey, m::Pose, &mut Collider)> {
        let bodies = &self.bodies;
        let coll_bodies = &self.coll_bodies;
        self.colliders.iter_mut().map(move |(k, coll)| {
            let pose = match coll_bodies.get(k).and_then(|b| bodies.get(b.0)) {
                Some(body) => body.pose * coll.pose,
                None => coll.pose,
            };
            (ColliderKey(k), pose, coll)
        })
    }

    /// Remove colliders that have had their corresponding bodies removed.
    pub(super) fn remove_orphan_colliders(&mut self) {
        let bodies = &self.bodies;
        let coll_bodies = &mut self.coll_bodies;
        self.colliders.retain(|k, _| {
            let orphaned = matches!(coll_bodies.get(k), Some(b) if !bodies.contains(b.0));
            if orphaned {
                coll_bodies.remove(k);
            }
            !orphaned
        });
    }

    // not exposed to users, must use through CollisionWorld::clear
    pub(super) fn clear(&mut self) {
        self.bodies.clear();
        self.colliders.clear();
        self.coll_bodies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PoseBuilder;

    #[test]
    fn attached_collider_pose_is_relative() {
        let mut set = EntitySet::new();
        let body = set.insert_body(Body::new_kinematic().with_pose([1.0, 1.0]));
        let coll = set.attach_collider(
            body,
            Collider::new_circle(0.5).unwrap().with_pose([0.5, 0.0]),
        );
        let free = set.insert_collider(Collider::new_circle(0.5).unwrap().with_pose([3.0, 0.0]));

        let pose = set.collider_world_pose(coll).unwrap();
        assert!((pose.translation - m::Vec2::new(1.5, 1.0)).mag() < 1e-12);
        assert_eq!(set.collider_world_pose(free).unwrap().translation, m::Vec2::new(3.0, 0.0));
        assert_eq!(set.get_collider_body_key(coll), Some(body));
        assert_eq!(set.get_collider_body_key(free), None);

        set.attach_existing_collider(body, free);
        set.get_body_mut(body).unwrap().pose = PoseBuilder::new().build();
        assert_eq!(set.collider_world_pose(free).unwrap().translation, m::Vec2::new(3.0, 0.0));
        assert_eq!(set.get_collider_body_key(free), Some(body));
    }

    #[test]
    fn orphans_are_removed() {
        let mut set = EntitySet::new();
        let body = set.insert_body(Body::new_particle(1.0));
        let attached = set.attach_collider(body, Collider::new_circle(1.0).unwrap());
        let free = set.insert_collider(Collider::new_circle(1.0).unwrap());
        assert!(set.remove_body(body).is_some());
        // still there until orphans are cleaned up
        assert!(set.get_collider(attached).is_some());
        set.remove_orphan_colliders();
        assert!(set.get_collider(attached).is_none());
        assert!(set.get_collider(free).is_some());
        assert_eq!(set.collider_count(), 1);
    }
}
