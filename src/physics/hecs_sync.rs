use crate::{
    math as m,
    physics::{BodyKey, ColliderKey, CollisionWorld},
};

use thunderdome as td;

/// Marker component that excludes a collider entity from collision detection
/// while it's present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Inactive;

#[derive(Clone, Copy, Debug)]
pub struct HecsSyncOptions {
    /// Copy the entity's [`Pose`][m::Pose] component into the collision world.
    pub sync_pose: bool,
    /// Deactivate colliders whose entity has an [`Inactive`] component.
    pub sync_active: bool,
    /// Remove the body or collider when its entity is despawned.
    pub autodelete: bool,
}

impl HecsSyncOptions {
    #[inline]
    pub fn all() -> Self {
        Self {
            sync_pose: true,
            sync_active: true,
            autodelete: true,
        }
    }

    #[inline]
    pub fn autodelete_only() -> Self {
        Self {
            sync_pose: false,
            sync_active: false,
            autodelete: true,
        }
    }

    #[inline]
    pub fn do_not_sync() -> Self {
        Self {
            sync_pose: false,
            sync_active: false,
            autodelete: false,
        }
    }
}

/// Automatically syncs information from a [`hecs`][hecs] world
/// to a [`CollisionWorld`][super::CollisionWorld].
///
/// Entities are linked to bodies and colliders by having a [`BodyKey`] or [`ColliderKey`]
/// component. Their [`Pose`][m::Pose] component is copied to the body,
/// or to a standalone collider. If a collider entity's collider is attached to a body,
/// the body's pose is set instead.
#[derive(Default, Debug)]
pub struct HecsSyncManager {
    /// If set, automatically uses these options to register all hecs entities
    /// with [`BodyKey`][BodyKey] or [`ColliderKey`][ColliderKey] components
    /// that haven't been registered manually. None by default.
    pub default_opts: Option<HecsSyncOptions>,
    body_entity_map: td::Arena<(hecs::Entity, HecsSyncOptions)>,
    collider_entity_map: td::Arena<(hecs::Entity, HecsSyncOptions)>,
}

impl HecsSyncManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn new_autosync(opts: HecsSyncOptions) -> Self {
        Self {
            default_opts: Some(opts),
            ..Self::default()
        }
    }

    #[inline]
    pub fn register_body(&mut self, body: BodyKey, entity: hecs::Entity, opts: HecsSyncOptions) {
        self.body_entity_map.insert_at(body.0, (entity, opts));
    }

    #[inline]
    pub fn register_collider(
        &mut self,
        coll: ColliderKey,
        entity: hecs::Entity,
        opts: HecsSyncOptions,
    ) {
        self.collider_entity_map.insert_at(coll.0, (entity, opts));
    }

    /// Sync data from a hecs world to the collision world.
    /// Call before [`CollisionWorld::step`][CollisionWorld::step].
    pub fn sync_hecs_to_physics(
        &mut self,
        physics: &mut CollisionWorld,
        hecs_world: &mut hecs::World,
    ) {
        // auto-register new entities
        if let Some(opts) = self.default_opts {
            for (entity, body_key) in hecs_world.query_mut::<&BodyKey>() {
                if !self.body_entity_map.contains(body_key.0) {
                    self.body_entity_map.insert_at(body_key.0, (entity, opts));
                }
            }
            for (entity, coll_key) in hecs_world.query_mut::<&ColliderKey>() {
                if !self.collider_entity_map.contains(coll_key.0) {
                    self.collider_entity_map
                        .insert_at(coll_key.0, (entity, opts));
                }
            }
        }
        self.body_entity_map.retain(|body_key, (entity, opts)| {
            let body_key = BodyKey(body_key);
            // auto-delete bodies for entities that don't exist anymore,
            // using the surrounding `retain` to also delete them from this map
            if opts.autodelete && !hecs_world.contains(*entity) {
                physics.entity_set.remove_body(body_key);
                return false;
            }
            let Some(body) = physics.entity_set.get_body_mut(body_key) else {
                // removed from the physics side, forget about it
                return false;
            };
            if opts.sync_pose {
                let Ok(pose) = hecs_world.query_one_mut::<&m::Pose>(*entity) else { return true };
                body.pose = *pose;
            }
            true
        });
        // same as above for colliders,
        // except if colliders have a body, actually sync the body
        self.collider_entity_map.retain(|coll_key, (entity, opts)| {
            let coll_key = ColliderKey(coll_key);
            if opts.autodelete && !hecs_world.contains(*entity) {
                physics.entity_set.remove_collider(coll_key);
                return false;
            }
            if physics.entity_set.get_collider(coll_key).is_none() {
                return false;
            }
            let Ok((pose, inactive)) =
                hecs_world.query_one_mut::<(Option<&m::Pose>, Option<&Inactive>)>(*entity)
            else {
                return true;
            };

            if opts.sync_pose {
                if let Some(pose) = pose {
                    if let Some(body) = physics.entity_set.get_collider_body_mut(coll_key) {
                        body.pose = *pose;
                    } else if let Some(coll) = physics.entity_set.get_collider_mut(coll_key) {
                        coll.pose = *pose;
                    }
                }
            }
            if opts.sync_active {
                if let Some(coll) = physics.entity_set.get_collider_mut(coll_key) {
                    coll.active = inactive.is_none();
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::PoseBuilder,
        physics::{Body, Collider, GridParams},
    };

    #[test]
    fn poses_and_activity_are_synced() {
        let mut physics = CollisionWorld::new(GridParams::default()).unwrap();
        let mut hecs_world = hecs::World::new();
        let mut sync = HecsSyncManager::new_autosync(HecsSyncOptions::all());

        let coll = physics
            .entity_set
            .insert_collider(Collider::new_circle(1.0).unwrap());
        let body = physics
            .entity_set
            .insert_body(Body::new_kinematic());
        let attached = physics
            .entity_set
            .attach_collider(body, Collider::new_square(1.0).unwrap());

        let coll_entity = hecs_world.spawn((coll, PoseBuilder::new().with_position([2.0, 1.0]).build()));
        let body_entity = hecs_world.spawn((body, PoseBuilder::new().with_position([-3.0, 0.0]).build()));

        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        assert_eq!(
            physics.entity_set.get_collider(coll).unwrap().pose.translation,
            m::Vec2::new(2.0, 1.0)
        );
        assert_eq!(
            physics.entity_set.collider_world_pose(attached).unwrap().translation,
            m::Vec2::new(-3.0, 0.0)
        );

        hecs_world.insert_one(coll_entity, Inactive).unwrap();
        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        assert!(!physics.entity_set.get_collider(coll).unwrap().active);

        hecs_world.remove_one::<Inactive>(coll_entity).unwrap();
        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        assert!(physics.entity_set.get_collider(coll).unwrap().active);

        // despawning deletes
        hecs_world.despawn(coll_entity).unwrap();
        hecs_world.despawn(body_entity).unwrap();
        sync.sync_hecs_to_physics(&mut physics, &mut hecs_world);
        assert!(physics.entity_set.get_collider(coll).is_none());
        assert!(physics.entity_set.get_body(body).is_none());
    }
}
