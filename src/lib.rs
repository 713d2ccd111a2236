//! Broad and narrow phase collision detection for 2D rigid bodies.
//!
//! Put [`Body`]s and [`Collider`]s into a [`CollisionWorld`] and call
//! [`step`][CollisionWorld::step] to find out which colliders intersect and how.
//! What to do about the intersections is up to you.

pub mod math;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod physics;
pub use physics::{
    collision::{
        self, narrowphase, query, Collider, ColliderPolygon, ColliderShape, ColliderType,
        ConfigurationError, ContactPoints, GeometryError, Grid, GridParams, Manifold, PairKey,
        PairSet, PhysicsMaterial, AABB,
    },
    Body, BodyKey, ColliderKey, CollisionError, CollisionWorld, EntitySet, HecsSyncManager,
    HecsSyncOptions, Inactive, Mass, StepReport, Velocity,
};

// Re-exported hecs to guarantee versions match
pub use hecs;
