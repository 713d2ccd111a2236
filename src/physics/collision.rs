//! Types and algorithms for detecting collisions between shapes.

mod aabb;
pub use aabb::AABB;

mod collider;
pub use collider::{
    CacheStatus, Collider, ColliderPolygon, ColliderShape, ColliderType, GeometryError,
    PhysicsMaterial, WorldShape,
};

pub mod grid;
pub use grid::{ConfigurationError, Grid, GridParams};

pub mod narrowphase;
pub use narrowphase::{ContactPoints, Manifold};

mod pair;
pub use pair::{PairKey, PairSet};

pub mod query;
