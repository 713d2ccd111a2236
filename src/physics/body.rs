use super::{Collider, Velocity};
use crate::math as m;

/// A body is something that moves, typically a physics-enabled rigid body or particle.
/// Attach colliders to a Body to make them move with it.
///
/// Collision detection only reads the pose of a body.
/// Velocity and mass are carried for whatever resolves the contacts.
#[derive(Clone, Copy, Debug)]
pub struct Body {
    pub pose: m::Pose,
    pub velocity: Velocity,
    pub mass: Mass,
    pub moment_of_inertia: Mass,
}

impl Body {
    /// A particle responds to external forces but does not rotate.
    pub fn new_particle(mass: f64) -> Self {
        Self {
            pose: m::Pose::identity(),
            velocity: Velocity::default(),
            mass: Mass::from(mass),
            moment_of_inertia: Mass::Infinite,
        }
    }

    /// Dynamic bodies respond to external forces and are allowed to rotate.
    /// This constructor calculates mass and moment of inertia from the given density and
    /// collider shape.
    pub fn new_dynamic(collider: &Collider, density: f64) -> Self {
        let mass = collider.shape().area() * density;
        Self {
            pose: m::Pose::identity(),
            velocity: Velocity::default(),
            mass: Mass::from(mass),
            moment_of_inertia: Mass::from(collider.shape().second_moment_of_area() * density),
        }
    }

    /// Kinematic bodies move, but are not affected by collision forces.
    pub fn new_kinematic() -> Self {
        Self {
            pose: m::Pose::identity(),
            velocity: Velocity::default(),
            mass: Mass::Infinite,
            moment_of_inertia: Mass::Infinite,
        }
    }

    /// Static bodies never move. This is the same as a kinematic body with zero velocity,
    /// useful for grouping several static colliders under one pose.
    pub fn new_static() -> Self {
        Self::new_kinematic()
    }

    /// Set the pose of the body in a builder-like chain.
    pub fn with_pose(mut self, pose: impl Into<m::PoseBuilder>) -> Self {
        self.pose = pose.into().build();
        self
    }

    /// Set the velocity of the body in a builder-like chain.
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.velocity = vel;
        self
    }

    /// Check whether the body has finite mass or moment of inertia, allowing forces to have an
    /// effect on it.
    #[inline]
    pub fn sees_forces(&self) -> bool {
        !matches!(
            (self.mass, self.moment_of_inertia),
            (Mass::Infinite, Mass::Infinite)
        )
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    /// Masses that aren't positive and finite are treated as infinite.
    #[inline]
    fn from(mass: f64) -> Self {
        if mass.is_finite() && mass > 0.0 {
            Mass::Finite {
                mass,
                inverse: 1.0 / mass,
            }
        } else {
            Mass::Infinite
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_body_mass_from_density() {
        let coll = Collider::new_rect(2.0, 1.0).unwrap();
        let body = Body::new_dynamic(&coll, 3.0);
        assert_eq!(body.mass, Mass::from(6.0));
        assert!((body.mass.inv() - 1.0 / 6.0).abs() < 1e-12);
        assert!(body.sees_forces());
        assert!(!Body::new_kinematic().sees_forces());
        assert!(!Body::new_static().sees_forces());
        assert_eq!(Mass::from(0.0), Mass::Infinite);
        assert_eq!(Mass::from(f64::NAN).inv(), 0.0);
    }
}
