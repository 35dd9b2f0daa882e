//! # Collision Shapes
//!
//! Geometry the kernel collides. Shapes are plain values copied into each
//! object descriptor; the kernel never shares them between objects.
//!
//! All primitives are centred on the owning object's origin. Capsules and
//! cylinders are aligned with the local Y axis.

use crate::error::{KernelError, KernelResult};
use ramjet_shared::Vec3;
use serde::{Deserialize, Serialize};

/// Collision geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollisionShape {
    /// Sphere of `radius`.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Box with the given half extents.
    Box {
        /// Half extents per axis.
        half_extents: Vec3,
    },
    /// Y-aligned capsule.
    Capsule {
        /// Radius of the hemispheres and shaft.
        radius: f32,
        /// Half the height of the cylindrical shaft.
        half_height: f32,
    },
    /// Y-aligned cylinder.
    Cylinder {
        /// Half extents; `x` is the radius, `y` half the height.
        half_extents: Vec3,
    },
    /// Infinite plane `dot(normal, p) == constant`. Static only.
    StaticPlane {
        /// Plane normal.
        normal: Vec3,
        /// Plane constant.
        constant: f32,
    },
}

impl CollisionShape {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sphere { .. } => "sphere",
            Self::Box { .. } => "box",
            Self::Capsule { .. } => "capsule",
            Self::Cylinder { .. } => "cylinder",
            Self::StaticPlane { .. } => "static_plane",
        }
    }

    /// True for shapes that can never belong to a dynamic body.
    #[inline]
    #[must_use]
    pub const fn is_static_only(&self) -> bool {
        matches!(self, Self::StaticPlane { .. })
    }

    /// Principal moments of inertia for a body of `mass` with this shape.
    ///
    /// Capsules use the box approximation of their bounding box.
    #[must_use]
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Self::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            Self::Box { half_extents } => box_inertia(mass, half_extents),
            Self::Capsule { radius, half_height } => {
                box_inertia(mass, Vec3::new(radius, radius + half_height, radius))
            }
            Self::Cylinder { half_extents } => {
                let r2 = half_extents.x * half_extents.x;
                let h2 = 4.0 * half_extents.y * half_extents.y;
                let side = mass * (3.0 * r2 + h2) / 12.0;
                Vec3::new(side, 0.5 * mass * r2, side)
            }
            Self::StaticPlane { .. } => Vec3::ZERO,
        }
    }

    /// Radius of a sphere around the origin enclosing the shape.
    ///
    /// Infinite for planes.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => radius,
            Self::Box { half_extents } => half_extents.length(),
            Self::Capsule { radius, half_height } => radius + half_height,
            Self::Cylinder { half_extents } => {
                (half_extents.x * half_extents.x + half_extents.y * half_extents.y).sqrt()
            }
            Self::StaticPlane { .. } => f32::INFINITY,
        }
    }

    /// Rejects non-finite or non-positive dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidDescription`] naming the bad field.
    pub fn validate(&self) -> KernelResult<()> {
        let ok = match *self {
            Self::Sphere { radius } => positive(radius),
            Self::Box { half_extents } | Self::Cylinder { half_extents } => {
                positive(half_extents.x) && positive(half_extents.y) && positive(half_extents.z)
            }
            Self::Capsule { radius, half_height } => {
                positive(radius) && half_height.is_finite() && half_height >= 0.0
            }
            Self::StaticPlane { normal, constant } => {
                constant.is_finite() && normal.is_finite() && normal.length_squared() > f32::EPSILON
            }
        };

        if ok {
            Ok(())
        } else {
            Err(KernelError::InvalidDescription(format!(
                "{} has invalid dimensions: {self:?}",
                self.name()
            )))
        }
    }
}

#[inline]
fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn box_inertia(mass: f32, half_extents: Vec3) -> Vec3 {
    let lx = 2.0 * half_extents.x;
    let ly = 2.0 * half_extents.y;
    let lz = 2.0 * half_extents.z;
    let k = mass / 12.0;
    Vec3::new(
        k * (ly * ly + lz * lz),
        k * (lx * lx + lz * lz),
        k * (lx * lx + ly * ly),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_inertia() {
        let inertia = CollisionShape::Sphere { radius: 0.5 }.calculate_local_inertia(2.0);
        assert!(inertia.abs_diff_eq(Vec3::splat(0.2), 1.0e-6));
    }

    #[test]
    fn test_unit_cube_inertia() {
        let shape = CollisionShape::Box {
            half_extents: Vec3::splat(0.5),
        };
        let inertia = shape.calculate_local_inertia(6.0);
        assert!(inertia.abs_diff_eq(Vec3::splat(1.0), 1.0e-6));
    }

    #[test]
    fn test_plane_is_static_and_unbounded() {
        let plane = CollisionShape::StaticPlane {
            normal: Vec3::Y,
            constant: 0.0,
        };
        assert!(plane.is_static_only());
        assert_eq!(plane.calculate_local_inertia(1.0), Vec3::ZERO);
        assert!(plane.bounding_radius().is_infinite());
    }

    #[test]
    fn test_validate_rejects_bad_dimensions() {
        assert!(CollisionShape::Sphere { radius: 1.0 }.validate().is_ok());
        assert!(CollisionShape::Sphere { radius: 0.0 }.validate().is_err());
        assert!(CollisionShape::Sphere { radius: f32::NAN }.validate().is_err());
        assert!(CollisionShape::StaticPlane {
            normal: Vec3::ZERO,
            constant: 0.0
        }
        .validate()
        .is_err());
    }
}
