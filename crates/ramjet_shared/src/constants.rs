//! # Simulation Defaults
//!
//! Values every configuration falls back to when a field is omitted.
//!
//! **NOTE:** Changing any of these changes simulation output for every host
//! relying on the defaults. Treat them like a file format.

use crate::math::Vec3;

// =============================================================================
// STEPPING
// =============================================================================

/// Default gravity (m/s^2), Y up.
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);

/// Default fixed internal time step (60 Hz).
pub const DEFAULT_FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// Default cap on internal sub-steps per `step` call.
pub const DEFAULT_MAX_SUB_STEPS: u32 = 3;

/// Seed handed to the constraint solver for reproducible ordering.
pub const SOLVER_RANDOM_SEED: u32 = 12_345;

// =============================================================================
// BROADPHASE
// =============================================================================

/// Maximum proxies a 16-bit sweep-and-prune broadphase can hold.
pub const AXIS3_SWEEP_MAX_PROXIES: u32 = 32_766;

/// Default lower corner of the sweep-and-prune world bounds.
pub const DEFAULT_BROADPHASE_MIN: Vec3 = Vec3::new(-1000.0, -1000.0, -1000.0);

/// Default upper corner of the sweep-and-prune world bounds.
pub const DEFAULT_BROADPHASE_MAX: Vec3 = Vec3::new(1000.0, 1000.0, 1000.0);

// =============================================================================
// SOFT BODIES
// =============================================================================

/// Default air density for soft-body aerodynamics (kg/m^3).
pub const DEFAULT_AIR_DENSITY: f32 = 1.2;

/// Default water density (no water).
pub const DEFAULT_WATER_DENSITY: f32 = 0.0;

/// Default water plane offset.
pub const DEFAULT_WATER_OFFSET: f32 = 0.0;

/// Default water plane normal (no water).
pub const DEFAULT_WATER_NORMAL: Vec3 = Vec3::ZERO;

// =============================================================================
// CAPACITY
// =============================================================================

/// Default maximum number of concurrently registered objects.
pub const DEFAULT_MAX_OBJECTS: usize = 1024;

/// Default number of entries the pool allocates whenever it runs dry.
pub const DEFAULT_POOL_GROWTH_STEP: usize = 32;

/// Default capacity of the world's body table (highest body id + 1).
pub const DEFAULT_MAX_BODIES: usize = 4096;

// =============================================================================
// ACTIVATION
// =============================================================================

/// Seconds a body must stay below its sleeping thresholds before it sleeps.
pub const DEACTIVATION_TIME: f32 = 2.0;

/// Default linear sleeping threshold (m/s).
pub const DEFAULT_LINEAR_SLEEPING_THRESHOLD: f32 = 0.8;

/// Default angular sleeping threshold (rad/s).
pub const DEFAULT_ANGULAR_SLEEPING_THRESHOLD: f32 = 1.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_is_sixty_hertz() {
        assert!((DEFAULT_FIXED_TIME_STEP * 60.0 - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn test_broadphase_bounds_are_ordered() {
        assert!(DEFAULT_BROADPHASE_MIN.x < DEFAULT_BROADPHASE_MAX.x);
        assert!(DEFAULT_BROADPHASE_MIN.y < DEFAULT_BROADPHASE_MAX.y);
        assert!(DEFAULT_BROADPHASE_MIN.z < DEFAULT_BROADPHASE_MAX.z);
    }
}
