//! # RAMJET Shared
//!
//! Value types used by both the kernel interface and the registration layer.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER own a native handle or depend on a kernel crate.
//! If a type refers to something the kernel allocated, it belongs in
//! `ramjet_kernel`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    DEFAULT_FIXED_TIME_STEP, DEFAULT_GRAVITY, DEFAULT_MAX_OBJECTS, DEFAULT_MAX_SUB_STEPS,
};
pub use math::{Quaternion, Transform, Vec3};
