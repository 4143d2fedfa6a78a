//! Configuration of float types for math

/// Scalar used for all geometry, selected by the `f64`/`f32` feature.
#[cfg(feature = "f64")]
pub type Real = f64;

/// Scalar used for all geometry, selected by the `f64`/`f32` feature.
#[cfg(feature = "f32")]
pub type Real = f32;

/// Tolerance for geometric comparisons.
#[cfg(feature = "f64")]
pub const EPSILON: Real = 1e-8;

/// Tolerance for geometric comparisons.
#[cfg(feature = "f32")]
pub const EPSILON: Real = 1e-5;

/// π/2
#[cfg(feature = "f64")]
pub const FRAC_PI_2: Real = core::f64::consts::FRAC_PI_2;

/// π/2
#[cfg(feature = "f32")]
pub const FRAC_PI_2: Real = core::f32::consts::FRAC_PI_2;
