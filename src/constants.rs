//! # Constants and type definitions for isotrack
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **unit
//! aliases** used throughout the engine, together with the numerical limits of the
//! hyperbolic Kepler solver and of the public request windows.
//!
//! ## Overview
//!
//! - Astronomical constants (Gaussian gravitational constant, astronomical unit)
//! - Unit conversions (degrees ↔ radians, AU/day ↔ km/s)
//! - Type aliases documenting the unit carried by a plain `f64`
//! - Solver and request limits shared by the orbit model and the HTTP surface

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Astronomical Unit in kilometers (IAU 2012)
pub const AU: f64 = 149_597_870.7;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Degrees → arcseconds
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Gaussian gravitational constant k (used in classical orbit dynamics)
pub const GAUSS_GRAV: f64 = 0.01720209895;

/// AU/day → km/s
pub const AU_PER_DAY_TO_KMPS: f64 = AU / SECONDS_PER_DAY;

// -------------------------------------------------------------------------------------------------
// Solver and request limits
// -------------------------------------------------------------------------------------------------

/// Newton–Raphson stopping criterion on |ΔH| for the hyperbolic Kepler equation
pub const KEPLER_TOLERANCE: f64 = 1e-10;

/// Iteration cap of the hyperbolic Kepler solver
pub const KEPLER_MAX_ITER: usize = 20;

/// Iteration cap used when the orbit model re-solves a non-converged anomaly
pub const KEPLER_RECOVERY_MAX_ITER: usize = 100;

/// Largest `days` accepted by the trajectory endpoint
pub const MAX_TRAJECTORY_DAYS: u32 = 400;

/// Largest `days` accepted by the velocity endpoint
pub const MAX_VELOCITY_DAYS: u32 = 90;

/// Dead-band of the brightness trend classifier (magnitude/day)
pub const TREND_DEAD_BAND: f64 = 0.01;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in kilometers
pub type Kilometer = f64;
/// Distance in astronomical units
pub type AstronomicalUnit = f64;
/// Time span in days
pub type Days = f64;
