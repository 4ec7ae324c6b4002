//! # isotrack
//!
//! Orbit determination and data reconciliation for hyperbolic interstellar
//! objects (default target: 3I/ATLAS, `C/2025 N1`).
//!
//! * [`frame_math`] and [`orbit_model`]: two-body propagation of an
//!   [`orbital_elements::OrbitalElements`] set into heliocentric ecliptic J2000 trails;
//! * [`gateway`]: rate-limited, retried access to JPL Horizons and SBDB;
//! * [`cache`]: memory + SQLite cache and the source health ledger;
//! * [`reconcile`]: primary/fallback trajectories, velocity profiles, brightness;
//! * [`trend`]: least-squares magnitude trend and activity fit;
//! * [`server`]: the JSON HTTP surface.

pub mod cache;
pub mod config;
pub mod constants;
pub mod frame_math;
pub mod gateway;
pub mod isotrack_errors;
pub mod orbit_model;
pub mod orbital_elements;
pub mod reconcile;
pub mod server;
pub mod time;
pub mod trend;
