//! # Two-body orbit model
//!
//! Propagates an [`OrbitalElements`] set to arbitrary instants on its hyperbola and
//! materializes trails of [`TrajectoryPoint`]s in the heliocentric ecliptic J2000 frame.
//!
//! ## Algorithm
//!
//! 1. `dt = t − T` in days (negative before perihelion)
//! 2. `a = q/(e−1)`, `n = k/|a|^1.5`, `M = n·dt`
//! 3. `H` from the hyperbolic Kepler equation, then `ν` and `r`
//! 4. `(r cos ν, r sin ν)` rotated by (ω, Ω, i) into the ecliptic frame
//! 5. `distance_from_sun = |position|`, recomputed from the rotated vector
//!
//! The output is a pure two-body solution; perturbations and non-gravitational
//! accelerations are not modelled.
//!
//! ## Current position
//!
//! A trail is a sampled sequence. [`current_point`] returns the **nearest** sample to a
//! given instant (no interpolation); [`interpolated_point`] is the linear alternative.
//! [`point_at`] selects between them with [`CurrentPointMode`].

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::KEPLER_RECOVERY_MAX_ITER,
    frame_math::{
        orbital_radius, rotate_orbital_plane_to_ecliptic, solve_hyperbolic_kepler_flagged,
        solve_hyperbolic_kepler_seeded, true_anomaly_from_hyperbolic,
    },
    isotrack_errors::IsotrackError,
    orbital_elements::OrbitalElements,
    time::{add_days, days_between, epoch_iso},
};

/// Step (days) of the central difference used by [`velocity_at`].
const VELOCITY_DIFF_STEP: f64 = 1e-3;

/// A heliocentric ecliptic J2000 position at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    #[serde(with = "epoch_iso")]
    pub instant: Epoch,
    /// Position components (AU).
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// `|position|` (AU).
    pub distance_from_sun: f64,
}

impl TrajectoryPoint {
    pub fn new(instant: Epoch, position: Vector3<f64>) -> Self {
        TrajectoryPoint {
            instant,
            x: position.x,
            y: position.y,
            z: position.z,
            distance_from_sun: position.norm(),
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// An ordered, materialized sequence of positions, monotonic in time.
pub type Trail = Vec<TrajectoryPoint>;

/// How the "current" position is derived from a sampled trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentPointMode {
    /// Sample whose instant is closest to the requested one.
    #[default]
    Nearest,
    /// Linear interpolation between the two bracketing samples.
    Interpolated,
}

/// Hyperbolic anomaly for `M`, re-solved from the asymptotic seed `asinh(M/e)`
/// when the `H₀ = M` iteration stops before converging.
fn hyperbolic_anomaly(mean_anomaly: f64, e: f64) -> f64 {
    let first = solve_hyperbolic_kepler_flagged(mean_anomaly, e);
    if first.converged {
        return first.value;
    }

    let recovered = solve_hyperbolic_kepler_seeded(
        mean_anomaly,
        e,
        (mean_anomaly / e).asinh(),
        KEPLER_RECOVERY_MAX_ITER,
    );
    tracing::debug!(
        mean_anomaly,
        eccentricity = e,
        recovered_iterations = recovered.iterations,
        converged = recovered.converged,
        "hyperbolic Kepler solver did not converge from H0 = M, re-solved from asinh(M/e)"
    );
    recovered.value
}

/// Heliocentric position of the object at `instant`.
///
/// Arguments
/// -----------------
/// * `elements`: a hyperbolic element set (`e > 1`)
/// * `instant`: evaluation time
///
/// Return
/// ----------
/// * The [`TrajectoryPoint`] at `instant`.
///
/// Errors
/// ----------
/// * [`IsotrackError::InvalidOrbit`] when `e ≤ 1`: the elliptic branch is not
///   implemented and no approximation is attempted.
pub fn position_at(
    elements: &OrbitalElements,
    instant: Epoch,
) -> Result<TrajectoryPoint, IsotrackError> {
    elements.ensure_hyperbolic()?;

    let e = elements.eccentricity;
    let q = elements.perihelion_distance;

    let dt_days = days_between(instant, elements.perihelion_time);
    let mean_anomaly = elements.mean_motion() * dt_days;

    let h = hyperbolic_anomaly(mean_anomaly, e);
    let nu = true_anomaly_from_hyperbolic(h, e);
    let r = orbital_radius(q, e, nu);

    let position = rotate_orbital_plane_to_ecliptic(
        r * nu.cos(),
        r * nu.sin(),
        elements.argument_of_perihelion,
        elements.longitude_of_ascending_node,
        elements.inclination,
    );

    Ok(TrajectoryPoint::new(instant, position))
}

/// Heliocentric velocity (AU/day) at `instant`, by central difference of [`position_at`].
pub fn velocity_at(
    elements: &OrbitalElements,
    instant: Epoch,
) -> Result<Vector3<f64>, IsotrackError> {
    let before = position_at(elements, add_days(instant, -VELOCITY_DIFF_STEP))?;
    let after = position_at(elements, add_days(instant, VELOCITY_DIFF_STEP))?;
    Ok((after.position() - before.position()) / (2.0 * VELOCITY_DIFF_STEP))
}

/// Sample [`position_at`] every `step_days` from `start` up to `end` (inclusive when
/// `end` falls on the grid).
///
/// Errors
/// ----------
/// * [`IsotrackError::InvalidRequest`] if `step_days ≤ 0` or `end < start`.
/// * [`IsotrackError::InvalidOrbit`] for non-hyperbolic elements.
pub fn trajectory_between(
    elements: &OrbitalElements,
    start: Epoch,
    end: Epoch,
    step_days: f64,
) -> Result<Trail, IsotrackError> {
    if !(step_days > 0.0) {
        return Err(IsotrackError::InvalidRequest(format!(
            "trajectory step must be positive, got {step_days} days"
        )));
    }
    let span = days_between(end, start);
    if span < 0.0 {
        return Err(IsotrackError::InvalidRequest(
            "trajectory end precedes its start".into(),
        ));
    }
    elements.ensure_hyperbolic()?;

    // tolerate rounding when `end` lies exactly on the grid
    let n_steps = (span / step_days + 1e-9).floor() as usize;
    (0..=n_steps)
        .map(|i| position_at(elements, add_days(start, i as f64 * step_days)))
        .collect()
}

/// Sample of `trail` whose instant is closest to `now`.
///
/// Ties resolve to the earlier sample. Returns `None` for an empty trail.
pub fn current_point(trail: &[TrajectoryPoint], now: Epoch) -> Option<TrajectoryPoint> {
    trail
        .iter()
        .min_by(|a, b| {
            let da = days_between(a.instant, now).abs();
            let db = days_between(b.instant, now).abs();
            da.total_cmp(&db)
        })
        .copied()
}

/// Linear interpolation of `trail` at `now`.
///
/// Outside the sampled span the nearest end point is returned.
pub fn interpolated_point(trail: &[TrajectoryPoint], now: Epoch) -> Option<TrajectoryPoint> {
    let first = trail.first()?;
    let last = trail.last()?;
    if now <= first.instant {
        return Some(*first);
    }
    if now >= last.instant {
        return Some(*last);
    }

    let upper = trail.partition_point(|p| p.instant <= now);
    let (p0, p1) = (&trail[upper - 1], &trail[upper]);

    let span = days_between(p1.instant, p0.instant);
    if span <= 0.0 {
        return Some(*p0);
    }
    let frac = days_between(now, p0.instant) / span;
    let position = p0.position() + (p1.position() - p0.position()) * frac;
    Some(TrajectoryPoint::new(now, position))
}

/// Current position of a trail according to `mode`.
pub fn point_at(
    trail: &[TrajectoryPoint],
    now: Epoch,
    mode: CurrentPointMode,
) -> Option<TrajectoryPoint> {
    match mode {
        CurrentPointMode::Nearest => current_point(trail, now),
        CurrentPointMode::Interpolated => interpolated_point(trail, now),
    }
}
