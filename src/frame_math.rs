//! # Frame math
//!
//! Pure numerical building blocks of the orbit model: angle normalization, the
//! hyperbolic Kepler equation, conic geometry, the 3-2-3 Euler rotation from the
//! orbital plane to the heliocentric ecliptic J2000 frame, and angular separation
//! on the celestial sphere.
//!
//! Units
//! -----
//! * Every public angle argument and return value is in **degrees**, except the
//!   anomalies (`M`, `H`, `ν`) which are in **radians**, as is customary.
//! * Distances are in **AU**.
//!
//! Nothing here holds state or performs I/O; all functions are safe to call from
//! any number of tasks concurrently.

use nalgebra::Vector3;
use std::f64::consts::PI;

use crate::constants::{Degree, Radian, DPI, KEPLER_MAX_ITER, KEPLER_TOLERANCE, RADEG};

/// Outcome of the hyperbolic Kepler solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HyperbolicAnomaly {
    /// Hyperbolic anomaly `H` (radians) reached when the iteration stopped.
    pub value: Radian,
    /// Number of Newton steps performed.
    pub iterations: usize,
    /// `true` when the last step satisfied `|ΔH| < tolerance`.
    pub converged: bool,
}

/// Returns the principal value of an angle in degrees, in `[0, 360)`.
pub fn normalize_degrees(angle: Degree) -> Degree {
    angle.rem_euclid(360.0)
}

/// Returns the principal value of an angle in radians, in `[0, 2π)`.
fn principal_angle(a: Radian) -> Radian {
    a.rem_euclid(DPI)
}

/// Signed difference `a − b` between two angles in degrees, in `[-180, 180]`.
pub fn angle_diff_degrees(a: Degree, b: Degree) -> Degree {
    let a = principal_angle(a * RADEG);
    let b = principal_angle(b * RADEG);

    let mut diff = a - b;
    if diff > PI {
        diff -= DPI;
    } else if diff < -PI {
        diff += DPI;
    }

    diff / RADEG
}

/// Newton–Raphson on `f(H) = e·sinh(H) − H − M` from a caller-chosen seed.
///
/// Arguments
/// ---------
/// * `mean_anomaly`: hyperbolic mean anomaly `M` (radians)
/// * `e`: eccentricity (> 1)
/// * `seed`: initial guess `H₀`
/// * `max_iter`: iteration cap
///
/// Return
/// ------
/// * the [`HyperbolicAnomaly`] reached, flagged as converged or not
pub fn solve_hyperbolic_kepler_seeded(
    mean_anomaly: Radian,
    e: f64,
    seed: Radian,
    max_iter: usize,
) -> HyperbolicAnomaly {
    let mut h = seed;

    for iteration in 1..=max_iter {
        let f = e * h.sinh() - h - mean_anomaly;
        let fp = e * h.cosh() - 1.0;
        let dh = f / fp;
        h -= dh;

        if dh.abs() < KEPLER_TOLERANCE {
            return HyperbolicAnomaly {
                value: h,
                iterations: iteration,
                converged: true,
            };
        }
    }

    HyperbolicAnomaly {
        value: h,
        iterations: max_iter,
        converged: false,
    }
}

/// Solve the hyperbolic Kepler equation, reporting whether the iteration converged.
///
/// Seeded with `H₀ = M` and capped at 20 iterations; see
/// [`solve_hyperbolic_kepler_seeded`] for a different seed or cap.
pub fn solve_hyperbolic_kepler_flagged(mean_anomaly: Radian, e: f64) -> HyperbolicAnomaly {
    solve_hyperbolic_kepler_seeded(mean_anomaly, e, mean_anomaly, KEPLER_MAX_ITER)
}

/// Solve the hyperbolic Kepler equation `M = e·sinh(H) − H` for `H`.
///
/// Never fails: when the 20-iteration cap is reached the last iterate is returned.
/// Use [`solve_hyperbolic_kepler_flagged`] to know whether it converged.
pub fn solve_hyperbolic_kepler(mean_anomaly: Radian, e: f64) -> Radian {
    solve_hyperbolic_kepler_flagged(mean_anomaly, e).value
}

/// True anomaly from hyperbolic anomaly: `ν = 2·atan(√((e+1)/(e−1))·tanh(H/2))`.
///
/// The caller guarantees `e > 1`.
pub fn true_anomaly_from_hyperbolic(h: Radian, e: f64) -> Radian {
    2.0 * (((e + 1.0) / (e - 1.0)).sqrt() * (h / 2.0).tanh()).atan()
}

/// Heliocentric distance on a conic: `r = q·(1+e)/(1+e·cos ν)`.
pub fn orbital_radius(q: f64, e: f64, nu: Radian) -> f64 {
    q * (1.0 + e) / (1.0 + e * nu.cos())
}

/// Rotate orbital-plane coordinates (perihelion along +x) to the heliocentric
/// ecliptic J2000 frame with the 3-2-3 Euler sequence `R3(−Ω)·R1(−i)·R3(−ω)`.
///
/// Arguments
/// ---------
/// * `x_orb`, `y_orb`: in-plane coordinates (AU)
/// * `omega`: argument of perihelion ω (degrees)
/// * `node`: longitude of the ascending node Ω (degrees)
/// * `incl`: inclination i (degrees)
///
/// Return
/// ------
/// * the ecliptic position vector (AU)
pub fn rotate_orbital_plane_to_ecliptic(
    x_orb: f64,
    y_orb: f64,
    omega: Degree,
    node: Degree,
    incl: Degree,
) -> Vector3<f64> {
    let (sin_w, cos_w) = (omega * RADEG).sin_cos();
    let (sin_n, cos_n) = (node * RADEG).sin_cos();
    let (sin_i, cos_i) = (incl * RADEG).sin_cos();

    let x = (cos_n * cos_w - sin_n * sin_w * cos_i) * x_orb
        + (-cos_n * sin_w - sin_n * cos_w * cos_i) * y_orb;
    let y = (sin_n * cos_w + cos_n * sin_w * cos_i) * x_orb
        + (-sin_n * sin_w + cos_n * cos_w * cos_i) * y_orb;
    let z = (sin_w * sin_i) * x_orb + (cos_w * sin_i) * y_orb;

    Vector3::new(x, y, z)
}

/// Angular separation between two directions given as (RA, Dec) or (λ, β), in degrees.
///
/// Uses the spherical law of cosines; the cosine is clamped to `[-1, 1]` so that
/// rounding overshoot never produces `NaN`.
pub fn angular_separation(ra1: Degree, dec1: Degree, ra2: Degree, dec2: Degree) -> Degree {
    let (ra1, dec1, ra2, dec2) = (ra1 * RADEG, dec1 * RADEG, ra2 * RADEG, dec2 * RADEG);

    let cos_sep = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * (ra1 - ra2).cos();
    cos_sep.clamp(-1.0, 1.0).acos() / RADEG
}

/// Ecliptic longitude and latitude (degrees) of a Cartesian direction.
///
/// Longitude is in `[0, 360)`; the zero vector maps to `(0, 0)`.
pub fn ecliptic_spherical(position: &Vector3<f64>) -> (Degree, Degree) {
    let r = position.norm();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let lon = normalize_degrees(position.y.atan2(position.x) / RADEG);
    let lat = (position.z / r).clamp(-1.0, 1.0).asin() / RADEG;
    (lon, lat)
}

#[cfg(test)]
mod frame_math_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_degrees() {
        assert_relative_eq!(normalize_degrees(370.0), 10.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_degrees(-30.0), 330.0, epsilon = 1e-12);
        assert_eq!(normalize_degrees(0.0), 0.0);
    }

    #[test]
    fn test_angle_diff_degrees() {
        assert_relative_eq!(angle_diff_degrees(10.0, 350.0), 20.0, epsilon = 1e-9);
        assert_relative_eq!(angle_diff_degrees(350.0, 10.0), -20.0, epsilon = 1e-9);
        assert_relative_eq!(angle_diff_degrees(90.0, 90.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kepler_round_trip() {
        for &e in &[1.2, 2.0, 6.2769203] {
            for &h in &[-1.5, -0.5, 0.0, 0.3, 1.0, 1.5] {
                let m = e * f64::sinh(h) - h;
                let solved = solve_hyperbolic_kepler(m, e);
                assert_relative_eq!(solved, h, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_kepler_flag_reports_convergence() {
        let res = solve_hyperbolic_kepler_flagged(2.0, 3.0);
        assert!(res.converged);
        assert!(res.iterations <= KEPLER_MAX_ITER);

        let residual = 3.0 * res.value.sinh() - res.value - 2.0;
        assert!(residual.abs() < 1e-9);
    }

    #[test]
    fn test_kepler_cap_returns_last_iterate() {
        // H₀ = M = 60 is far from the root (~4.45); Newton needs more than 20 steps.
        let flagged = solve_hyperbolic_kepler_flagged(60.0, 1.5);
        assert!(!flagged.converged);
        assert_eq!(flagged.iterations, KEPLER_MAX_ITER);
        assert_eq!(solve_hyperbolic_kepler(60.0, 1.5), flagged.value);

        let recovered = solve_hyperbolic_kepler_seeded(60.0, 1.5, (60.0f64 / 1.5).asinh(), 100);
        assert!(recovered.converged);
        let residual = 1.5 * recovered.value.sinh() - recovered.value - 60.0;
        assert!(residual.abs() < 1e-8);
    }

    #[test]
    fn test_true_anomaly_and_radius_at_perihelion() {
        assert_eq!(true_anomaly_from_hyperbolic(0.0, 2.0), 0.0);
        assert_relative_eq!(orbital_radius(1.3, 2.0, 0.0), 1.3, epsilon = 1e-15);
    }

    #[test]
    fn test_true_anomaly_bounded_by_asymptote() {
        let e: f64 = 6.2769203;
        let nu_inf = (-1.0 / e).acos();
        let nu = true_anomaly_from_hyperbolic(10.0, e);
        assert!(nu > 0.0 && nu < nu_inf);
        assert_relative_eq!(true_anomaly_from_hyperbolic(-10.0, e), -nu, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_identity() {
        let v = rotate_orbital_plane_to_ecliptic(0.7, -1.2, 0.0, 0.0, 0.0);
        assert_relative_eq!(v.x, 0.7, epsilon = 1e-15);
        assert_relative_eq!(v.y, -1.2, epsilon = 1e-15);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_rotation_preserves_norm() {
        let v = rotate_orbital_plane_to_ecliptic(1.1, 0.4, 127.79317, 322.27219, 175.11669);
        assert_relative_eq!(v.norm(), (1.1f64.powi(2) + 0.4f64.powi(2)).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_signs() {
        // i = 90°: perihelion on the node line, +y_orb lifts out of the ecliptic.
        let v = rotate_orbital_plane_to_ecliptic(0.0, 1.0, 0.0, 0.0, 90.0);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-15);
        assert_relative_eq!(v.z, 1.0, epsilon = 1e-15);

        // Ω = 90°: the node line points to +y.
        let v = rotate_orbital_plane_to_ecliptic(1.0, 0.0, 0.0, 90.0, 0.0);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-15);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-15);

        // i = 180°: retrograde plane mirrors y.
        let v = rotate_orbital_plane_to_ecliptic(0.0, 1.0, 0.0, 0.0, 180.0);
        assert_relative_eq!(v.y, -1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_angular_separation() {
        assert_relative_eq!(angular_separation(0.0, 0.0, 90.0, 0.0), 90.0, epsilon = 1e-12);
        assert_relative_eq!(angular_separation(10.0, 90.0, 250.0, 90.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(angular_separation(0.0, 0.0, 180.0, 0.0), 180.0, epsilon = 1e-12);
        // identical points must not produce NaN from acos overshoot
        let sep = angular_separation(123.456789, -45.678901, 123.456789, -45.678901);
        assert!(!sep.is_nan());
        assert!(sep < 1e-6);
    }

    #[test]
    fn test_ecliptic_spherical() {
        let (lon, lat) = ecliptic_spherical(&Vector3::new(0.0, -2.0, 0.0));
        assert_relative_eq!(lon, 270.0, epsilon = 1e-12);
        assert_relative_eq!(lat, 0.0, epsilon = 1e-12);

        let (_, lat) = ecliptic_spherical(&Vector3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(lat, 90.0, epsilon = 1e-12);
    }
}
