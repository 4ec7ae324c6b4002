use hifitime::Epoch;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    constants::{Degree, GAUSS_GRAV},
    isotrack_errors::IsotrackError,
    time::{epoch_iso, epoch_to_iso},
};

/// # Perihelion-based orbital elements of a hyperbolic object
///
/// Cometary elements are the natural parametrisation of an open orbit: the
/// semi-major axis of a hyperbola is negative and carries less information than
/// the perihelion distance `q` and the perihelion passage `T`.
///
/// Units & conventions
/// --------------------
/// - Distances in **AU**; angles in **degrees**; instants as [`Epoch`].
/// - Angles refer to the ecliptic and mean equinox of J2000.
/// - For this object class `e > 1`; the orbit model rejects anything else.
///
/// An element set is never edited in place: a newer solution is a new value,
/// typically fetched from a provider with a later `epoch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    /// Eccentricity `e` (> 1).
    pub eccentricity: f64,

    /// Perihelion distance `q` (AU).
    pub perihelion_distance: f64,

    /// Inclination `i` (deg).
    pub inclination: Degree,

    /// Argument of perihelion `ω` (deg).
    pub argument_of_perihelion: Degree,

    /// Longitude of the ascending node `Ω` (deg).
    pub longitude_of_ascending_node: Degree,

    /// Time of perihelion passage `T`.
    #[serde(with = "epoch_iso")]
    pub perihelion_time: Epoch,

    /// Osculation epoch of the solution.
    #[serde(with = "epoch_iso")]
    pub epoch: Epoch,

    /// Provider that produced the solution.
    pub source: String,

    /// Number of observations used in the fit, when the provider reports it.
    pub observation_count: Option<u32>,

    /// Observation arc as reported by the provider (e.g. `"87 days"`).
    pub observation_arc: Option<String>,
}

impl OrbitalElements {
    /// Historical element set of 3I/ATLAS (C/2025 N1), used as the built-in
    /// prediction when no fresher solution could be fetched.
    pub fn reference_3i_atlas() -> Self {
        let perihelion_time = Epoch::from_gregorian_utc_hms(2025, 10, 29, 5, 3, 46);
        OrbitalElements {
            eccentricity: 6.2769203,
            perihelion_distance: 1.3745928,
            inclination: 175.11669,
            argument_of_perihelion: 127.79317,
            longitude_of_ascending_node: 322.27219,
            perihelion_time,
            epoch: perihelion_time,
            source: "reference".into(),
            observation_count: None,
            observation_arc: None,
        }
    }

    pub fn is_hyperbolic(&self) -> bool {
        self.eccentricity > 1.0
    }

    /// Fail loudly on elements the hyperbolic solver cannot handle.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` when `e > 1` and `q > 0`, [`IsotrackError::InvalidOrbit`] otherwise.
    pub fn ensure_hyperbolic(&self) -> Result<(), IsotrackError> {
        if self.is_hyperbolic() && self.perihelion_distance > 0.0 {
            Ok(())
        } else {
            Err(IsotrackError::InvalidOrbit {
                eccentricity: self.eccentricity,
            })
        }
    }

    /// Semi-major axis `a = −q/(e−1)` (AU, negative for a hyperbola).
    pub fn semi_major_axis(&self) -> f64 {
        -self.perihelion_distance / (self.eccentricity - 1.0)
    }

    /// Mean motion `n = k / |a|^1.5` (rad/day).
    pub fn mean_motion(&self) -> f64 {
        GAUSS_GRAV / self.semi_major_axis().abs().powf(1.5)
    }
}

impl fmt::Display for OrbitalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Orbital Elements ({}) @ epoch {}",
            self.source,
            epoch_to_iso(&self.epoch)
        )?;
        writeln!(f, "------------------------------------------------")?;
        writeln!(
            f,
            "  q   (perihelion distance)     = {:.7} AU",
            self.perihelion_distance
        )?;
        writeln!(f, "  e   (eccentricity)            = {:.7}", self.eccentricity)?;
        writeln!(f, "  i   (inclination)             = {:.5}°", self.inclination)?;
        writeln!(
            f,
            "  Ω   (longitude of node)       = {:.5}°",
            self.longitude_of_ascending_node
        )?;
        writeln!(
            f,
            "  ω   (argument of perihelion)  = {:.5}°",
            self.argument_of_perihelion
        )?;
        write!(
            f,
            "  T   (perihelion time)         = {}",
            epoch_to_iso(&self.perihelion_time)
        )
    }
}
