//! # Brightness trend analysis
//!
//! Ordinary least squares over `(x, y)` samples, and the classification of the
//! fitted slope. Magnitudes decrease as an object brightens, so a negative slope
//! reads as *brightening*.
//!
//! [`fit_activity_model`] fits the standard comet photometric law
//!
//! ```text
//! m = H + 5 log10(Δ) + 2.5 n log10(r)
//! ```
//!
//! which is linear in `(H, n)` once the geometric term is moved to the left side.

use serde::{Deserialize, Serialize};

use crate::{constants::TREND_DEAD_BAND, isotrack_errors::IsotrackError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, `1 − SS_res / SS_tot`.
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Closed-form least-squares line through `points`.
///
/// Errors
/// ----------
/// * [`IsotrackError::InsufficientData`] with fewer than two points, or when every
///   point shares the same `x` (the slope is undefined).
pub fn fit_linear(points: &[(f64, f64)]) -> Result<LinearFit, IsotrackError> {
    if points.len() < 2 {
        return Err(IsotrackError::InsufficientData {
            required: 2,
            got: points.len(),
        });
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });

    if sxx == 0.0 {
        return Err(IsotrackError::InsufficientData {
            required: 2,
            got: 1,
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let (ss_res, ss_tot) = points.iter().fold((0.0, 0.0), |(res, tot), (x, y)| {
        let residual = y - (slope * x + intercept);
        (res + residual * residual, tot + (y - mean_y).powi(2))
    });
    // a constant series is fitted exactly by the horizontal line
    let r_squared = if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Brightening,
    Dimming,
    Stable,
}

/// Classify a magnitude slope (mag/day): within the dead band it is stable.
pub fn classify_trend(slope: f64) -> Trend {
    if slope.abs() < TREND_DEAD_BAND {
        Trend::Stable
    } else if slope < 0.0 {
        Trend::Brightening
    } else {
        Trend::Dimming
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub trend: Trend,
    pub slope: f64,
    /// `r²` of the fit, clamped to `[0, 1]`.
    pub confidence: f64,
}

/// Fit `points` (day, magnitude) and classify the result.
pub fn analyze_trend(points: &[(f64, f64)]) -> Result<TrendReport, IsotrackError> {
    let fit = fit_linear(points)?;
    Ok(TrendReport {
        trend: classify_trend(fit.slope),
        slope: fit.slope,
        confidence: fit.r_squared.clamp(0.0, 1.0),
    })
}

/// Photometric parameters of an active comet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityFit {
    /// Total absolute magnitude `H`.
    pub absolute_magnitude: f64,
    /// Activity index `n` of the heliocentric term.
    pub activity_index: f64,
    pub r_squared: f64,
}

/// Fit `m = H + 5 log10 Δ + 2.5 n log10 r` to `(r, Δ, m)` samples (AU, AU, mag).
///
/// Errors
/// ----------
/// * [`IsotrackError::InsufficientData`] with fewer than three samples or a single
///   heliocentric distance.
/// * [`IsotrackError::InvalidRequest`] for a non-positive distance.
pub fn fit_activity_model(samples: &[(f64, f64, f64)]) -> Result<ActivityFit, IsotrackError> {
    if samples.len() < 3 {
        return Err(IsotrackError::InsufficientData {
            required: 3,
            got: samples.len(),
        });
    }

    let points = samples
        .iter()
        .map(|&(r, delta, m)| {
            if r <= 0.0 || delta <= 0.0 {
                return Err(IsotrackError::InvalidRequest(format!(
                    "distances must be positive, got r = {r}, delta = {delta}"
                )));
            }
            Ok((2.5 * r.log10(), m - 5.0 * delta.log10()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let fit = fit_linear(&points)?;
    Ok(ActivityFit {
        absolute_magnitude: fit.intercept,
        activity_index: fit.slope,
        r_squared: fit.r_squared,
    })
}
