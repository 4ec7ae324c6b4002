//! # Reconciliation layer
//!
//! Combines the provider adapters, the cache tier and the orbit model into the
//! three products served to consumers:
//!
//! * [`Reconciler::dual_trajectory`]: predicted trail (two-body model) next to the
//!   fetched trail, with the deviation between their current points;
//! * [`Reconciler::velocity_profile`]: heliocentric and geocentric speeds, paired by
//!   timestamp;
//! * [`Reconciler::brightness_trend`]: magnitude trend and activity fit.
//!
//! ## Fallback
//!
//! The fetched trail comes from the primary source, or from the fallback when the
//! primary fails or answers with an empty series. Every outcome lands in the health
//! ledger. When both fail the trajectory report still carries the predicted trail,
//! plus a warning.

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cache::{
        health::{OverallStatus, SourceHealthRecord, SourceStatus},
        CacheKey, CacheTier,
    },
    config::EngineConfig,
    constants::{
        ArcSec, AstronomicalUnit, Kilometer, ARCSEC_PER_DEGREE, AU, AU_PER_DAY_TO_KMPS,
        MAX_TRAJECTORY_DAYS, MAX_VELOCITY_DAYS, SECONDS_PER_DAY,
    },
    gateway::{
        horizons_observer::HorizonsObserverSource, horizons_vectors::HorizonsVectorSource,
        http::HttpFetcher, sbdb_elements::SbdbElementsSource, ParsedSeries, SourceAdapter, Step,
        TimeRange,
    },
    isotrack_errors::IsotrackError,
    orbit_model::{point_at, trajectory_between, CurrentPointMode, TrajectoryPoint, Trail},
    orbital_elements::OrbitalElements,
    time::{days_between, epoch_iso, epoch_iso_option, floor_to_hour, now, pairing_key},
    trend::{analyze_trend, fit_activity_model, ActivityFit, TrendReport},
};

/// Which trajectory source produced a fetched trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Primary,
    Fallback,
}

/// Difference between a predicted and a fetched position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationRecord {
    pub position_error_au: AstronomicalUnit,
    pub position_error_km: Kilometer,
    /// Separation of the two heliocentric directions.
    pub angular_error_arcsec: ArcSec,
}

/// Deviation of `actual` from `predicted`.
///
/// The angle comes from `atan2(|p × a|, p · a)`, which stays exact for nearly
/// parallel directions.
pub fn deviation_between(predicted: &TrajectoryPoint, actual: &TrajectoryPoint) -> DeviationRecord {
    let p = predicted.position();
    let a = actual.position();
    let position_error_au = (p - a).norm();
    let angle = p.cross(&a).norm().atan2(p.dot(&a));

    DeviationRecord {
        position_error_au,
        position_error_km: position_error_au * AU,
        angular_error_arcsec: angle.to_degrees() * ARCSEC_PER_DEGREE,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryReport {
    pub predicted: Trail,
    pub actual: Option<Trail>,
    pub deviation: Option<DeviationRecord>,
    pub source: Option<SourceTag>,
    pub warning: Option<String>,
}

/// Position and velocity at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub instant: Epoch,
    /// AU
    pub position: Vector3<f64>,
    /// AU/day
    pub velocity: Vector3<f64>,
}

impl StateVector {
    pub fn speed_kmps(&self) -> f64 {
        self.velocity.norm() * AU_PER_DAY_TO_KMPS
    }

    /// States of the samples that carry both a position and a velocity.
    pub fn from_series(series: &ParsedSeries) -> Vec<StateVector> {
        series
            .samples
            .iter()
            .filter_map(|s| {
                Some(StateVector {
                    instant: s.instant,
                    position: s.position?,
                    velocity: s.velocity?,
                })
            })
            .collect()
    }
}

/// Pair two state series on their timestamp key; unmatched states are dropped.
///
/// The result follows the order of `helio`.
pub fn pair_by_timestamp(
    helio: &[StateVector],
    geo: &[StateVector],
) -> Vec<(StateVector, StateVector)> {
    let by_key: HashMap<i64, &StateVector> = geo.iter().map(|s| (pairing_key(s.instant), s)).collect();

    let pairs: Vec<(StateVector, StateVector)> = helio
        .iter()
        .filter_map(|h| by_key.get(&pairing_key(h.instant)).map(|g| (*h, **g)))
        .collect();

    let unmatched = helio.len().saturating_sub(pairs.len()) + geo.len().saturating_sub(pairs.len());
    if unmatched > 0 {
        tracing::warn!(
            helio = helio.len(),
            geo = geo.len(),
            paired = pairs.len(),
            "dropping state vectors without a counterpart at the same instant"
        );
    }
    pairs
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocitySample {
    #[serde(with = "epoch_iso")]
    pub date: Epoch,
    pub heliocentric_velocity_kmps: f64,
    pub geocentric_velocity_kmps: f64,
    /// Rate of change of the heliocentric speed.
    pub acceleration_kmps2: f64,
    pub distance_from_sun_au: f64,
    pub distance_from_earth_au: f64,
}

/// Velocity samples from paired states; acceleration by finite difference of the
/// heliocentric speed (backward, forward for the first sample, 0 for a lone one).
pub fn velocity_samples(pairs: &[(StateVector, StateVector)]) -> Vec<VelocitySample> {
    let speeds: Vec<f64> = pairs.iter().map(|(h, _)| h.speed_kmps()).collect();

    let rate = |i: usize, j: usize| {
        let dt = days_between(pairs[j].0.instant, pairs[i].0.instant) * SECONDS_PER_DAY;
        if dt == 0.0 {
            0.0
        } else {
            (speeds[j] - speeds[i]) / dt
        }
    };

    pairs
        .iter()
        .enumerate()
        .map(|(i, (helio, geo))| {
            let acceleration_kmps2 = match i {
                0 if pairs.len() > 1 => rate(0, 1),
                0 => 0.0,
                _ => rate(i - 1, i),
            };
            VelocitySample {
                date: helio.instant,
                heliocentric_velocity_kmps: speeds[i],
                geocentric_velocity_kmps: geo.speed_kmps(),
                acceleration_kmps2,
                distance_from_sun_au: helio.position.norm(),
                distance_from_earth_au: geo.position.norm(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeSample {
    #[serde(with = "epoch_iso")]
    pub date: Epoch,
    pub magnitude: f64,
    pub r_au: Option<f64>,
    pub delta_au: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrightnessReport {
    pub samples: Vec<MagnitudeSample>,
    pub trend: TrendReport,
    /// Absent when fewer than three samples carry both distances.
    pub activity: Option<ActivityFit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealthView {
    pub name: String,
    pub status: SourceStatus,
    #[serde(with = "epoch_iso_option")]
    pub last_success: Option<Epoch>,
    #[serde(with = "epoch_iso_option")]
    pub last_failure: Option<Epoch>,
    pub response_time_ms: Option<u64>,
}

impl From<SourceHealthRecord> for SourceHealthView {
    fn from(record: SourceHealthRecord) -> Self {
        SourceHealthView {
            name: record.source_name,
            status: record.status,
            last_success: record.last_success,
            last_failure: record.last_failure,
            response_time_ms: record.last_response_time_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub per_source: Vec<SourceHealthView>,
}

/// Cache lifetimes and sampling used by the [`Reconciler`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    pub trajectory_ttl: Duration,
    pub velocity_ttl: Duration,
    pub brightness_ttl: Duration,
    pub step: Step,
    pub current_point: CurrentPointMode,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        ReconcilerSettings {
            trajectory_ttl: Duration::from_secs(3_600),
            velocity_ttl: Duration::from_secs(3_600),
            brightness_ttl: Duration::from_secs(6 * 3_600),
            step: Step::days(1),
            current_point: CurrentPointMode::Nearest,
        }
    }
}

impl From<&EngineConfig> for ReconcilerSettings {
    fn from(config: &EngineConfig) -> Self {
        ReconcilerSettings {
            trajectory_ttl: Duration::from_secs(config.cache.trajectory_ttl_secs),
            velocity_ttl: Duration::from_secs(config.cache.velocity_ttl_secs),
            brightness_ttl: Duration::from_secs(config.cache.brightness_ttl_secs),
            step: Step::days(config.trajectory.step_days),
            current_point: config.trajectory.current_point,
        }
    }
}

/// The provider adapters a [`Reconciler`] draws from.
#[derive(Clone)]
pub struct ReconcilerSources {
    /// Heliocentric state vectors: first choice for the fetched trail, and the
    /// heliocentric half of the velocity profile.
    pub primary: Arc<dyn SourceAdapter>,
    /// Second choice for the fetched trail.
    pub fallback: Arc<dyn SourceAdapter>,
    /// Geocentric state vectors.
    pub geocentric: Arc<dyn SourceAdapter>,
    /// Observer ephemeris (magnitudes).
    pub observer: Arc<dyn SourceAdapter>,
}

impl ReconcilerSources {
    /// JPL Horizons vectors first, SBDB elements as fallback, every adapter sharing
    /// one HTTP client and rate limiter.
    pub fn from_config(config: &EngineConfig) -> Result<Self, IsotrackError> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config.gateway)?);
        Ok(Self::with_fetcher(fetcher, config))
    }

    pub fn with_fetcher(fetcher: Arc<HttpFetcher>, config: &EngineConfig) -> Self {
        ReconcilerSources {
            primary: Arc::new(HorizonsVectorSource::heliocentric(
                fetcher.clone(),
                &config.gateway,
                &config.target,
            )),
            fallback: Arc::new(SbdbElementsSource::new(
                fetcher.clone(),
                &config.gateway,
                &config.target,
            )),
            geocentric: Arc::new(HorizonsVectorSource::geocentric(
                fetcher.clone(),
                &config.gateway,
                &config.target,
            )),
            observer: Arc::new(HorizonsObserverSource::new(
                fetcher,
                &config.gateway,
                &config.target,
            )),
        }
    }
}

pub struct Reconciler {
    sources: ReconcilerSources,
    cache: Arc<CacheTier>,
    settings: ReconcilerSettings,
}

fn validate_days(days: u32, max: u32) -> Result<(), IsotrackError> {
    if days == 0 || days > max {
        return Err(IsotrackError::InvalidRequest(format!(
            "days must be between 1 and {max}, got {days}"
        )));
    }
    Ok(())
}

impl Reconciler {
    pub fn new(
        sources: ReconcilerSources,
        cache: Arc<CacheTier>,
        settings: ReconcilerSettings,
    ) -> Self {
        let health = cache.health();
        for source in [
            &sources.primary,
            &sources.fallback,
            &sources.geocentric,
            &sources.observer,
        ] {
            health.register(source.name());
        }
        Reconciler {
            sources,
            cache,
            settings,
        }
    }

    pub fn from_config(config: &EngineConfig, cache: Arc<CacheTier>) -> Result<Self, IsotrackError> {
        Ok(Self::new(
            ReconcilerSources::from_config(config)?,
            cache,
            ReconcilerSettings::from(config),
        ))
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Fetch from `source`, recording the outcome and latency in the health ledger.
    async fn fetch_recorded(
        &self,
        source: &dyn SourceAdapter,
        range: &TimeRange,
        step: &Step,
    ) -> Result<ParsedSeries, IsotrackError> {
        let started = tokio::time::Instant::now();
        let result = source.fetch(range, step).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let health = self.cache.health();
        match &result {
            Ok(series) => {
                health.record_outcome(source.name(), true, None, latency_ms);
                if series.is_empty() {
                    health.mark_degraded(source.name(), "empty series");
                } else if series.skipped_lines > 0 {
                    health.mark_degraded(
                        source.name(),
                        &format!("{} records skipped", series.skipped_lines),
                    );
                }
            }
            Err(err) => {
                tracing::warn!(source = source.name(), error = %err, latency_ms, "source fetch failed");
                health.record_outcome(source.name(), false, Some(&err.to_string()), latency_ms);
            }
        }
        result
    }

    /// Heliocentric trail over `range` from the primary source, or the fallback.
    ///
    /// Errors
    /// ----------
    /// * [`IsotrackError::AllSourcesFailed`] listing each source's failure when
    ///   neither produced a non-empty trail.
    pub async fn actual_trajectory(
        &self,
        range: &TimeRange,
        step: &Step,
    ) -> Result<(Trail, SourceTag), IsotrackError> {
        let mut failures = Vec::new();

        for (tag, source) in [
            (SourceTag::Primary, &self.sources.primary),
            (SourceTag::Fallback, &self.sources.fallback),
        ] {
            match self.fetch_recorded(source.as_ref(), range, step).await {
                Ok(series) => {
                    let trail = series.to_trail();
                    if !trail.is_empty() {
                        if tag == SourceTag::Fallback {
                            tracing::info!(source = source.name(), "trajectory served by fallback source");
                        }
                        return Ok((trail, tag));
                    }
                    failures.push(format!("{}: no trajectory points", source.name()));
                }
                Err(err) => failures.push(format!("{}: {err}", source.name())),
            }
        }

        Err(IsotrackError::AllSourcesFailed(failures))
    }

    /// [`Reconciler::dual_trajectory_at`] at the current instant.
    pub async fn dual_trajectory(
        &self,
        elements: &OrbitalElements,
        days: u32,
    ) -> Result<TrajectoryReport, IsotrackError> {
        self.dual_trajectory_at(elements, days, now()?).await
    }

    /// Predicted and fetched trails over `[now − days, now + days]`.
    ///
    /// The window is anchored on the start of the current hour so that requests
    /// within the same hour share a cache entry.
    ///
    /// Errors
    /// ----------
    /// * [`IsotrackError::InvalidRequest`] when `days` is outside `[1, 400]`.
    /// * [`IsotrackError::InvalidOrbit`] for non-hyperbolic elements.
    ///
    /// A failure of the fetched trail is not an error: the report then has the
    /// predicted trail only and a warning.
    pub async fn dual_trajectory_at(
        &self,
        elements: &OrbitalElements,
        days: u32,
        now: Epoch,
    ) -> Result<TrajectoryReport, IsotrackError> {
        validate_days(days, MAX_TRAJECTORY_DAYS)?;

        let step = self.settings.step;
        let range = TimeRange::around(floor_to_hour(now), days as f64);
        let predicted = trajectory_between(elements, range.start, range.end, step.in_days())?;

        let key = CacheKey::new("trajectory", range.cache_params(&step));
        let fetched = self
            .cache
            .get_or_compute(&key, self.settings.trajectory_ttl, || {
                self.actual_trajectory(&range, &step)
            })
            .await;

        let (actual, source) = match fetched {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "actual trajectory unavailable, serving prediction only");
                return Ok(TrajectoryReport {
                    predicted,
                    actual: None,
                    deviation: None,
                    source: None,
                    warning: Some(format!("actual trajectory unavailable: {err}")),
                });
            }
        };

        let mode = self.settings.current_point;
        let deviation = match (point_at(&predicted, now, mode), point_at(&actual, now, mode)) {
            (Some(p), Some(a)) => Some(deviation_between(&p, &a)),
            _ => None,
        };

        Ok(TrajectoryReport {
            predicted,
            actual: Some(actual),
            deviation,
            source: Some(source),
            warning: None,
        })
    }

    /// [`Reconciler::velocity_profile_at`] at the current instant.
    pub async fn velocity_profile(&self, days: u32) -> Result<Vec<VelocitySample>, IsotrackError> {
        self.velocity_profile_at(days, now()?).await
    }

    /// Heliocentric and geocentric speeds over `[now − days, now + days]`.
    ///
    /// Both state series are fetched concurrently; the profile fails if either does.
    ///
    /// Errors
    /// ----------
    /// * [`IsotrackError::InvalidRequest`] when `days` is outside `[1, 90]`.
    /// * [`IsotrackError::Parse`] when a series has no state vectors or the two
    ///   share no timestamp. Nothing is cached then.
    pub async fn velocity_profile_at(
        &self,
        days: u32,
        now: Epoch,
    ) -> Result<Vec<VelocitySample>, IsotrackError> {
        validate_days(days, MAX_VELOCITY_DAYS)?;

        let step = self.settings.step;
        let range = TimeRange::around(floor_to_hour(now), days as f64);
        let key = CacheKey::new("velocity", range.cache_params(&step));

        self.cache
            .get_or_compute(&key, self.settings.velocity_ttl, || async {
                let (helio, geo) = tokio::try_join!(
                    self.fetch_recorded(self.sources.primary.as_ref(), &range, &step),
                    self.fetch_recorded(self.sources.geocentric.as_ref(), &range, &step),
                )?;

                let helio_states = StateVector::from_series(&helio);
                let geo_states = StateVector::from_series(&geo);
                for (series, states) in [(&helio, &helio_states), (&geo, &geo_states)] {
                    if states.is_empty() {
                        return Err(IsotrackError::Parse(format!(
                            "{}: no state vectors",
                            series.source
                        )));
                    }
                }

                let pairs = pair_by_timestamp(&helio_states, &geo_states);
                if pairs.is_empty() {
                    return Err(IsotrackError::Parse(
                        "heliocentric and geocentric series share no instant".into(),
                    ));
                }
                Ok(velocity_samples(&pairs))
            })
            .await
    }

    /// [`Reconciler::brightness_trend_at`] at the current instant.
    pub async fn brightness_trend(&self, days: u32) -> Result<BrightnessReport, IsotrackError> {
        self.brightness_trend_at(days, now()?).await
    }

    /// Magnitude trend over the trailing window `[now − days, now]`.
    ///
    /// Errors
    /// ----------
    /// * [`IsotrackError::InvalidRequest`] when `days` is outside `[1, 400]`.
    /// * [`IsotrackError::InsufficientData`] when fewer than two magnitudes are known.
    pub async fn brightness_trend_at(
        &self,
        days: u32,
        now: Epoch,
    ) -> Result<BrightnessReport, IsotrackError> {
        validate_days(days, MAX_TRAJECTORY_DAYS)?;

        let step = self.settings.step;
        let range = TimeRange::trailing(floor_to_hour(now), days as f64);
        let key = CacheKey::new("brightness", range.cache_params(&step));

        self.cache
            .get_or_compute(&key, self.settings.brightness_ttl, || async {
                let series = self
                    .fetch_recorded(self.sources.observer.as_ref(), &range, &step)
                    .await?;
                brightness_report(&series)
            })
            .await
    }

    pub fn health_report(&self) -> HealthReport {
        let health = self.cache.health();
        HealthReport {
            status: health.overall_status(),
            per_source: health
                .snapshot()
                .into_iter()
                .map(SourceHealthView::from)
                .collect(),
        }
    }
}

/// Trend and activity fit of the magnitudes of an observer series.
pub fn brightness_report(series: &ParsedSeries) -> Result<BrightnessReport, IsotrackError> {
    let samples: Vec<MagnitudeSample> = series
        .samples
        .iter()
        .filter_map(|s| {
            Some(MagnitudeSample {
                date: s.instant,
                magnitude: s.magnitude?,
                r_au: s.r_au,
                delta_au: s.delta_au,
            })
        })
        .collect();

    let Some(first) = samples.first() else {
        return Err(IsotrackError::InsufficientData {
            required: 2,
            got: 0,
        });
    };
    let origin = first.date;

    let points: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| (days_between(s.date, origin), s.magnitude))
        .collect();
    let trend = analyze_trend(&points)?;

    let photometry: Vec<(f64, f64, f64)> = samples
        .iter()
        .filter_map(|s| Some((s.r_au?, s.delta_au?, s.magnitude)))
        .collect();
    let activity = match fit_activity_model(&photometry) {
        Ok(fit) => Some(fit),
        Err(err) => {
            tracing::debug!(error = %err, "no activity fit");
            None
        }
    };

    Ok(BrightnessReport {
        samples,
        trend,
        activity,
    })
}

#[cfg(test)]
mod reconcile_test {
    use super::*;
    use crate::gateway::SeriesSample;
    use approx::assert_relative_eq;

    fn state(jd: f64, position: [f64; 3], velocity: [f64; 3]) -> StateVector {
        StateVector {
            instant: Epoch::from_jde_tdb(jd),
            position: Vector3::from(position),
            velocity: Vector3::from(velocity),
        }
    }

    #[test]
    fn test_deviation_between() {
        let t = Epoch::from_jde_tdb(2460977.5);
        let predicted = TrajectoryPoint::new(t, Vector3::new(1.0, 0.0, 0.0));
        let actual = TrajectoryPoint::new(t, Vector3::new(1.0, 0.001, 0.0));

        let deviation = deviation_between(&predicted, &actual);
        assert_relative_eq!(deviation.position_error_au, 0.001, epsilon = 1e-15);
        assert_relative_eq!(deviation.position_error_km, 149_597.8707, epsilon = 1e-6);
        // atan(0.001) in arcsec
        assert_relative_eq!(
            deviation.angular_error_arcsec,
            0.001f64.atan().to_degrees() * 3600.0,
            epsilon = 1e-3
        );

        let same = deviation_between(&predicted, &predicted);
        assert_eq!(same.position_error_au, 0.0);
        assert_eq!(same.angular_error_arcsec, 0.0);
    }

    #[test]
    fn test_deviation_has_no_floor_for_coincident_points() {
        let t = Epoch::from_jde_tdb(2460977.5);
        let position = Vector3::new(1.2841, -0.7413, 0.0562);
        let predicted = TrajectoryPoint::new(t, position);

        let same = deviation_between(&predicted, &TrajectoryPoint::new(t, position));
        assert!(same.angular_error_arcsec < 1e-9, "{}", same.angular_error_arcsec);

        // one micro-arcsecond off along a perpendicular direction
        let offset = 1e-6 / 3600.0 * crate::constants::RADEG * position.norm();
        let perpendicular = position.cross(&Vector3::z()).normalize() * offset;
        let actual = TrajectoryPoint::new(t, position + perpendicular);
        assert_relative_eq!(
            deviation_between(&predicted, &actual).angular_error_arcsec,
            1e-6,
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_pair_by_timestamp_drops_unmatched() {
        let helio = vec![
            state(2460970.5, [1.0, 0.0, 0.0], [0.0, 0.01, 0.0]),
            state(2460971.5, [1.1, 0.0, 0.0], [0.0, 0.02, 0.0]),
            state(2460972.5, [1.2, 0.0, 0.0], [0.0, 0.03, 0.0]),
        ];
        // geocentric series misses the middle instant and is out of order
        let geo = vec![
            state(2460972.5, [2.2, 0.0, 0.0], [0.0, 0.05, 0.0]),
            state(2460970.5, [2.0, 0.0, 0.0], [0.0, 0.04, 0.0]),
        ];

        let pairs = pair_by_timestamp(&helio, &geo);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.instant, pairs[0].1.instant);
        assert_eq!(pairs[1].1.position.x, 2.2);
    }

    #[test]
    fn test_velocity_samples() {
        let pairs = vec![
            (
                state(2460970.5, [1.0, 0.0, 0.0], [0.0, 0.01, 0.0]),
                state(2460970.5, [2.0, 0.0, 0.0], [0.0, 0.02, 0.0]),
            ),
            (
                state(2460971.5, [0.0, 1.5, 0.0], [0.0, 0.02, 0.0]),
                state(2460971.5, [0.0, 2.5, 0.0], [0.0, 0.02, 0.0]),
            ),
        ];
        let samples = velocity_samples(&pairs);
        assert_eq!(samples.len(), 2);

        let expected_accel = 0.01 * AU_PER_DAY_TO_KMPS / SECONDS_PER_DAY;
        assert_relative_eq!(samples[0].heliocentric_velocity_kmps, 0.01 * AU_PER_DAY_TO_KMPS);
        assert_relative_eq!(samples[0].geocentric_velocity_kmps, 0.02 * AU_PER_DAY_TO_KMPS);
        assert_relative_eq!(samples[0].acceleration_kmps2, expected_accel, epsilon = 1e-12);
        assert_relative_eq!(samples[1].acceleration_kmps2, expected_accel, epsilon = 1e-12);
        assert_relative_eq!(samples[1].distance_from_sun_au, 1.5);
        assert_relative_eq!(samples[1].distance_from_earth_au, 2.5);

        let lone = velocity_samples(&pairs[..1]);
        assert_eq!(lone[0].acceleration_kmps2, 0.0);
        assert!(velocity_samples(&[]).is_empty());
    }

    #[test]
    fn test_state_vectors_need_velocity() {
        let mut complete = SeriesSample::at(Epoch::from_jde_tdb(2460970.5));
        complete.position = Some(Vector3::new(1.0, 0.0, 0.0));
        complete.velocity = Some(Vector3::new(0.0, 0.01, 0.0));
        let mut partial = SeriesSample::at(Epoch::from_jde_tdb(2460971.5));
        partial.position = Some(Vector3::new(1.0, 0.0, 0.0));

        let series = ParsedSeries::new("x", vec![complete, partial], 0);
        assert_eq!(StateVector::from_series(&series).len(), 1);
    }

    #[test]
    fn test_brightness_report() {
        let samples = (0..6)
            .map(|d| {
                let mut s = SeriesSample::at(Epoch::from_jde_tdb(2460960.5 + d as f64));
                let r = 1.6 - 0.02 * d as f64;
                let delta = 2.4 - 0.01 * d as f64;
                s.r_au = Some(r);
                s.delta_au = Some(delta);
                s.magnitude = Some(6.0 + 5.0 * delta.log10() + 10.0 * r.log10());
                s
            })
            .collect();
        let report = brightness_report(&ParsedSeries::new("obs", samples, 0)).unwrap();

        assert_eq!(report.samples.len(), 6);
        assert_eq!(report.trend.trend, crate::trend::Trend::Brightening);
        let activity = report.activity.unwrap();
        assert_relative_eq!(activity.absolute_magnitude, 6.0, epsilon = 1e-9);
        assert_relative_eq!(activity.activity_index, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_brightness_report_without_magnitudes() {
        let series = ParsedSeries::new(
            "obs",
            vec![SeriesSample::at(Epoch::from_jde_tdb(2460960.5))],
            0,
        );
        assert_eq!(
            brightness_report(&series),
            Err(IsotrackError::InsufficientData {
                required: 2,
                got: 0
            })
        );
    }

    #[test]
    fn test_validate_days() {
        assert!(validate_days(1, 90).is_ok());
        assert!(validate_days(90, 90).is_ok());
        assert!(matches!(
            validate_days(91, 90),
            Err(IsotrackError::InvalidRequest(_))
        ));
        assert!(validate_days(0, 400).is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = EngineConfig::default();
        config.cache.velocity_ttl_secs = 5;
        config.trajectory.step_days = 2;
        let settings = ReconcilerSettings::from(&config);
        assert_eq!(settings.velocity_ttl, Duration::from_secs(5));
        assert_eq!(settings.step, Step::days(2));
    }
}
