#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use async_trait::async_trait;
use hifitime::Epoch;
use isotrack::{
    cache::CacheTier,
    gateway::{ParsedSeries, SeriesSample, SourceAdapter, Step, TimeRange},
    isotrack_errors::IsotrackError,
    orbit_model::{trajectory_between, velocity_at, TrajectoryPoint},
    orbital_elements::OrbitalElements,
    reconcile::{Reconciler, ReconcilerSettings, ReconcilerSources},
    time::pairing_key,
};

pub const HELIO_VECTORS: &str = include_str!("../data/horizons_vectors_helio.txt");
pub const GEO_VECTORS: &str = include_str!("../data/horizons_vectors_geo.txt");
pub const OBSERVER_TABLE: &str = include_str!("../data/horizons_observer.txt");
pub const SBDB_3I: &str = include_str!("../data/sbdb_3i.json");

/// Same instant (to the second) and same position within `epsilon` AU.
pub fn assert_point_close(actual: &TrajectoryPoint, expected: &TrajectoryPoint, epsilon: f64) {
    assert_eq!(pairing_key(actual.instant), pairing_key(expected.instant));
    assert_relative_eq!(actual.x, expected.x, epsilon = epsilon);
    assert_relative_eq!(actual.y, expected.y, epsilon = epsilon);
    assert_relative_eq!(actual.z, expected.z, epsilon = epsilon);
}

/// Start of an hour, so windows built from it line up with the reconciler's.
pub fn on_the_hour(year: i32, month: u8, day: u8, hour: u8) -> Epoch {
    Epoch::from_gregorian_utc_hms(year, month, day, hour, 0, 0)
}

/// Answers every request with the same series and counts the calls.
pub struct StaticSource {
    name: String,
    series: ParsedSeries,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(name: &str, series: ParsedSeries) -> Arc<Self> {
        Arc::new(StaticSource {
            name: name.into(),
            series,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty(name: &str) -> Arc<Self> {
        Self::new(name, ParsedSeries::new(name, Vec::new(), 0))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _range: &TimeRange, _step: &Step) -> Result<ParsedSeries, IsotrackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.series.clone())
    }
}

/// Fails every request with a network error.
pub struct FailingSource {
    name: String,
    calls: AtomicUsize,
}

impl FailingSource {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(FailingSource {
            name: name.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _range: &TimeRange, _step: &Step) -> Result<ParsedSeries, IsotrackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(IsotrackError::Network(format!("{} unreachable", self.name)))
    }
}

/// Propagates `elements` over the requested range, positions and velocities.
pub struct ModelSource {
    name: String,
    elements: OrbitalElements,
}

impl ModelSource {
    pub fn new(name: &str, elements: OrbitalElements) -> Arc<Self> {
        Arc::new(ModelSource {
            name: name.into(),
            elements,
        })
    }
}

#[async_trait]
impl SourceAdapter for ModelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, range: &TimeRange, step: &Step) -> Result<ParsedSeries, IsotrackError> {
        model_series(&self.name, &self.elements, range, step)
    }
}

pub fn model_series(
    name: &str,
    elements: &OrbitalElements,
    range: &TimeRange,
    step: &Step,
) -> Result<ParsedSeries, IsotrackError> {
    let trail = trajectory_between(elements, range.start, range.end, step.in_days())?;
    let samples = trail
        .iter()
        .map(|point| {
            let mut sample = SeriesSample::at(point.instant);
            sample.position = Some(point.position());
            sample.velocity = Some(velocity_at(elements, point.instant)?);
            sample.r_au = Some(point.distance_from_sun);
            Ok(sample)
        })
        .collect::<Result<Vec<_>, IsotrackError>>()?;
    Ok(ParsedSeries::new(name, samples, 0))
}

pub fn reconciler(
    primary: Arc<dyn SourceAdapter>,
    fallback: Arc<dyn SourceAdapter>,
    geocentric: Arc<dyn SourceAdapter>,
    observer: Arc<dyn SourceAdapter>,
) -> Reconciler {
    Reconciler::new(
        ReconcilerSources {
            primary,
            fallback,
            geocentric,
            observer,
        },
        Arc::new(CacheTier::memory_only()),
        ReconcilerSettings::default(),
    )
}
