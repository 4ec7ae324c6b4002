//! # Source gateway
//!
//! One adapter per upstream provider. Every adapter performs its network call
//! through the shared [`http::HttpFetcher`] (rate limit, timeout, retry) and turns
//! the provider-specific text or JSON into the common [`ParsedSeries`].
//!
//! ## Adapters
//!
//! | adapter                                         | provider                 | yields                      |
//! |-------------------------------------------------|--------------------------|-----------------------------|
//! | [`horizons_vectors::HorizonsVectorSource`]      | JPL Horizons `VECTORS`   | position + velocity         |
//! | [`horizons_observer::HorizonsObserverSource`]   | JPL Horizons `OBSERVER`  | RA/Dec, r, Δ, magnitude     |
//! | [`sbdb_elements::SbdbElementsSource`]           | JPL SBDB (JSON)          | element set + propagated positions |
//!
//! ## Parsing policy
//!
//! Providers are unversioned and best-effort. Parsers are pure functions over the
//! response text: a record that fails to parse is skipped and logged, and only a
//! response with no usable record at all is a [`IsotrackError::Parse`] failure.

pub mod horizons_observer;
pub mod horizons_vectors;
pub mod http;
pub mod interval;
pub mod rate_limiter;
pub mod sbdb_elements;

use async_trait::async_trait;
use hifitime::Epoch;
use itertools::Itertools;
use nalgebra::Vector3;
use regex::Regex;
use std::sync::LazyLock;

use crate::{
    constants::{AstronomicalUnit, Degree},
    isotrack_errors::IsotrackError,
    orbit_model::{TrajectoryPoint, Trail},
    orbital_elements::OrbitalElements,
};

pub use interval::{Step, StepUnit, TimeRange};

static SOE_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\$\$SOE[^\n]*\n(.*?)\$\$EOE").expect("SOE regex is valid")
});

/// One record of a provider series. Every field but the instant is optional:
/// each provider fills what it exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSample {
    pub instant: Epoch,
    /// Heliocentric (or provider-centered) position, AU.
    pub position: Option<Vector3<f64>>,
    /// Velocity, AU/day.
    pub velocity: Option<Vector3<f64>>,
    pub ra_deg: Option<Degree>,
    pub dec_deg: Option<Degree>,
    /// Observer-to-target distance Δ, AU.
    pub delta_au: Option<AstronomicalUnit>,
    /// Sun-to-target distance r, AU.
    pub r_au: Option<AstronomicalUnit>,
    /// Total (comet) or apparent magnitude.
    pub magnitude: Option<f64>,
}

impl SeriesSample {
    pub fn at(instant: Epoch) -> Self {
        SeriesSample {
            instant,
            position: None,
            velocity: None,
            ra_deg: None,
            dec_deg: None,
            delta_au: None,
            r_au: None,
            magnitude: None,
        }
    }
}

/// Common intermediate representation of a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSeries {
    /// Adapter that produced the series.
    pub source: String,
    /// Records in provider order (ascending time).
    pub samples: Vec<SeriesSample>,
    /// Records dropped because they could not be parsed.
    pub skipped_lines: usize,
    /// Element set behind the series, for element-based providers.
    pub elements: Option<OrbitalElements>,
}

impl ParsedSeries {
    pub fn new(source: impl Into<String>, samples: Vec<SeriesSample>, skipped_lines: usize) -> Self {
        ParsedSeries {
            source: source.into(),
            samples,
            skipped_lines,
            elements: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Positions of the series as a trail; samples without a position are ignored.
    pub fn to_trail(&self) -> Trail {
        self.samples
            .iter()
            .filter_map(|s| s.position.map(|p| TrajectoryPoint::new(s.instant, p)))
            .collect()
    }
}

/// A provider of time series for a time range.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable name, used as the health-ledger key.
    fn name(&self) -> &str;

    async fn fetch(&self, range: &TimeRange, step: &Step) -> Result<ParsedSeries, IsotrackError>;
}

/// Extract the data block between the Horizons `$$SOE` / `$$EOE` markers.
///
/// Errors
/// ----------
/// * [`IsotrackError::Parse`] carrying the first lines of the response when the
///   markers are missing (Horizons reports errors as plain text).
pub(crate) fn soe_block(response: &str) -> Result<&str, IsotrackError> {
    SOE_BLOCK_REGEX
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            let excerpt = response
                .lines()
                .filter(|l| !l.trim().is_empty())
                .take(3)
                .join(" | ");
            IsotrackError::Parse(format!("no $$SOE/$$EOE block in response: {excerpt}"))
        })
}

/// Parse an optional numeric field; blanks and `n.a.` mean absent.
pub(crate) fn optional_number(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("n.a.") {
        return None;
    }
    field.parse().ok()
}

/// Turn the outcome of a line-by-line parse into a series, failing only when
/// nothing was usable.
pub(crate) fn finish_series(
    source: &str,
    samples: Vec<SeriesSample>,
    skipped: usize,
) -> Result<ParsedSeries, IsotrackError> {
    if samples.is_empty() && skipped > 0 {
        return Err(IsotrackError::Parse(format!(
            "{source}: none of the {skipped} records could be parsed"
        )));
    }
    if skipped > 0 {
        tracing::warn!(
            source,
            skipped,
            kept = samples.len(),
            "skipped malformed provider records"
        );
    }
    Ok(ParsedSeries::new(source, samples, skipped))
}
