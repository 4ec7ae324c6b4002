use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::{GatewayConfig, TargetConfig},
    isotrack_errors::IsotrackError,
    orbit_model::{trajectory_between, velocity_at},
    orbital_elements::OrbitalElements,
    time::jd_tdb_to_epoch,
};

use super::{http::HttpFetcher, ParsedSeries, SeriesSample, SourceAdapter, Step, TimeRange};

#[derive(Debug, Deserialize)]
struct SbdbResponse {
    object: Option<SbdbObject>,
    orbit: Option<SbdbOrbit>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SbdbObject {
    fullname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SbdbOrbit {
    epoch: Option<Value>,
    n_obs_used: Option<Value>,
    data_arc: Option<Value>,
    #[serde(default)]
    elements: Vec<SbdbElement>,
}

#[derive(Debug, Deserialize)]
struct SbdbElement {
    name: String,
    value: Option<Value>,
}

/// SBDB prints numbers either as JSON numbers or as strings (`"-.26395"`).
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl SbdbOrbit {
    fn element(&self, name: &str) -> Result<f64, IsotrackError> {
        self.elements
            .iter()
            .find(|el| el.name == name)
            .and_then(|el| el.value.as_ref())
            .and_then(value_as_f64)
            .ok_or_else(|| IsotrackError::Parse(format!("SBDB orbit has no usable '{name}' element")))
    }
}

/// Build an [`OrbitalElements`] from an SBDB API JSON body.
///
/// Reads `e`, `q`, `i`, `om`, `w` and the perihelion time `tp` (JD TDB). The
/// solution epoch falls back to `tp` when absent.
///
/// Errors
/// ----------
/// * [`IsotrackError::Serialization`] for a body that is not SBDB JSON.
/// * [`IsotrackError::Parse`] when SBDB reports an error or a required element is missing.
pub fn parse_sbdb_elements(body: &str) -> Result<OrbitalElements, IsotrackError> {
    let response: SbdbResponse = serde_json::from_str(body)?;

    let orbit = match (response.orbit, response.message) {
        (Some(orbit), _) => orbit,
        (None, Some(message)) => {
            return Err(IsotrackError::Parse(format!("SBDB: {message}")));
        }
        (None, None) => return Err(IsotrackError::Parse("SBDB response has no orbit".into())),
    };

    let perihelion_time = jd_tdb_to_epoch(orbit.element("tp")?);
    let epoch = orbit
        .epoch
        .as_ref()
        .and_then(value_as_f64)
        .map(jd_tdb_to_epoch)
        .unwrap_or(perihelion_time);

    let source = match response.object.and_then(|o| o.fullname) {
        Some(fullname) => format!("sbdb:{}", fullname.trim()),
        None => "sbdb".to_string(),
    };

    Ok(OrbitalElements {
        eccentricity: orbit.element("e")?,
        perihelion_distance: orbit.element("q")?,
        inclination: orbit.element("i")?,
        argument_of_perihelion: orbit.element("w")?,
        longitude_of_ascending_node: orbit.element("om")?,
        perihelion_time,
        epoch,
        source,
        observation_count: orbit
            .n_obs_used
            .as_ref()
            .and_then(value_as_f64)
            .map(|n| n as u32),
        observation_arc: orbit
            .data_arc
            .as_ref()
            .and_then(value_as_f64)
            .map(|days| format!("{days} days")),
    })
}

/// Element-set provider: the JPL Small-Body Database orbit solution, propagated
/// with the two-body model over the requested range.
#[derive(Debug, Clone)]
pub struct SbdbElementsSource {
    name: String,
    fetcher: Arc<HttpFetcher>,
    url: String,
    designation: String,
}

impl SbdbElementsSource {
    pub fn new(fetcher: Arc<HttpFetcher>, gateway: &GatewayConfig, target: &TargetConfig) -> Self {
        SbdbElementsSource {
            name: "sbdb-elements".into(),
            fetcher,
            url: gateway.sbdb_url.clone(),
            designation: target.sbdb_designation.clone(),
        }
    }

    /// Latest orbit solution of the configured designation.
    pub async fn fetch_elements(&self) -> Result<OrbitalElements, IsotrackError> {
        let query = [
            ("sstr".to_string(), self.designation.clone()),
            ("full-prec".to_string(), "true".to_string()),
        ];
        let body = self.fetcher.get_text(&self.name, &self.url, &query).await?;
        let elements = parse_sbdb_elements(&body)?;
        tracing::info!(
            source = %elements.source,
            e = elements.eccentricity,
            q = elements.perihelion_distance,
            "fetched SBDB orbit solution"
        );
        Ok(elements)
    }
}

#[async_trait]
impl SourceAdapter for SbdbElementsSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, range: &TimeRange, step: &Step) -> Result<ParsedSeries, IsotrackError> {
        let elements = self.fetch_elements().await?;
        let trail = trajectory_between(&elements, range.start, range.end, step.in_days())?;

        let samples = trail
            .iter()
            .map(|point| {
                let mut sample = SeriesSample::at(point.instant);
                sample.position = Some(point.position());
                sample.velocity = velocity_at(&elements, point.instant).ok();
                sample.r_au = Some(point.distance_from_sun);
                sample
            })
            .collect();

        let mut series = ParsedSeries::new(&self.name, samples, 0);
        series.elements = Some(elements);
        Ok(series)
    }
}
