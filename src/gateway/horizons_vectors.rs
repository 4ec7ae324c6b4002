use async_trait::async_trait;
use nalgebra::Vector3;
use std::sync::Arc;

use crate::{
    config::{GatewayConfig, TargetConfig},
    isotrack_errors::IsotrackError,
    time::jd_tdb_to_epoch,
};

use super::{
    finish_series,
    http::HttpFetcher,
    interval::horizons_time_params,
    optional_number, soe_block, ParsedSeries, SeriesSample, SourceAdapter, Step, TimeRange,
};

/// Horizons center code of the Sun (body center).
pub const HELIOCENTRIC_CENTER: &str = "500@10";
/// Horizons center code of the geocenter.
pub const GEOCENTRIC_CENTER: &str = "500@399";

/// State-vector provider: JPL Horizons `VECTORS` table in CSV form.
///
/// Positions are ecliptic J2000 in AU, velocities in AU/day, relative to the
/// configured center.
#[derive(Debug, Clone)]
pub struct HorizonsVectorSource {
    name: String,
    fetcher: Arc<HttpFetcher>,
    url: String,
    command: String,
    center: String,
}

impl HorizonsVectorSource {
    pub fn new(
        name: impl Into<String>,
        fetcher: Arc<HttpFetcher>,
        url: impl Into<String>,
        command: impl Into<String>,
        center: impl Into<String>,
    ) -> Self {
        HorizonsVectorSource {
            name: name.into(),
            fetcher,
            url: url.into(),
            command: command.into(),
            center: center.into(),
        }
    }

    pub fn heliocentric(
        fetcher: Arc<HttpFetcher>,
        gateway: &GatewayConfig,
        target: &TargetConfig,
    ) -> Self {
        Self::new(
            "horizons-vectors-helio",
            fetcher,
            &gateway.horizons_url,
            &target.horizons_command,
            HELIOCENTRIC_CENTER,
        )
    }

    pub fn geocentric(
        fetcher: Arc<HttpFetcher>,
        gateway: &GatewayConfig,
        target: &TargetConfig,
    ) -> Self {
        Self::new(
            "horizons-vectors-geo",
            fetcher,
            &gateway.horizons_url,
            &target.horizons_command,
            GEOCENTRIC_CENTER,
        )
    }

    pub fn center(&self) -> &str {
        &self.center
    }

    /// Query parameters of the Horizons `VECTORS` request.
    pub(crate) fn request_params(&self, range: &TimeRange, step: &Step) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("format".into(), "text".into()),
            ("COMMAND".into(), format!("'{}'", self.command)),
            ("OBJ_DATA".into(), "'NO'".into()),
            ("MAKE_EPHEM".into(), "'YES'".into()),
            ("EPHEM_TYPE".into(), "'VECTORS'".into()),
            ("CENTER".into(), format!("'{}'", self.center)),
            ("REF_PLANE".into(), "'ECLIPTIC'".into()),
            ("REF_SYSTEM".into(), "'ICRF'".into()),
            ("VEC_TABLE".into(), "'2'".into()),
            ("OUT_UNITS".into(), "'AU-D'".into()),
            ("CSV_FORMAT".into(), "'YES'".into()),
            ("VEC_LABELS".into(), "'NO'".into()),
        ];
        params.extend(horizons_time_params(range, step));
        params
    }
}

#[async_trait]
impl SourceAdapter for HorizonsVectorSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, range: &TimeRange, step: &Step) -> Result<ParsedSeries, IsotrackError> {
        let params = self.request_params(range, step);
        let response = self.fetcher.get_text(&self.name, &self.url, &params).await?;
        parse_vectors(&self.name, &response)
    }
}

fn required(record: &csv::StringRecord, idx: usize) -> Result<f64, String> {
    let field = record
        .get(idx)
        .ok_or_else(|| format!("missing column {idx}"))?;
    field
        .parse::<f64>()
        .map_err(|e| format!("column {idx} ({field:?}): {e}"))
}

/// One CSV row: `JDTDB, Calendar Date (TDB), X, Y, Z, VX, VY, VZ,`.
/// The velocity triple is optional (`VEC_TABLE=1` omits it).
fn vector_record(record: &csv::StringRecord) -> Result<SeriesSample, String> {
    let jd = required(record, 0)?;
    let position = Vector3::new(required(record, 2)?, required(record, 3)?, required(record, 4)?);

    let velocity = match (
        record.get(5).and_then(optional_number),
        record.get(6).and_then(optional_number),
        record.get(7).and_then(optional_number),
    ) {
        (Some(vx), Some(vy), Some(vz)) => Some(Vector3::new(vx, vy, vz)),
        _ => None,
    };

    let mut sample = SeriesSample::at(jd_tdb_to_epoch(jd));
    sample.position = Some(position);
    sample.velocity = velocity;
    sample.r_au = Some(position.norm());
    Ok(sample)
}

/// Parse a Horizons `VECTORS` response in CSV form.
///
/// Argument
/// --------
/// * `source`: adapter name, for logs and the resulting series
/// * `response`: the raw Horizons text response
///
/// Return
/// ------
/// * a [`ParsedSeries`] with positions (and velocities when present); malformed rows
///   are skipped and counted
pub fn parse_vectors(source: &str, response: &str) -> Result<ParsedSeries, IsotrackError> {
    let block = soe_block(response)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(block.as_bytes());

    let mut samples = Vec::new();
    let mut skipped = 0;
    for (line, record) in reader.records().enumerate() {
        match record
            .map_err(|e| e.to_string())
            .and_then(|r| vector_record(&r))
        {
            Ok(sample) => samples.push(sample),
            Err(reason) => {
                skipped += 1;
                tracing::warn!(source, line = line + 1, %reason, "skipping malformed vector record");
            }
        }
    }

    finish_series(source, samples, skipped)
}
