use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    config::{GatewayConfig, TargetConfig},
    isotrack_errors::IsotrackError,
    time::parse_horizons_calendar,
};

use super::{
    finish_series,
    horizons_vectors::GEOCENTRIC_CENTER,
    http::HttpFetcher,
    interval::horizons_time_params,
    optional_number, soe_block, ParsedSeries, SeriesSample, SourceAdapter, Step, TimeRange,
};

/// Observer-table provider: JPL Horizons `OBSERVER` ephemeris seen from the geocenter.
///
/// Requested quantities: astrometric RA/Dec (1), magnitudes (9), heliocentric
/// range (19) and observer range (20). Columns are located by their header
/// labels, so the table layout may change order without breaking the parser.
#[derive(Debug, Clone)]
pub struct HorizonsObserverSource {
    name: String,
    fetcher: Arc<HttpFetcher>,
    url: String,
    command: String,
}

impl HorizonsObserverSource {
    pub fn new(
        fetcher: Arc<HttpFetcher>,
        gateway: &GatewayConfig,
        target: &TargetConfig,
    ) -> Self {
        HorizonsObserverSource {
            name: "horizons-observer".into(),
            fetcher,
            url: gateway.horizons_url.clone(),
            command: target.horizons_command.clone(),
        }
    }

    pub(crate) fn request_params(&self, range: &TimeRange, step: &Step) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("format".into(), "text".into()),
            ("COMMAND".into(), format!("'{}'", self.command)),
            ("OBJ_DATA".into(), "'NO'".into()),
            ("MAKE_EPHEM".into(), "'YES'".into()),
            ("EPHEM_TYPE".into(), "'OBSERVER'".into()),
            ("CENTER".into(), format!("'{GEOCENTRIC_CENTER}'")),
            ("QUANTITIES".into(), "'1,9,19,20'".into()),
            ("ANG_FORMAT".into(), "'DEG'".into()),
            ("CSV_FORMAT".into(), "'YES'".into()),
        ];
        params.extend(horizons_time_params(range, step));
        params
    }
}

#[async_trait]
impl SourceAdapter for HorizonsObserverSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, range: &TimeRange, step: &Step) -> Result<ParsedSeries, IsotrackError> {
        let params = self.request_params(range, step);
        let response = self.fetcher.get_text(&self.name, &self.url, &params).await?;
        parse_observer_table(&self.name, &response)
    }
}

fn column(labels: &[&str], pred: impl Fn(&str) -> bool) -> Option<usize> {
    labels.iter().position(|l| pred(*l))
}

/// Positions of the observer-table columns this crate reads.
#[derive(Debug, Clone, PartialEq)]
struct ObserverColumns {
    date: usize,
    ra: Option<usize>,
    dec: Option<usize>,
    magnitude: Option<usize>,
    r: Option<usize>,
    delta: Option<usize>,
}

impl ObserverColumns {
    /// Locate the columns from the CSV header line printed just above `$$SOE`.
    fn from_response(response: &str) -> Result<Self, IsotrackError> {
        let head = response.split("$$SOE").next().unwrap_or_default();
        let header = head
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.chars().all(|c| c == '*'))
            .ok_or_else(|| IsotrackError::Parse("observer table has no header line".into()))?;

        let labels: Vec<&str> = header.split(',').map(str::trim).collect();

        let date = column(&labels, |l| l.starts_with("Date"))
            .ok_or_else(|| IsotrackError::Parse(format!("no date column in header: {header}")))?;

        Ok(ObserverColumns {
            date,
            ra: column(&labels, |l| l.starts_with("R.A.")),
            dec: column(&labels, |l| l.starts_with("DEC")),
            // comets report total magnitude, asteroids apparent magnitude
            magnitude: column(&labels, |l| l == "T-mag").or_else(|| column(&labels, |l| l == "APmag")),
            r: column(&labels, |l| l == "r"),
            delta: column(&labels, |l| l == "delta"),
        })
    }

    fn read(&self, record: &csv::StringRecord) -> Result<SeriesSample, String> {
        let date = record
            .get(self.date)
            .ok_or_else(|| "missing date column".to_string())?;
        let instant = parse_horizons_calendar(date).map_err(|e| e.to_string())?;

        let number = |idx: Option<usize>| idx.and_then(|i| record.get(i)).and_then(optional_number);

        let mut sample = SeriesSample::at(instant);
        sample.ra_deg = number(self.ra);
        sample.dec_deg = number(self.dec);
        sample.magnitude = number(self.magnitude);
        sample.r_au = number(self.r);
        sample.delta_au = number(self.delta);
        Ok(sample)
    }
}

/// Parse a Horizons `OBSERVER` table (CSV, angles in degrees).
///
/// Rows with an unreadable date are skipped; any other field that is blank or
/// `n.a.` is left empty in the resulting sample.
pub fn parse_observer_table(source: &str, response: &str) -> Result<ParsedSeries, IsotrackError> {
    let block = soe_block(response)?;
    let columns = ObserverColumns::from_response(response)?;

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
            .and_then(|r| columns.read(&r))
        {
            Ok(sample) => samples.push(sample),
            Err(reason) => {
                skipped += 1;
                tracing::warn!(source, line = line + 1, %reason, "skipping malformed observer record");
            }
        }
    }

    finish_series(source, samples, skipped)
}

#[cfg(test)]
mod horizons_observer_test {
    use super::*;
    use approx::assert_relative_eq;
    use hifitime::Epoch;

    const GOLDEN: &str = include_str!("../../tests/data/horizons_observer.txt");

    #[test]
    fn test_columns_from_header() {
        let columns = ObserverColumns::from_response(GOLDEN).unwrap();
        assert_eq!(
            columns,
            ObserverColumns {
                date: 0,
                ra: Some(3),
                dec: Some(4),
                magnitude: Some(5),
                r: Some(7),
                delta: Some(9),
            }
        );
    }

    #[test]
    fn test_parse_golden_observer_table() {
        let series = parse_observer_table("horizons-observer", GOLDEN).unwrap();
        assert_eq!(series.samples.len(), 6);
        assert_eq!(series.skipped_lines, 0);

        let first = &series.samples[0];
        assert_eq!(
            first.instant,
            Epoch::from_gregorian_utc_hms(2025, 10, 19, 0, 0, 0)
        );
        assert_relative_eq!(first.ra_deg.unwrap(), 208.44523);
        assert_relative_eq!(first.dec_deg.unwrap(), -8.81438);
        assert_relative_eq!(first.magnitude.unwrap(), 9.459);
        assert_relative_eq!(first.r_au.unwrap(), 1.424877878519);
        assert_relative_eq!(first.delta_au.unwrap(), 2.422151727699);
        assert!(first.position.is_none());

        // n.a. magnitude keeps the row
        assert!(series.samples[3].magnitude.is_none());
        assert!(series.samples[3].ra_deg.is_some());
    }

    #[test]
    fn test_apparent_magnitude_column() {
        let response = "
 Date__(UT)__HR:MN, , , R.A._(ICRF), DEC_(ICRF), APmag, S-brt, r, rdot, delta, deldot,
$$SOE
 2025-Nov-01 00:00, , , 210.0, -10.0, 11.5, 5.0, 1.4, -1.0, 2.5, 1.0,
 2025-Nov-02 00:00, , , 210.5, -10.5, 11.4, 5.0, 1.41, -1.0, 2.49, 1.0,
 garbage line
$$EOE
";
        let series = parse_observer_table("obs", response).unwrap();
        assert_eq!(series.samples.len(), 2);
        assert_eq!(series.skipped_lines, 1);
        assert_relative_eq!(series.samples[1].magnitude.unwrap(), 11.4);
        assert_relative_eq!(series.samples[1].delta_au.unwrap(), 2.49);
    }

    #[test]
    fn test_missing_date_column() {
        let response = "R.A., DEC\n$$SOE\n1.0, 2.0\n$$EOE\n";
        assert!(matches!(
            parse_observer_table("obs", response),
            Err(IsotrackError::Parse(_))
        ));
    }
}
