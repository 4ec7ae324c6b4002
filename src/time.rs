use hifitime::{
    efmt::{consts::ISO8601_FLEX, Formatter},
    Epoch, TimeScale, Unit,
};

use crate::{constants::SECONDS_PER_DAY, isotrack_errors::IsotrackError};

/// Layouts of the Horizons calendar column, most specific first.
const HORIZONS_CALENDAR_FORMATS: [&str; 4] = [
    "%Y-%b-%d %H:%M:%S.%f",
    "%Y-%b-%d %H:%M:%S",
    "%Y-%b-%d %H:%M",
    "%Y-%b-%d",
];

/// Current instant from the system clock, in UTC.
pub fn now() -> Result<Epoch, IsotrackError> {
    Ok(Epoch::now()?)
}

/// Signed span `later − earlier` in days (negative when `later` precedes `earlier`).
pub fn days_between(later: Epoch, earlier: Epoch) -> f64 {
    (later - earlier).to_unit(Unit::Day)
}

/// Shift an instant by a (possibly fractional, possibly negative) number of days.
pub fn add_days(epoch: Epoch, days: f64) -> Epoch {
    epoch + Unit::Day * days
}

/// Truncate an instant to the start of its UTC hour.
///
/// Used to build cache keys that stay stable for the lifetime of a cache entry.
pub fn floor_to_hour(epoch: Epoch) -> Epoch {
    let (y, m, d, h, _, _, _) = epoch.to_gregorian_utc();
    Epoch::from_gregorian_utc_hms(y, m, d, h, 0, 0)
}

/// Julian date in the TDB scale, as printed by JPL Horizons, to an [`Epoch`].
pub fn jd_tdb_to_epoch(jd: f64) -> Epoch {
    Epoch::from_jde_tdb(jd)
}

/// Time argument for the Horizons `START_TIME`/`STOP_TIME` parameters.
///
/// Argument
/// --------
/// * `epoch`: the instant to encode
///
/// Return
/// ------
/// * a quoted string such as `'JD2460977.5'`
pub fn horizons_time_arg(epoch: Epoch) -> String {
    format!("'JD{:.6}'", epoch.to_jde_tdb_days())
}

/// Integer key (whole seconds) used to pair samples of two series by timestamp.
pub fn pairing_key(epoch: Epoch) -> i64 {
    (epoch.to_jde_utc_days() * SECONDS_PER_DAY).round() as i64
}

/// Format an instant as an ISO-8601 UTC string (`YYYY-MM-DDTHH:MM:SS[.nnnnnnnnn]Z`).
///
/// Sub-seconds are written only when non-zero, at full nanosecond precision.
pub fn epoch_to_iso(epoch: &Epoch) -> String {
    format!(
        "{}Z",
        Formatter::to_time_scale(*epoch, ISO8601_FLEX, TimeScale::UTC)
    )
}

/// Parse an ISO-8601 date or date-time, UTC unless a time scale or offset is given.
///
/// Accepted forms include `2025-10-29`, `2025-10-29T05:03`, `2025-10-29T05:03:46`,
/// `2025-10-29T05:03:46.250Z` and `2025-10-29 05:03:46 UTC`.
pub fn iso_to_epoch(text: &str) -> Result<Epoch, IsotrackError> {
    Epoch::from_gregorian_str(text.trim())
        .map_err(|e| IsotrackError::Time(format!("not an ISO-8601 date: {text} ({e})")))
}

/// Parse a Horizons calendar date such as `2025-Oct-29 05:00` or
/// `A.D. 2025-Oct-29 05:03:46.0000`, interpreted in UTC.
pub fn parse_horizons_calendar(text: &str) -> Result<Epoch, IsotrackError> {
    let trimmed = text.trim();
    let date = trimmed
        .strip_prefix("A.D.")
        .map(str::trim_start)
        .unwrap_or(trimmed);

    HORIZONS_CALENDAR_FORMATS
        .iter()
        .find_map(|format| Epoch::from_format_str(date, format).ok())
        .ok_or_else(|| IsotrackError::Time(format!("not a Horizons calendar date: {text}")))
}

/// Serde adapter writing an [`Epoch`] as an ISO-8601 UTC string.
pub mod epoch_iso {
    use hifitime::Epoch;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(epoch: &Epoch, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::epoch_to_iso(epoch))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Epoch, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::iso_to_epoch(&text).map_err(serde::de::Error::custom)
    }
}

/// Same as [`epoch_iso`] for optional instants (`null` when absent).
pub mod epoch_iso_option {
    use hifitime::Epoch;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        epoch: &Option<Epoch>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match epoch {
            Some(epoch) => serializer.serialize_some(&super::epoch_to_iso(epoch)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Epoch>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| super::iso_to_epoch(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
