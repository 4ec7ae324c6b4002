use hifitime::Epoch;
use std::fmt;

use crate::{
    isotrack_errors::IsotrackError,
    time::{add_days, days_between, epoch_to_iso, horizons_time_arg},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUnit {
    Days,
    Hours,
    Minutes,
}

/// Sampling cadence of a provider request, rendered the way Horizons expects
/// (`1d`, `6h`, `30m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    value: u32,
    unit: StepUnit,
}

impl Step {
    pub fn new(value: u32, unit: StepUnit) -> Self {
        Step {
            value: value.max(1),
            unit,
        }
    }

    pub fn days(value: u32) -> Self {
        Step::new(value, StepUnit::Days)
    }

    pub fn hours(value: u32) -> Self {
        Step::new(value, StepUnit::Hours)
    }

    /// Step length in days.
    pub fn in_days(&self) -> f64 {
        let value = self.value as f64;
        match self.unit {
            StepUnit::Days => value,
            StepUnit::Hours => value / 24.0,
            StepUnit::Minutes => value / 1440.0,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            StepUnit::Days => write!(f, "{}d", self.value),
            StepUnit::Hours => write!(f, "{}h", self.value),
            StepUnit::Minutes => write!(f, "{}m", self.value),
        }
    }
}

/// Closed time interval `[start, end]` requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: Epoch,
    pub end: Epoch,
}

impl TimeRange {
    pub fn new(start: Epoch, end: Epoch) -> Result<Self, IsotrackError> {
        if end < start {
            return Err(IsotrackError::InvalidRequest(format!(
                "time range end {} precedes start {}",
                epoch_to_iso(&end),
                epoch_to_iso(&start)
            )));
        }
        Ok(TimeRange { start, end })
    }

    /// `[center − days, center + days]`.
    pub fn around(center: Epoch, days: f64) -> Self {
        let half = days.abs();
        TimeRange {
            start: add_days(center, -half),
            end: add_days(center, half),
        }
    }

    /// `[end − days, end]`.
    pub fn trailing(end: Epoch, days: f64) -> Self {
        TimeRange {
            start: add_days(end, -days.abs()),
            end,
        }
    }

    pub fn span_days(&self) -> f64 {
        days_between(self.end, self.start)
    }

    /// Normalized textual form used in cache keys.
    pub fn cache_params(&self, step: &Step) -> String {
        format!(
            "start={}&stop={}&step={}",
            epoch_to_iso(&self.start),
            epoch_to_iso(&self.end),
            step
        )
    }
}

/// Time window parameters shared by every Horizons request.
pub(crate) fn horizons_time_params(range: &TimeRange, step: &Step) -> [(String, String); 3] {
    [
        ("START_TIME".into(), horizons_time_arg(range.start)),
        ("STOP_TIME".into(), horizons_time_arg(range.end)),
        ("STEP_SIZE".into(), format!("'{step}'")),
    ]
}
