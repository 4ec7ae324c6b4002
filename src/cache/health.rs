use hifitime::Epoch;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::time::epoch_iso_option;

/// Ledger name of the durable cache level.
pub const STORE_TIER: &str = "cache-store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Healthy,
    /// Answered, but with an empty or partially unparseable series.
    Degraded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealthRecord {
    pub source_name: String,
    pub status: SourceStatus,
    #[serde(with = "epoch_iso_option")]
    pub last_success: Option<Epoch>,
    #[serde(with = "epoch_iso_option")]
    pub last_failure: Option<Epoch>,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub last_response_time_ms: Option<u64>,
}

impl SourceHealthRecord {
    fn new(source_name: &str) -> Self {
        SourceHealthRecord {
            source_name: source_name.to_string(),
            status: SourceStatus::Healthy,
            last_success: None,
            last_failure: None,
            failure_count: 0,
            last_error: None,
            last_response_time_ms: None,
        }
    }

    fn is_down(&self) -> bool {
        self.status != SourceStatus::Healthy
    }
}

/// Per-source outcome ledger.
///
/// Only the cache tier mutates it; everything else reads [`HealthLedger::snapshot`].
#[derive(Debug, Default)]
pub struct HealthLedger {
    records: Mutex<BTreeMap<String, SourceHealthRecord>>,
}

impl HealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source in the `healthy` state if it is not tracked yet.
    pub fn register(&self, source: &str) {
        self.records
            .lock()
            .entry(source.to_string())
            .or_insert_with(|| SourceHealthRecord::new(source));
    }

    /// Record the outcome of one call to `source`.
    ///
    /// Success resets the failure count and sets `healthy`; failure increments it
    /// and sets `failed`.
    pub fn record_outcome(
        &self,
        source: &str,
        success: bool,
        error: Option<&str>,
        latency_ms: u64,
    ) {
        let now = Epoch::now().ok();
        let mut records = self.records.lock();
        let record = records
            .entry(source.to_string())
            .or_insert_with(|| SourceHealthRecord::new(source));

        record.last_response_time_ms = Some(latency_ms);
        if success {
            record.status = SourceStatus::Healthy;
            record.failure_count = 0;
            record.last_success = now;
        } else {
            record.status = SourceStatus::Failed;
            record.failure_count += 1;
            record.last_failure = now;
            record.last_error = error.map(str::to_string);
        }
    }

    /// Downgrade a source that answered with a degraded series.
    pub fn mark_degraded(&self, source: &str, reason: &str) {
        let mut records = self.records.lock();
        let record = records
            .entry(source.to_string())
            .or_insert_with(|| SourceHealthRecord::new(source));
        if record.status == SourceStatus::Healthy {
            record.status = SourceStatus::Degraded;
        }
        record.last_error = Some(reason.to_string());
    }

    /// Record the outcome of a durable-store operation.
    pub fn record_store_outcome(&self, success: bool, error: Option<&str>) {
        self.record_outcome(STORE_TIER, success, error, 0);
    }

    pub fn record(&self, source: &str) -> Option<SourceHealthRecord> {
        self.records.lock().get(source).cloned()
    }

    /// Every record, ordered by source name.
    pub fn snapshot(&self) -> Vec<SourceHealthRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// `unhealthy` when every tracked tier is down, `degraded` when at least one
    /// is, `healthy` otherwise (including when nothing is tracked).
    pub fn overall_status(&self) -> OverallStatus {
        let records = self.records.lock();
        let down = records.values().filter(|r| r.is_down()).count();
        match down {
            0 => OverallStatus::Healthy,
            n if n == records.len() => OverallStatus::Unhealthy,
            _ => OverallStatus::Degraded,
        }
    }
}
