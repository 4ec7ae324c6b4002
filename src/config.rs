//! Engine configuration
//!
//! Every section has defaults, so an empty TOML document is a valid configuration.
//! [`EngineConfig::load`] reads the file named by `ISOTRACK_CONFIG` when set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{isotrack_errors::IsotrackError, orbit_model::CurrentPointMode};

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "ISOTRACK_CONFIG";

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Tracked object designations
    pub target: TargetConfig,
    /// Upstream provider access
    pub gateway: GatewayConfig,
    /// Cache & health tier
    pub cache: CacheConfig,
    /// Trajectory sampling
    pub trajectory: TrajectoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Horizons `COMMAND` value
    pub horizons_command: String,
    /// SBDB search string
    pub sbdb_designation: String,
    /// Try to refresh the predicted elements from SBDB at startup
    pub refresh_elements_at_startup: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            horizons_command: "C/2025 N1".into(),
            sbdb_designation: "3I".into(),
            refresh_elements_at_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub horizons_url: String,
    pub sbdb_url: String,
    /// Requests admitted per rate-limit window
    pub requests_per_window: usize,
    pub window_secs: u64,
    /// Per-attempt timeout
    pub timeout_secs: u64,
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n × backoff_step_ms`
    pub backoff_step_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            horizons_url: "https://ssd.jpl.nasa.gov/api/horizons.api".into(),
            sbdb_url: "https://ssd-api.jpl.nasa.gov/sbdb.api".into(),
            requests_per_window: 10,
            window_secs: 60,
            timeout_secs: 30,
            max_attempts: 3,
            backoff_step_ms: 5_000,
        }
    }
}

impl GatewayConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file of the durable tier; memory-only when absent
    pub database_path: Option<PathBuf>,
    pub trajectory_ttl_secs: u64,
    pub velocity_ttl_secs: u64,
    pub brightness_ttl_secs: u64,
    /// Bound of the in-memory level
    pub memory_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            trajectory_ttl_secs: 3_600,
            velocity_ttl_secs: 3_600,
            brightness_ttl_secs: 6 * 3_600,
            memory_max_entries: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Cadence of predicted and fetched trails
    pub step_days: u32,
    /// `nearest` sample or `interpolated` position for "now"
    pub current_point: CurrentPointMode,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            step_days: 1,
            current_point: CurrentPointMode::Nearest,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, IsotrackError> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| IsotrackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, IsotrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Configuration from `$ISOTRACK_CONFIG`, or defaults when the variable is unset.
    pub fn load() -> Result<Self, IsotrackError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::from_toml_file(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), IsotrackError> {
        if self.gateway.max_attempts == 0 {
            return Err(IsotrackError::Config(
                "gateway.max_attempts must be at least 1".into(),
            ));
        }
        if self.gateway.requests_per_window == 0 {
            return Err(IsotrackError::Config(
                "gateway.requests_per_window must be at least 1".into(),
            ));
        }
        if self.trajectory.step_days == 0 {
            return Err(IsotrackError::Config(
                "trajectory.step_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
