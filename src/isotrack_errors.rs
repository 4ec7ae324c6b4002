use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsotrackError {
    #[error("Malformed provider response: {0}")]
    Parse(String),

    #[error("Request to {provider} timed out after {after_secs} s")]
    Timeout { provider: String, after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {status} returned by {url}")]
    HttpStatus { status: u16, url: String },

    #[error("All sources failed: {}", .0.join("; "))]
    AllSourcesFailed(Vec<String>),

    #[error("Orbit is not hyperbolic (e = {eccentricity}); only e > 1 is supported")]
    InvalidOrbit { eccentricity: f64 },

    #[error("Insufficient data: {required} points required, {got} given")]
    InsufficientData { required: usize, got: usize },

    #[error("Durable cache store error: {0}")]
    CacheStore(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Time conversion error: {0}")]
    Time(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),
}

impl IsotrackError {
    /// Transient failures worth another attempt: timeouts, transport errors and
    /// server-side (5xx) statuses. Client errors and parse failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            IsotrackError::Timeout { .. } | IsotrackError::Network(_) => true,
            IsotrackError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for IsotrackError {
    fn from(err: rusqlite::Error) -> Self {
        IsotrackError::CacheStore(err.to_string())
    }
}

impl From<hifitime::HifitimeError> for IsotrackError {
    fn from(err: hifitime::HifitimeError) -> Self {
        IsotrackError::Time(err.to_string())
    }
}

impl PartialEq for IsotrackError {
    fn eq(&self, other: &Self) -> bool {
        use IsotrackError::*;
        match (self, other) {
            (Parse(a), Parse(b)) => a == b,
            (
                Timeout {
                    provider: p1,
                    after_secs: s1,
                },
                Timeout {
                    provider: p2,
                    after_secs: s2,
                },
            ) => p1 == p2 && s1 == s2,
            (Network(a), Network(b)) => a == b,
            (
                HttpStatus {
                    status: s1,
                    url: u1,
                },
                HttpStatus {
                    status: s2,
                    url: u2,
                },
            ) => s1 == s2 && u1 == u2,
            (AllSourcesFailed(a), AllSourcesFailed(b)) => a == b,
            (InvalidOrbit { eccentricity: a }, InvalidOrbit { eccentricity: b }) => a == b,
            (
                InsufficientData {
                    required: r1,
                    got: g1,
                },
                InsufficientData {
                    required: r2,
                    got: g2,
                },
            ) => r1 == r2 && g1 == g2,
            (CacheStore(a), CacheStore(b)) => a == b,
            (InvalidRequest(a), InvalidRequest(b)) => a == b,
            (Config(a), Config(b)) => a == b,
            (Time(a), Time(b)) => a == b,

            // not comparable: equal when the variant matches
            (Serialization(_), Serialization(_)) => true,
            (IoError(_), IoError(_)) => true,

            _ => false,
        }
    }
}
