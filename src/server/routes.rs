//! API routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    isotrack_errors::IsotrackError,
    orbital_elements::OrbitalElements,
    reconcile::{BrightnessReport, HealthReport, TrajectoryReport, VelocitySample},
    server::state::AppState,
};

/// Window used when a request does not name one.
pub const DEFAULT_DAYS: u32 = 30;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/trajectory", get(trajectory))
        .route("/velocity", get(velocity))
        .route("/brightness", get(brightness))
        .route("/elements", get(elements))
        .route("/health", get(health))
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_DAYS)
    }
}

/// GET /api/trajectory?days=N - predicted and fetched trails, N in [1, 400]
async fn trajectory(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<TrajectoryReport>, IsotrackError> {
    let report = state
        .reconciler()
        .dual_trajectory(state.elements(), query.days())
        .await?;
    Ok(Json(report))
}

/// GET /api/velocity?days=N - velocity profile, N in [1, 90]
async fn velocity(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Vec<VelocitySample>>, IsotrackError> {
    let samples = state.reconciler().velocity_profile(query.days()).await?;
    Ok(Json(samples))
}

/// GET /api/brightness?days=N - magnitude trend over the last N days
async fn brightness(
    State(state): State<AppState>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<BrightnessReport>, IsotrackError> {
    let report = state.reconciler().brightness_trend(query.days()).await?;
    Ok(Json(report))
}

/// GET /api/elements - element set behind the prediction
async fn elements(State(state): State<AppState>) -> Json<OrbitalElements> {
    Json(state.elements().clone())
}

/// GET /api/health - per-source health and overall status
async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.reconciler().health_report())
}

impl IntoResponse for IsotrackError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            IsotrackError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            IsotrackError::InsufficientData { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_data")
            }
            IsotrackError::AllSourcesFailed(_) => (StatusCode::BAD_GATEWAY, "all_sources_failed"),
            IsotrackError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            IsotrackError::Network(_) | IsotrackError::HttpStatus { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            IsotrackError::Parse(_) => (StatusCode::BAD_GATEWAY, "upstream_parse_error"),
            IsotrackError::InvalidOrbit { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_orbit")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod routes_test {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                IsotrackError::InvalidRequest("days".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                IsotrackError::InsufficientData {
                    required: 2,
                    got: 0,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                IsotrackError::AllSourcesFailed(vec!["a".into()]),
                StatusCode::BAD_GATEWAY,
            ),
            (
                IsotrackError::Timeout {
                    provider: "horizons".into(),
                    after_secs: 30,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                IsotrackError::Config("bad".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_default_days() {
        assert_eq!(DaysQuery { days: None }.days(), 30);
        assert_eq!(DaysQuery { days: Some(7) }.days(), 7);
    }
}
