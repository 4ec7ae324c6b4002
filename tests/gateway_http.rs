use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use isotrack::{
    cache::CacheTier,
    config::EngineConfig,
    gateway::{
        http::{HttpFetcher, RetryPolicy},
        rate_limiter::RateLimiter,
        sbdb_elements::SbdbElementsSource,
        SourceAdapter, Step, TimeRange,
    },
    isotrack_errors::IsotrackError,
    reconcile::{Reconciler, ReconcilerSettings, ReconcilerSources},
};

mod common;
use common::{on_the_hour, GEO_VECTORS, HELIO_VECTORS, SBDB_3I};

#[derive(Clone, Default)]
struct Upstream {
    flaky_calls: Arc<AtomicUsize>,
    missing_calls: Arc<AtomicUsize>,
    horizons_calls: Arc<AtomicUsize>,
}

async fn flaky(State(upstream): State<Upstream>) -> Result<&'static str, StatusCode> {
    // two server errors, then the payload
    if upstream.flaky_calls.fetch_add(1, Ordering::SeqCst) < 2 {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(HELIO_VECTORS)
}

async fn missing(State(upstream): State<Upstream>) -> StatusCode {
    upstream.missing_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    HELIO_VECTORS
}

async fn horizons(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<&'static str, StatusCode> {
    upstream.horizons_calls.fetch_add(1, Ordering::SeqCst);
    match params.get("CENTER").map(String::as_str) {
        Some("'500@10'") => Ok(HELIO_VECTORS),
        Some("'500@399'") => Ok(GEO_VECTORS),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

async fn sbdb(Query(params): Query<HashMap<String, String>>) -> Result<&'static str, StatusCode> {
    match params.get("sstr").map(String::as_str) {
        Some("3I") => Ok(SBDB_3I),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn spawn_upstream() -> (SocketAddr, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/flaky", get(flaky))
        .route("/missing", get(missing))
        .route("/slow", get(slow))
        .route("/horizons.api", get(horizons))
        .route("/sbdb.api", get(sbdb))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, upstream)
}

fn fetcher(max_attempts: u32, timeout: Duration) -> Arc<HttpFetcher> {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)));
    let policy = RetryPolicy {
        max_attempts,
        backoff_step: Duration::from_millis(10),
        timeout,
    };
    Arc::new(HttpFetcher::new(limiter, policy).unwrap())
}

fn local_config(addr: SocketAddr) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.gateway.horizons_url = format!("http://{addr}/horizons.api");
    config.gateway.sbdb_url = format!("http://{addr}/sbdb.api");
    config
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (addr, upstream) = spawn_upstream().await;
    let fetcher = fetcher(3, Duration::from_secs(5));

    let body = fetcher
        .get_text("test", &format!("http://{addr}/flaky"), &[])
        .await
        .unwrap();

    assert!(body.contains("$$SOE"));
    assert_eq!(upstream.flaky_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (addr, upstream) = spawn_upstream().await;
    let fetcher = fetcher(2, Duration::from_secs(5));

    let err = fetcher
        .get_text("test", &format!("http://{addr}/flaky"), &[])
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IsotrackError::HttpStatus {
            status: 503,
            url: format!("http://{addr}/flaky"),
        }
    );
    assert_eq!(upstream.flaky_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (addr, upstream) = spawn_upstream().await;
    let fetcher = fetcher(3, Duration::from_secs(5));

    let err = fetcher
        .get_text("test", &format!("http://{addr}/missing"), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, IsotrackError::HttpStatus { status: 404, .. }));
    assert_eq!(upstream.missing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let (addr, _) = spawn_upstream().await;
    let fetcher = fetcher(1, Duration::from_millis(200));

    let err = fetcher
        .get_text("slow-provider", &format!("http://{addr}/slow"), &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IsotrackError::Timeout { ref provider, .. } if provider == "slow-provider"
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(1, Duration::from_secs(2))
        .get_text("test", &format!("http://{addr}/"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IsotrackError::Network(_)));
}

#[tokio::test]
async fn test_sbdb_elements_over_http() {
    let (addr, _) = spawn_upstream().await;
    let config = local_config(addr);
    let source = SbdbElementsSource::new(
        fetcher(1, Duration::from_secs(5)),
        &config.gateway,
        &config.target,
    );

    let elements = source.fetch_elements().await.unwrap();
    assert!(elements.is_hyperbolic());
    assert_eq!(elements.observation_count, Some(1163));

    // the adapter interface propagates the fetched elements over the range
    let range = TimeRange::around(on_the_hour(2025, 11, 1, 0), 2.0);
    let series = source.fetch(&range, &Step::days(1)).await.unwrap();
    assert_eq!(series.samples.len(), 5);
    assert_eq!(series.elements, Some(elements));
}

#[tokio::test]
async fn test_velocity_profile_end_to_end() {
    let (addr, upstream) = spawn_upstream().await;
    let config = local_config(addr);
    let sources = ReconcilerSources::with_fetcher(fetcher(1, Duration::from_secs(5)), &config);
    let reconciler = Reconciler::new(
        sources,
        Arc::new(CacheTier::memory_only()),
        ReconcilerSettings::from(&config),
    );

    let now = on_the_hour(2025, 10, 21, 0);
    let profile = reconciler.velocity_profile_at(2, now).await.unwrap();
    assert_eq!(profile.len(), 5);
    assert_eq!(upstream.horizons_calls.load(Ordering::SeqCst), 2);

    // served from cache the second time
    let again = reconciler.velocity_profile_at(2, now).await.unwrap();
    assert_eq!(again.len(), 5);
    assert_eq!(upstream.horizons_calls.load(Ordering::SeqCst), 2);
}
