//! Application state for the HTTP server

use std::sync::Arc;

use crate::{
    cache::CacheTier,
    config::EngineConfig,
    gateway::{http::HttpFetcher, sbdb_elements::SbdbElementsSource},
    isotrack_errors::IsotrackError,
    orbital_elements::OrbitalElements,
    reconcile::{Reconciler, ReconcilerSettings, ReconcilerSources},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    reconciler: Reconciler,
    /// Element set behind the predicted trail
    elements: OrbitalElements,
}

impl AppState {
    pub fn new(reconciler: Reconciler, elements: OrbitalElements) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                reconciler,
                elements,
            }),
        }
    }

    /// Build the whole pipeline from `config`: one HTTP client for every adapter,
    /// the cache tier, and the predicted element set.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, IsotrackError> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config.gateway)?);
        let cache = Arc::new(CacheTier::from_config(&config.cache));

        let sbdb = SbdbElementsSource::new(fetcher.clone(), &config.gateway, &config.target);
        let elements = initial_elements(&sbdb, config.target.refresh_elements_at_startup).await;

        let reconciler = Reconciler::new(
            ReconcilerSources::with_fetcher(fetcher, config),
            cache,
            ReconcilerSettings::from(config),
        );
        Ok(Self::new(reconciler, elements))
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    pub fn elements(&self) -> &OrbitalElements {
        &self.inner.elements
    }
}

/// Latest SBDB solution when `refresh` is set and it is usable, otherwise the
/// built-in reference elements.
pub async fn initial_elements(sbdb: &SbdbElementsSource, refresh: bool) -> OrbitalElements {
    if !refresh {
        return OrbitalElements::reference_3i_atlas();
    }

    match sbdb.fetch_elements().await {
        Ok(elements) => match elements.ensure_hyperbolic() {
            Ok(()) => elements,
            Err(err) => {
                tracing::warn!(error = %err, "SBDB solution rejected, using reference elements");
                OrbitalElements::reference_3i_atlas()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "SBDB refresh failed, using reference elements");
            OrbitalElements::reference_3i_atlas()
        }
    }
}
