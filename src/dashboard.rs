//! Read-only dashboard over the pipeline's cataloged data.
//!
//! Every request re-derives its targets from the state document and runs
//! one aggregation query against the managed query service; nothing is
//! cached between requests. Domain outcomes (no tables yet, no data, a
//! failed or timed-out query) are returned as structured error bodies with
//! HTTP 200 so the page can render them; only state-document and provider
//! faults surface as HTTP 500.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::poll::{PollError, PollWindow, await_condition};
use crate::provider::{Cloud, ProviderError, QueryState};
use crate::store::{StateStore, StateStoreError};

const QUERY_WINDOW: PollWindow = PollWindow {
    interval: Duration::from_secs(2),
    timeout: Duration::from_secs(60),
};

/// Errors surfaced by the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The state document could not be loaded.
    #[error("could not load pipeline state: {0}")]
    Store(#[from] StateStoreError),
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The catalog holds no tables yet.
    #[error("no tables found in the data catalog")]
    EmptyCatalog,
    /// The query succeeded but returned no data rows.
    #[error("no customer data found")]
    NoData,
    /// The query finished unsuccessfully.
    #[error("query failed: {reason}")]
    QueryFailed {
        /// Provider-reported failure reason.
        reason: String,
    },
    /// The query did not complete before the deadline.
    #[error("query did not complete within {timeout_secs}s")]
    Timeout {
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// The HTTP listener could not be started or failed while serving.
    #[error("could not serve dashboard: {0}")]
    Serve(String),
}

impl DashboardError {
    /// Faults are 500s; domain outcomes render as structured 200 bodies.
    const fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) | Self::Provider(_) | Self::Serve(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::EmptyCatalog | Self::NoData | Self::QueryFailed { .. } | Self::Timeout { .. } => {
                StatusCode::OK
            }
        }
    }
}

/// One country and its customer count.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CountryCount {
    /// Country value from the cataloged data.
    pub country: String,
    /// Number of customers recorded for the country.
    pub count: u64,
}

/// Aggregated response of the customer-data endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomerData {
    /// Per-country counts, descending.
    pub countries: Vec<CountryCount>,
    /// Sum of all counts.
    pub total: u64,
    /// Wall-clock seconds the query took.
    pub query_time: f64,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: String,
}

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct DashboardState<C> {
    cloud: Arc<C>,
    store: StateStore,
    query: PollWindow,
}

impl<C> Clone for DashboardState<C> {
    fn clone(&self) -> Self {
        Self {
            cloud: Arc::clone(&self.cloud),
            store: self.store.clone(),
            query: self.query,
        }
    }
}

impl<C> DashboardState<C> {
    /// Creates the dashboard state over a provider and a state store.
    #[must_use]
    pub const fn new(cloud: Arc<C>, store: StateStore) -> Self {
        Self {
            cloud,
            store,
            query: QUERY_WINDOW,
        }
    }

    /// Overrides the query poll window.
    ///
    /// This is primarily used by tests to keep runs fast.
    #[must_use]
    pub const fn with_query_poll(mut self, window: PollWindow) -> Self {
        self.query = window;
        self
    }
}

/// Builds the dashboard router.
#[must_use]
pub fn router<C: Cloud + 'static>(state: DashboardState<C>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/customer-data", get(customer_data::<C>))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// Binds the listener and serves the dashboard until shutdown.
///
/// # Errors
///
/// Returns [`DashboardError::Serve`] when the listener cannot bind or the
/// server fails.
pub async fn serve<C: Cloud + 'static>(
    state: DashboardState<C>,
    port: u16,
) -> Result<(), DashboardError> {
    let app = router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| DashboardError::Serve(err.to_string()))?;
    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .map_err(|err| DashboardError::Serve(err.to_string()))
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/dashboard.html"))
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn customer_data<C: Cloud + 'static>(State(state): State<DashboardState<C>>) -> Response {
    match aggregate_countries(&state).await {
        Ok(data) => Json(data).into_response(),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                warn!("customer-data request failed: {err}");
            }
            (status, Json(ErrorBody { error: err.to_string() })).into_response()
        }
    }
}

fn country_query(database: &str, table: &str) -> String {
    format!(
        "SELECT country, COUNT(*) AS customer_count \
         FROM \"{database}\".\"{table}\" \
         WHERE country IS NOT NULL AND country != '' \
         GROUP BY country ORDER BY customer_count DESC"
    )
}

async fn aggregate_countries<C: Cloud>(
    state: &DashboardState<C>,
) -> Result<CustomerData, DashboardError> {
    let started = Instant::now();
    let document = state.store.load()?;
    let region = document.regions.target_region.as_str();
    let database = document.resources.catalog.database_name.as_str();
    let workgroup = document.resources.query_service.workgroup.as_str();

    let tables = state.cloud.list_tables(region, database).await?;
    let Some(table) = tables.first() else {
        return Err(DashboardError::EmptyCatalog);
    };

    let sql = country_query(database, &table.name);
    let execution_id = state.cloud.start_query(region, workgroup, &sql).await?;

    let cloud = state.cloud.as_ref();
    let execution = execution_id.as_str();
    await_condition(
        "query completion",
        state.query.interval,
        state.query.timeout,
        || async move {
            match cloud.query_state(region, execution).await {
                Ok(QueryState::Succeeded) => Ok(Some(())),
                Ok(QueryState::Queued | QueryState::Running) => Ok(None),
                Ok(QueryState::Failed { reason }) => Err(DashboardError::QueryFailed { reason }),
                Ok(QueryState::Cancelled) => Err(DashboardError::QueryFailed {
                    reason: String::from("cancelled"),
                }),
                Err(err) => Err(DashboardError::from(err)),
            }
        },
    )
    .await
    .map_err(|err| match err {
        PollError::TimedOut { timeout_secs, .. } => DashboardError::Timeout { timeout_secs },
        PollError::Probe(inner) => inner,
    })?;

    let rows = state.cloud.query_rows(region, &execution_id).await?;
    if rows.len() <= 1 {
        return Err(DashboardError::NoData);
    }

    let mut countries = Vec::new();
    let mut total = 0;
    for row in rows.iter().skip(1) {
        let country = row
            .first()
            .cloned()
            .unwrap_or_else(|| String::from("Unknown"));
        let count = row
            .get(1)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        total += count;
        countries.push(CountryCount { country, count });
    }

    Ok(CustomerData {
        countries,
        total,
        query_time: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests;
