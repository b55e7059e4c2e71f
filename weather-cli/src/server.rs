//! HTTP surface: JSON routes over [`ForecastService`].

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use district_weather_core::{
    ForecastError, ForecastResult, ForecastService, TravelDecision, TravelQuery, TravelQueryInput,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const TOP_DISTRICTS: &str = "/api/v1/weather/top-districts";
const TRAVEL_DECISION: &str = "/api/v1/weather/travel-decision";

/// Set on ranking responses when some districts were left out.
pub const FAILED_DISTRICTS: HeaderName = HeaderName::from_static("x-failed-districts");

type AppState = Arc<ForecastService>;

pub fn router(service: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(TOP_DISTRICTS, get(top_districts))
        .route(&format!("{TOP_DISTRICTS}/"), get(top_districts))
        .route(TRAVEL_DECISION, post(travel_decision))
        .route(&format!("{TRAVEL_DECISION}/"), post(travel_decision))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

pub async fn serve(bind: &str, service: ForecastService) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn top_districts(State(service): State<AppState>) -> Result<Response, ApiError> {
    let ranking = service.top_districts().await?;

    let mut response = Json::<Vec<ForecastResult>>(ranking.districts).into_response();
    if ranking.failed > 0 {
        response
            .headers_mut()
            .insert(FAILED_DISTRICTS, HeaderValue::from(ranking.failed));
    }
    Ok(response)
}

async fn travel_decision(
    State(service): State<AppState>,
    payload: Result<Json<TravelQueryInput>, JsonRejection>,
) -> Result<Json<TravelDecision>, ApiError> {
    let Json(input) = payload.map_err(|rejection| ForecastError::invalid(rejection.body_text()))?;
    let query = TravelQuery::try_from(input)?;

    Ok(Json(service.travel_decision(&query).await?))
}

/// Maps a forecast error onto an HTTP status.
pub fn status_for(err: &ForecastError) -> StatusCode {
    match err {
        ForecastError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ForecastError::DistrictNotFound(_) => StatusCode::NOT_FOUND,
        ForecastError::UpstreamUnavailable(_) | ForecastError::MalformedForecastData(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

#[derive(Debug)]
struct ApiError(ForecastError);

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "{}", self.0);
        } else {
            tracing::debug!(kind = self.0.kind(), "{}", self.0);
        }

        let body = json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}
