//! HTTP surface of the status read model

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use super::experiments::{ExperimentDetail, ExperimentRecord};
use super::read_model::{ScenarioDetail, ScenarioSummary, StatusService, MAX_EXECUTIONS};
use crate::error::{ChaosError, ErrorCode};
use crate::pipeline::PipelineRun;
use crate::store::StoreHealth;
use crate::workflow::{ExecutionSummary, WorkflowExecution};

/// Error body: `{"error": "...", "message": "..."}`
#[derive(Debug)]
pub struct ApiError(ChaosError);

impl From<ChaosError> for ApiError {
    fn from(err: ChaosError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let missing = self.0.is_not_found()
            || self.0.code() == ErrorCode::VALIDATION_INVALID_IDENTIFIER;
        let (status, kind) = if missing {
            (StatusCode::NOT_FOUND, "not_found")
        } else {
            error!("Status API error: {}", self.0);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        };
        let body = Json(json!({
            "error": kind,
            "message": self.0.message(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    store: StoreHealth,
}

pub fn router(service: Arc<StatusService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scenarios", get(list_scenarios))
        .route("/scenarios/{id}", get(get_scenario))
        .route("/fis/experiments", get(list_experiments))
        .route("/fis/experiments/{id}", get(get_experiment))
        .route("/executions", get(list_executions))
        .route("/executions/{id}", get(get_execution))
        .route("/pipeline/runs", get(list_pipeline_runs))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Serve the router until `shutdown` resolves
pub async fn serve<S>(
    service: Arc<StatusService>,
    addr: SocketAddr,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(service): State<Arc<StatusService>>) -> ApiResult<HealthResponse> {
    let store = service.health().await?;
    Ok(Json(HealthResponse {
        status: if store.healthy { "ok" } else { "degraded" },
        store,
    }))
}

async fn list_scenarios(
    State(service): State<Arc<StatusService>>,
) -> ApiResult<Vec<ScenarioSummary>> {
    Ok(Json(service.list_scenarios().await?))
}

async fn get_scenario(
    State(service): State<Arc<StatusService>>,
    Path(id): Path<String>,
) -> ApiResult<ScenarioDetail> {
    Ok(Json(service.get_scenario(&id).await?))
}

async fn list_experiments(
    State(service): State<Arc<StatusService>>,
) -> ApiResult<Vec<ExperimentRecord>> {
    Ok(Json(service.list_experiments().await?))
}

async fn get_experiment(
    State(service): State<Arc<StatusService>>,
    Path(id): Path<String>,
) -> ApiResult<ExperimentDetail> {
    Ok(Json(service.get_experiment(&id).await?))
}

async fn list_executions(
    State(service): State<Arc<StatusService>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<ExecutionSummary>> {
    let limit = query.limit.unwrap_or(MAX_EXECUTIONS);
    Ok(Json(service.list_executions(limit).await?))
}

async fn get_execution(
    State(service): State<Arc<StatusService>>,
    Path(id): Path<String>,
) -> ApiResult<WorkflowExecution> {
    Ok(Json(service.get_execution(&id).await?))
}

async fn list_pipeline_runs(
    State(service): State<Arc<StatusService>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<PipelineRun>> {
    Ok(Json(service.list_pipeline_runs(query.limit.unwrap_or(20)).await?))
}
