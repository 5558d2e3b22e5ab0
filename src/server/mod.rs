//! HTTP surface of the export service.
//!
//! Routes: `/health`, `POST /exports`, `GET /exports/benchmark`,
//! `GET /exports/:id/download`. The benchmark route is a literal path that
//! the router matches ahead of the `:id` capture. This module is the single
//! place where an export error becomes an HTTP status, and the single place
//! that updates job state.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::benchmark;
use crate::config::{Config, SINK_CHANNEL_CAPACITY};
use crate::export::{ChannelSink, ExportPipeline};
use crate::jobs::{JobRegistry, JobStatus};
use crate::model::{ExportRequest, ExportRequestBody};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    /// The shared Postgres pool.
    pub pool: PgPool,
    /// The in-process job registry.
    pub registry: Arc<JobRegistry>,
    /// Resolved runtime configuration.
    pub config: Arc<Config>,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/exports", post(create_export_handler))
        .route("/exports/benchmark", get(benchmark_handler))
        .route("/exports/:id/download", get(download_handler))
        .with_state(state)
}

/// Binds the listener and serves until a shutdown signal, then drains
/// in-flight exports and closes the pool.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(config: Config, pool: PgPool) -> Result<(), anyhow::Error> {
    let port = config.port;
    let state = AppState {
        pool: pool.clone(),
        registry: Arc::new(JobRegistry::new()),
        config: Arc::new(config),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind port {}: {}", port, e))?;
    info!("Export service listening on http://0.0.0.0:{port}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::app::shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    pool.close().await;
    info!("Database pool closed");
    Ok(())
}

/// JSON body of `POST /exports` responses.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateExportResponse {
    export_id: String,
    status: &'static str,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health_handler() -> Response {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn create_export_handler(
    State(state): State<AppState>,
    body: Result<Json<ExportRequestBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let request = match ExportRequest::validate(body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let job = state.registry.create(request);
    info!(
        "Created export job {} ({}, {} columns)",
        job.id,
        job.request.format.extension(),
        job.request.columns.len()
    );

    (
        StatusCode::CREATED,
        Json(CreateExportResponse {
            export_id: job.id.to_string(),
            status: job.status.as_str(),
        }),
    )
        .into_response()
}

async fn download_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(job_id) = Uuid::parse_str(&id) else {
        return error_response(StatusCode::NOT_FOUND, "unknown export job");
    };
    let Some(job) = state.registry.get(&job_id) else {
        return error_response(StatusCode::NOT_FOUND, "unknown export job");
    };

    state
        .registry
        .update_status(&job_id, JobStatus::InProgress, None);

    // Open the cursor before committing to a streaming response so setup
    // failures still produce a well-formed 5xx.
    let pipeline = match ExportPipeline::open(
        &state.pool,
        job.request.clone(),
        state.config.export_row_limit,
    )
    .await
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            warn!("Export {job_id} failed before streaming: {e}");
            state
                .registry
                .update_status(&job_id, JobStatus::Failed, Some(e.cause().to_string()));
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(SINK_CHANNEL_CAPACITY);
    let registry = Arc::clone(&state.registry);
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        match pipeline.run(&mut sink).await {
            Ok(rows) => {
                registry.update_status(&job_id, JobStatus::Completed, None);
                info!("Export {job_id} completed ({rows} rows)");
            }
            Err(e) => {
                // Truncate the chunked body; a partial prefix plus an abort
                // is the correct error signal once bytes have been sent.
                sink.terminate(&e.to_string()).await;
                registry.update_status(&job_id, JobStatus::Failed, Some(e.cause().to_string()));
                warn!("Export {job_id} failed mid-stream: {e}");
            }
        }
    });

    let body_stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });

    let format = job.request.format;
    let mut builder = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"export_{}.{}\"",
                job_id,
                format.extension()
            ),
        );
    if job.request.compression.is_some() {
        builder = builder.header(header::CONTENT_ENCODING, "gzip");
    }
    builder
        .body(Body::from_stream(body_stream))
        .expect("statically valid response")
}

async fn benchmark_handler(State(state): State<AppState>) -> Response {
    match benchmark::run(&state.pool, &state.config).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!("Benchmark failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
