use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::downloader::{to_csv, to_xlsx};
use crate::error::SubmitError;
use crate::handler::{SubmissionResponse, SubmissionService};
use crate::store::{SUBMISSIONS_SHEET, workbook_summary};
use crate::workbook::Workbook;

pub struct AppState {
    pub service: SubmissionService,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

/// Builds the router over a ready service.
pub fn router(service: SubmissionService) -> Router {
    let state = Arc::new(AppState { service });

    Router::new()
        .route("/", post(submit))
        .route("/api/submit", post(submit))
        .route("/api/summary", get(summary))
        .route("/api/export", get(export))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(service: SubmissionService) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = service.config().bind_addr.clone();
    let app = router(service);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Intake endpoint. The body is read as raw bytes, capped at
/// `max_body_bytes`, so oversized and malformed bodies are answered in-band
/// like every other failure.
async fn submit(State(state): State<Arc<AppState>>, body: Body) -> Json<SubmissionResponse> {
    let limit = state.service.config().max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            let err = SubmitError::UnreadableBody(e.to_string());
            error!("Error processing form: {} (limit {} bytes)", err, limit);
            return Json(SubmissionResponse::failed(&err));
        }
    };

    let now = Utc::now();
    let worker = tokio::task::spawn_blocking(move || state.service.handle(&body, now));

    match worker.await {
        Ok(response) => Json(response),
        Err(e) => {
            error!("Submission worker failed: {}", e);
            Json(SubmissionResponse {
                success: false,
                message: format!("Error processing form: {}", e),
                log_id: None,
                email_sent: None,
                timestamp: None,
            })
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            message,
        }),
    )
        .into_response()
}

async fn snapshot(state: Arc<AppState>) -> Result<Workbook, Response> {
    let worker = tokio::task::spawn_blocking(move || {
        let service = &state.service;
        let handle = service.store().ensure_store(&service.config().store_name)?;
        service.store().read_workbook(&handle)
    });

    match worker.await {
        Ok(Ok(workbook)) => Ok(workbook),
        Ok(Err(e)) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn summary(State(state): State<Arc<AppState>>) -> Response {
    match snapshot(state).await {
        Ok(workbook) => {
            let today = Utc::now().with_timezone(&Local).date_naive();
            Json(workbook_summary(&workbook, today)).into_response()
        }
        Err(response) => response,
    }
}

async fn export(State(state): State<Arc<AppState>>, Query(params): Query<ExportQuery>) -> Response {
    let format = params.format.unwrap_or_else(|| "xlsx".to_string());
    let workbook = match snapshot(state).await {
        Ok(workbook) => workbook,
        Err(response) => return response,
    };

    match format.as_str() {
        "xlsx" => match to_xlsx(&workbook) {
            Ok(buffer) => (
                StatusCode::OK,
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                            .to_string(),
                    ),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}.xlsx\"", workbook.name),
                    ),
                ],
                buffer,
            )
                .into_response(),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        "csv" => {
            let Some(sheet) = workbook.sheet(SUBMISSIONS_SHEET) else {
                return error_response(StatusCode::NOT_FOUND, "No Submissions sheet".to_string());
            };
            match to_csv(sheet) {
                Ok(csv) => (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                        (
                            header::CONTENT_DISPOSITION,
                            format!("attachment; filename=\"{}.csv\"", workbook.name),
                        ),
                    ],
                    csv,
                )
                    .into_response(),
                Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            }
        }
        other => error_response(
            StatusCode::BAD_REQUEST,
            format!("Unsupported export format '{}'", other),
        ),
    }
}
