use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use grain_analysis::{analyze_bytes, encode_report, AnalysisError};
use shared::{
    domain::Algorithm,
    error::{ApiError, ErrorCode},
    protocol::{ProcessQuery, ProcessResponse, IMAGE_FIELD, PROCESS_ROUTE, SATURATION_FIELD},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type Rejection = (StatusCode, Json<ApiError>);

const DEFAULT_SATURATION: f64 = 1.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let state = AppState {
        params: settings.analysis_params(),
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, max_upload_bytes = settings.max_upload_bytes, "processing service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route(PROCESS_ROUTE, post(process))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Form fields of a `POST /process` request.
#[derive(Debug, Default)]
struct Upload {
    image: Option<Bytes>,
    saturation: Option<String>,
}

async fn process(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProcessQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, Rejection> {
    let upload = match multipart {
        Ok(mut multipart) => read_upload(&mut multipart).await?,
        Err(rejection) => {
            warn!(%rejection, "process request is not multipart");
            Upload::default()
        }
    };

    let Some(image) = upload.image.filter(|bytes| !bytes.is_empty()) else {
        return Err(validation("No image uploaded"));
    };

    let algorithm = query
        .algorithm
        .as_deref()
        .and_then(|raw| raw.parse::<Algorithm>().ok())
        .ok_or_else(|| validation("Invalid algorithm"))?;

    let saturation = match upload.saturation.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_SATURATION,
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| validation(format!("Invalid saturation '{raw}'")))?,
    };

    let params = state.params;
    let image_bytes = image.len();
    let response = tokio::task::spawn_blocking(move || {
        let report = analyze_bytes(algorithm, &image, &params, saturation)?;
        encode_report(&report)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "analysis task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal("analysis task failed")),
        )
    })?
    .map_err(analysis_rejection)?;

    info!(
        %algorithm,
        image_bytes,
        saturation,
        grain_count = response.grain_count,
        average_length = response.average_length,
        "processed image"
    );
    Ok(Json(response))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, Rejection> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        match field.name() {
            Some(IMAGE_FIELD) => {
                upload.image = Some(field.bytes().await.map_err(multipart_rejection)?);
            }
            Some(SATURATION_FIELD) => {
                upload.saturation = Some(field.text().await.map_err(multipart_rejection)?);
            }
            _ => {}
        }
    }
    Ok(upload)
}

fn validation(message: impl Into<String>) -> Rejection {
    let error = ApiError::validation(message);
    warn!(message = %error.message, "rejected process request");
    (StatusCode::BAD_REQUEST, Json(error))
}

fn multipart_rejection(error: MultipartError) -> Rejection {
    let status = error.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorCode::PayloadTooLarge
    } else {
        ErrorCode::Validation
    };
    warn!(%status, error = %error.body_text(), "unable to read upload");
    (status, Json(ApiError::new(code, error.body_text())))
}

fn analysis_rejection(error: AnalysisError) -> Rejection {
    match error {
        AnalysisError::Encode { .. } => {
            error!(%error, "unable to encode analysis images");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(error.to_string())),
            )
        }
        other => validation(other.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
