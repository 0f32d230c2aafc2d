use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use shared::{
    domain::{BloodRequest, RequestId},
    error::{ApiError, ErrorCode},
    protocol::{AttachHospitalsRequest, CreateBloodRequest, ListRequestsQuery},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{attach_hospitals, create_request, get_request, list_requests, ApiContext};
use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "blood request service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            shared::protocol::requests_route(),
            get(http_list_requests).post(http_create_request),
        )
        .route("/requests/:request_id", get(http_get_request))
        .route("/requests/:request_id/hospitals", put(http_attach_hospitals))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

fn failure(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            warn!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn http_create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBloodRequest>,
) -> ApiResult<(StatusCode, Json<BloodRequest>)> {
    let request = create_request(&state.api, body).await.map_err(failure)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn http_list_requests(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListRequestsQuery>,
) -> ApiResult<Json<Vec<BloodRequest>>> {
    let requests = list_requests(&state.api, &q.owner_id)
        .await
        .map_err(failure)?;
    Ok(Json(requests))
}

async fn http_get_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
) -> ApiResult<Json<BloodRequest>> {
    let request = get_request(&state.api, request_id)
        .await
        .map_err(failure)?;
    Ok(Json(request))
}

async fn http_attach_hospitals(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<RequestId>,
    Json(body): Json<AttachHospitalsRequest>,
) -> ApiResult<StatusCode> {
    attach_hospitals(&state.api, request_id, body.hospitals)
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
