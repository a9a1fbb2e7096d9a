//! Run store HTTP server
//!
//! Serves any [`RunStore`] over the `/api/escape-runs` JSON API:
//!
//! | method | path | success |
//! |--------|------|---------|
//! | GET    | `/api/escape-runs?scenarioId=&limit=` | 200 list |
//! | POST   | `/api/escape-runs` | 201 created run |
//! | GET    | `/api/escape-runs/{id}` | 200 run |
//! | PATCH  | `/api/escape-runs/{id}` | 200 updated run |
//! | DELETE | `/api/escape-runs/{id}` | 200 `{"ok": true}` |
//!
//! Without `scenarioId` the listing covers every scenario.
//!
//! Errors are `{"error": message}` with 404 for unknown ids, 400 for bad
//! input and 500 for everything else.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EscapeRoomError, PersistenceError};
use crate::persistence::{DEFAULT_PAGE_SIZE, NewRun, RenameRequest, RunStore};

/// Largest request body accepted.
const MAX_BODY_SIZE: usize = 1024 * 1024;

type SharedStore = Arc<dyn RunStore>;

/// Error response carrying a status and a message.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        let (status, message) = match e {
            PersistenceError::NotFound(_) => (StatusCode::NOT_FOUND, "Run not found.".to_string()),
            PersistenceError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message),
            other => {
                warn!(error = %other, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    scenario_id: Option<String>,
    limit: Option<String>,
}

/// Builds the router over `store`.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/api/escape-runs", get(list_runs).post(create_run))
        .route(
            "/api/escape-runs/{id}",
            get(get_run).patch(rename_run).delete(delete_run),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(store)
}

/// Accepts `:8080`, `8080` or a full socket address.
///
/// # Errors
///
/// Returns [`EscapeRoomError::Usage`] if the address cannot be parsed.
pub fn parse_bind_addr(input: &str) -> Result<SocketAddr, EscapeRoomError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse()
        .map_err(|e| EscapeRoomError::Usage(format!("invalid bind address \"{input}\": {e}")))
}

/// Serves `store` on `addr` until `cancel` fires.
///
/// `on_bound` receives the bound address before serving starts (useful with
/// port 0).
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind or the server fails.
pub async fn serve(
    store: SharedStore,
    addr: SocketAddr,
    cancel: CancellationToken,
    on_bound: impl FnOnce(SocketAddr),
) -> Result<(), EscapeRoomError> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    on_bound(bound);
    info!(%bound, backend = store.backend(), "run store listening");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    debug!("run store shut down");
    Ok(())
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is required."));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))
}

fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map_or(DEFAULT_PAGE_SIZE, |n| n.min(DEFAULT_PAGE_SIZE))
}

async fn list_runs(
    State(store): State<SharedStore>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let scenario_id = query
        .scenario_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let runs = store
        .list(scenario_id, parse_limit(query.limit.as_deref()))
        .await?;
    Ok(Json(runs).into_response())
}

async fn get_run(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let run = store.get(&id).await?;
    Ok(Json(run).into_response())
}

async fn create_run(State(store): State<SharedStore>, body: Bytes) -> Result<Response, ApiError> {
    let run: NewRun = parse_body(&body)?;
    let saved = store.create(run).await?;
    Ok((StatusCode::CREATED, Json(saved)).into_response())
}

async fn rename_run(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: RenameRequest = parse_body(&body)?;
    let name = request
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let updated = store.rename(&id, name).await?;
    Ok(Json(updated).into_response())
}

async fn delete_run(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    store.delete(&id).await?;
    Ok(Json(json!({ "ok": true })).into_response())
}
