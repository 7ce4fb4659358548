//! HTTP API for one record collection

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::{Patch, Record, Resource};
use crate::store::{RecordStore, StoreError};

/// Application state shared across handlers
pub struct AppState<T> {
    pub store: Box<dyn RecordStore<T>>,
}

impl<T: Resource> AppState<T> {
    pub fn new(store: impl RecordStore<T> + 'static) -> Arc<Self> {
        Arc::new(Self {
            store: Box::new(store),
        })
    }
}

/// Create the API router for `T`, mounted at `T::BASE_PATH`
pub fn create_router<T: Resource>(state: Arc<AppState<T>>) -> Router {
    let item_path = format!("{}/{{id}}", T::BASE_PATH);

    Router::new()
        .route("/health", get(health::<T>))
        .route(T::BASE_PATH, get(list_records::<T>).post(create_record::<T>))
        .route(&item_path, put(update_record::<T>).delete(delete_record::<T>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health<T: Resource>() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": T::SERVICE,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The request body as a JSON object. A body not declared as JSON, or an
/// empty one, reads as `{}`.
fn read_body(headers: &HeaderMap, body: &Bytes) -> Result<Map<String, Value>, serde_json::Error> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json"));

    if !is_json || body.is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_slice(body)
}

async fn create_record<T: Resource>(
    State(state): State<Arc<AppState<T>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Record<T>>), ApiError> {
    let payload: T = read_body(&headers, &body)
        .and_then(|fields| serde_json::from_value(Value::Object(fields)))
        .map_err(|e| ApiError::bad_body::<T>(Operation::Save, e))?;

    let record = state
        .store
        .create(payload)
        .await
        .map_err(|e| ApiError::store::<T>(Operation::Save, e))?;

    tracing::info!(id = %record.id, collection = T::COLLECTION, "Record created");

    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_records<T: Resource>(
    State(state): State<Arc<AppState<T>>>,
) -> Result<Json<Vec<Record<T>>>, ApiError> {
    let records = state
        .store
        .list_all()
        .await
        .map_err(|e| ApiError::store::<T>(Operation::Fetch, e))?;

    Ok(Json(records))
}

async fn update_record<T: Resource>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Record<T>>, ApiError> {
    let patch = read_body(&headers, &body)
        .and_then(Patch::<T>::from_json)
        .map_err(|e| ApiError::bad_body::<T>(Operation::Update, e))?;

    let record = state
        .store
        .update_by_id(&id, patch)
        .await
        .map_err(|e| ApiError::store::<T>(Operation::Update, e))?;

    Ok(Json(record))
}

async fn delete_record<T: Resource>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .delete_by_id(&id)
        .await
        .map_err(|e| ApiError::store::<T>(Operation::Delete, e))?;

    tracing::info!(%id, collection = T::COLLECTION, "Record deleted");

    Ok(Json(
        serde_json::json!({ "message": format!("{} deleted", T::TITLE) }),
    ))
}

/// The operation a request was attempting, for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Fetch,
    Update,
    Delete,
}

impl Operation {
    fn failure_message<T: Resource>(self) -> String {
        let (verb, noun) = match self {
            Operation::Save => ("save", T::SINGULAR),
            Operation::Fetch => ("fetch", T::PLURAL),
            Operation::Update => ("update", T::SINGULAR),
            Operation::Delete => ("delete", T::SINGULAR),
        };
        format!("Failed to {verb} {noun}. Please try again.")
    }

    fn gerund(self) -> &'static str {
        match self {
            Operation::Save => "saving",
            Operation::Fetch => "fetching",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
        }
    }
}

/// API error type, rendered as `{ "error": "<message>" }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Body was not JSON or did not fit the record shape
    fn bad_body<T: Resource>(op: Operation, err: serde_json::Error) -> Self {
        tracing::error!(
            error = %err,
            "Error {} {}: malformed request body",
            op.gerund(),
            T::SINGULAR
        );
        Self {
            status: StatusCode::BAD_REQUEST,
            message: op.failure_message::<T>(),
        }
    }

    fn store<T: Resource>(op: Operation, err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(id) => {
                tracing::warn!(%id, collection = T::COLLECTION, "{} not found", T::TITLE);
                return Self {
                    status: StatusCode::NOT_FOUND,
                    message: format!("{} not found", T::TITLE),
                };
            }
            StoreError::InvalidId(_) | StoreError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
            StoreError::CorruptDocument(_) | StoreError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        tracing::error!(error = %err, "Error {} {}", op.gerund(), T::SINGULAR);
        Self {
            status,
            message: op.failure_message::<T>(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
