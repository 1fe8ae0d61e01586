//! Read-only catalog query service.
//!
//! Exposes the version catalog over a small JSON HTTP API. The service
//! only reads from the [`CatalogStore`]; it never triggers reconciliation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/datamodel/{name}/versions` | Versions of a data model, newest first |
//! | `GET`  | `/datamodel/{name}/versions/{version}` | Version and schema URL |
//! | `GET`  | `/datamodel/{name}/version/{version}` | Legacy alias of the above |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "data model not found: Foo" } }
//! ```
//!
//! Error codes: `not_found` (404), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::StoreError;
use crate::sqlite_store::SqliteCatalog;
use crate::store::CatalogStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn CatalogStore>,
}

/// Starts the query server on `[server].bind` over the SQLite catalog.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalog::open(&config.db).await?);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("query service listening on http://{}", config.server.bind);
    println!("Query service listening on http://{}", config.server.bind);

    axum::serve(listener, router(store)).await?;
    Ok(())
}

/// Builds the query router over any catalog store.
pub fn router(store: Arc<dyn CatalogStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/datamodel/{name}/versions", get(handle_list_versions))
        .route("/datamodel/{name}/versions/{version}", get(handle_get_version))
        .route("/datamodel/{name}/version/{version}", get(handle_get_version))
        .layer(cors)
        .with_state(AppState { store })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "catalog query failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: e.to_string(),
        }
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "This is the SDM version manager api.",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /datamodel/{name}/versions ============

async fn handle_list_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let versions = state.store.versions_for_data_model(&name).await?;
    if versions.is_empty() {
        return Err(not_found(format!("data model not found: {}", name)));
    }
    Ok(Json(versions))
}

// ============ GET /datamodel/{name}/versions/{version} ============

/// Response body for a single version lookup.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SchemaResponse {
    version: String,
    schema_url: String,
}

async fn handle_get_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<SchemaResponse>, AppError> {
    let record = state
        .store
        .find_version(&name, &version)
        .await?
        .ok_or_else(|| not_found(format!("data model version not found: {} {}", name, version)))?;

    Ok(Json(SchemaResponse {
        version: record.version,
        schema_url: record.schema_url,
    }))
}
