// 🌐 Payer Resolution - Web Server
// REST API with Axum over the review layer

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use payer_resolution::{
    assign_group, group_tree, map_detail, payers_page, unmapped_page, update_pretty_name,
    AppConfig, ResolutionRun, ResolverConfig, ResolverError, SqliteStore, OPERATOR,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payer-server", version, about = "HTTP API for payer review")]
struct Args {
    #[arg(long, env = "PAYER_DB")]
    db: Option<PathBuf>,

    #[arg(long, env = "PAYER_CONFIG")]
    config: Option<PathBuf>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    resolver: Arc<ResolverConfig>,
}

impl AppState {
    fn store(&self) -> Result<MutexGuard<'_, SqliteStore>, Response> {
        self.store.lock().map_err(|_| {
            error!("Store mutex poisoned");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "store unavailable".to_string())
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

fn respond<T: Serialize>(result: payer_resolution::Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            let status = match &e {
                ResolverError::PayerNotFound(_) | ResolverError::DetailNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ResolverError::MalformedInput { .. } | ResolverError::Config(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status.is_server_error() {
                error!("Request failed: {}", e);
            }
            failure(status, e.to_string())
        }
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Deserialize)]
struct MapPayerRequest {
    detail_id: i64,
    payer_id: String,
}

#[derive(Deserialize)]
struct PrettyNameRequest {
    payer_id: String,
    pretty_name: String,
}

#[derive(Deserialize)]
struct AssignGroupRequest {
    payer_id: String,
    group_id: String,
}

#[derive(Deserialize, Default)]
struct ResolveRequest {
    #[serde(default)]
    dry_run: bool,
}

#[derive(Serialize)]
struct AssignGroupResponse {
    payer_id: String,
    group_id: String,
    group_created: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/unmapped - Records waiting for review
async fn get_unmapped(State(state): State<AppState>, Query(page): Query<PageParams>) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(unmapped_page(&mut *store, &state.resolver, page.offset, page.limit))
}

/// GET /api/payers - Canonical payers with display names
async fn get_payers(State(state): State<AppState>, Query(page): Query<PageParams>) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(payers_page(&*store, page.offset, page.limit))
}

/// GET /api/groups/tree - Inferred group hierarchy
async fn get_group_tree(State(state): State<AppState>) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(group_tree(&*store, &state.resolver))
}

/// POST /api/map_payer - Manual mapping of a detail record
async fn post_map_payer(
    State(state): State<AppState>,
    Json(body): Json<MapPayerRequest>,
) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(map_detail(&mut *store, body.detail_id, &body.payer_id, OPERATOR))
}

/// POST /api/update_pretty_name
async fn post_update_pretty_name(
    State(state): State<AppState>,
    Json(body): Json<PrettyNameRequest>,
) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(update_pretty_name(&mut *store, &body.payer_id, &body.pretty_name, OPERATOR))
}

/// POST /api/assign_group
async fn post_assign_group(
    State(state): State<AppState>,
    Json(body): Json<AssignGroupRequest>,
) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    let result = assign_group(&mut *store, &body.payer_id, &body.group_id, OPERATOR).map(
        |group_created| AssignGroupResponse {
            payer_id: body.payer_id.clone(),
            group_id: body.group_id.clone(),
            group_created,
        },
    );
    respond(result)
}

/// POST /api/resolve - Run a resolution pass
async fn post_resolve(
    State(state): State<AppState>,
    body: Option<Json<ResolveRequest>>,
) -> Response {
    let Json(request) = body.unwrap_or_default();
    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };
    respond(
        ResolutionRun::new(&mut *store, &state.resolver)
            .dry_run(request.dry_run)
            .execute(),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let store = SqliteStore::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path.display());

    // Create shared state
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        resolver: Arc::new(config.resolver.clone()),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/unmapped", get(get_unmapped))
        .route("/payers", get(get_payers))
        .route("/groups/tree", get(get_group_tree))
        .route("/map_payer", post(post_map_payer))
        .route("/update_pretty_name", post(post_update_pretty_name))
        .route("/assign_group", post(post_assign_group))
        .route("/resolve", post(post_resolve))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
