//! HTTP route definitions

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::tournament::model::TournamentPatch;
use crate::tournament::service::CreateTournament;
use crate::tournament::{BracketError, MatchScore, Tournament, TournamentStatus};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/tournaments",
            get(list_tournaments_handler).post(create_tournament_handler),
        )
        .route(
            "/tournaments/:id",
            get(get_tournament_handler)
                .patch(patch_tournament_handler)
                .put(report_result_handler),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    tournaments: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.sessions.active_sessions(),
        tournaments: state.tournaments.tournament_count(),
    })
}

// ============================================================================
// Tournament endpoints
// ============================================================================

async fn create_tournament_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTournament>,
) -> Result<(StatusCode, Json<Tournament>), AppError> {
    let tournament = state.tournaments.create(req)?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

#[derive(Deserialize)]
struct ListQuery {
    host: Option<String>,
    status: Option<TournamentStatus>,
}

async fn list_tournaments_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Tournament>> {
    Json(state.tournaments.list(query.host.as_deref(), query.status))
}

async fn get_tournament_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tournament>, AppError> {
    Ok(Json(state.tournaments.get(id)?))
}

async fn patch_tournament_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TournamentPatch>,
) -> Result<Json<Tournament>, AppError> {
    let tournament = state.tournaments.patch(id, patch)?;
    info!(tournament_id = %id, status = ?tournament.status, "Tournament updated");
    Ok(Json(tournament))
}

#[derive(Deserialize)]
struct ReportRequest {
    winner: String,
    #[serde(default)]
    score: MatchScore,
}

async fn report_result_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<Tournament>, AppError> {
    Ok(Json(state.tournaments.report(id, &req.winner, req.score)?))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<BracketError> for AppError {
    fn from(err: BracketError) -> Self {
        let message = err.to_string();
        match err {
            BracketError::NotFound(_) => AppError::NotFound(message),
            BracketError::HostBusy(_) | BracketError::Closed | BracketError::AlreadyDecided(_) => {
                AppError::Conflict(message)
            }
            _ => AppError::BadRequest(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
