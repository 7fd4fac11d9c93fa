// The web dashboard: one JSON API per user action, plus a static page.
//
// The pre-flight confirmation lives in server state and gates every draw
// endpoint until the operator validates both checks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::app::{self, history, roster, AppError, AppResult};

#[derive(Clone)]
pub struct DashboardState {
    pub workbook: String,
    pub history_dir: PathBuf,
    pub checks_confirmed: Arc<RwLock<bool>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ChecksResponse {
    confirmed: bool,
}

#[derive(Deserialize)]
struct ConfirmRequest {
    call_done: bool,
    week_ok: bool,
}

#[derive(Deserialize)]
struct ExamDrawRequest {
    sheet: String,
    week: String,
    #[serde(default)]
    reset: bool,
}

#[derive(Serialize)]
struct ExamDrawResponse {
    sheet: String,
    week: String,
    present_count: usize,
    quota: usize,
    drawn: Vec<String>,
}

#[derive(Deserialize)]
struct GroupDrawRequest {
    sheet: String,
    num_groups: usize,
    #[serde(default)]
    reset: bool,
}

#[derive(Serialize)]
struct GroupView {
    name: String,
    members: Vec<String>,
    rapporteur: Option<String>,
}

#[derive(Serialize)]
struct GroupDrawResponse {
    sheet: String,
    groups: Vec<GroupView>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Parses the address, builds the runtime and blocks until the server stops.
pub fn serve(addr: &str, workbook: String, history_dir: PathBuf) -> AppResult<()> {
    let addr: SocketAddr = match addr.parse() {
        Ok(a) => a,
        Err(e) => whatever!("Adresse d'écoute invalide {} : {}", addr, e),
    };
    let state = DashboardState {
        workbook,
        history_dir,
        checks_confirmed: Arc::new(RwLock::new(false)),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .whatever_context("Impossible de démarrer le serveur")?;
    runtime.block_on(run_dashboard(addr, state));
    Ok(())
}

async fn run_dashboard(addr: SocketAddr, state: DashboardState) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/sheets", get(sheets_handler))
        .route("/api/sheets/:sheet/weeks", get(weeks_handler))
        .route("/api/checks", get(checks_status_handler))
        .route("/api/checks", post(confirm_checks_handler))
        .route("/api/checks/reset", post(reset_checks_handler))
        .route("/api/exam", post(exam_draw_handler))
        .route("/api/exam/history", get(exam_history_handler))
        .route("/api/groups", post(group_draw_handler))
        .route("/api/groups/:sheet/history", get(group_history_handler))
        .layer(cors)
        .with_state(state);

    info!("Starting the dashboard on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind the dashboard on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Dashboard server failed: {}", e);
    }
}

fn error_status(e: &AppError) -> StatusCode {
    match e {
        AppError::MissingWorksheet { .. }
        | AppError::EmptyWorksheet { .. }
        | AppError::MissingColumns { .. } => StatusCode::BAD_REQUEST,
        AppError::OpeningWorkbook { .. } => StatusCode::NOT_FOUND,
        AppError::ChecksNotConfirmed {} | AppError::Aborted {} => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: AppError) -> HandlerError {
    debug!("request failed: {:?}", e);
    (
        error_status(&e),
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

async fn ensure_confirmed(state: &DashboardState) -> Result<(), HandlerError> {
    if *state.checks_confirmed.read().await {
        Ok(())
    } else {
        Err(error_response(AppError::ChecksNotConfirmed {}))
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

async fn sheets_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<String>>, HandlerError> {
    roster::list_sheets(&state.workbook)
        .map(Json)
        .map_err(error_response)
}

async fn weeks_handler(
    State(state): State<DashboardState>,
    UrlPath(sheet): UrlPath<String>,
) -> Result<Json<Vec<String>>, HandlerError> {
    roster::week_columns(&state.workbook, &sheet)
        .map(Json)
        .map_err(error_response)
}

async fn checks_status_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(ChecksResponse {
        confirmed: *state.checks_confirmed.read().await,
    })
}

async fn confirm_checks_handler(
    State(state): State<DashboardState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ChecksResponse>, HandlerError> {
    if !(req.call_done && req.week_ok) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Veuillez confirmer chaque point pour continuer.".to_string(),
            }),
        ));
    }
    *state.checks_confirmed.write().await = true;
    Ok(Json(ChecksResponse { confirmed: true }))
}

async fn reset_checks_handler(State(state): State<DashboardState>) -> Json<ChecksResponse> {
    *state.checks_confirmed.write().await = false;
    Json(ChecksResponse { confirmed: false })
}

async fn exam_draw_handler(
    State(state): State<DashboardState>,
    Json(req): Json<ExamDrawRequest>,
) -> Result<Json<ExamDrawResponse>, HandlerError> {
    ensure_confirmed(&state).await?;
    let outcome = app::run_exam_draw(
        &state.workbook,
        &state.history_dir,
        &req.sheet,
        &req.week,
        req.reset,
    )
    .map_err(error_response)?;
    Ok(Json(ExamDrawResponse {
        sheet: outcome.sheet,
        week: outcome.week,
        present_count: outcome.selection.present_count,
        quota: outcome.selection.quota,
        drawn: outcome.selection.drawn,
    }))
}

async fn exam_history_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<history::ExamEntry>>, HandlerError> {
    let path = history::exam_history_path(&state.history_dir);
    let mut entries = history::load_exam_history(&path).map_err(error_response)?;
    entries.sort_by(|a, b| a.sheet.cmp(&b.sheet));
    Ok(Json(entries))
}

async fn group_draw_handler(
    State(state): State<DashboardState>,
    Json(req): Json<GroupDrawRequest>,
) -> Result<Json<GroupDrawResponse>, HandlerError> {
    ensure_confirmed(&state).await?;
    if !(2..=20).contains(&req.num_groups) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Le nombre de groupes doit être compris entre 2 et 20.".to_string(),
            }),
        ));
    }
    let outcome = app::run_group_draw(
        &state.workbook,
        &state.history_dir,
        &req.sheet,
        req.num_groups,
        req.reset,
    )
    .map_err(error_response)?;
    Ok(Json(GroupDrawResponse {
        sheet: outcome.sheet,
        groups: group_views(&outcome.groups),
    }))
}

async fn group_history_handler(
    State(state): State<DashboardState>,
    UrlPath(sheet): UrlPath<String>,
) -> Result<Json<Vec<tirage::Drawing>>, HandlerError> {
    let path = history::group_history_path(&state.history_dir, &sheet);
    history::load_group_history(&path)
        .map(Json)
        .map_err(error_response)
}

fn group_views(drawing: &tirage::Drawing) -> Vec<GroupView> {
    drawing
        .iter()
        .enumerate()
        .map(|(idx, group)| GroupView {
            name: format!("Groupe {}", idx + 1),
            members: group.clone(),
            rapporteur: group.first().cloned(),
        })
        .collect()
}
