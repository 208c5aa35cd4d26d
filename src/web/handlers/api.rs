use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::assistant::Action;
use crate::db::executor::QueryResult;
use crate::error::AppError;
use crate::session::{HistoryEntry, SharedSession};
use crate::web::state::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub query: String,
}

// Response types

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
}

#[derive(Debug, Serialize)]
pub struct GeneratedSql {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub schema: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub active_sessions: usize,
    pub llm_backend: String,
}

type ApiResult<T> = Result<Json<T>, AppError>;

async fn logged_in_session(state: &AppState, jar: &CookieJar) -> Result<SharedSession, AppError> {
    state.session(jar).await.ok_or(AppError::NotLoggedIn)
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionStatus>), AppError> {
    let jar = state.log_in(jar, payload.password).await?;
    Ok((jar, Json(SessionStatus { logged_in: true })))
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<SessionStatus> {
    state.log_out(&jar).await;
    Json(SessionStatus { logged_in: false })
}

// Natural language to SQL, without executing it
pub async fn generate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<GenerateRequest>,
) -> ApiResult<GeneratedSql> {
    debug!("NL-query: {}", payload.question);
    let session = logged_in_session(&state, &jar).await?;
    let mut session = session.lock().await;
    let sql = state.assistant.generate(&mut session, &payload.question).await?;

    Ok(Json(GeneratedSql {
        question: payload.question.trim().to_string(),
        sql,
    }))
}

// Query execution
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ExecuteQueryRequest>,
) -> ApiResult<QueryResult> {
    let session = logged_in_session(&state, &jar).await?;
    let mut session = session.lock().await;
    let result = state.assistant.run(&mut session, &payload.query).await?;
    Ok(Json(result))
}

pub async fn rerun_history_entry(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(index): Path<usize>,
) -> ApiResult<QueryResult> {
    let session = logged_in_session(&state, &jar).await?;
    let mut session = session.lock().await;
    let result = state.assistant.rerun(&mut session, index).await?;
    Ok(Json(result))
}

pub async fn list_history(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<HistoryResponse> {
    let session = logged_in_session(&state, &jar).await?;
    let session = session.lock().await;
    if !session.logged_in {
        return Err(AppError::NotLoggedIn);
    }

    Ok(Json(HistoryResponse {
        entries: session.recent_history(state.display_limit),
        total: session.history_len(),
    }))
}

pub async fn clear_history(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<StatusCode, AppError> {
    let session = logged_in_session(&state, &jar).await?;
    let mut session = session.lock().await;
    state.assistant.dispatch(&mut session, Action::ClearHistory).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_schema(State(state): State<Arc<AppState>>, jar: CookieJar) -> ApiResult<SchemaResponse> {
    let session = logged_in_session(&state, &jar).await?;
    if !session.lock().await.logged_in {
        return Err(AppError::NotLoggedIn);
    }

    Ok(Json(SchemaResponse {
        schema: state.assistant.schema().to_string(),
    }))
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        active_sessions: state.sessions.len().await,
        llm_backend: state.llm_backend.clone(),
    })
}
