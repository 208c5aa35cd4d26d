use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assistant::{Action, Outcome};
use crate::db::executor::QueryResult;
use crate::error::AppError;
use crate::session::{HistoryEntry, SessionState};
use crate::web::state::AppState;
use crate::web::templates::render_template;

const EXAMPLE_QUESTIONS: &[&str] = &[
    "How many customers by city?",
    "Total sales by product category?",
    "Top 10 products by quantity?",
    "Average order quantity?",
];

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SqlForm {
    pub sql: String,
}

#[derive(Serialize)]
struct PageContext<'a> {
    examples: &'a [&'a str],
    question: Option<&'a str>,
    sql: Option<&'a str>,
    result: Option<&'a QueryResult>,
    history: Vec<HistoryEntry>,
    error: Option<String>,
    success: Option<String>,
}

/// Text the user submitted, redisplayed when the action failed.
#[derive(Default)]
struct Draft<'a> {
    question: Option<&'a str>,
    sql: Option<&'a str>,
}

fn login_page(state: &AppState, error: Option<String>) -> Html<String> {
    Html(render_template(
        &state.template_env,
        "login.html",
        minijinja::context! { error => error },
    ))
}

fn render_page(
    state: &AppState,
    session: &SessionState,
    draft: Draft<'_>,
    outcome: Option<Result<Outcome, AppError>>,
) -> Html<String> {
    if !session.logged_in {
        return login_page(state, outcome.and_then(Result::err).map(|e| e.to_string()));
    }

    let (error, success) = match &outcome {
        Some(Ok(Outcome::Executed(result))) => {
            (None, Some(format!("Rows returned: {}", result.row_count)))
        }
        Some(Ok(Outcome::HistoryCleared)) => (None, Some("History cleared".to_string())),
        Some(Err(e)) => (Some(e.to_string()), None),
        _ => (None, None),
    };
    let failed = matches!(outcome, Some(Err(_)));

    let context = PageContext {
        examples: EXAMPLE_QUESTIONS,
        question: draft
            .question
            .filter(|_| failed)
            .or(session.current_question.as_deref()),
        sql: draft
            .sql
            .filter(|_| failed)
            .or(session.generated_sql.as_deref()),
        result: session.last_result.as_ref(),
        history: session.recent_history(state.display_limit),
        error,
        success,
    };

    Html(render_template(&state.template_env, "index.html", context))
}

async fn perform(state: &AppState, jar: &CookieJar, action: Action, draft: Draft<'_>) -> Html<String> {
    let Some(session) = state.session(jar).await else {
        return login_page(state, Some(AppError::NotLoggedIn.to_string()));
    };
    let mut session = session.lock().await;
    let outcome = state.assistant.dispatch(&mut session, action).await;
    render_page(state, &session, draft, Some(outcome))
}

// Main UI entry point
pub async fn index_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Html<String> {
    match state.session(&jar).await {
        Some(session) => {
            let session = session.lock().await;
            render_page(&state, &session, Draft::default(), None)
        }
        None => login_page(&state, None),
    }
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.log_in(jar, form.password).await {
        Ok(jar) => (jar, Redirect::to("/")).into_response(),
        Err(e) => login_page(&state, Some(e.to_string())).into_response(),
    }
}

pub async fn logout_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Redirect {
    state.log_out(&jar).await;
    Redirect::to("/")
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<QuestionForm>,
) -> Html<String> {
    let draft = Draft {
        question: Some(&form.question),
        sql: None,
    };
    let action = Action::Generate {
        question: form.question.clone(),
    };
    perform(&state, &jar, action, draft).await
}

pub async fn run_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SqlForm>,
) -> Html<String> {
    let draft = Draft {
        question: None,
        sql: Some(&form.sql),
    };
    let action = Action::Run {
        sql: form.sql.clone(),
    };
    perform(&state, &jar, action, draft).await
}

pub async fn rerun_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(index): Path<usize>,
) -> Html<String> {
    perform(&state, &jar, Action::Rerun { index }, Draft::default()).await
}

pub async fn clear_history_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> Html<String> {
    perform(&state, &jar, Action::ClearHistory, Draft::default()).await
}

pub async fn not_found_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let html = render_template(
        &state.template_env,
        "error.html",
        minijinja::context! { message => "Page not found" },
    );
    (StatusCode::NOT_FOUND, Html(html))
}
