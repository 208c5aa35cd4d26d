use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use minijinja::Environment;
use std::time::Duration;
use uuid::Uuid;

use crate::assistant::{Action, Assistant};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::session::{SessionStore, SharedSession};
use crate::web::templates::init_templates;

pub const SESSION_COOKIE: &str = "nlsql_session";

/// Shared application state for the web server
pub struct AppState {
    pub assistant: Assistant,
    pub sessions: SessionStore,
    pub template_env: Environment<'static>,
    pub display_limit: usize,
    pub llm_backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

impl AppState {
    pub fn new(config: &AppConfig, assistant: Assistant) -> Result<Self, minijinja::Error> {
        Ok(Self {
            assistant,
            sessions: SessionStore::new(
                config.history.max_entries,
                Duration::from_secs(config.session.idle_timeout_secs),
            ),
            template_env: init_templates()?,
            display_limit: config.history.display_limit,
            llm_backend: config.llm.backend.clone(),
            startup_time: chrono::Utc::now(),
        })
    }

    /// The stored session named by the caller's cookie, if it is still live.
    pub async fn session(&self, jar: &CookieJar) -> Option<SharedSession> {
        self.sessions.get(session_id(jar)?).await
    }

    /// Checks the password and, on success, issues a new session id in the cookie.
    pub async fn log_in(&self, jar: CookieJar, password: String) -> Result<CookieJar, AppError> {
        let mut verified = self.sessions.blank();
        self.assistant
            .dispatch(&mut verified, Action::Login { password })
            .await?;

        let (id, _) = self.sessions.log_in(session_id(&jar), verified).await;

        let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        Ok(jar.add(cookie))
    }

    pub async fn log_out(&self, jar: &CookieJar) {
        if let Some(session) = self.session(jar).await {
            session.lock().await.log_out();
        }
    }
}
