use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::executor::QueryResult;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryEntry {
    pub question: String,
    pub sql: String,
    pub row_count: usize,
    pub executed_at: DateTime<Utc>,
}

/// Everything one browser session knows between actions.
#[derive(Debug)]
pub struct SessionState {
    pub logged_in: bool,
    pub generated_sql: Option<String>,
    pub current_question: Option<String>,
    pub last_result: Option<QueryResult>,
    query_history: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl SessionState {
    pub fn new(max_entries: usize) -> Self {
        Self {
            logged_in: false,
            generated_sql: None,
            current_question: None,
            last_result: None,
            query_history: VecDeque::new(),
            max_entries,
        }
    }

    /// Drops the displayed SQL and result when `question` is not the current one.
    pub fn begin_question(&mut self, question: &str) {
        if self.current_question.as_deref() != Some(question) {
            if self.generated_sql.is_some() {
                debug!("Question changed, clearing stale SQL");
            }
            self.generated_sql = None;
            self.last_result = None;
        }
    }

    pub fn record_generation(&mut self, question: &str, sql: String) {
        self.current_question = Some(question.to_string());
        self.generated_sql = Some(sql);
    }

    /// Stores a successful execution: the SQL that ran becomes the displayed query.
    pub fn record_execution(&mut self, sql: &str, result: QueryResult) {
        let entry = HistoryEntry {
            question: self.current_question.clone().unwrap_or_default(),
            sql: sql.to_string(),
            row_count: result.row_count,
            executed_at: Utc::now(),
        };

        self.query_history.push_back(entry);
        while self.query_history.len() > self.max_entries {
            self.query_history.pop_front();
        }

        self.generated_sql = Some(sql.to_string());
        self.last_result = Some(result);
    }

    /// Retained history, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.query_history.iter().rev()
    }

    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history().take(limit).cloned().collect()
    }

    /// Entry at `index` counted from the most recent (0).
    pub fn history_entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.history().nth(index)
    }

    pub fn history_len(&self) -> usize {
        self.query_history.len()
    }

    pub fn clear_history(&mut self) {
        self.query_history.clear();
    }

    /// Revokes access and drops the displayed result. History is kept.
    pub fn log_out(&mut self) {
        self.logged_in = false;
        self.last_result = None;
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

struct Tracked {
    session: SharedSession,
    last_seen: Instant,
}

/// Authenticated sessions keyed by the id stored in the session cookie.
///
/// Anonymous visitors are never stored. An entry idle for longer than
/// `idle_timeout` is treated as absent and swept on the next login.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Tracked>>,
    max_entries: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(max_entries: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_entries,
            idle_timeout,
        }
    }

    /// A state that is not stored anywhere yet.
    pub fn blank(&self) -> SessionState {
        SessionState::new(self.max_entries)
    }

    /// Returns the live session stored under `id` and refreshes its idle timer.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let expired = match sessions.get_mut(&id) {
            Some(tracked) if now.duration_since(tracked.last_seen) < self.idle_timeout => {
                tracked.last_seen = now;
                return Some(Arc::clone(&tracked.session));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            sessions.remove(&id);
            info!("Session {} expired", id);
        }
        None
    }

    /// Stores an authenticated session under a newly generated id.
    ///
    /// A session already stored under `previous` moves to the new id and keeps
    /// its history; otherwise `verified` is stored. The old id stops working.
    pub async fn log_in(&self, previous: Option<Uuid>, verified: SessionState) -> (Uuid, SharedSession) {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, tracked| now.duration_since(tracked.last_seen) < self.idle_timeout);
        if sessions.len() < before {
            debug!("Evicted {} idle sessions", before - sessions.len());
        }

        let (session, moved) = match previous.and_then(|id| sessions.remove(&id)) {
            Some(tracked) => (tracked.session, true),
            None => (Arc::new(Mutex::new(verified)), false),
        };

        let id = Uuid::new_v4();
        sessions.insert(
            id,
            Tracked {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        drop(sessions);

        if moved {
            session.lock().await.logged_in = true;
        }
        info!("Started session {}", id);
        (id, session)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
