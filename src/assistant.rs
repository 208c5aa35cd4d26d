use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::PasswordGate;
use crate::db::executor::{QueryExecutor, QueryResult};
use crate::error::AppError;
use crate::llm::LlmManager;
use crate::session::SessionState;

/// One user interaction that goes through [`Assistant::dispatch`].
#[derive(Debug, Clone)]
pub enum Action {
    Login { password: String },
    Generate { question: String },
    Run { sql: String },
    Rerun { index: usize },
    ClearHistory,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    LoggedIn,
    Generated { sql: String },
    Executed(QueryResult),
    HistoryCleared,
}

/// Applies actions to a session. Each action makes at most one LLM call and
/// at most one database call, and a failed action leaves history untouched.
pub struct Assistant {
    llm: LlmManager,
    executor: Arc<dyn QueryExecutor>,
    gate: PasswordGate,
}

fn require_login(session: &SessionState) -> Result<(), AppError> {
    if session.logged_in {
        Ok(())
    } else {
        Err(AppError::NotLoggedIn)
    }
}

impl Assistant {
    pub fn new(llm: LlmManager, executor: Arc<dyn QueryExecutor>, gate: PasswordGate) -> Self {
        Self { llm, executor, gate }
    }

    pub fn schema(&self) -> &str {
        self.llm.schema()
    }

    pub async fn dispatch(
        &self,
        session: &mut SessionState,
        action: Action,
    ) -> Result<Outcome, AppError> {
        match action {
            Action::Login { password } => self.login(session, &password),
            Action::Generate { question } => self
                .generate(session, &question)
                .await
                .map(|sql| Outcome::Generated { sql }),
            Action::Run { sql } => self.run(session, &sql).await.map(Outcome::Executed),
            Action::Rerun { index } => self.rerun(session, index).await.map(Outcome::Executed),
            Action::ClearHistory => {
                require_login(session)?;
                session.clear_history();
                info!("Query history cleared");
                Ok(Outcome::HistoryCleared)
            }
        }
    }

    fn login(&self, session: &mut SessionState, password: &str) -> Result<Outcome, AppError> {
        if self.gate.verify(password) {
            session.logged_in = true;
            Ok(Outcome::LoggedIn)
        } else {
            Err(AppError::AuthenticationFailure)
        }
    }

    /// Generates SQL for `question` and makes it the displayed query.
    pub async fn generate(&self, session: &mut SessionState, question: &str) -> Result<String, AppError> {
        require_login(session)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        session.begin_question(question);

        let sql = self.llm.generate_sql(question).await.map_err(|e| {
            warn!("SQL generation failed: {}", e);
            AppError::from(e)
        })?;

        session.record_generation(question, sql.clone());
        Ok(sql)
    }

    pub async fn run(&self, session: &mut SessionState, sql: &str) -> Result<QueryResult, AppError> {
        require_login(session)?;
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(AppError::EmptySql);
        }

        let result = self.executor.execute(sql).await?;
        session.record_execution(sql, result.clone());
        Ok(result)
    }

    /// Executes the SQL of history entry `index` (0 is the most recent) again.
    pub async fn rerun(&self, session: &mut SessionState, index: usize) -> Result<QueryResult, AppError> {
        require_login(session)?;
        let entry = session
            .history_entry(index)
            .cloned()
            .ok_or(AppError::HistoryEntryNotFound(index))?;

        info!("Re-running history entry {}: {}", index, entry.question);
        let result = self.executor.execute(&entry.sql).await?;

        session.current_question = Some(entry.question);
        session.record_execution(&entry.sql, result.clone());
        Ok(result)
    }
}
