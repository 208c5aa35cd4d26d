use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod assistant;
mod auth;
mod config;
mod db;
mod error;
mod llm;
mod session;
mod util;
mod web;

use crate::assistant::Assistant;
use crate::auth::PasswordGate;
use crate::config::{AppConfig, CliArgs};
use crate::db::executor::PgExecutor;
use crate::llm::prompt::PromptBuilder;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration; any missing secret stops startup here
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let gate = PasswordGate::new(&config.auth.password_hash).map_err(|e| {
        error!("Configured password hash is not a valid bcrypt hash: {}", e);
        e
    })?;

    // The pool connects on first use and is shared by every session
    let pool = db::pool::create_lazy_pool(&config.database)?;
    let executor = Arc::new(PgExecutor::new(pool));

    info!("Initializing LLM provider with backend: {}", config.llm.backend);
    let provider = llm::provider_from_config(&config.llm)?;
    let prompts = PromptBuilder::from_config(&config.schema)?;
    let llm_manager = LlmManager::new(provider, prompts);

    let assistant = Assistant::new(llm_manager, executor, gate);
    let app_state = Arc::new(AppState::new(&config, assistant)?);

    // Start the web server
    info!("Starting SQL assistant on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
