use clap::Parser;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "gemini", "remote", or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// bcrypt hash of the shared access password
    pub password_hash: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    pub display_limit: usize,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchemaConfig {
    pub dialect: String,
    pub description_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub history: HistoryConfig,
    pub session: SessionConfig,
    pub schema: SchemaConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Plain environment variables used by existing deployments, mapped onto config keys.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("POSTGRES_USERNAME", "database.username"),
    ("POSTGRES_PASSWORD", "database.password"),
    ("POSTGRES_SERVER", "database.host"),
    ("POSTGRES_DATABASE", "database.database"),
    ("POSTGRES_PORT", "database.port"),
    ("GOOGLE_API_KEY", "llm.api_key"),
    ("HASHED_PASSWORD", "auth.password_hash"),
];

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // A local .env file is optional
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let mut config_builder = Self::defaults()?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-sql-assistant/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("NLSQL")
                .prefix_separator("__")
                .separator("__"),
        );
        config_builder = apply_env_overrides(config_builder, |name| std::env::var(name).ok())?;

        // Override with command line args if provided
        config_builder = config_builder
            .set_override_option("web.host", args.host.clone())?
            .set_override_option("web.port", args.port.map(i64::from))?;

        Self::build(config_builder)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.port", 5432)?
            .set_default("database.pool_size", 5)?
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8501)?
            .set_default("llm.backend", "gemini")?
            .set_default("llm.model", "gemini-2.0-flash")?
            .set_default("llm.temperature", 0.1)?
            .set_default("history.display_limit", 5)?
            .set_default("history.max_entries", 50)?
            .set_default("session.idle_timeout_secs", 3600)?
            .set_default("schema.dialect", "PostgreSQL")
    }

    /// Deserializes the merged sources and rejects missing secrets.
    pub fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database.username", self.database.username.as_str()),
            ("database.password", self.database.password.as_str()),
            ("database.host", self.database.host.as_str()),
            ("database.database", self.database.database.as_str()),
            ("auth.password_hash", self.auth.password_hash.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::NotFound(key.to_string()));
            }
        }

        let needs_key = matches!(self.llm.backend.as_str(), "gemini" | "remote");
        if needs_key && self.llm.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(ConfigError::NotFound("llm.api_key".to_string()));
        }

        if self.history.display_limit == 0 || self.history.max_entries < self.history.display_limit {
            return Err(ConfigError::Message(
                "history.max_entries must be at least history.display_limit, which must be positive"
                    .to_string(),
            ));
        }

        if self.session.idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "session.idle_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn apply_env_overrides<F>(
    mut builder: ConfigBuilder<DefaultState>,
    lookup: F,
) -> Result<ConfigBuilder<DefaultState>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (var, key) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, lookup(var))?;
    }
    Ok(builder)
}
