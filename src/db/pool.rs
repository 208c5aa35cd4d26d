use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Build a connection string with URL-encoded credentials.
pub fn connection_string(config: &DatabaseConfig) -> String {
    let username = urlencoding::encode(&config.username);
    let password = urlencoding::encode(&config.password);

    format!(
        "postgres://{}:{}@{}:{}/{}",
        username, password, config.host, config.port, config.database
    )
}

/// Same as `connection_string` with the password masked, for logs.
pub fn redacted_connection_string(config: &DatabaseConfig) -> String {
    format!(
        "postgres://{}:****@{}:{}/{}",
        urlencoding::encode(&config.username),
        config.host,
        config.port,
        config.database
    )
}

/// Creates the process-wide pool without connecting; the first query opens it.
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        "Configuring PostgreSQL pool for {} (max {} connections)",
        redacted_connection_string(config),
        config.pool_size
    );

    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect_lazy(&connection_string(config))
}
