// src/utils/db_connect.rs
use anyhow::{Context, Result};
use bb8::{Pool, RunError};
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Builds the PostgreSQL config from `DATABASE_URL` when present, otherwise
/// from the individual `POSTGRES_*` variables.
pub fn build_pg_config() -> Result<Config> {
    let mut config = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            info!("DB Config: using DATABASE_URL");
            Config::from_str(url.trim()).context("Invalid DATABASE_URL")?
        }
        _ => {
            let mut config = Config::new();
            let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = std::env::var("POSTGRES_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse::<u16>()
                .unwrap_or(5432);
            let dbname = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "postgres".to_string());
            let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
            let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

            info!(
                "DB Config: Host={}, Port={}, DB={}, User={}",
                host, port, dbname, user
            );
            config
                .host(&host)
                .port(port)
                .dbname(&dbname)
                .user(&user)
                .password(&password);
            config
        }
    };
    config.application_name("landplot_matching");
    config.connect_timeout(Duration::from_secs(10));
    Ok(config)
}

pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config()?;
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let pool = Pool::builder()
        .max_size(10)
        .min_idle(Some(1))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    drop(conn);
    info!("Database connection pool initialized successfully.");
    Ok(pool)
}

/// Returns `(total, idle, in_use)` connection counts.
pub fn get_pool_status(pool: &PgPool) -> (u32, u32, u32) {
    let state = pool.state();
    (
        state.connections,
        state.idle_connections,
        state.connections - state.idle_connections,
    )
}

/// Pool checkout failures and closed connections. Batch jobs stop on
/// these; any other error belongs to the row being written.
pub fn is_connection_error(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<RunError<tokio_postgres::Error>>().is_some() {
        return true;
    }
    err.downcast_ref::<tokio_postgres::Error>()
        .map_or(false, |e| e.is_closed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_connection_error_classification() {
        let pool_timeout: Result<()> =
            Err(RunError::<tokio_postgres::Error>::TimedOut).context("Failed to get DB connection");
        assert!(is_connection_error(&pool_timeout.unwrap_err()));

        let row_failure = anyhow::anyhow!("duplicate key value violates unique constraint")
            .context("Failed to update bundle link of parcel");
        assert!(!is_connection_error(&row_failure));
    }

    #[test]
    fn test_pg_config_from_individual_vars() {
        env::remove_var("DATABASE_URL");
        env::set_var("POSTGRES_HOST", "db.internal");
        env::set_var("POSTGRES_PORT", "6543");
        env::set_var("POSTGRES_DB", "plots");
        env::set_var("POSTGRES_USER", "loader");

        let config = build_pg_config().unwrap();
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_dbname(), Some("plots"));
        assert_eq!(config.get_user(), Some("loader"));
        assert_eq!(config.get_application_name(), Some("landplot_matching"));

        env::remove_var("POSTGRES_HOST");
        env::remove_var("POSTGRES_PORT");
        env::remove_var("POSTGRES_DB");
        env::remove_var("POSTGRES_USER");
    }
}
