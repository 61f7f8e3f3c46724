use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::DatabaseConfig;

/// Opens the connection pool and checks the database answers before the
/// server starts taking requests.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(config.url());
    opts.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(true);

    let db = Database::connect(opts)
        .await
        .with_context(|| format!("connecting to {}:{}/{}", config.host, config.port, config.name))?;

    db.ping().await.context("database ping")?;
    tracing::info!(host = %config.host, port = config.port, db = %config.name, "database ready");

    Ok(db)
}
