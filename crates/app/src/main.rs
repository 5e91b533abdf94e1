use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::warn!("no server settings found, nothing to run");
        return Ok(());
    };
    tracing::info!("Found server settings...");

    let db = parse_database(&server.database).await.inspect_err(|err| {
        tracing::error!("failed to initialize database: {err}");
    })?;

    let mut builder = engine::Engine::builder()
        .database(db)
        .lock_strategy(server.ledger.lock_strategy);
    if let Some(timeout_ms) = server.ledger.lock_timeout_ms {
        builder = builder.lock_timeout(Duration::from_millis(timeout_ms));
    }
    let engine = builder.build().await.inspect_err(|err| {
        tracing::error!("failed to build engine from database: {err}");
    })?;

    if server.tokens.is_empty() {
        tracing::warn!("no tokens configured, every request will be rejected");
    }

    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|err| tracing::error!("failed to bind server listener: {err}"))?;

    let state = server::ServerState::new(engine, server.tokens);
    tokio::select! {
        result = server::run_with_listener(state, listener) => {
            if let Err(err) = &result {
                tracing::error!("server failed: {err}");
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = match config {
        Database::Memory => sea_orm::ConnectOptions::new("sqlite::memory:"),
        Database::Sqlite(path) => sea_orm::ConnectOptions::new(format!("sqlite:{}?mode=rwc", path)),
    };
    // SQLite admits one writer at a time, and every pooled connection to an
    // in-memory database would see its own empty copy.
    options.max_connections(1);

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
