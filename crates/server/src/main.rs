use anyhow::Context;
use db::DBService;
use server::{AppState, app};
use services::services::{bootstrap, config::AppConfig, database_validator::DatabaseValidator};
use tracing::{info, warn};
use utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;

    let report = DatabaseValidator::new(db.pool.clone()).validate().await?;
    if report.is_ok() {
        info!("{}", report.summary());
    } else {
        warn!(
            missing_tables = ?report.missing_tables,
            pending = ?report.pending_migrations,
            "{}",
            report.summary()
        );
    }

    if let Some(admin) = bootstrap::run(&db.pool, config.admin.as_ref()).await? {
        info!(user_id = %admin.id, email = %admin.email, "Bootstrap admin created");
    }

    let addr = config.socket_addr()?;
    let state = AppState::new(db, config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
