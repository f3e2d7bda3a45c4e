use crate::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, warn};

/// Connection pool for the relational sink. Connects lazily, so the service
/// starts while the database is still down and each load reports its own
/// connection failure.
pub async fn setup_database(config: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", config.redacted_url());

    let mut opt = ConnectOptions::new(config.connection_url());
    opt.max_connections(5)
        .min_connections(0)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_lazy(true)
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    if db.ping().await.is_ok() {
        info!("✅ Database reachable");
    } else {
        warn!("⚠️  Database unreachable at startup; loads will fail until it is up");
    }

    Ok(db)
}
