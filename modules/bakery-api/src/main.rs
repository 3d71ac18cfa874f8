use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bakery_api::{router, scheduler, AppState};
use bakery_common::{load_config, AppConfig, FileConfig};
use bakery_escalation::{Bakery, BakeryDeps, NoopBackend, NotifyBackend, NotifyRouter, RuleSet};
use bakery_store::{PgNotificationStore, PgOrderStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bakery=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    config.log_redacted();

    let file_config = match &config.config_path {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let rules = match &file_config.rules_path {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::defaults()?,
    };
    info!(rules = rules.len(), "Loaded trigger rules");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    let backend: Arc<dyn NotifyBackend> = match NotifyRouter::from_config(&config) {
        Some(router) => {
            info!("Slack forwarding enabled");
            Arc::new(router)
        }
        None => Arc::new(NoopBackend),
    };

    let bakery = Bakery::new(
        BakeryDeps::builder()
            .orders(Arc::new(PgOrderStore::new(pool.clone())))
            .notifications(Arc::new(PgNotificationStore::new(pool)))
            .rules(rules)
            .config(file_config)
            .backend(backend)
            .build(),
    );
    let state = Arc::new(AppState { bakery });

    if config.scan_enabled {
        scheduler::spawn_scan_loop(state.clone(), config.scan_interval, config.scan_initial_delay);
    }

    let app = router(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Bakery API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
