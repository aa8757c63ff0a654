mod health;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use dealsense_core::config::{AppConfig, LoadOptions, LogFormat};
use dealsense_engine::{Intelligence, Notifier, NullNotifier, WebhookNotifier};

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let pool = dealsense_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .context("database connection failed")?;
    dealsense_db::migrations::run_pending(&pool).await.context("migrations failed")?;

    let notifier: Arc<dyn Notifier> = match &config.intelligence.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NullNotifier),
    };
    let engine = Arc::new(Intelligence::new(pool.clone(), &config, notifier));

    let state = routes::AppState { engine, pool };
    let app = routes::router(state);

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener =
        tokio::net::TcpListener::bind(&address).await.context("could not bind server address")?;

    tracing::info!(
        event_name = "system.server.started",
        address = %address,
        "dealsense server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server terminated unexpectedly")?;

    tracing::info!(event_name = "system.server.stopped", "dealsense server stopped");
    Ok(())
}
