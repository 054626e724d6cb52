use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod db;
mod engine;
mod odds;

use api::AppState;
use config::Config;
use db::Database;
use engine::settlement::PayoutSettings;
use engine::PickemEngine;
use odds::{spawn_scheduler, Ingestor, OddsApiClient, SeasonCalendar};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let engine = PickemEngine::new(
        db,
        config.push_rule,
        PayoutSettings {
            dollar_per_point: config.default_dollar_per_point,
            weekly_bonus: config.default_weekly_bonus,
        },
    );
    info!("Grading with push rule {:?}", config.push_rule);

    let api_key = config.odds_api_key.clone().unwrap_or_else(|| {
        warn!("ODDS_API_KEY not set; odds and score refreshes will fail");
        String::new()
    });
    let client = OddsApiClient::new(&config.odds_api_url, &api_key, &config.sport_key)?;
    let ingestor = Arc::new(Ingestor::new(
        Arc::new(client),
        engine.clone(),
        SeasonCalendar::new(config.season_start, config.season_weeks),
        &config.bookmaker,
        chrono::Duration::minutes(config.line_lock_minutes),
        config.scores_days_from,
    ));

    // Picks on games that went final while the server was down
    engine.grade_pending()?;

    if config.disable_scheduler {
        info!("Background scheduler disabled");
    } else {
        spawn_scheduler(
            ingestor.clone(),
            Duration::from_secs(config.scheduler_tick_secs),
        );
    }

    let app = api::router(AppState { engine, ingestor }, config.static_dir.as_deref());
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("League API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
