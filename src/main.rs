// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use mnemo::config::CONFIG;
use mnemo::memory::estimator::HeuristicEstimator;
use mnemo::memory::summarization::fallback::ExtractiveSummarizer;

#[derive(Debug, Parser)]
#[command(name = "mnemo", about = "Token-budget memory store and retrieval service")]
struct Args {
    /// Bind host (overrides MNEMO_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides MNEMO_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let database_url = args.database_url.unwrap_or_else(|| CONFIG.database_url.clone());
    info!("Starting mnemo (database: {})", database_url);

    // Create database pool
    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.sqlite_max_connections)
        .connect(&database_url)
        .await?;

    // External collaborators: a heuristic token estimator and an extractive
    // fallback summarizer. Both sit behind traits; a model-backed pair can
    // replace them without touching the core.
    let estimator = Arc::new(HeuristicEstimator);
    let summarizer = Arc::new(ExtractiveSummarizer::new(estimator.clone()));

    let app_state = Arc::new(mnemo::state::create_app_state(pool, summarizer, estimator).await?);

    let app: Router = mnemo::api::http::router::http_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(CONFIG.request_timeout_secs)))
        .layer(CorsLayer::permissive());

    // Start server
    let host = args.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = args.port.unwrap_or(CONFIG.port);
    let bind_address = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("HTTP server listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
