use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songsmith_server::api;
use songsmith_server::backend::{MelodyBackend, RemoteMelodyBackend, SubprocessBackend};
use songsmith_server::config::{Config, MelodyBackendKind};
use songsmith_server::db;
use songsmith_server::repository::ArtifactStore;
use songsmith_server::score::{LilypondBackend, ScoreRenderer};
use songsmith_server::service::Pipeline;
use songsmith_server::speech::openai::OpenAiSpeechBackend;
use songsmith_server::text::TextGenerator;
use songsmith_server::text::openai::OpenAiTextBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songsmith_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Songsmith server...");

    let config = Config::load()?;

    if config.text.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; lyrics generation will fail");
    }

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let store = ArtifactStore::new(&config.results_dir);
    store
        .init()
        .await
        .context("Failed to create results directory")?;
    tracing::info!("Storing artifacts under {}", config.results_dir.display());

    let melody: Arc<dyn MelodyBackend> = match config.melody_backend {
        MelodyBackendKind::Remote => Arc::new(RemoteMelodyBackend::new(config.remote.clone())),
        MelodyBackendKind::Subprocess => {
            Arc::new(SubprocessBackend::new(config.subprocess.clone()))
        }
    };
    tracing::info!("Using {} melody backend", melody.name());

    let text = TextGenerator::new(
        Arc::new(OpenAiTextBackend::new(config.text.clone())),
        config.lyrics.clone(),
    );
    let scores = ScoreRenderer::new(Arc::new(LilypondBackend::new(config.score.clone())));

    let pipeline = Pipeline::new(
        pool,
        store,
        text,
        melody,
        scores,
        config.max_concurrent_generations,
    )
    .with_speech(Arc::new(OpenAiSpeechBackend::new(config.speech.clone())));

    // Build router with all API endpoints
    let app = api::create_router(pipeline);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
