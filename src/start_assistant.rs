//! Startup helpers for the assistant server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::memory::core::config::AssistantConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl+C (used by the `offline-assistant` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting offline assistant v{}", env!("CARGO_PKG_VERSION"));

    let config = match AssistantConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the database or the Ollama client cannot be set up.
pub async fn initialize(config: &AssistantConfig) -> anyhow::Result<Arc<AppState>> {
    tracing::info!("Ollama endpoint: {}", config.llm.base_url);
    tracing::info!("Database: {}", config.storage.sqlite_path.display());

    let state = AppState::new(config)
        .await
        .context("failed to create application state")?;

    match &state.ollama {
        Some(ollama) if ollama.is_ready().await => {
            tracing::info!("Ollama is reachable, model {}", ollama.model());
        }
        _ => tracing::warn!("Ollama is not reachable yet; chat replies will report the error"),
    }

    Ok(state)
}

async fn serve(config: AssistantConfig) -> anyhow::Result<()> {
    let state = initialize(&config).await?;
    server::run_server_with_shutdown(state, &config.server, shutdown_signal())
        .await
        .with_context(|| format!("failed to serve on port {}", config.server.port))?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
