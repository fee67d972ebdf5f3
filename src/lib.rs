pub mod api;
pub mod config;
pub mod export;
pub mod pipeline;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::server::ServerError;
use crate::api::ApiContext;
use crate::config::AppConfig;
use crate::pipeline::engines::{EngineError, Engines};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engines(#[from] EngineError),

    #[error("Engine initialization task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Initialize tracing, build the engines and serve until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    std::fs::create_dir_all(config.uploads_dir())?;
    std::fs::create_dir_all(config.results_dir())?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        max_upload_mb = config.max_upload_mb(),
        "Configuration loaded"
    );

    // Engine construction blocks (tesseract probe, PDFium load, blocking HTTP client).
    let engine_config = config.clone();
    let engines =
        tokio::task::spawn_blocking(move || Engines::initialize(&engine_config)).await??;

    let ctx = ApiContext::from_engines(engines, &config);
    api::serve(ctx, config.bind_addr).await?;
    Ok(())
}
