mod classifier;
mod config;
mod labels;
mod model;
mod prediction;
mod server;

use crate::classifier::{Device, SentimentClassifier};
use crate::config::Settings;
use crate::server::AppState;
use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sentiment_api=info".parse()?),
        )
        .init();

    let settings = Settings::parse();
    let cors_origin = HeaderValue::from_str(&settings.cors_origin)
        .with_context(|| format!("invalid CORS origin {:?}", settings.cors_origin))?;

    let device = if settings.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available(0)?
    };
    info!(path = %settings.model_path.display(), ?device, "loading model");

    // Nothing listens until the model has loaded and answered once.
    let classifier = SentimentClassifier::load(&settings.model_path, device)
        .with_context(|| format!("failed to load model from {}", settings.model_path.display()))?;
    classifier.warm_up().context("model failed its startup check")?;

    let app = server::router(AppState::new(Arc::new(classifier)), cors_origin);
    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    info!(addr = %settings.bind, origin = %settings.cors_origin, "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler, it will not drain the server: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
