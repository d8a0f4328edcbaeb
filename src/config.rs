use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Sentiment classification over HTTP.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Settings {
    /// Directory holding config.json, tokenizer.json and the model weights.
    #[arg(long, env = "MODEL_PATH", default_value = "./model/sentiment_model/")]
    pub model_path: PathBuf,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// The only origin allowed to make cross-origin requests.
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Run on the CPU even if an accelerator is available.
    #[arg(long, env = "FORCE_CPU")]
    pub cpu: bool,
}
