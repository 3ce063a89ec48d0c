use anyhow::Result;
use axum::Router;
use clap::Parser;
use retrieval::persist::{load_snapshot, save_snapshot, SnapshotPaths};
use retrieval::{Engine, EngineConfig, TokenizerConfig};
use server::{build_app, shutdown_signal, AppSettings, DEFAULT_TIMEOUT_MS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Default number of search results
    #[arg(long, default_value_t = retrieval::config::DEFAULT_K)]
    k: usize,
    /// BM25 term frequency saturation
    #[arg(long, default_value_t = retrieval::config::BM25_K1)]
    k1: f64,
    /// BM25 length normalization
    #[arg(long, default_value_t = retrieval::config::BM25_B)]
    b: f64,
    /// Supplementary vocabulary for Chinese segmentation
    #[arg(long)]
    user_dict: Option<PathBuf>,
    /// Snapshot directory, loaded at startup and written on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Per-request search deadline in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = EngineConfig { default_k: args.k, k1: args.k1, b: args.b };
    let tokenizer = TokenizerConfig { user_dict: args.user_dict.clone(), ..TokenizerConfig::default() };
    let engine = Arc::new(Engine::with_tokenizer_config(config, &tokenizer)?);

    if let Some(dir) = &args.snapshot {
        let paths = SnapshotPaths::new(dir);
        if paths.exists() {
            engine.restore(load_snapshot(&paths)?)?;
            tracing::info!(snapshot = %dir.display(), num_docs = engine.len(), "snapshot restored");
        }
    }

    let settings = AppSettings::from_env(Duration::from_millis(args.timeout_ms));
    let app: Router = build_app(Arc::clone(&engine), settings);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(dir) = &args.snapshot {
        save_snapshot(&SnapshotPaths::new(dir), &engine.snapshot())?;
        tracing::info!(snapshot = %dir.display(), num_docs = engine.len(), "snapshot written");
    }
    Ok(())
}
