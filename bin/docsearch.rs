use anyhow::Result;
use clap::Parser;
use docsearch::{
    create_router, AppState, IndexSettings, ReconstructPolicy, SearchEngine, ServiceMetrics,
    TokenizerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Full-text JSON document indexing and retrieval service", long_about = None)]
struct Args {
    /// Directory holding the index
    #[arg(long, env = "DOCSEARCH_STORAGE", default_value = "logs.index")]
    storage_location: PathBuf,

    /// HTTP API port
    #[arg(long, env = "DOCSEARCH_HTTP_PORT", default_value = "9000")]
    http_port: u16,

    /// Attempts at the writer lock before giving up
    #[arg(long, env = "DOCSEARCH_OPEN_RETRIES", default_value = "5")]
    open_retries: u32,

    /// Delay between writer lock attempts
    #[arg(long, env = "DOCSEARCH_OPEN_BACKOFF_MS", default_value = "20")]
    open_backoff_ms: u64,

    /// Longest accepted query, in bytes
    #[arg(long, env = "DOCSEARCH_MAX_QUERY_LEN", default_value = "1024")]
    max_query_len: usize,

    /// Stem tokens at index and query time
    #[arg(long, env = "DOCSEARCH_STEM")]
    stem: bool,

    /// Keep stopwords instead of dropping them
    #[arg(long, env = "DOCSEARCH_KEEP_STOPWORDS")]
    keep_stopwords: bool,

    /// Fail document reconstruction on undecodable stored values
    #[arg(long, env = "DOCSEARCH_STRICT_RECONSTRUCT")]
    strict_reconstruct: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting docsearch v{}", docsearch::VERSION);

    let tokenizer = TokenizerConfig {
        stem: args.stem,
        remove_stopwords: !args.keep_stopwords,
        ..TokenizerConfig::default()
    };
    let policy = if args.strict_reconstruct {
        ReconstructPolicy::Strict
    } else {
        ReconstructPolicy::DropInvalid
    };
    let settings = IndexSettings::new(&args.storage_location)
        .with_tokenizer(tokenizer)
        .with_reconstruct_policy(policy)
        .with_max_query_len(args.max_query_len)
        .with_open_retries(args.open_retries, args.open_backoff_ms);

    info!("Index settings:");
    info!("  Storage location: {:?}", settings.storage.location);
    info!("  Stemming: {}", settings.tokenizer_config.stem);
    info!("  Reconstruct policy: {:?}", settings.reconstruct_policy);

    let engine = Arc::new(tokio::task::spawn_blocking(move || SearchEngine::open(settings)).await??);

    let metrics = Arc::new(ServiceMetrics::new()?);
    let stats = engine.stats()?;
    metrics.set_index_stats(stats.documents, stats.archive_bytes);
    info!(documents = stats.documents, "Metrics initialized");

    let app = create_router(AppState {
        engine: engine.clone(),
        metrics,
    });
    let http_addr = format!("0.0.0.0:{}", args.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!("HTTP API server listening on {}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal, gracefully shutting down");
        })
        .await?;

    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.close()?,
        Err(_) => warn!("Engine still referenced at shutdown, skipping explicit close"),
    }
    Ok(())
}
