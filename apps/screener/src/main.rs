mod config;
mod errors;
mod extract;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::screening::cleanup::CleanupPolicy;
use crate::screening::pipeline::{run_batch, BatchSettings, ScoringMode};
use crate::screening::scorer::{Scorer, ScorerSettings};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "screener", version, about = "Score a folder of CVs against a job description")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score every CV in the uploads folder and write a ranked CSV report.
    Run {
        #[arg(long)]
        uploads: Option<PathBuf>,
        #[arg(long)]
        job: Option<PathBuf>,
        #[arg(long)]
        cache: Option<PathBuf>,
        #[arg(long)]
        report_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ScoringMode::Upload)]
        mode: ScoringMode,
        #[arg(long, value_enum, default_value_t = CleanupPolicy::Ask)]
        cleanup: CleanupPolicy,
    },
    /// Serve the single-document HTTP API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run {
            uploads,
            job,
            cache,
            report_dir,
            mode,
            cleanup,
        } => {
            let settings = BatchSettings {
                uploads_dir: uploads.unwrap_or_else(|| config.uploads_dir.clone()),
                job_file: job.unwrap_or_else(|| config.job_file.clone()),
                cache_file: cache.unwrap_or_else(|| config.cache_file.clone()),
                report_dir: report_dir.unwrap_or_else(|| config.report_dir.clone()),
                cache_key: config.cache_key,
                mode,
                cleanup,
                file_delay: config.file_delay,
            };
            run(&config, settings).await
        }
        Commands::Serve { port } => serve(config, port).await,
    }
}

async fn run(config: &Config, settings: BatchSettings) -> Result<()> {
    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));
    let client = Arc::new(LlmClient::new(
        config.require_api_key()?,
        &config.openai_base_url,
        &config.model,
    ));
    info!("LLM client initialized (model: {})", client.model());

    let scorer = Scorer::new(
        client.clone(),
        ScorerSettings {
            retry_delay: config.retry_delay,
            ..ScorerSettings::default()
        },
    );

    match until_interrupted(
        run_batch(&settings, &scorer, client.as_ref()),
        tokio::signal::ctrl_c(),
    )
    .await
    {
        Some(report) => report.map(|_| ()),
        None => {
            warn!("Analysis stopped by user");
            // A pending cleanup prompt holds a blocking stdin read that runtime
            // shutdown would wait on.
            std::process::exit(0)
        }
    }
}

/// Races `work` against `interrupt`; `None` when the interrupt fires first.
async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future,
) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        _ = interrupt => None,
    }
}

async fn serve(config: Config, port: Option<u16>) -> Result<()> {
    info!("Starting screener API v{}", env!("CARGO_PKG_VERSION"));
    let port = port.unwrap_or(config.port);

    let app = build_router(AppState::new(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
