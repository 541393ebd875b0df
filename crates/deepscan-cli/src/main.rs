//! deepscan CLI: submit media for deepfake analysis and browse past results.
//!
//! Configuration comes from DEEPSCAN_* variables (see `ClientConfig::from_env`);
//! `--backend` and `--api-url` override them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use deepscan_api_client::history::DEFAULT_PAGE_SIZE;
use deepscan_api_client::{
    AnalysisService, AnalysisSession, ApiClient, HistoryStore, HttpAnalysisService,
    InMemoryHistory, MockAnalysisService, MockConfig, RemoteHistory,
};
use deepscan_cli::{format_deleted, format_history_table, format_megabytes, init_tracing};
use deepscan_core::models::{AnalysisId, MediaCandidate};
use deepscan_core::presentation::render_summary;
use deepscan_core::{
    AcceptPolicy, AppError, Backend, ClientConfig, ErrorMetadata, UploadPolicy, WorkflowState,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "deepscan", about = "Deepfake detection client")]
struct Cli {
    /// Analysis backend: mock or http (overrides DEEPSCAN_BACKEND)
    #[arg(long, global = true)]
    backend: Option<Backend>,
    /// Base URL of the analysis service (overrides DEEPSCAN_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an image or video file
    Analyze {
        /// Path to the file to analyze
        file: PathBuf,
        /// Only accept video files (mp4, mov, avi)
        #[arg(long)]
        video_only: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse past analyses
    History {
        #[command(subcommand)]
        sub: HistoryCommands,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List analyses, most recent first
    List {
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show one analysis
    Get {
        /// Analysis ID
        id: AnalysisId,
        #[arg(long)]
        json: bool,
    },
    /// Delete one analysis
    Delete {
        /// Analysis ID
        id: AnalysisId,
        #[arg(long)]
        json: bool,
    },
}

/// Service and history for the selected backend.
struct Backends {
    service: Arc<dyn AnalysisService>,
    history: Arc<dyn HistoryStore>,
}

impl Backends {
    fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        match config.backend {
            Backend::Mock => {
                let history = Arc::new(if config.seed_history {
                    InMemoryHistory::with_samples()
                } else {
                    InMemoryHistory::new()
                });
                let service = MockAnalysisService::new(history.clone(), MockConfig::from(config));
                Ok(Self {
                    service: Arc::new(service),
                    history,
                })
            }
            Backend::Http => {
                let client = ApiClient::from_config(config)
                    .map_err(user_error)
                    .context("Failed to create API client")?;
                Ok(Self {
                    service: Arc::new(HttpAnalysisService::new(client.clone())),
                    history: Arc::new(RemoteHistory::new(client)),
                })
            }
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Client-facing message plus the suggested action, if any.
fn user_error(err: AppError) -> anyhow::Error {
    match err.suggested_action() {
        Some(action) => anyhow::anyhow!("{} ({})", err.client_message(), action),
        None => anyhow::anyhow!(err.client_message()),
    }
}

async fn run_analysis(
    backends: &Backends,
    config: &ClientConfig,
    file: PathBuf,
    video_only: bool,
    json: bool,
) -> anyhow::Result<()> {
    let policy = if video_only {
        UploadPolicy::new(AcceptPolicy::Video, config.max_file_size_bytes)
    } else {
        config.upload_policy()
    };
    let session = AnalysisSession::new(backends.service.clone(), policy)
        .with_analysis_timeout(config.analysis_timeout());

    let candidate = MediaCandidate::from_path(&file, policy.max_file_size()).map_err(user_error)?;
    let staged = session.select_file(candidate).await.map_err(user_error)?;
    if !json {
        eprintln!(
            "Analyzing {} ({}, {})",
            staged.name(),
            staged.content_type(),
            format_megabytes(staged.size())
        );
    }

    let mut updates = session.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().state().clone();
            match state {
                WorkflowState::Analyzing { progress, .. } => {
                    if !json {
                        eprint!("\rUploading... {:>3}%", progress);
                        let _ = std::io::stderr().flush();
                    }
                }
                _ => break,
            }
        }
    });

    let outcome = tokio::select! {
        outcome = session.analyze() => outcome,
        _ = tokio::signal::ctrl_c() => {
            session.reset().await;
            Err(AppError::Cancelled)
        }
    };
    progress.abort();
    if !json {
        eprintln!();
    }

    let result = outcome.map_err(user_error)?;
    if json {
        print_json(&result)?;
    } else {
        print!("{}", render_summary(&result));
    }
    Ok(())
}

async fn run_history(backends: &Backends, sub: HistoryCommands) -> anyhow::Result<()> {
    match sub {
        HistoryCommands::List { page, limit, json } => {
            let listing = backends
                .history
                .list(page, limit)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&listing)?;
            } else {
                print!("{}", format_history_table(&listing));
            }
        }
        HistoryCommands::Get { id, json } => {
            let result = backends.history.get(id).await.map_err(user_error)?;
            if json {
                print_json(&result)?;
            } else {
                println!(
                    "#{} {} ({}, {})",
                    result.id,
                    result.filename,
                    result.file_type,
                    format_megabytes(result.file_size)
                );
                println!("Analyzed {}\n", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
                print!("{}", render_summary(&result));
            }
        }
        HistoryCommands::Delete { id, json } => {
            backends.history.delete(id).await.map_err(user_error)?;
            let message = format_deleted(id);
            if json {
                print_json(&serde_json::json!({ "success": true, "message": message }))?;
            } else {
                println!("{}", message);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid DEEPSCAN_* configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
    }
    config.validate().context("Invalid configuration")?;

    tracing::debug!(backend = %config.backend, api_url = %config.api_url, "Configuration loaded");
    let backends = Backends::from_config(&config)?;

    match cli.command {
        Commands::Analyze {
            file,
            video_only,
            json,
        } => run_analysis(&backends, &config, file, video_only, json).await?,
        Commands::History { sub } => run_history(&backends, sub).await?,
    }

    Ok(())
}
