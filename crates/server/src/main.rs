//! Verdict Server
//!
//! Axum front end for the concept review workflow, plus a terminal mode that
//! runs one review and asks for the decision on stdin.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{prelude::*, EnvFilter};

use verdict_core::config::EngineConfig;
use verdict_core::skills::default_collaborators;
use verdict_core::state::{Decision, DecisionParseError, OutputKind};
use verdict_core::workflow::{Coordinator, Document, WorkflowEvent};

mod api;
mod config;
mod error;
mod reports;

use api::AppState;
use config::{PersistedConfig, DEFAULT_CONFIG_PATH};

const DEFAULT_LOG_FILTER: &str = "verdict=info,verdict_core=info,tower_http=info";
const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Clone)]
#[command(author, version, about = "Verdict - Concept review with human approval")]
struct Args {
    /// Persisted configuration file
    #[arg(long, global = true, env = "VERDICT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for final documents (overrides the config file)
    #[arg(long, global = true, env = "VERDICT_REPORTS_DIR")]
    reports_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Verdict server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        host: IpAddr,
    },
    /// Review one concept document in the terminal (no server)
    Review {
        /// Concept outline (markdown or plain text)
        file: PathBuf,
        /// Decide up front instead of answering on stdin
        #[arg(long, value_parser = parse_decision)]
        decision: Option<Decision>,
        /// Reviewer feedback recorded with the decision
        #[arg(long)]
        feedback: Option<String>,
    },
}

fn parse_decision(s: &str) -> Result<Decision, DecisionParseError> {
    s.parse()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

pub async fn run_server(
    addr: SocketAddr,
    engine: EngineConfig,
    config_path: PathBuf,
    reports_dir: PathBuf,
) -> anyhow::Result<()> {
    let collaborators = default_collaborators(&engine);
    let coordinator = Arc::new(Coordinator::new(engine, collaborators));

    tokio::spawn(reports::archive_completions(
        coordinator.subscribe(),
        Arc::new(reports_dir.clone()),
    ));

    let app = api::router(AppState::new(coordinator, config_path));

    println!("Verdict server running at http://{}", addr);
    println!("   Run:     /api/v1/run/start, /status, /approve, /cancel");
    println!("   Events:  /api/v1/run/events (SSE), /ws (WebSocket)");
    println!("   Config:  /api/v1/config (GET, PATCH), /api/v1/providers");
    println!("   OpenAPI: /api/v1/openapi.json");
    tracing::info!(%addr, reports_dir = %reports_dir.display(), "Server listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Run one review in the terminal
async fn run_review(
    file: &Path,
    mut decision: Option<Decision>,
    mut feedback: Option<String>,
    engine: EngineConfig,
    reports_dir: &Path,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let collaborators = default_collaborators(&engine);
    let coordinator = Coordinator::new(engine, collaborators);
    let mut events = coordinator.subscribe();
    let run_id = coordinator.start_run(Document::new(&name, content)).await?;
    println!("Reviewing {} (run {})", name, run_id);

    let mut last_step = String::new();
    while let Some(envelope) = events.recv().await {
        match envelope.event {
            WorkflowEvent::StatusUpdate { run } => {
                if run.current_step != last_step {
                    println!("[{:>3}%] {}", run.progress, run.current_step);
                    last_step = run.current_step;
                }
            }
            WorkflowEvent::OutputAdded { output } => match output.kind {
                OutputKind::AgentResult => {
                    println!("\n=== {} ===\n{}\n", output.source, output.content.trim())
                }
                OutputKind::Info => println!("  {}: {}", output.source, output.content),
                OutputKind::Error => eprintln!("  {}: {}", output.source, output.content),
            },
            WorkflowEvent::ApprovalRequest { question, .. } => {
                println!("\n{}", question);
                let chosen = match decision.take() {
                    Some(d) => d,
                    None => {
                        let d = prompt_decision().await?;
                        if feedback.is_none() {
                            let notes = prompt_line("Feedback (optional): ").await?;
                            feedback = Some(notes).filter(|n| !n.is_empty());
                        }
                        d
                    }
                };
                coordinator.submit_approval(chosen, feedback.take()).await?;
            }
            WorkflowEvent::Completion {
                result,
                final_document,
            } => {
                let path = reports::write_report(reports_dir, &final_document).await?;
                println!("\nResult: {:?}", result);
                println!("{} written to {}", final_document.title, path.display());
                return Ok(());
            }
            WorkflowEvent::Error { reason, .. } => bail!("Review failed: {}", reason),
        }
    }
    bail!("Event stream closed before the review finished")
}

async fn prompt_line(prompt: &'static str) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            bail!("stdin closed while waiting for input");
        }
        Ok(line.trim().to_string())
    })
    .await?
}

async fn prompt_decision() -> anyhow::Result<Decision> {
    loop {
        let answer = prompt_line("Approve this concept? [yes/no]: ").await?;
        match answer.parse::<Decision>() {
            Ok(decision) => return Ok(decision),
            Err(e) => eprintln!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Provider API keys come from the environment
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let persisted = PersistedConfig::load(&args.config).await?;
    let engine = persisted
        .to_engine_config()
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    let reports_dir = args
        .reports_dir
        .clone()
        .unwrap_or_else(|| persisted.reports_dir());

    match args.command.unwrap_or(CliCommand::Serve {
        port: DEFAULT_PORT,
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
    }) {
        CliCommand::Serve { port, host } => {
            run_server(SocketAddr::new(host, port), engine, args.config, reports_dir).await
        }
        CliCommand::Review {
            file,
            decision,
            feedback,
        } => run_review(&file, decision, feedback, engine, &reports_dir).await,
    }
}
