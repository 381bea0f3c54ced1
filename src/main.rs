use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use research_stream_lib::config::{ClientConfig, ConfigLoader};
use research_stream_lib::server::{self, ServerAppState};
use research_stream_lib::shutdown::{register_signal_handlers, ShutdownState};
use research_stream_lib::{
    controller_from_config, AgentState, AgentStatusRecord, HttpTransport, ResearchSnapshot,
    SessionLifecycle, TranscriptEntry,
};

/// Research Stream - terminal and browser client for the multi-agent research backend
#[derive(Parser, Debug)]
#[command(name = "research-stream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Research backend base URL
    #[arg(long, global = true, env = "RESEARCH_BACKEND_URL")]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a topic and print the conversation as it streams
    Run {
        /// Topic or question to research
        topic: String,
    },
    /// Check that the research backend is reachable
    Health,
    /// Serve the HTTP/WebSocket bridge for browser UIs
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        bind: Option<String>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(cli.config)?;
    if let Some(url) = cli.backend_url {
        config.backend.url = url;
    }

    match cli.command {
        Command::Run { topic } => run_research(&config, &topic).await,
        Command::Health => check_health(&config).await,
        Command::Serve { port, bind } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(&config).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}

fn shutdown_state() -> ShutdownState {
    let shutdown_state = ShutdownState::new();
    if let Err(e) = register_signal_handlers(shutdown_state.clone()) {
        log::warn!("Failed to register signal handlers: {}", e);
    }
    shutdown_state
}

async fn run_research(config: &ClientConfig, topic: &str) -> Result<ExitCode> {
    let controller = controller_from_config(config)?;
    let shutdown = shutdown_state();

    let mut updates = controller.subscribe();
    controller.start_research(topic)?;

    let mut printer = TranscriptPrinter::default();
    loop {
        let snapshot = updates.borrow_and_update().clone();
        printer.print(&snapshot);
        if !snapshot.is_loading {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.wait() => {
                eprintln!("Interrupted");
                return Ok(ExitCode::from(130));
            }
        }
    }

    match controller.lifecycle() {
        Some(SessionLifecycle::Completed) => {
            println!("\nResearch complete.");
            Ok(ExitCode::SUCCESS)
        }
        other => {
            let state = other.map(|l| l.as_str()).unwrap_or("unknown");
            eprintln!("\nResearch ended: {}", state);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints transcript entries once they are final and status changes as they
/// happen
#[derive(Default)]
struct TranscriptPrinter {
    printed: usize,
    status: Vec<AgentStatusRecord>,
}

impl TranscriptPrinter {
    fn print(&mut self, snapshot: &ResearchSnapshot) {
        for record in &snapshot.status {
            let previous = self
                .status
                .iter()
                .find(|r| r.agent_id == record.agent_id)
                .map(|r| r.state);
            if previous != Some(record.state)
                && (previous.is_some() || record.state != AgentState::Idle)
            {
                println!("  [{}] {}", record.agent_id, record.state);
            }
        }
        self.status = snapshot.status.clone();

        // Entries are printed in order; a partial entry holds back the rest
        for entry in snapshot.messages.iter().skip(self.printed) {
            if !entry.is_final {
                break;
            }
            print_entry(entry);
            self.printed += 1;
        }
    }
}

fn print_entry(entry: &TranscriptEntry) {
    let author = match entry.agent_id {
        _ if entry.is_user() => "You".to_string(),
        Some(agent) => agent.to_string(),
        None => "System".to_string(),
    };
    if entry.is_error() {
        println!("\n{} (error): {}", author, entry.content);
    } else {
        println!("\n{}:\n{}", author, entry.content);
    }
}

async fn check_health(config: &ClientConfig) -> Result<ExitCode> {
    let transport = HttpTransport::new(&config.backend)?;
    let health = transport
        .check_health()
        .await
        .map_err(|e| anyhow!("{} unreachable: {}", config.backend.health_url(), e))?;

    println!(
        "{}: {}{}",
        config.backend.url,
        health.status,
        health
            .service
            .as_deref()
            .map(|s| format!(" ({})", s))
            .unwrap_or_default()
    );
    Ok(if health.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(config: &ClientConfig) -> Result<ExitCode> {
    let controller = Arc::new(controller_from_config(config)?);
    let state = ServerAppState::new(controller, shutdown_state());

    server::run_server(&config.server, state)
        .await
        .map_err(|e| anyhow!(e))?;
    Ok(ExitCode::SUCCESS)
}
