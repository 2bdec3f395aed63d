use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use solvr::app::run_chat;
use solvr::client::RelayClient;
use solvr::config::{API_KEY_ENV, Config};
use solvr::events::Subject;
use solvr::image::ImageAttachment;
use solvr::llm::LlmClient;
use solvr::relay::{Relay, Solver};
use solvr::server::{self, ServerState};
use solvr::session::{ChatSession, SubmitOutcome};
use solvr::ui::text::marked_text;

#[derive(Parser)]
#[command(name = "solvr")]
#[command(version)]
#[command(about = "Step-by-step math, chemistry and biology solutions from an LLM", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of ~/.solvr/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat screen (default)
    Chat {
        #[arg(long, value_parser = parse_subject)]
        subject: Option<Subject>,
        /// Send questions to a running `solvr serve` instead of the model API
        #[arg(long)]
        relay_url: Option<String>,
    },
    /// Run the HTTP relay (`POST /api/solve`)
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ask one question and print the answer
    Ask {
        question: Option<String>,
        #[arg(long, value_parser = parse_subject)]
        subject: Option<Subject>,
        /// Image file to analyse with the question
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        relay_url: Option<String>,
    },
    /// Write a default config file if none exists
    Init,
}

fn parse_subject(raw: &str) -> Result<Subject, String> {
    Subject::from_tag(raw).ok_or_else(|| format!("unknown subject '{raw}' (expected math, chem or bio)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command.unwrap_or(Commands::Chat {
        subject: None,
        relay_url: None,
    }) {
        Commands::Chat { subject, relay_url } => {
            init_file_logging(cli.verbose, &config)?;
            let (solver, backend) = build_solver(&config, relay_url)?;
            let session = ChatSession::new(solver, subject.unwrap_or(config.default_subject));
            run_chat(session, backend).await
        }
        Commands::Serve { bind } => {
            init_logging(cli.verbose.max(1));
            if !config.has_api_key() {
                tracing::warn!("no API key configured; set openai_api_key or {API_KEY_ENV}");
            }
            let relay = Relay::new(Arc::new(LlmClient::new(&config)?), config.temperature);
            let addr = bind.unwrap_or_else(|| config.bind.clone());
            server::serve(&addr, ServerState::new(Arc::new(relay))).await
        }
        Commands::Ask {
            question,
            subject,
            image,
            relay_url,
        } => {
            init_logging(cli.verbose);
            ask(&config, question, subject, image, relay_url).await
        }
        Commands::Init => {
            init_logging(cli.verbose);
            let path = config.config_path();
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                config.save()?;
                println!("Wrote default config to {}", path.display());
            }
            Ok(())
        }
    }
}

/// The in-process relay, or a client for a remote one when a relay URL is set.
fn build_solver(config: &Config, relay_url: Option<String>) -> Result<(Arc<dyn Solver>, String)> {
    match relay_url.or_else(|| config.relay_url.clone()) {
        Some(url) => {
            let client = RelayClient::new(&url, config.request_timeout_secs)?;
            let label = client.endpoint().to_string();
            Ok((Arc::new(client), label))
        }
        None => {
            if !config.has_api_key() {
                tracing::warn!("no API key configured; questions will fail until {API_KEY_ENV} is set");
            }
            let relay = Relay::new(Arc::new(LlmClient::new(config)?), config.temperature);
            let label = relay.model_name().to_string();
            Ok((Arc::new(relay), label))
        }
    }
}

async fn ask(
    config: &Config,
    question: Option<String>,
    subject: Option<Subject>,
    image: Option<PathBuf>,
    relay_url: Option<String>,
) -> Result<()> {
    let image = image
        .map(|path| ImageAttachment::from_path(&path))
        .transpose()
        .context("Failed to load image")?;
    let question = question.unwrap_or_default();
    if question.trim().is_empty() && image.is_none() {
        bail!("nothing to ask: give a question, an --image, or both");
    }

    let (solver, _) = build_solver(config, relay_url)?;
    let mut session = ChatSession::new(solver, subject.unwrap_or(config.default_subject));

    let outcome = session.ask(question, image).await;
    let answer = session
        .transcript()
        .last()
        .map(|turn| turn.content().to_string())
        .unwrap_or_default();

    match outcome {
        SubmitOutcome::Answered => {
            println!("{}", marked_text(&answer));
            Ok(())
        }
        SubmitOutcome::Failed => bail!("{answer} (run with -v for details)"),
        SubmitOutcome::Empty | SubmitOutcome::Busy => Ok(()),
    }
}

fn init_logging(verbosity: u8) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter(verbosity))
        .init();
}

/// The chat screen owns the terminal, so its logs go to `~/.solvr/solvr.log`.
fn init_file_logging(verbosity: u8, config: &Config) -> Result<()> {
    let path = config.log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(env_filter(verbosity.max(1)))
        .init();
    Ok(())
}

fn env_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
