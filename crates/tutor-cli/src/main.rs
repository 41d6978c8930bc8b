use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

use config::TutorConfig;
use session::Session;
use tutor_core::{AgentRoster, LlmProvider, Runner, tutoring_registry};

#[derive(Parser)]
#[command(name = "tutor")]
#[command(version)]
#[command(about = "AI tutor and study coach for math, writing, and study skills")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the conversation
    let filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let cfg = TutorConfig::load(&cli.config)?;
    let provider = cfg.build_provider()?;
    info!(
        "Using provider {} (model: {})",
        provider.provider_name(),
        provider.model()
    );

    let runner = Runner::new(provider, tutoring_registry()).with_max_turns(cfg.runner.max_turns);
    let roster = AgentRoster::tutoring()?;
    let mut session = Session::new(runner, roster, cfg.student.seed_context());
    info!("Conversation id {}", session.conversation_id());

    let stdin = std::io::stdin();
    session.run(stdin.lock(), std::io::stdout()).await
}
