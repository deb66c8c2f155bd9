//! # smoorgh server
//!
//! HTTP service that answers movie trivia questions with a hosted LLM.
//!
//! ## Usage
//!
//! - `smoorgh` - Serve with discovered configuration, tool phase
//! - `smoorgh --phase direct` - Prompt-only answering
//! - `smoorgh --phase retrieval` - Answer with semantic search context

use anyhow::{Context, Result};
use clap::Parser;
use smoorgh_core::{Orchestrator, Phase, ToolResultPolicy};
use std::path::PathBuf;

mod config;
mod error;
mod routes;
mod server;

use config::ServerConfigLoader;
use server::AppState;

/// smoorgh - trivia answering service
#[derive(Parser)]
#[command(name = "smoorgh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answers movie trivia questions over HTTP using a hosted LLM")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol to use (openai_compat, azure_openai)
    #[arg(long)]
    protocol: Option<String>,

    /// API key override
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// Model or deployment name override
    #[arg(long)]
    model: Option<String>,

    /// Answering phase (direct, retrieval, tools)
    #[arg(long, env = "SMOORGH_PHASE")]
    phase: Option<Phase>,

    /// How results of several tool calls are answered (consolidated, last_wins)
    #[arg(long)]
    tool_policy: Option<ToolResultPolicy>,

    /// Address to listen on
    #[arg(long, env = "SMOORGH_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> ServerConfigLoader {
    let mut loader = ServerConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(protocol) = &cli.protocol {
        loader = loader.with_protocol_override(protocol.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    if let Some(phase) = cli.phase {
        loader = loader.with_phase_override(phase);
    }

    if let Some(policy) = cli.tool_policy {
        loader = loader.with_tool_policy_override(policy);
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    smoorgh_core::init_tracing_with_debug(cli.verbose);

    let config = build_config_loader(&cli)
        .load()
        .await
        .context("Failed to load configuration")?;

    tracing::info!(
        version = smoorgh_core::VERSION,
        protocol = config.llm.protocol.as_str(),
        model = %config.llm.model,
        phase = %config.orchestrator.phase,
        tool_policy = %config.orchestrator.tool_policy,
        "Starting smoorgh"
    );

    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to build orchestrator")?;

    server::run(AppState::new(orchestrator), &cli.bind).await
}
