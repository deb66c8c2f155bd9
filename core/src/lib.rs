//! # smoorgh Core
//!
//! Core library for smoorgh - a trivia answering service backed by a hosted LLM.
//!
//! This library provides prompt construction, the model client abstraction,
//! movie fact tools, semantic retrieval and the orchestrator that ties them
//! together for each of the three answering phases.

// Core modules
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod question;
pub mod search;
pub mod tools;

// Re-export commonly used types
pub use config::{ModelParams, Protocol, ResolvedConfig, ResolvedLlmConfig};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig, Phase, ToolResultPolicy};
pub use question::{Answer, Question, QuestionType};

/// Current version of the smoorgh-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing with a specific debug mode; `RUST_LOG` takes precedence
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}
