//! Question answering orchestration

pub mod config;
pub mod core;

pub use config::{OrchestratorBuilder, OrchestratorConfig, Phase, ToolResultPolicy};
pub use self::core::{Orchestrator, Stage};
