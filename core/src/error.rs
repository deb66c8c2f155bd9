//! Error types and handling for Smoorgh Core

use thiserror::Error;

/// Result type alias for Smoorgh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Smoorgh Core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// LLM client errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool execution errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Orchestration errors that abort a request
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Semantic search errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Prompt template errors
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Prompt rendering errors
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// LLM client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Model call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Model returned no choices")]
    EmptyResponse,
}

/// Tool execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool registered twice: {name}")]
    Duplicate { name: String },

    #[error("Invalid tool parameters: {message}")]
    InvalidParameters { message: String },
}

/// Failures of a single fact API lookup.
///
/// These never leave the tool that issued the lookup; they are turned into the
/// fallback text for the fact kind.
#[derive(Error, Debug)]
pub enum FactError {
    #[error("Fact API request failed: {message}")]
    Transport { message: String },

    #[error("Fact API returned status {status}")]
    Status { status: u16 },
}

/// Errors that fail a whole answering request
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Model requested unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Bad arguments for tool '{name}': {message}")]
    BadToolArguments { name: String, message: String },

    #[error("Phase '{phase}' requires {component}")]
    MissingComponent { phase: String, component: String },
}

/// Semantic search errors
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("Search service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode search response: {message}")]
    Decode { message: String },
}
