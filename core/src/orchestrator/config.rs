//! Orchestrator configuration and builder

use crate::error::{ConfigError, OrchestratorError, Result};
use crate::llm::{ChatOptions, LlmClient};
use crate::prompt::PromptBuilder;
use crate::search::Retriever;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::Orchestrator;

/// Which answering pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Prompt and answer, no tools
    Direct,
    /// Retrieve context documents, then prompt
    Retrieval,
    /// Model-driven movie fact lookups
    #[default]
    Tools,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Direct => "direct",
            Phase::Retrieval => "retrieval",
            Phase::Tools => "tools",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" | "phase1" => Ok(Phase::Direct),
            "retrieval" | "phase2" => Ok(Phase::Retrieval),
            "tools" | "phase3" => Ok(Phase::Tools),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// How answers are produced when the model requests several tools at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultPolicy {
    /// Append every tool result, then make one second-pass call
    #[default]
    Consolidated,
    /// Make a second-pass call after each tool result; the last answer is returned
    LastWins,
}

impl ToolResultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolResultPolicy::Consolidated => "consolidated",
            ToolResultPolicy::LastWins => "last_wins",
        }
    }
}

impl fmt::Display for ToolResultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolResultPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "consolidated" => Ok(ToolResultPolicy::Consolidated),
            "last_wins" => Ok(ToolResultPolicy::LastWins),
            other => Err(format!("unknown tool policy '{}'", other)),
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub phase: Phase,

    #[serde(default)]
    pub tool_policy: ToolResultPolicy,

    /// Upper bound for each model call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            phase: Phase::default(),
            tool_policy: ToolResultPolicy::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    pub fn with_tool_policy(mut self, policy: ToolResultPolicy) -> Self {
        self.tool_policy = policy;
        self
    }

    pub fn with_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.request_timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Builder for creating orchestrators
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    llm_client: Option<Arc<dyn LlmClient>>,
    tools: Option<Arc<ToolRegistry>>,
    retriever: Option<Retriever>,
    chat_options: ChatOptions,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            llm_client: None,
            tools: None,
            retriever: None,
            chat_options: ChatOptions::default(),
        }
    }

    pub fn llm_client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.llm_client = Some(client);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn chat_options(mut self, options: ChatOptions) -> Self {
        self.chat_options = options;
        self
    }

    /// Build the orchestrator, checking the phase has what it needs
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let phase = self.config.phase;

        let llm = self
            .llm_client
            .ok_or_else(|| missing_component(phase, "an LLM client"))?;

        match phase {
            Phase::Direct => {}
            Phase::Retrieval if self.retriever.is_none() => {
                return Err(missing_component(phase, "a retriever"));
            }
            Phase::Retrieval => {}
            Phase::Tools if self.tools.as_ref().map_or(true, |t| t.is_empty()) => {
                return Err(missing_component(phase, "a tool registry"));
            }
            Phase::Tools => {}
        }

        Ok(Orchestrator {
            llm,
            tools: self.tools.unwrap_or_default(),
            retriever: self.retriever,
            prompts: PromptBuilder::new(phase)?,
            options: self.chat_options,
            config: self.config,
        })
    }
}

fn missing_component(phase: Phase, component: &str) -> crate::error::Error {
    OrchestratorError::MissingComponent {
        phase: phase.to_string(),
        component: component.to_string(),
    }
    .into()
}
