//! Base tool traits and structures

use crate::error::{Result, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Check a call's arguments before anything is executed.
    ///
    /// The default checks that every parameter listed as `required` in the
    /// schema is present.
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.parameters_schema();
        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();

        for key in required.iter().filter_map(|k| k.as_str()) {
            if call.parameters.get(key).is_none() {
                return Err(ToolError::InvalidParameters {
                    message: format!("Missing parameter: {}", key),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Execute the tool with the given parameters
    async fn execute(&self, call: ToolCall) -> Result<ToolResult>;

    /// Get the declaration advertised to the model
    fn definition(&self) -> crate::llm::ToolDefinition {
        crate::llm::ToolDefinition {
            tool_type: "function".to_string(),
            function: crate::llm::FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

/// A call to a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Parameters to pass to the tool
    pub parameters: serde_json::Value,

    /// Optional metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is a result for
    pub tool_call_id: String,

    /// Whether the execution was successful
    pub success: bool,

    /// Result content
    pub content: String,

    /// Execution duration in milliseconds
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new<S: Into<String>>(name: S, parameters: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            parameters,
            metadata: None,
        }
    }

    /// Set the call id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }
}

impl ToolResult {
    /// Create a successful result
    pub fn success<S: Into<String>>(tool_call_id: S, content: S) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: true,
            content: content.into(),
            duration_ms: None,
        }
    }

    /// Create an error result
    pub fn error<S: Into<String>>(tool_call_id: S, error: S) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            success: false,
            content: format!("Error: {}", error.into()),
            duration_ms: None,
        }
    }

    /// Set execution duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
