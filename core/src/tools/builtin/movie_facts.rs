//! Movie fact lookup tools

use crate::error::{Result, ToolError};
use crate::tools::facts::{FactClient, FactKind};
use crate::tools::{Tool, ToolCall, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Arguments every movie fact tool accepts
#[derive(Debug, Deserialize)]
pub struct MovieFactArgs {
    pub title: String,
}

impl MovieFactArgs {
    /// Parse the arguments of a call
    pub fn from_call(call: &ToolCall) -> Result<Self> {
        serde_json::from_value(call.parameters.clone()).map_err(|e| {
            ToolError::InvalidParameters {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Tool that looks up one kind of fact about a movie
pub struct MovieFactTool {
    kind: FactKind,
    client: FactClient,
}

impl MovieFactTool {
    pub fn new(kind: FactKind, client: FactClient) -> Self {
        Self { kind, client }
    }

    pub fn kind(&self) -> FactKind {
        self.kind
    }
}

#[async_trait]
impl Tool for MovieFactTool {
    fn name(&self) -> &str {
        self.kind.tool_name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The movie name. The movie name should be a string without quotation marks."
                }
            },
            "required": ["title"]
        })
    }

    fn validate(&self, call: &ToolCall) -> Result<()> {
        MovieFactArgs::from_call(call).map(|_| ())
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let args = MovieFactArgs::from_call(&call)?;
        let fact = self.client.lookup_or_fallback(self.kind, &args.title).await;
        Ok(ToolResult::success(call.id, fact))
    }
}
