//! Tool registry for managing available tools

use crate::error::{Result, ToolError};
use crate::llm::ToolDefinition;
use crate::tools::builtin::MovieFactTool;
use crate::tools::facts::{FactClient, FactKind};
use crate::tools::{Tool, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered set of tools, looked up by name.
///
/// Declarations are advertised in registration order. The registry is built
/// once and shared read-only.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one lookup tool per movie fact kind
    pub fn movie_facts(client: FactClient) -> Result<Self> {
        let mut registry = Self::new();
        for kind in FactKind::ALL {
            registry.register(Arc::new(MovieFactTool::new(kind, client.clone())))?;
        }
        Ok(registry)
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate { name }.into());
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// List tool names in registration order
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool definitions for LLM function calling
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Execute a tool call
    pub async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let tool = self.get(&call.name).ok_or_else(|| ToolError::NotFound {
            name: call.name.clone(),
        })?;

        let start_time = std::time::Instant::now();
        let call_id = call.id.clone();
        let result = tool.execute(call).await;
        let duration = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(result) => Ok(result.with_duration(duration)),
            Err(e) => Ok(ToolResult::error(call_id, e.to_string()).with_duration(duration)),
        }
    }
}
