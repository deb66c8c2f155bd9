//! Scripted LLM client for tests
//!
//! Replays queued responses in order and records every request it receives.

use crate::error::{LlmError, Result};
use crate::llm::{ChatOptions, LlmClient, LlmMessage, LlmResponse, ToolDefinition};
use crate::tools::ToolCall;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A request captured by [`ScriptedLlmClient`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<LlmMessage>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub options: Option<ChatOptions>,
}

enum Scripted {
    Response(LlmResponse),
    Failure(String),
}

/// LLM client that answers from a script instead of a remote model
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer
    pub fn push_text<S: Into<String>>(&self, content: S, prompt_tokens: u32, completion_tokens: u32) {
        self.push_response(LlmResponse::text(content).with_usage(prompt_tokens, completion_tokens));
    }

    /// Queue a response requesting the given tool calls
    pub fn push_tool_calls(&self, calls: Vec<ToolCall>, prompt_tokens: u32, completion_tokens: u32) {
        let response = LlmResponse {
            message: LlmMessage::assistant_tool_calls(&calls),
            usage: None,
            model: String::new(),
            finish_reason: Some(crate::llm::FinishReason::ToolCalls),
            metadata: None,
        }
        .with_usage(prompt_tokens, completion_tokens);
        self.push_response(response);
    }

    /// Queue an arbitrary response
    pub fn push_response(&self, response: LlmResponse) {
        self.lock_script().push_back(Scripted::Response(response));
    }

    /// Queue a failed model call
    pub fn push_failure<S: Into<String>>(&self, message: S) {
        self.lock_script().push_back(Scripted::Failure(message.into()));
    }

    /// Delay every response, to exercise timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedRequest {
                messages,
                tools,
                options,
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.lock_script().pop_front() {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(message)) => Err(LlmError::Network { message }.into()),
            None => Err(LlmError::EmptyResponse.into()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
