//! LLM client abstractions and implementations

pub mod client;
pub mod embedding;
pub mod message;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod providers;

pub use client::{
    ChatOptions, EmbeddingClient, FinishReason, FunctionDefinition, LlmClient, LlmResponse,
    ToolChoice, ToolDefinition, Usage,
};
pub use embedding::{create_embedding_client, OpenAiEmbedder};
pub use message::{ContentBlock, LlmMessage, MessageContent, MessageRole};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{RecordedRequest, ScriptedLlmClient};
pub use providers::{create_llm_client, OpenAiClient};
