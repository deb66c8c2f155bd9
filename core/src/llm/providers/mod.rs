//! LLM provider implementations

pub mod openai;

pub use openai::OpenAiClient;

use crate::config::{Protocol, ResolvedLlmConfig};
use crate::error::Result;
use crate::llm::LlmClient;
use std::sync::Arc;

/// Create the chat client matching the configured protocol
pub fn create_llm_client(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.protocol {
        Protocol::OpenAICompat => Arc::new(OpenAiClient::new(config)?),
        Protocol::AzureOpenAI => Arc::new(OpenAiClient::azure(config)?),
    };

    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "LLM client ready"
    );
    Ok(client)
}
