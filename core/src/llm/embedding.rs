//! Embedding client for the retrieval phase, calling the `/embeddings` endpoint

use crate::config::{Protocol, ResolvedEmbeddingConfig, ResolvedLlmConfig};
use crate::error::{LlmError, Result};
use crate::llm::providers::openai::{http_client, map_openai_error};
use crate::llm::EmbeddingClient;
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;

/// Embedding client using async-openai
pub struct OpenAiEmbedder<C: Config> {
    client: Client<C>,
    model: String,
    dimensions: u32,
}

impl OpenAiEmbedder<OpenAIConfig> {
    /// Create an embedder for an OpenAI-compatible endpoint
    pub fn new(llm: &ResolvedLlmConfig, embedding: &ResolvedEmbeddingConfig) -> Result<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(&llm.api_key)
            .with_api_base(llm.base_url.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client(&llm.headers)?),
            model: embedding.model.clone(),
            dimensions: embedding.dimensions,
        })
    }
}

impl OpenAiEmbedder<AzureConfig> {
    /// Create an embedder for an Azure OpenAI embedding deployment
    pub fn azure(llm: &ResolvedLlmConfig, embedding: &ResolvedEmbeddingConfig) -> Result<Self> {
        let config = AzureConfig::new()
            .with_api_base(llm.base_url.trim_end_matches('/'))
            .with_api_key(&llm.api_key)
            .with_deployment_id(&embedding.model)
            .with_api_version(llm.api_version.clone().unwrap_or_default());

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client(&llm.headers)?),
            model: embedding.model.clone(),
            dimensions: embedding.dimensions,
        })
    }
}

#[async_trait]
impl<C: Config> EmbeddingClient for OpenAiEmbedder<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions)
            .build()
            .map_err(|e| LlmError::InvalidRequest {
                message: format!("Failed to build embedding request: {}", e),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or(LlmError::EmptyResponse)?;

        tracing::debug!(dimensions = vector.len(), "Embedded question");
        Ok(vector)
    }
}

/// Create the embedding client matching the configured protocol
pub fn create_embedding_client(
    llm: &ResolvedLlmConfig,
    embedding: &ResolvedEmbeddingConfig,
) -> Result<Arc<dyn EmbeddingClient>> {
    match llm.protocol {
        Protocol::OpenAICompat => Ok(Arc::new(OpenAiEmbedder::new(llm, embedding)?)),
        Protocol::AzureOpenAI => Ok(Arc::new(OpenAiEmbedder::azure(llm, embedding)?)),
    }
}
