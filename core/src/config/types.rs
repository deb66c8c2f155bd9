//! Resolved configuration types for Smoorgh core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in the server layer.

use crate::error::{ConfigError, Result};
use crate::orchestrator::{OrchestratorConfig, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default fact API base URL
pub const DEFAULT_FACT_API_URL: &str =
    "https://smoorgh-api.bluebush-897105f3.northeurope.azurecontainerapps.io/";

/// Supported LLM protocols
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// OpenAI-compatible API (includes OpenAI, many proxies, local models)
    #[serde(rename = "openai_compat")]
    OpenAICompat,
    /// Azure OpenAI API
    #[serde(rename = "azure_openai")]
    AzureOpenAI,
}

impl Protocol {
    /// Get the protocol name as a string
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::OpenAICompat => "openai_compat",
            Protocol::AzureOpenAI => "azure_openai",
        }
    }

    /// Get the default base URL for this protocol
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Protocol::OpenAICompat => Some("https://api.openai.com/v1"),
            Protocol::AzureOpenAI => None, // Requires custom endpoint
        }
    }

    /// Parse a protocol name, accepting a few common aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai_compat" | "openai" => Some(Protocol::OpenAICompat),
            "azure_openai" | "azure" => Some(Protocol::AzureOpenAI),
            _ => None,
        }
    }
}

/// Model parameters for LLM requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

/// A fully resolved LLM configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    /// The protocol to use
    pub protocol: Protocol,
    /// Base URL for the API (Azure: the resource endpoint)
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model name; the deployment name for Azure
    pub model: String,
    /// Azure API version
    #[serde(default)]
    pub api_version: Option<String>,
    /// Model parameters
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ResolvedLlmConfig {
    /// Create a new resolved LLM config
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            api_version: None,
            params: ModelParams::default(),
            headers: HashMap::new(),
        }
    }

    /// Set the Azure API version
    pub fn with_api_version<S: Into<String>>(mut self, api_version: S) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Set model parameters
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Add a header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(missing("api_key"));
        }

        if self.model.is_empty() {
            return Err(missing("model"));
        }

        validate_url("base_url", &self.base_url)?;

        if self.protocol == Protocol::AzureOpenAI && self.api_version.is_none() {
            return Err(missing("api_version"));
        }

        if let Some(temp) = self.params.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(invalid("temperature", temp));
            }
        }

        if let Some(top_p) = self.params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(invalid("top_p", top_p));
            }
        }

        Ok(())
    }
}

/// Embedding model used by the retrieval phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEmbeddingConfig {
    /// Embedding model; the embedding deployment name for Azure
    pub model: String,
    /// Requested vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
}

impl ResolvedEmbeddingConfig {
    /// Create an embedding config with the default dimensions
    pub fn new<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_dimensions() -> u32 {
    1536
}

/// Semantic search index used by the retrieval phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSearchConfig {
    /// Search service endpoint
    pub endpoint: String,
    /// Admin or query key
    pub api_key: String,
    /// Index name
    #[serde(default = "default_index")]
    pub index: String,
    /// Semantic re-ranking configuration
    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,
    /// Vector field the embedding is matched against
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    /// Nearest neighbours for the vector query
    #[serde(default = "default_k")]
    pub k: u32,
    /// Maximum documents returned
    #[serde(default = "default_top")]
    pub top: u32,
    /// Search REST API version
    #[serde(default = "default_search_api_version")]
    pub api_version: String,
    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl ResolvedSearchConfig {
    /// Create a search config with default index settings
    pub fn new<S: Into<String>>(endpoint: S, api_key: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            index: default_index(),
            semantic_configuration: default_semantic_configuration(),
            vector_field: default_vector_field(),
            k: default_k(),
            top: default_top(),
            api_version: default_search_api_version(),
            timeout_secs: default_search_timeout(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("search.endpoint", &self.endpoint)?;
        if self.api_key.is_empty() {
            return Err(missing("search.api_key"));
        }
        if self.index.is_empty() {
            return Err(missing("search.index"));
        }
        if self.k == 0 {
            return Err(invalid("search.k", self.k));
        }
        Ok(())
    }
}

fn default_index() -> String {
    "movies-semantic-index".to_string()
}

fn default_semantic_configuration() -> String {
    "movies-semantic-config".to_string()
}

fn default_vector_field() -> String {
    "vector".to_string()
}

fn default_k() -> u32 {
    5
}

fn default_top() -> u32 {
    10
}

fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_search_timeout() -> u64 {
    10
}

/// Movie fact API used by the tool phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactApiConfig {
    /// Base URL; the fact kind is appended directly
    #[serde(default = "default_fact_url")]
    pub base_url: String,
    /// Per-lookup timeout in seconds
    #[serde(default = "default_fact_timeout")]
    pub timeout_secs: u64,
    /// Retries of transient failures; 0 disables retrying
    #[serde(default = "default_fact_retries")]
    pub max_retries: u32,
}

impl Default for FactApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_fact_url(),
            timeout_secs: default_fact_timeout(),
            max_retries: default_fact_retries(),
        }
    }
}

impl FactApiConfig {
    /// Create a fact API config for the given base URL
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the per-lookup timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_url("facts.base_url", &self.base_url)?;
        if self.timeout_secs == 0 {
            return Err(invalid("facts.timeout_secs", self.timeout_secs));
        }
        Ok(())
    }
}

fn default_fact_url() -> String {
    DEFAULT_FACT_API_URL.to_string()
}

fn default_fact_timeout() -> u64 {
    5
}

fn default_fact_retries() -> u32 {
    1
}

/// Everything core needs to build an orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Chat completion model
    pub llm: ResolvedLlmConfig,
    /// Embedding model, required by the retrieval phase
    #[serde(default)]
    pub embedding: Option<ResolvedEmbeddingConfig>,
    /// Search index, required by the retrieval phase
    #[serde(default)]
    pub search: Option<ResolvedSearchConfig>,
    /// Fact API
    #[serde(default)]
    pub facts: FactApiConfig,
    /// Orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl ResolvedConfig {
    /// Create a config for the given model with default settings elsewhere
    pub fn new(llm: ResolvedLlmConfig) -> Self {
        Self {
            llm,
            embedding: None,
            search: None,
            facts: FactApiConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }

    /// Validate the configuration for the selected phase
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        self.orchestrator.validate()?;

        match self.orchestrator.phase {
            Phase::Direct => {}
            Phase::Retrieval => {
                let embedding = self
                    .embedding
                    .as_ref()
                    .ok_or_else(|| missing("embedding"))?;
                if embedding.model.is_empty() {
                    return Err(missing("embedding.model"));
                }
                self.search
                    .as_ref()
                    .ok_or_else(|| missing("search"))?
                    .validate()?;
            }
            Phase::Tools => self.facts.validate()?,
        }

        Ok(())
    }
}

fn missing(field: &str) -> crate::error::Error {
    ConfigError::MissingField {
        field: field.to_string(),
    }
    .into()
}

fn invalid<V: ToString>(field: &str, value: V) -> crate::error::Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(missing(field));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(invalid(field, url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn llm() -> ResolvedLlmConfig {
        ResolvedLlmConfig::new(
            Protocol::OpenAICompat,
            "https://api.openai.com/v1".to_string(),
            "sk-test".to_string(),
            "gpt-4o".to_string(),
        )
    }

    #[test]
    fn test_llm_config_validation() {
        assert!(llm().validate().is_ok());

        let mut config = llm();
        config.api_key.clear();
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::MissingField { .. }))
        ));

        let mut config = llm();
        config.base_url = "ftp://example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));

        let mut config = llm();
        config.params.temperature = Some(3.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_azure_requires_api_version() {
        let mut config = llm();
        config.protocol = Protocol::AzureOpenAI;
        assert!(config.validate().is_err());
        assert!(config.with_api_version("2024-06-01").validate().is_ok());
    }

    #[test]
    fn test_retrieval_phase_requires_search_and_embedding() {
        let mut config = ResolvedConfig::new(llm());
        config.orchestrator.phase = Phase::Retrieval;
        assert!(config.validate().is_err());

        config.embedding = Some(ResolvedEmbeddingConfig::new("text-embedding-3-small"));
        assert!(config.validate().is_err());

        config.search = Some(ResolvedSearchConfig::new(
            "https://search.example.net",
            "key",
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_match_deployment() {
        let search = ResolvedSearchConfig::new("https://s", "k");
        assert_eq!(search.index, "movies-semantic-index");
        assert_eq!(search.semantic_configuration, "movies-semantic-config");
        assert_eq!(search.k, 5);
        assert_eq!(search.top, 10);

        let facts = FactApiConfig::default();
        assert_eq!(facts.base_url, DEFAULT_FACT_API_URL);
        assert_eq!(facts.timeout_secs, 5);
        assert_eq!(facts.max_retries, 1);
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!(Protocol::parse("azure"), Some(Protocol::AzureOpenAI));
        assert_eq!(Protocol::parse("OpenAI_Compat"), Some(Protocol::OpenAICompat));
        assert_eq!(Protocol::parse("anthropic"), None);
    }
}
