//! Server configuration loader for smoorgh
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./smoorgh.json or ./.smoorgh/config.json
//! 3. Git repository root: <repo_root>/.smoorgh/config.json
//! 4. XDG config: $XDG_CONFIG_HOME/smoorgh/config.json or ~/.config/smoorgh/config.json
//! 5. Environment variables only (no files)

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use smoorgh_core::config::{
    FactApiConfig, ModelParams, Protocol, ResolvedConfig, ResolvedEmbeddingConfig,
    ResolvedLlmConfig, ResolvedSearchConfig,
};
use smoorgh_core::{OrchestratorConfig, Phase, ToolResultPolicy};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Raw configuration file format (single-file schema)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: String,
    /// Base URL; the resource endpoint for Azure
    pub base_url: Option<String>,
    /// Model name; the deployment name for Azure
    pub model: String,
    /// Azure API version
    #[serde(default)]
    pub api_version: Option<String>,
    /// Model parameters (optional)
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers (optional)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Embedding model for the retrieval phase
    #[serde(default)]
    pub embedding: Option<ResolvedEmbeddingConfig>,
    /// Search index for the retrieval phase; `api_key` accepts "env:VAR_NAME"
    #[serde(default)]
    pub search: Option<ResolvedSearchConfig>,
    /// Fact API settings
    #[serde(default)]
    pub facts: Option<FactApiConfig>,
    /// Phase, tool policy and timeouts
    #[serde(default)]
    pub orchestrator: Option<OrchestratorConfig>,
}

/// Server configuration loader
pub struct ServerConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    protocol_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
    phase_override: Option<Phase>,
    tool_policy_override: Option<ToolResultPolicy>,
    /// Directory searched first; defaults to the process working directory
    working_dir: Option<PathBuf>,
    /// Environment snapshot
    env: HashMap<String, String>,
}

impl ServerConfigLoader {
    /// Create a new loader reading the process environment
    pub fn new() -> Self {
        Self {
            config_override: None,
            protocol_override: None,
            api_key_override: None,
            base_url_override: None,
            model_override: None,
            phase_override: None,
            tool_policy_override: None,
            working_dir: None,
            env: std::env::vars().collect(),
        }
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set protocol override
    pub fn with_protocol_override(mut self, protocol: String) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Set phase override
    pub fn with_phase_override(mut self, phase: Phase) -> Self {
        self.phase_override = Some(phase);
        self
    }

    /// Set tool result policy override
    pub fn with_tool_policy_override(mut self, policy: ToolResultPolicy) -> Self {
        self.tool_policy_override = Some(policy);
        self
    }

    /// Search from this directory instead of the process working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Replace the environment snapshot
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        self.env.get(name).filter(|v| !v.is_empty()).cloned()
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<ResolvedConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides
        if let Some(protocol) = &self.protocol_override {
            config.protocol = protocol.clone();
        }
        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = model.clone();
        }

        // Step 3: Resolve to final config
        self.resolve_config(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<RawConfig> {
        if let Some(config) = self.try_load_cwd().await? {
            return Ok(config);
        }

        if let Some(config) = self.try_load_git_root().await? {
            return Ok(config);
        }

        if let Some(config) = self.try_load_xdg().await? {
            return Ok(config);
        }

        self.try_load_env_only()
    }

    fn current_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Try loading from current working directory
    async fn try_load_cwd(&self) -> Result<Option<RawConfig>> {
        let cwd = self.current_dir()?;

        let smoorgh_json = cwd.join("smoorgh.json");
        if smoorgh_json.exists() {
            return Ok(Some(self.load_file(&smoorgh_json).await?));
        }

        let dir_config = cwd.join(".smoorgh").join("config.json");
        if dir_config.exists() {
            return Ok(Some(self.load_file(&dir_config).await?));
        }

        Ok(None)
    }

    /// Try loading from git repository root
    async fn try_load_git_root(&self) -> Result<Option<RawConfig>> {
        if let Some(git_root) = self.find_git_root()? {
            let config_path = git_root.join(".smoorgh").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Try loading from XDG config directory
    async fn try_load_xdg(&self) -> Result<Option<RawConfig>> {
        if let Some(config_dir) = self.get_xdg_config_dir() {
            let config_path = config_dir.join("smoorgh").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Build configuration from environment variables only
    fn try_load_env_only(&self) -> Result<RawConfig> {
        let azure_key = self.var("AZURE_OPENAI_API_KEY");
        let openai_key = self.var("OPENAI_API_KEY");

        let available_keys: Vec<_> = [
            azure_key.as_ref().map(|_| "azure_openai"),
            openai_key.as_ref().map(|_| "openai_compat"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let env_protocol = self.var("SMOORGH_PROTOCOL");
        let protocol_preference = self.protocol_override.as_ref().or(env_protocol.as_ref());

        let protocol = if let Some(preferred) = protocol_preference {
            match Protocol::parse(preferred) {
                Some(Protocol::AzureOpenAI) if azure_key.is_some() => Protocol::AzureOpenAI,
                Some(Protocol::OpenAICompat) if openai_key.is_some() => Protocol::OpenAICompat,
                _ => {
                    return Err(anyhow!(
                        "Protocol '{}' specified but no corresponding API key found. Available keys: {}",
                        preferred,
                        available_keys.join(", ")
                    ))
                }
            }
        } else {
            match (azure_key.is_some(), openai_key.is_some()) {
                (false, false) => {
                    return Err(anyhow!(
                        "No configuration found. Please create a smoorgh.json file or set AZURE_OPENAI_API_KEY or OPENAI_API_KEY"
                    ))
                }
                (true, false) => Protocol::AzureOpenAI,
                (false, true) => Protocol::OpenAICompat,
                (true, true) => {
                    return Err(anyhow!(
                        "Multiple API keys detected: {}. Please specify which protocol to use with SMOORGH_PROTOCOL or --protocol",
                        available_keys.join(", ")
                    ))
                }
            }
        };

        let (api_key, base_url, model, api_version) = match protocol {
            Protocol::AzureOpenAI => (
                azure_key.unwrap_or_default(),
                self.var("AZURE_OPENAI_ENDPOINT"),
                self.var("AZURE_OPENAI_COMPLETION_DEPLOYMENT_NAME")
                    .or_else(|| self.var("AZURE_OPENAI_COMPLETION_MODEL"))
                    .unwrap_or_default(),
                self.var("AZURE_OPENAI_VERSION"),
            ),
            Protocol::OpenAICompat => (
                openai_key.unwrap_or_default(),
                self.var("OPENAI_BASE_URL"),
                self.var("OPENAI_MODEL")
                    .unwrap_or_else(|| "gpt-4o".to_string()),
                None,
            ),
        };

        let search = match (
            self.var("AZURE_AI_SEARCH_ENDPOINT"),
            self.var("AZURE_AI_SEARCH_KEY"),
        ) {
            (Some(endpoint), Some(key)) => Some(ResolvedSearchConfig::new(endpoint, key)),
            _ => None,
        };

        Ok(RawConfig {
            protocol: protocol.as_str().to_string(),
            api_key,
            base_url,
            model,
            api_version,
            params: ModelParams::default(),
            headers: HashMap::new(),
            embedding: self
                .var("AZURE_OPENAI_EMBEDDING_MODEL")
                .map(ResolvedEmbeddingConfig::new),
            search,
            facts: self.var("SMOORGH_FACT_API_URL").map(FactApiConfig::new),
            orchestrator: None,
        })
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        tracing::debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find git repository root
    fn find_git_root(&self) -> Result<Option<PathBuf>> {
        let mut current = self.current_dir()?;

        loop {
            if current.join(".git").exists() {
                return Ok(Some(current));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }

    /// Get XDG config directory
    fn get_xdg_config_dir(&self) -> Option<PathBuf> {
        if let Some(xdg_config) = self.var("XDG_CONFIG_HOME") {
            Some(PathBuf::from(xdg_config))
        } else {
            self.var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
        }
    }

    /// Resolve a value that may reference an environment variable
    fn resolve_secret(&self, value: String) -> Result<String> {
        match value.strip_prefix("env:") {
            Some(var_name) => self
                .var(var_name)
                .with_context(|| format!("Environment variable not found: {}", var_name)),
            None => Ok(value),
        }
    }

    /// Resolve raw config to ResolvedConfig
    fn resolve_config(&self, config: RawConfig) -> Result<ResolvedConfig> {
        let protocol = Protocol::parse(&config.protocol)
            .ok_or_else(|| anyhow!("Unsupported protocol: {}", config.protocol))?;

        let api_key = self.resolve_secret(config.api_key)?;

        let base_url = match config.base_url {
            Some(url) => url,
            None => protocol
                .default_base_url()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Protocol '{}' requires a base_url", protocol.as_str()))?,
        };

        let mut llm = ResolvedLlmConfig::new(protocol, base_url, api_key, config.model)
            .with_params(config.params);
        llm.api_version = config.api_version;
        llm.headers = config.headers;

        let search = match config.search {
            Some(mut search) => {
                search.api_key = self.resolve_secret(search.api_key)?;
                Some(search)
            }
            None => None,
        };

        let mut orchestrator = config.orchestrator.unwrap_or_default();
        if let Some(phase) = self.phase_override {
            orchestrator.phase = phase;
        }
        if let Some(policy) = self.tool_policy_override {
            orchestrator.tool_policy = policy;
        }

        let resolved = ResolvedConfig {
            llm,
            embedding: config.embedding,
            search,
            facts: config.facts.unwrap_or_default(),
            orchestrator,
        };

        resolved
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(resolved)
    }
}

impl Default for ServerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Loader isolated from the real working directory and environment
    fn loader(dir: &TempDir, pairs: &[(&str, &str)]) -> ServerConfigLoader {
        let mut vars = env(pairs);
        vars.entry("XDG_CONFIG_HOME".to_string())
            .or_insert_with(|| dir.path().join("xdg").display().to_string());
        ServerConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .with_env(vars)
    }

    #[tokio::test]
    async fn test_env_only_azure() {
        let dir = TempDir::new().unwrap();
        let config = loader(
            &dir,
            &[
                ("AZURE_OPENAI_API_KEY", "azure-key"),
                ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
                ("AZURE_OPENAI_VERSION", "2024-06-01"),
                ("AZURE_OPENAI_COMPLETION_DEPLOYMENT_NAME", "gpt-4o-deploy"),
                ("SMOORGH_FACT_API_URL", "http://localhost:8080/"),
            ],
        )
        .load()
        .await
        .unwrap();

        assert_eq!(config.llm.protocol, Protocol::AzureOpenAI);
        assert_eq!(config.llm.model, "gpt-4o-deploy");
        assert_eq!(config.llm.api_version.as_deref(), Some("2024-06-01"));
        assert_eq!(config.facts.base_url, "http://localhost:8080/");
        assert_eq!(config.orchestrator.phase, Phase::Tools);
    }

    #[tokio::test]
    async fn test_env_only_without_keys_fails() {
        let dir = TempDir::new().unwrap();
        assert!(loader(&dir, &[]).load().await.is_err());
    }

    #[tokio::test]
    async fn test_multiple_keys_need_protocol() {
        let dir = TempDir::new().unwrap();
        let pairs = [
            ("AZURE_OPENAI_API_KEY", "azure-key"),
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_VERSION", "2024-06-01"),
            ("AZURE_OPENAI_COMPLETION_MODEL", "gpt-4o"),
            ("OPENAI_API_KEY", "sk-test"),
        ];
        assert!(loader(&dir, &pairs).load().await.is_err());

        let config = loader(&dir, &pairs)
            .with_protocol_override("openai".to_string())
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.protocol, Protocol::OpenAICompat);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_retrieval_phase_from_env() {
        let dir = TempDir::new().unwrap();
        let pairs = [
            ("OPENAI_API_KEY", "sk-test"),
            ("AZURE_OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            ("AZURE_AI_SEARCH_ENDPOINT", "https://search.example.net"),
            ("AZURE_AI_SEARCH_KEY", "search-key"),
        ];
        let config = loader(&dir, &pairs)
            .with_phase_override(Phase::Retrieval)
            .load()
            .await
            .unwrap();

        let search = config.search.unwrap();
        assert_eq!(search.api_key, "search-key");
        assert_eq!(search.index, "movies-semantic-index");
        assert_eq!(config.embedding.unwrap().dimensions, 1536);

        // Retrieval without a search index is rejected
        let result = loader(&dir, &[("OPENAI_API_KEY", "sk-test")])
            .with_phase_override(Phase::Retrieval)
            .load()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cwd_file_with_env_reference() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("smoorgh.json"),
            r#"{
                "protocol": "openai_compat",
                "api_key": "env:MY_KEY",
                "base_url": "http://localhost:11434/v1",
                "model": "llama3",
                "orchestrator": {"tool_policy": "last_wins", "request_timeout_secs": 30}
            }"#,
        )
        .unwrap();

        let config = loader(&dir, &[("MY_KEY", "secret")])
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.api_key, "secret");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.orchestrator.tool_policy, ToolResultPolicy::LastWins);
        assert_eq!(config.orchestrator.request_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_missing_env_reference_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("smoorgh.json"),
            r#"{"protocol": "openai", "api_key": "env:NOT_SET", "model": "gpt-4o"}"#,
        )
        .unwrap();
        assert!(loader(&dir, &[]).load().await.is_err());
    }

    #[tokio::test]
    async fn test_dot_dir_and_flag_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".smoorgh")).unwrap();
        std::fs::write(
            dir.path().join(".smoorgh").join("config.json"),
            r#"{"protocol": "openai", "api_key": "sk-file", "model": "gpt-4o"}"#,
        )
        .unwrap();

        let config = loader(&dir, &[])
            .with_model_override("gpt-4o-mini".to_string())
            .with_api_key_override("sk-flag".to_string())
            .with_tool_policy_override(ToolResultPolicy::LastWins)
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key, "sk-flag");
        assert_eq!(config.orchestrator.tool_policy, ToolResultPolicy::LastWins);
    }

    #[tokio::test]
    async fn test_config_override_directory() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        std::fs::write(
            other.path().join("config.json"),
            r#"{"protocol": "azure", "api_key": "k", "base_url": "https://res.openai.azure.com", "model": "dep", "api_version": "2024-06-01"}"#,
        )
        .unwrap();

        let config = loader(&dir, &[])
            .with_config_override(other.path().to_path_buf())
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.protocol, Protocol::AzureOpenAI);

        let missing = loader(&dir, &[])
            .with_config_override(dir.path().join("nope.json"))
            .load()
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_xdg_config() {
        let dir = TempDir::new().unwrap();
        let xdg = TempDir::new().unwrap();
        std::fs::create_dir_all(xdg.path().join("smoorgh")).unwrap();
        std::fs::write(
            xdg.path().join("smoorgh").join("config.json"),
            r#"{"protocol": "openai", "api_key": "sk-xdg", "model": "gpt-4o"}"#,
        )
        .unwrap();

        let xdg_path = xdg.path().display().to_string();
        let config = loader(&dir, &[("XDG_CONFIG_HOME", xdg_path.as_str())])
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.api_key, "sk-xdg");
    }

    #[tokio::test]
    async fn test_unsupported_protocol() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("smoorgh.json"),
            r#"{"protocol": "anthropic", "api_key": "k", "model": "m"}"#,
        )
        .unwrap();
        assert!(loader(&dir, &[]).load().await.is_err());
    }
}
