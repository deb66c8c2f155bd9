//! Azure AI Search client (REST)

use crate::config::ResolvedSearchConfig;
use crate::error::{Result, SearchError};
use crate::search::{MovieDocument, SemanticSearch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SELECT_FIELDS: &str = "title,genre,plot,year,rating";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query_type: &'a str,
    semantic_configuration: &'a str,
    vector_queries: Vec<VectorQuery<'a>>,
    select: &'a str,
    top: u32,
}

#[derive(Debug, Serialize)]
struct VectorQuery<'a> {
    kind: &'a str,
    vector: Vec<f32>,
    k: u32,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<MovieDocument>,
}

/// Semantic search against an Azure AI Search index
pub struct AzureSearchClient {
    client: reqwest::Client,
    config: ResolvedSearchConfig,
}

impl AzureSearchClient {
    pub fn new(config: ResolvedSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.index,
            self.config.api_version
        )
    }

    fn request_body(&self, vector: Vec<f32>) -> SearchRequest<'_> {
        SearchRequest {
            query_type: "semantic",
            semantic_configuration: &self.config.semantic_configuration,
            vector_queries: vec![VectorQuery {
                kind: "vector",
                vector,
                k: self.config.k,
                fields: &self.config.vector_field,
            }],
            select: SELECT_FIELDS,
            top: self.config.top,
        }
    }
}

#[async_trait]
impl SemanticSearch for AzureSearchClient {
    async fn search(&self, vector: Vec<f32>) -> Result<Vec<MovieDocument>> {
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&self.request_body(vector))
            .send()
            .await
            .map_err(|e| SearchError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Search request rejected");
            return Err(SearchError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: SearchResponse = response.json().await.map_err(|e| SearchError::Decode {
            message: e.to_string(),
        })?;
        Ok(body.value)
    }
}
