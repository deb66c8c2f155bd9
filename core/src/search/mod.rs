//! Retrieval of movie documents for context-grounded answers

pub mod azure;

pub use azure::AzureSearchClient;

use crate::error::Result;
use crate::llm::EmbeddingClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;

/// A movie document returned by the search index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    /// Stored as a number or a string depending on the index
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub rating: Option<Value>,
}

/// Vector plus semantic search over an index of movie documents
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Return the documents closest to the given embedding
    async fn search(&self, vector: Vec<f32>) -> Result<Vec<MovieDocument>>;
}

/// Embeds a question and fetches its context documents
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    search: Arc<dyn SemanticSearch>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, search: Arc<dyn SemanticSearch>) -> Self {
        Self { embedder, search }
    }

    /// Fetch the documents for a question; an empty question yields none
    pub async fn retrieve(&self, question: &str) -> Result<Vec<MovieDocument>> {
        if question.trim().is_empty() {
            tracing::debug!("Empty question, skipping retrieval");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(question).await?;
        let documents = self.search.search(vector).await?;
        tracing::debug!(count = documents.len(), "Retrieved context documents");
        Ok(documents)
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn scalar(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render documents as numbered context lines for the prompt
pub fn format_context(documents: &[MovieDocument]) -> String {
    let mut results = String::new();
    for (i, doc) in documents.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = writeln!(
            results,
            "{}. Title: {}, Genre: {}, Plot: {}, Year: {}, Rating: {}",
            i + 1,
            field(&doc.title),
            field(&doc.genre),
            field(&doc.plot),
            scalar(&doc.year),
            scalar(&doc.rating),
        );
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2])
        }
    }

    struct FixedSearch;

    #[async_trait]
    impl SemanticSearch for FixedSearch {
        async fn search(&self, vector: Vec<f32>) -> Result<Vec<MovieDocument>> {
            assert_eq!(vector, vec![0.1, 0.2]);
            Ok(vec![MovieDocument {
                title: Some("Alien".to_string()),
                ..Default::default()
            }])
        }
    }

    #[test]
    fn test_format_context_numbers_lines() {
        let documents: Vec<MovieDocument> = serde_json::from_value(json!([
            {"title": "Inception", "genre": "Sci-Fi", "plot": "Dreams", "year": 2010, "rating": 8.8},
            {"title": "Alien", "genre": "Horror", "plot": "Space", "year": "1979", "rating": null}
        ]))
        .unwrap();

        assert_eq!(
            format_context(&documents),
            "1. Title: Inception, Genre: Sci-Fi, Plot: Dreams, Year: 2010, Rating: 8.8\n\
             2. Title: Alien, Genre: Horror, Plot: Space, Year: 1979, Rating: \n"
        );
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
        assert_eq!(
            format_context(&[MovieDocument::default()]),
            "1. Title: , Genre: , Plot: , Year: , Rating: \n"
        );
    }

    #[tokio::test]
    async fn test_retriever_skips_empty_question() {
        let embedder = Arc::new(FixedEmbedder {
            calls: AtomicUsize::new(0),
        });
        let retriever = Retriever::new(embedder.clone(), Arc::new(FixedSearch));

        assert!(retriever.retrieve("  ").await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        let documents = retriever.retrieve("Who is in Alien?").await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}
