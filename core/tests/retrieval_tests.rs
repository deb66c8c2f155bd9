//! Retrieval-phase answering against stub search and a scripted model

use async_trait::async_trait;
use serde_json::json;
use smoorgh_core::config::{Protocol, ResolvedEmbeddingConfig, ResolvedLlmConfig};
use smoorgh_core::error::{Error, LlmError, Result, SearchError};
use smoorgh_core::llm::{create_embedding_client, EmbeddingClient, MessageRole, ScriptedLlmClient};
use smoorgh_core::prompt::ANSWER_PRIMER;
use smoorgh_core::search::{MovieDocument, Retriever, SemanticSearch};
use smoorgh_core::{Orchestrator, OrchestratorConfig, Phase, Question, QuestionType};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedEmbedder;

#[async_trait]
impl EmbeddingClient for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.5, -0.25])
    }
}

#[derive(Default)]
struct StubSearch {
    documents: Vec<MovieDocument>,
    fail: bool,
    vectors: Mutex<Vec<Vec<f32>>>,
}

#[async_trait]
impl SemanticSearch for StubSearch {
    async fn search(&self, vector: Vec<f32>) -> Result<Vec<MovieDocument>> {
        self.vectors.lock().unwrap().push(vector);
        if self.fail {
            return Err(SearchError::Status {
                status: 503,
                message: "index unavailable".to_string(),
            }
            .into());
        }
        Ok(self.documents.clone())
    }
}

fn alien() -> MovieDocument {
    MovieDocument {
        title: Some("Alien".to_string()),
        genre: Some("Sci-Fi".to_string()),
        plot: Some("A crew meets a deadly creature.".to_string()),
        year: Some(json!(1979)),
        rating: Some(json!("8.5")),
    }
}

fn orchestrator(
    llm: Arc<ScriptedLlmClient>,
    embedder: Arc<dyn EmbeddingClient>,
    search: Arc<StubSearch>,
    timeout_secs: u64,
) -> Orchestrator {
    Orchestrator::builder(
        OrchestratorConfig::new(Phase::Retrieval).with_request_timeout_secs(timeout_secs),
    )
    .llm_client(llm)
    .retriever(Retriever::new(embedder, search))
    .build()
    .unwrap()
}

#[tokio::test]
async fn context_documents_are_placed_in_the_system_prompt() {
    let llm = Arc::new(ScriptedLlmClient::new());
    llm.push_text("Ridley Scott", 300, 3);
    let search = Arc::new(StubSearch {
        documents: vec![alien()],
        ..Default::default()
    });

    let orchestrator = orchestrator(llm.clone(), Arc::new(FixedEmbedder), search.clone(), 60);
    let question = Question::new("Who directed Alien?", QuestionType::MultipleChoice)
        .with_correlation_token("r-1");
    let answer = orchestrator.answer(&question).await.unwrap();

    assert_eq!(answer.answer, "Ridley Scott");
    assert_eq!(answer.correlation_token.as_deref(), Some("r-1"));
    assert_eq!(answer.prompt_tokens_used, Some(300));
    assert_eq!(search.vectors.lock().unwrap().clone(), vec![vec![0.5, -0.25]]);

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].tools.is_none());

    let messages = &requests[0].messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::System);
    let system = messages[0].get_text().unwrap();
    assert!(system.contains(
        "# Context:\n1. Title: Alien, Genre: Sci-Fi, Plot: A crew meets a deadly creature., Year: 1979, Rating: 8.5\n"
    ));
    assert!(system.ends_with("# Question:\nWho directed Alien?"));
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].get_text().unwrap(), ANSWER_PRIMER);
}

#[tokio::test]
async fn search_failure_fails_the_request() {
    let llm = Arc::new(ScriptedLlmClient::new());
    let search = Arc::new(StubSearch {
        fail: true,
        ..Default::default()
    });

    let orchestrator = orchestrator(llm.clone(), Arc::new(FixedEmbedder), search, 60);
    let result = orchestrator
        .answer(&Question::new("Who directed Alien?", QuestionType::MultipleChoice))
        .await;

    assert!(matches!(
        result,
        Err(Error::Search(SearchError::Status { status: 503, .. }))
    ));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn stalled_embedding_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "object": "list",
                    "model": "text-embedding-3-small",
                    "data": [{"index": 0, "object": "embedding", "embedding": [0.1]}],
                    "usage": {"prompt_tokens": 1, "total_tokens": 1}
                }))
                .set_delay(Duration::from_secs(6)),
        )
        .mount(&server)
        .await;

    let llm_config = ResolvedLlmConfig::new(
        Protocol::OpenAICompat,
        server.uri(),
        "sk-test".to_string(),
        "gpt-4o-mini".to_string(),
    );
    let embedder = create_embedding_client(
        &llm_config,
        &ResolvedEmbeddingConfig::new("text-embedding-3-small"),
    )
    .unwrap();

    let llm = Arc::new(ScriptedLlmClient::new());
    let orchestrator = orchestrator(llm.clone(), embedder, Arc::new(StubSearch::default()), 1);

    let result = tokio::time::timeout(
        Duration::from_secs(4),
        orchestrator.answer(&Question::new("Who directed Alien?", QuestionType::MultipleChoice)),
    )
    .await
    .expect("request timeout should fire before the outer bound");

    assert!(matches!(
        result,
        Err(Error::Llm(LlmError::Timeout { seconds: 1 }))
    ));
    assert_eq!(llm.call_count(), 0);
}
