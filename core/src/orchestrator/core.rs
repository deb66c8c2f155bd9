//! Answering state machine

use crate::config::ResolvedConfig;
use crate::error::{LlmError, OrchestratorError, Result};
use crate::llm::{
    create_embedding_client, create_llm_client, ChatOptions, LlmClient, LlmMessage, LlmResponse,
    ToolChoice, ToolDefinition,
};
use crate::prompt::PromptBuilder;
use crate::question::{Answer, Question};
use crate::search::{format_context, AzureSearchClient, Retriever};
use crate::tools::{FactClient, ToolCall, ToolRegistry};
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::{OrchestratorBuilder, OrchestratorConfig, Phase, ToolResultPolicy};

/// Progress of a single answering request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingFirstModelResponse,
    DispatchingTools,
    AwaitingSecondModelResponse,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingFirstModelResponse => "awaiting_first_model_response",
            Stage::DispatchingTools => "dispatching_tools",
            Stage::AwaitingSecondModelResponse => "awaiting_second_model_response",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-request conversation; never shared between requests
struct Conversation {
    messages: Vec<LlmMessage>,
    stage: Stage,
}

impl Conversation {
    fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            stage: Stage::AwaitingFirstModelResponse,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// Turns questions into answers using the configured phase.
///
/// Built once at start-up and shared read-only between requests.
pub struct Orchestrator {
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) retriever: Option<Retriever>,
    pub(crate) prompts: PromptBuilder,
    pub(crate) options: ChatOptions,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Build an orchestrator and its collaborators from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        config.validate()?;

        let llm = create_llm_client(&config.llm)?;
        let mut builder = OrchestratorBuilder::new(config.orchestrator.clone())
            .llm_client(llm)
            .chat_options(ChatOptions::from_params(&config.llm.params));

        match config.orchestrator.phase {
            Phase::Direct => {}
            Phase::Retrieval => {
                // validate() guarantees both sections are present
                let (Some(embedding), Some(search)) = (&config.embedding, &config.search) else {
                    return Err(OrchestratorError::MissingComponent {
                        phase: Phase::Retrieval.to_string(),
                        component: "embedding and search configuration".to_string(),
                    }
                    .into());
                };
                let embedder = create_embedding_client(&config.llm, embedding)?;
                let search = AzureSearchClient::new(search.clone())?;
                builder = builder.retriever(Retriever::new(embedder, Arc::new(search)));
            }
            Phase::Tools => {
                let client = FactClient::new(&config.facts)?;
                builder = builder.tools(Arc::new(ToolRegistry::movie_facts(client)?));
            }
        }

        builder.build()
    }

    pub fn phase(&self) -> Phase {
        self.config.phase
    }

    /// Answer one question
    pub async fn answer(&self, question: &Question) -> Result<Answer> {
        info!(
            phase = %self.config.phase,
            question_type = %question.question_type,
            question = question.text(),
            "Answering question"
        );

        let answer = match self.config.phase {
            Phase::Direct => self.answer_direct(question).await?,
            Phase::Retrieval => self.answer_with_context(question).await?,
            Phase::Tools => self.answer_with_tools(question).await?,
        };

        info!(
            answer = %answer.answer,
            prompt_tokens = ?answer.prompt_tokens_used,
            completion_tokens = ?answer.completion_tokens_used,
            "Answered"
        );
        Ok(answer)
    }

    async fn answer_direct(&self, question: &Question) -> Result<Answer> {
        let mut conversation = Conversation::new(self.prompts.build(question, None)?);
        let response = self.call_model(conversation.messages.clone(), None).await?;
        conversation.advance(Stage::Done);
        Ok(Answer::from_response(&response, question))
    }

    async fn answer_with_context(&self, question: &Question) -> Result<Answer> {
        let documents = match &self.retriever {
            Some(retriever) => self.bounded(retriever.retrieve(question.text())).await?,
            None => Vec::new(),
        };
        let context = format_context(&documents);
        debug!(context = %context, "Search results");

        let mut conversation = Conversation::new(self.prompts.build(question, Some(&context))?);
        let response = self.call_model(conversation.messages.clone(), None).await?;
        conversation.advance(Stage::Done);
        Ok(Answer::from_response(&response, question))
    }

    async fn answer_with_tools(&self, question: &Question) -> Result<Answer> {
        let mut conversation = Conversation::new(self.prompts.build(question, None)?);

        let first = self
            .call_model(conversation.messages.clone(), Some(self.tools.definitions()))
            .await?;

        let calls = first.message.tool_calls();
        if calls.is_empty() {
            debug!("Model answered without tools");
            conversation.advance(Stage::Done);
            return Ok(Answer::from_response(&first, question));
        }

        conversation.advance(Stage::DispatchingTools);
        self.validate_calls(&calls)?;
        conversation.messages.push(first.message.clone());

        let last = match self.config.tool_policy {
            ToolResultPolicy::Consolidated => {
                let results = join_all(calls.iter().map(|call| self.run_tool(call))).await;
                for (call, content) in calls.iter().zip(results) {
                    conversation
                        .messages
                        .push(LlmMessage::tool_result(&call.id, &call.name, content?));
                }

                conversation.advance(Stage::AwaitingSecondModelResponse);
                self.call_model(conversation.messages.clone(), None).await?
            }
            ToolResultPolicy::LastWins => {
                if calls.len() > 1 {
                    warn!(
                        calls = calls.len(),
                        "last_wins sends tool results one at a time; strict endpoints reject unanswered tool calls"
                    );
                }
                let mut last = None;
                for call in &calls {
                    let content = self.run_tool(call).await?;
                    conversation
                        .messages
                        .push(LlmMessage::tool_result(&call.id, &call.name, content));

                    conversation.advance(Stage::AwaitingSecondModelResponse);
                    last = Some(self.call_model(conversation.messages.clone(), None).await?);
                }
                last.ok_or(LlmError::EmptyResponse)?
            }
        };

        conversation.advance(Stage::Done);
        Ok(Answer::from_response(&last, question))
    }

    /// Reject the whole batch before any lookup runs
    fn validate_calls(&self, calls: &[ToolCall]) -> Result<()> {
        for call in calls {
            let tool = self
                .tools
                .get(&call.name)
                .ok_or_else(|| OrchestratorError::UnknownTool {
                    name: call.name.clone(),
                })?;

            tool.validate(call)
                .map_err(|e| OrchestratorError::BadToolArguments {
                    name: call.name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn run_tool(&self, call: &ToolCall) -> Result<String> {
        debug!(tool = %call.name, id = %call.id, arguments = %call.parameters, "Calling tool");
        let result = self.tools.execute(call.clone()).await?;
        debug!(tool = %call.name, result = %result.content, duration_ms = ?result.duration_ms, "Tool finished");
        Ok(result.content)
    }

    async fn call_model(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<LlmResponse> {
        let mut options = self.options.clone();
        if tools.is_some() {
            options.tool_choice = Some(ToolChoice::Auto);
        }

        self.bounded(self.llm.chat_completion(messages, tools, Some(options)))
            .await
    }

    /// Bound a model or embedding call by the request timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let seconds = self.config.request_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(seconds), call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(seconds, "Call timed out");
                Err(LlmError::Timeout { seconds }.into())
            }
        }
    }
}
