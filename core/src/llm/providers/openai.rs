//! OpenAI and Azure OpenAI client implementation using async-openai library

use crate::config::ResolvedLlmConfig;
use crate::error::{Error, LlmError, Result};
use crate::llm::{
    ChatOptions, ContentBlock, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageContent,
    MessageRole, ToolChoice, ToolDefinition, Usage,
};
use async_openai::{
    config::{AzureConfig, Config, OpenAIConfig},
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
        ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall,
        FunctionObject, Stop,
    },
    Client,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;

/// Chat completion client for OpenAI-compatible and Azure OpenAI endpoints
pub struct OpenAiClient<C: Config> {
    client: Client<C>,
    model: String,
    provider: &'static str,
}

impl OpenAiClient<OpenAIConfig> {
    /// Create a client for an OpenAI-compatible endpoint
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        require_api_key(config)?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(config.base_url.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client(&config.headers)?),
            model: config.model.clone(),
            provider: "openai",
        })
    }
}

impl OpenAiClient<AzureConfig> {
    /// Create a client for an Azure OpenAI deployment; `model` is the deployment name
    pub fn azure(config: &ResolvedLlmConfig) -> Result<Self> {
        require_api_key(config)?;

        let azure_config = AzureConfig::new()
            .with_api_base(config.base_url.trim_end_matches('/'))
            .with_api_key(&config.api_key)
            .with_deployment_id(&config.model)
            .with_api_version(config.api_version.clone().unwrap_or_default());

        Ok(Self {
            client: Client::with_config(azure_config).with_http_client(http_client(&config.headers)?),
            model: config.model.clone(),
            provider: "azure_openai",
        })
    }
}

fn require_api_key(config: &ResolvedLlmConfig) -> Result<()> {
    if config.api_key.is_empty() {
        return Err(Error::Llm(LlmError::Authentication {
            message: format!("No API key found for {}", config.protocol.as_str()),
        }));
    }
    Ok(())
}

/// Build the HTTP client carrying the configured extra headers
pub(crate) fn http_client(headers: &HashMap<String, String>) -> Result<reqwest::Client> {
    let mut header_map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| LlmError::InvalidRequest {
            message: format!("Invalid header name '{}': {}", key, e),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| LlmError::InvalidRequest {
            message: format!("Invalid value for header '{}': {}", key, e),
        })?;
        header_map.insert(name, value);
    }

    Ok(reqwest::Client::builder().default_headers(header_map).build()?)
}

/// Map an async-openai failure onto the model error taxonomy
pub(crate) fn map_openai_error(error: OpenAIError) -> LlmError {
    match error {
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) => LlmError::ApiError {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => LlmError::Network {
                message: e.to_string(),
            },
        },
        OpenAIError::ApiError(api) => {
            let message = api.to_string();
            match api.code.as_deref() {
                Some("invalid_api_key") | Some("401") => LlmError::Authentication { message },
                _ => LlmError::ApiError {
                    status: 500, // async-openai doesn't expose status codes directly
                    message,
                },
            }
        }
        OpenAIError::JSONDeserialize(e) => LlmError::ApiError {
            status: 500,
            message: format!("Malformed response: {}", e),
        },
        OpenAIError::InvalidArgument(message) => LlmError::InvalidRequest { message },
        other => LlmError::ApiError {
            status: 500,
            message: other.to_string(),
        },
    }
}

impl<C: Config> OpenAiClient<C> {
    /// Convert our internal message format to async-openai format
    fn convert_messages(
        &self,
        messages: Vec<LlmMessage>,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut converted = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => {
                    let content = extract_text_content(&message.content);
                    converted.push(ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessage {
                            content: content.into(),
                            name: None,
                        },
                    ));
                }
                MessageRole::User => {
                    let content = extract_text_content(&message.content);
                    converted.push(ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessage {
                            content: content.into(),
                            name: None,
                        },
                    ));
                }
                MessageRole::Assistant => {
                    converted.push(ChatCompletionRequestMessage::Assistant(
                        convert_assistant(&message.content),
                    ));
                }
                MessageRole::Tool => {
                    let mut pushed_any = false;
                    if let MessageContent::MultiModal(blocks) = &message.content {
                        for block in blocks {
                            if let ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                                ..
                            } = block
                            {
                                converted.push(ChatCompletionRequestMessage::Tool(
                                    ChatCompletionRequestToolMessage {
                                        content: ChatCompletionRequestToolMessageContent::Text(
                                            content.clone(),
                                        ),
                                        tool_call_id: tool_use_id.clone(),
                                    },
                                ));
                                pushed_any = true;
                            }
                        }
                    }
                    if !pushed_any {
                        return Err((LlmError::InvalidRequest {
                            message: "Tool message must contain ToolResult".to_string(),
                        })
                        .into());
                    }
                }
            }
        }

        Ok(converted)
    }

    /// Convert our tool definitions to async-openai format
    fn convert_tools(&self, tools: Vec<ToolDefinition>) -> Vec<ChatCompletionTool> {
        tools
            .into_iter()
            .map(|tool| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.function.name,
                    description: Some(tool.function.description),
                    parameters: Some(tool.function.parameters),
                    strict: None,
                },
            })
            .collect()
    }

    /// Convert async-openai response to our internal format
    fn convert_response(&self, response: CreateChatCompletionResponse) -> Result<LlmResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        let mut blocks = Vec::new();
        if let Some(content) = choice.message.content {
            blocks.push(ContentBlock::Text { text: content });
        }

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        for tool_call in tool_calls {
            let function = tool_call.function;
            // Keep unparseable arguments as a raw string so validation can reject them
            let args: Value = serde_json::from_str(&function.arguments)
                .unwrap_or_else(|_| Value::String(function.arguments.clone()));

            blocks.push(ContentBlock::ToolUse {
                id: tool_call.id,
                name: function.name,
                input: args,
            });
        }

        let message_content = match blocks.as_slice() {
            [] => MessageContent::Text(String::new()),
            [ContentBlock::Text { text }] => MessageContent::Text(text.clone()),
            _ => MessageContent::MultiModal(blocks),
        };

        let message = LlmMessage {
            role: MessageRole::Assistant,
            content: message_content,
            metadata: None,
        };

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        let finish_reason = choice.finish_reason.map(|reason| match reason {
            async_openai::types::FinishReason::Stop => FinishReason::Stop,
            async_openai::types::FinishReason::Length => FinishReason::Length,
            async_openai::types::FinishReason::ToolCalls => FinishReason::ToolCalls,
            async_openai::types::FinishReason::ContentFilter => FinishReason::ContentFilter,
            async_openai::types::FinishReason::FunctionCall => FinishReason::ToolCalls,
        });

        Ok(LlmResponse {
            message,
            usage,
            model: response.model,
            finish_reason,
            metadata: None,
        })
    }
}

/// Extract text content from MessageContent
fn extract_text_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::MultiModal(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn convert_assistant(content: &MessageContent) -> ChatCompletionRequestAssistantMessage {
    let (text, tool_calls) = match content {
        MessageContent::Text(text) => (text.clone(), Vec::new()),
        MessageContent::MultiModal(blocks) => {
            let mut tool_calls = Vec::new();
            for block in blocks {
                if let ContentBlock::ToolUse { id, name, input } = block {
                    tool_calls.push(ChatCompletionMessageToolCall {
                        id: id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: match input {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            },
                        },
                    });
                }
            }
            (extract_text_content(content), tool_calls)
        }
    };

    ChatCompletionRequestAssistantMessage {
        content: if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(ChatCompletionRequestAssistantMessageContent::Text(text))
        },
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        ..Default::default()
    }
}

#[async_trait]
impl<C: Config> LlmClient for OpenAiClient<C> {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let converted_messages = self.convert_messages(messages)?;
        let converted_tools = tools
            .filter(|t| !t.is_empty())
            .map(|t| self.convert_tools(t));

        if let Some(ref tools) = converted_tools {
            tracing::debug!("{} request with {} tools enabled", self.provider, tools.len());
        }

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.model);
        request_builder.messages(converted_messages);

        let has_tools = converted_tools.is_some();
        if let Some(tools) = converted_tools {
            request_builder.tools(tools);
        }

        if let Some(opts) = options {
            if let Some(max_tokens) = opts.max_tokens {
                request_builder.max_tokens(max_tokens);
            }
            if let Some(temperature) = opts.temperature {
                request_builder.temperature(temperature);
            }
            if let Some(top_p) = opts.top_p {
                request_builder.top_p(top_p);
            }
            if let Some(stop) = opts.stop.filter(|s| !s.is_empty()) {
                request_builder.stop(Stop::StringArray(stop));
            }
            // tool_choice is only valid alongside tools
            if let (true, Some(choice)) = (has_tools, opts.tool_choice) {
                request_builder.tool_choice(match choice {
                    ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
                });
            }
        }

        let request = request_builder.build().map_err(|e| {
            tracing::error!("Failed to build {} request: {}", self.provider, e);
            LlmError::InvalidRequest {
                message: format!("Failed to build request: {}", e),
            }
        })?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            tracing::error!("{} API call failed: {}", self.provider, e);
            map_openai_error(e)
        })?;

        let result = self.convert_response(response);
        if let Ok(response) = &result {
            for call in response.message.tool_calls() {
                tracing::debug!("Tool call: {} (id: {})", call.name, call.id);
            }
            if let Some(FinishReason::ToolCalls) = response.finish_reason {
                tracing::debug!("{} response finished due to tool calls", self.provider);
            }
        }

        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}
