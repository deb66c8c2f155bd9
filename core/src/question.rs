//! Question and answer wire types

use crate::llm::LlmResponse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of trivia question; selects the prompt template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Pick one of the listed options
    MultipleChoice,

    /// Answer with true or false
    TrueOrFalse,

    /// Pick the option most people would choose
    PopularChoice,

    /// Answer with a single number
    Estimation,
}

impl QuestionType {
    /// All question types, in wire order
    pub const ALL: [QuestionType; 4] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueOrFalse,
        QuestionType::PopularChoice,
        QuestionType::Estimation,
    ];

    /// Wire name of the question type
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueOrFalse => "true_or_false",
            QuestionType::PopularChoice => "popular_choice",
            QuestionType::Estimation => "estimation",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound question (`POST /ask` body)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question text, passed to the model verbatim
    #[serde(default)]
    pub question: Option<String>,

    /// Question type
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Opaque caller token echoed back on the answer
    #[serde(default)]
    pub correlation_token: Option<String>,
}

impl Question {
    /// Create a new question
    pub fn new<S: Into<String>>(question: S, question_type: QuestionType) -> Self {
        Self {
            question: Some(question.into()),
            question_type,
            correlation_token: None,
        }
    }

    /// Set the correlation token
    pub fn with_correlation_token<S: Into<String>>(mut self, token: S) -> Self {
        self.correlation_token = Some(token.into());
        self
    }

    /// Question text, or the empty string when none was sent
    pub fn text(&self) -> &str {
        self.question.as_deref().unwrap_or("")
    }
}

/// The answer returned for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Answer text produced by the model
    pub answer: String,

    /// Correlation token copied from the question
    pub correlation_token: Option<String>,

    /// Prompt tokens of the last model call
    pub prompt_tokens_used: Option<u32>,

    /// Completion tokens of the last model call
    pub completion_tokens_used: Option<u32>,
}

impl Answer {
    /// Build an answer from the last model response of a request
    pub fn from_response(response: &LlmResponse, question: &Question) -> Self {
        Self {
            answer: response.message.get_text().unwrap_or_default(),
            correlation_token: question.correlation_token.clone(),
            prompt_tokens_used: response.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens_used: response.usage.as_ref().map(|u| u.completion_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_deserializes_all_types() {
        for question_type in QuestionType::ALL {
            let body = json!({
                "question": "Who?",
                "type": question_type.as_str(),
                "correlationToken": "abc"
            });
            let question: Question = serde_json::from_value(body).unwrap();
            assert_eq!(question.question_type, question_type);
            assert_eq!(question.correlation_token.as_deref(), Some("abc"));
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let body = json!({ "question": "Who?", "type": "open_ended" });
        assert!(serde_json::from_value::<Question>(body).is_err());
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let body = json!({ "question": "Who?" });
        assert!(serde_json::from_value::<Question>(body).is_err());
    }

    #[test]
    fn test_null_question_and_token_are_accepted() {
        let body = json!({ "question": null, "type": "estimation", "correlationToken": null });
        let question: Question = serde_json::from_value(body).unwrap();
        assert_eq!(question.question, None);
        assert_eq!(question.text(), "");
        assert_eq!(question.correlation_token, None);
    }

    #[test]
    fn test_answer_serializes_nulls() {
        let answer = Answer {
            answer: "3".to_string(),
            correlation_token: None,
            prompt_tokens_used: Some(12),
            completion_tokens_used: None,
        };
        let value = serde_json::to_value(&answer).unwrap();
        assert_eq!(
            value,
            json!({
                "answer": "3",
                "correlationToken": null,
                "promptTokensUsed": 12,
                "completionTokensUsed": null
            })
        );
    }
}
