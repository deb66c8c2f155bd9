//! Prompt construction for each answering phase
//!
//! Instructions are picked per question type; the surrounding layout of each
//! phase is a handlebars template rendered without HTML escaping.

use crate::error::Result;
use crate::llm::LlmMessage;
use crate::orchestrator::Phase;
use crate::question::{Question, QuestionType};
use handlebars::Handlebars;
use serde_json::json;

const DIRECT_SYSTEM: &str = "direct_system";
const DIRECT_USER: &str = "direct_user";
const RETRIEVAL_SYSTEM: &str = "retrieval_system";
const TOOLS_SYSTEM: &str = "tools_system";

const DIRECT_USER_LAYOUT: &str = "Question: {{question}}\nType: {{type}}\nAnswer: ";
const RETRIEVAL_LAYOUT: &str =
    "{{instructions}}\n# Context:\n{{context}}\n# Question:\n{{question}}";
const TOOLS_LAYOUT: &str = "{{instructions}}\n\nQuestion: {{question}}";

/// Primer sent as an assistant message after the retrieval prompt
pub const ANSWER_PRIMER: &str = "Answer: ";

const DIRECT_INSTRUCTIONS: &str = concat!(
    "You are a question answering bot. Answer the question correctly. ",
    "For multiple choice and popular choice, do NOT include the index of the answer ",
    "(so e.g. instead of \"1) Blue\" just \"Blue\").\n",
    "\n",
    "Examples:\n",
    "Question: Which movie features a plot where a girl named Dorothy is transported to a magical land? 1) Cinderella 2) The Wizard of Oz\n",
    "Type: multiple_choice\n",
    "Answer: The Wizard of Oz\n",
    "\n",
    "Question: Is Yoda a character from the Star Trek universe: True or False?\n",
    "Type: true_or_false\n",
    "Answer: false\n",
    "\n",
    "Question: Which Pixar movie would most people pick as their favourite? 1) Cars 2 2) Toy Story\n",
    "Type: popular_choice\n",
    "Answer: Toy Story\n",
    "\n",
    "Question: How many movies are there in 'The Lord of the Rings'?\n",
    "Type: estimation\n",
    "Answer: 3",
);

const MULTIPLE_CHOICE_EXAMPLE: &str = concat!(
    "# Examples for answer format:\n",
    "Question: Which movie features a plot where a girl named Dorothy is transported to a magical land? 1) Cinderella 2) The Wizard of Oz\n",
    "Answer: The Wizard of Oz\n",
);

const TRUE_OR_FALSE_EXAMPLE: &str = concat!(
    "# Examples for answer format:\n",
    "Question: Is Yoda a character from the Star Trek universe: True or False?\n",
    "Answer: false",
);

const POPULAR_CHOICE_EXAMPLE: &str = concat!(
    "# Examples for answer format:\n",
    "Question: Which Pixar movie would most people pick as their favourite? 1) Cars 2 2) Toy Story\n",
    "Answer: Toy Story",
);

const ESTIMATION_EXAMPLE: &str = concat!(
    "# Examples for answer format:\n",
    "Question: How many movies are there in 'The Lord of the Rings'?\n",
    "Answer: 3",
);

/// Per-type instructions for the tool-calling phase
fn tools_instructions(question_type: QuestionType) -> String {
    let lead = "You are a question answering bot. Use the tools available to you.";
    match question_type {
        QuestionType::MultipleChoice => format!(
            "{} Do NOT include the index of the answer (so e.g. instead of \"1) Blue\" just \"Blue\"). \n\n{}",
            lead, MULTIPLE_CHOICE_EXAMPLE
        ),
        QuestionType::TrueOrFalse => format!(
            "{} Answer the question with either True or False.\n\n{}",
            lead, TRUE_OR_FALSE_EXAMPLE
        ),
        QuestionType::PopularChoice => format!(
            "{} Answer with the option most people would choose. Do NOT include the index of the answer (so e.g. instead of \"1) Blue\" just \"Blue\").\n\n{}",
            lead, POPULAR_CHOICE_EXAMPLE
        ),
        QuestionType::Estimation => format!(
            "{} Answer the question with only the number, no unit or other words. Give the shortest possible answer.\n\n{}",
            lead, ESTIMATION_EXAMPLE
        ),
    }
}

/// Per-type instructions for the retrieval phase
fn retrieval_instructions(question_type: QuestionType) -> String {
    let lead = "You are a question answering bot. Answer the question exclusively based on the context provided below";
    match question_type {
        QuestionType::MultipleChoice => format!(
            "{}. Do NOT include the index of the answer (so e.g. instead of \"1) Blue\" just \"Blue\"). \n\n{}",
            lead, MULTIPLE_CHOICE_EXAMPLE
        ),
        QuestionType::TrueOrFalse => format!(
            "{} with either True or False.\n\n{}",
            lead, TRUE_OR_FALSE_EXAMPLE
        ),
        QuestionType::PopularChoice => format!(
            "{} with the option most people would choose. Do NOT include the index of the answer (so e.g. instead of \"1) Blue\" just \"Blue\").\n\n{}",
            lead, POPULAR_CHOICE_EXAMPLE
        ),
        QuestionType::Estimation => format!(
            "{} with only the number, no unit or other words. Give the shortest possible answer.\n\n{}",
            lead, ESTIMATION_EXAMPLE
        ),
    }
}

/// Builds the initial conversation for a question
pub struct PromptBuilder {
    registry: Handlebars<'static>,
    phase: Phase,
}

impl PromptBuilder {
    /// Create a builder for the given phase
    pub fn new(phase: Phase) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template_string(DIRECT_SYSTEM, DIRECT_INSTRUCTIONS)?;
        registry.register_template_string(DIRECT_USER, DIRECT_USER_LAYOUT)?;
        registry.register_template_string(RETRIEVAL_SYSTEM, RETRIEVAL_LAYOUT)?;
        registry.register_template_string(TOOLS_SYSTEM, TOOLS_LAYOUT)?;

        Ok(Self { registry, phase })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Instructions used for a question type in this builder's phase
    pub fn instructions(&self, question_type: QuestionType) -> String {
        match self.phase {
            Phase::Direct => DIRECT_INSTRUCTIONS.to_string(),
            Phase::Retrieval => retrieval_instructions(question_type),
            Phase::Tools => tools_instructions(question_type),
        }
    }

    /// Build the initial conversation.
    ///
    /// `context` holds the formatted retrieval results and is only used in the
    /// retrieval phase.
    pub fn build(&self, question: &Question, context: Option<&str>) -> Result<Vec<LlmMessage>> {
        let data = json!({
            "instructions": self.instructions(question.question_type),
            "question": question.text(),
            "type": question.question_type.as_str(),
            "context": context.unwrap_or(""),
        });

        let messages = match self.phase {
            Phase::Direct => vec![
                LlmMessage::system(self.registry.render(DIRECT_SYSTEM, &data)?),
                LlmMessage::user(self.registry.render(DIRECT_USER, &data)?),
            ],
            Phase::Retrieval => vec![
                LlmMessage::system(self.registry.render(RETRIEVAL_SYSTEM, &data)?),
                LlmMessage::assistant(ANSWER_PRIMER),
            ],
            Phase::Tools => vec![LlmMessage::system(
                self.registry.render(TOOLS_SYSTEM, &data)?,
            )],
        };

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    fn system_text(messages: &[LlmMessage]) -> String {
        messages[0].get_text().unwrap()
    }

    #[test]
    fn test_tools_prompt_selects_template_by_type() {
        let builder = PromptBuilder::new(Phase::Tools).unwrap();
        let expected = [
            (QuestionType::MultipleChoice, "Answer: The Wizard of Oz"),
            (QuestionType::TrueOrFalse, "True or False?\nAnswer: false"),
            (QuestionType::PopularChoice, "Answer: Toy Story"),
            (QuestionType::Estimation, "Answer: 3"),
        ];

        for (question_type, example) in expected {
            let messages = builder
                .build(&Question::new("Q?", question_type), None)
                .unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].role, MessageRole::System);
            let text = system_text(&messages);
            assert!(text.starts_with("You are a question answering bot. Use the tools available to you."));
            assert!(text.contains(example), "{question_type}: {text}");
            assert!(text.ends_with("\n\nQuestion: Q?"));
        }
    }

    #[test]
    fn test_tools_multiple_choice_exact_text() {
        let builder = PromptBuilder::new(Phase::Tools).unwrap();
        let messages = builder
            .build(
                &Question::new("Which is blue? 1) Sky 2) Grass", QuestionType::MultipleChoice),
                None,
            )
            .unwrap();
        assert_eq!(
            system_text(&messages),
            "You are a question answering bot. Use the tools available to you. Do NOT include the index of the answer (so e.g. instead of \"1) Blue\" just \"Blue\"). \n\n\
             # Examples for answer format:\n\
             Question: Which movie features a plot where a girl named Dorothy is transported to a magical land? 1) Cinderella 2) The Wizard of Oz\n\
             Answer: The Wizard of Oz\n\
             \n\nQuestion: Which is blue? 1) Sky 2) Grass"
        );
    }

    #[test]
    fn test_missing_question_renders_empty() {
        let builder = PromptBuilder::new(Phase::Tools).unwrap();
        let question = Question {
            question: None,
            question_type: QuestionType::Estimation,
            correlation_token: None,
        };
        let messages = builder.build(&question, None).unwrap();
        assert!(system_text(&messages).ends_with("Question: "));
    }

    #[test]
    fn test_question_text_is_not_escaped() {
        let builder = PromptBuilder::new(Phase::Tools).unwrap();
        let messages = builder
            .build(
                &Question::new("Is 'Tom & Jerry' <animated>?", QuestionType::TrueOrFalse),
                None,
            )
            .unwrap();
        assert!(system_text(&messages).ends_with("Is 'Tom & Jerry' <animated>?"));
    }

    #[test]
    fn test_direct_prompt_shape() {
        let builder = PromptBuilder::new(Phase::Direct).unwrap();
        let messages = builder
            .build(&Question::new("Is Yoda a Sith?", QuestionType::TrueOrFalse), None)
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert!(system_text(&messages).contains("Type: estimation\nAnswer: 3"));
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(
            messages[1].get_text().unwrap(),
            "Question: Is Yoda a Sith?\nType: true_or_false\nAnswer: "
        );
    }

    #[test]
    fn test_retrieval_prompt_shape() {
        let builder = PromptBuilder::new(Phase::Retrieval).unwrap();
        let context = "1. Title: Alien, Genre: Horror, Plot: Space, Year: 1979, Rating: 8.5\n";
        let messages = builder
            .build(
                &Question::new("When was Alien released?", QuestionType::Estimation),
                Some(context),
            )
            .unwrap();

        assert_eq!(messages.len(), 2);
        let text = system_text(&messages);
        assert!(text.starts_with(
            "You are a question answering bot. Answer the question exclusively based on the context provided below with only the number"
        ));
        assert!(text.ends_with(&format!(
            "Answer: 3\n# Context:\n{}\n# Question:\nWhen was Alien released?",
            context
        )));
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].get_text().unwrap(), ANSWER_PRIMER);
    }
}
