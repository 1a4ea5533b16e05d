use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use common::{error::AppError, storage::types::question::Question, utils::config::AppConfig};
use serde::Deserialize;
use serde_json::json;

static GENERATION_SYSTEM_MESSAGE: &str = "You write multiple-choice quiz questions from \
    technical documentation. Every question has four options labelled A through D and \
    exactly one correct answer.";

/// Opaque question-generation service. The scheduler only depends on this
/// trait, so tests can substitute a deterministic source.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(&self, text: &str, num_questions: u32) -> Result<Vec<Question>, AppError>;
}

pub struct OpenAiQuestionSource {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

#[derive(Deserialize)]
struct GeneratedQuestions {
    questions: Vec<Question>,
}

impl OpenAiQuestionSource {
    pub fn new(client: Arc<Client<OpenAIConfig>>, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.generation_model.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        Self::new(client, config)
    }

    fn build_request(
        &self,
        text: &str,
        num_questions: u32,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let user_message = format!(
            "Generate {num_questions} multiple-choice questions based on the following text. \
            For each question, provide four options (A, B, C, D) with exactly one correct \
            answer.\n\nHere is the text:\n{text}"
        );

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Multiple-choice questions generated from the supplied text".into()),
                name: "multiple_choice_questions".into(),
                schema: Some(question_batch_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(GENERATION_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .temperature(0.0)
            .build()?;

        Ok(request)
    }
}

#[async_trait]
impl QuestionSource for OpenAiQuestionSource {
    async fn generate(&self, text: &str, num_questions: u32) -> Result<Vec<Question>, AppError> {
        let request = self.build_request(text, num_questions)?;
        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(AppError::LLMParsing(
                "No content found in generation response".into(),
            ))?;

        let parsed = serde_json::from_str::<GeneratedQuestions>(content).map_err(|e| {
            AppError::LLMParsing(format!("Failed to parse generated questions: {e}"))
        })?;

        Ok(parsed.questions)
    }
}

fn question_batch_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question": { "type": "string" },
                        "options": {
                            "type": "object",
                            "properties": {
                                "A": { "type": "string" },
                                "B": { "type": "string" },
                                "C": { "type": "string" },
                                "D": { "type": "string" }
                            },
                            "required": ["A", "B", "C", "D"],
                            "additionalProperties": false
                        },
                        "correct_answer": { "type": "string", "enum": ["A", "B", "C", "D"] }
                    },
                    "required": ["question", "options", "correct_answer"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}
