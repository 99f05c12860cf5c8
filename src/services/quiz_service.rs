use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::{config::GeneratorConfig, state::room::QuizQuestion};

/// Error raised by a question source.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Generator settings are incomplete.
    #[error("generator configuration is missing required values")]
    Misconfigured,
    /// The HTTP request to the generator failed.
    #[error("generator request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The generator answered with something that is not a question list.
    #[error("generator response was malformed: {0}")]
    Malformed(String),
}

/// Abstraction over the AI question generator.
pub trait QuestionSource: Send + Sync {
    /// Generate `count` questions about `topic`.
    ///
    /// An `Ok` result may be empty; callers go through
    /// [`generate_with_retry`], which treats empty results as retryable.
    fn generate(
        &self,
        topic: &str,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, GenerationError>>;
}

/// Question source backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiQuestionSource {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiQuestionSource {
    /// Build a source from the configured endpoint, model, and API key.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.endpoint.trim().is_empty()
            || config.model.trim().is_empty()
            || config.api_key.trim().is_empty()
        {
            return Err(GenerationError::Misconfigured);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

impl QuestionSource for OpenAiQuestionSource {
    fn generate(
        &self,
        topic: &str,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, GenerationError>> {
        let client = self.client.clone();
        let config = self.config.clone();
        let topic = topic.to_string();

        Box::pin(async move {
            let prompt = format!(
                "Generate {count} quiz questions about {topic}, each with 4 options and \
                 the correct answer. Respond with a JSON array of objects shaped \
                 {{\"question\": \"...\", \"options\": [\"...\"], \"answer\": \"...\"}} \
                 and nothing else."
            );
            let body = serde_json::json!({
                "model": config.model,
                "messages": [{"role": "user", "content": prompt}],
            });

            let response = client
                .post(&config.endpoint)
                .bearer_auth(&config.api_key)
                .json(&body)
                .send()
                .await?
                .error_for_status()?;

            let completion: ChatCompletion = response.json().await?;
            let content = completion
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| GenerationError::Malformed("completion has no choices".into()))?;

            parse_questions(&content)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Parse a question list out of a model completion.
///
/// Accepts a bare JSON array or one wrapped in a markdown code fence, with
/// lowercase or PascalCase keys. Questions without options or without an
/// answer are dropped rather than failing the batch.
pub fn parse_questions(content: &str) -> Result<Vec<QuizQuestion>, GenerationError> {
    let payload = strip_code_fence(content);
    let questions: Vec<QuizQuestion> = serde_json::from_str(payload)
        .map_err(|err| GenerationError::Malformed(err.to_string()))?;

    Ok(questions
        .into_iter()
        .filter(|q| {
            !q.question.trim().is_empty()
                && !q.options.is_empty()
                && !q.answer.trim().is_empty()
        })
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline, then the
    // closing fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Call the source with bounded retries and exponential backoff.
///
/// Empty and degenerate results count as failed attempts. Returns an empty
/// list once the attempts are exhausted; the caller decides how to surface
/// that to the room.
pub async fn generate_with_retry(
    source: &dyn QuestionSource,
    topic: &str,
    count: usize,
    max_attempts: u32,
    backoff: Duration,
) -> Vec<QuizQuestion> {
    let mut delay = backoff;
    for attempt in 1..=max_attempts {
        match source.generate(topic, count).await {
            Ok(questions) if !questions.is_empty() => return questions,
            Ok(_) => {
                warn!(topic, attempt, "generator returned no usable questions");
            }
            Err(err) => {
                warn!(topic, attempt, error = %err, "question generation attempt failed");
            }
        }
        if attempt < max_attempts {
            sleep(delay).await;
            delay *= 2;
        }
    }
    Vec::new()
}
