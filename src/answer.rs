//! Answer generation: prompting the model with assembled context and
//! shaping its output into a structured, traceable answer.

use crate::config::{GenerationSettings, Prompts};
use crate::context::{AssembledContext, SourceRef};
use crate::error::{Result, SvarError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Heuristic label summarizing how well-supported an answer is.
///
/// Derived only from retrieval scores, never from model introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// A generated answer with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The generated answer text.
    pub text: String,
    /// Source passages the answer is grounded in, chronological order.
    pub sources: Vec<SourceRef>,
    /// How well-supported the answer is.
    pub confidence: Confidence,
}

impl Answer {
    /// Format the answer with its sources for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.text.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!(
                    "\n@ {} (score: {:.2})",
                    format_seconds(source.start_seconds),
                    source.relevance_score
                ));
            }
        }
        output.push_str(&format!("\n\nConfidence: {}", self.confidence));

        output
    }
}

fn format_seconds(start_seconds: f64) -> String {
    let total_seconds = start_seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Derive a confidence label from the included sources' scores.
pub fn confidence_from_sources(sources: &[SourceRef]) -> Confidence {
    let top = sources
        .iter()
        .map(|s| s.relevance_score)
        .fold(f32::MIN, f32::max);
    let supported = sources.iter().filter(|s| s.relevance_score >= 0.5).count();

    if top >= 0.75 && supported >= 2 {
        Confidence::High
    } else if top >= 0.5 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Trait for text generation backends.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Complete a system + user prompt pair into answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI chat completion backend.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGenerator {
    /// Create a generator from settings.
    pub fn new(settings: &GenerationSettings) -> Self {
        Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_seconds)),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

#[async_trait]
impl GenerationModel for OpenAIGenerator {
    #[instrument(skip(self, system, user))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| SvarError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| SvarError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| SvarError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SvarError::Generation(format!("Chat completion failed: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| SvarError::Generation("Empty response from model".to_string()))
    }
}

/// Builds the QA prompt, invokes the generation model, and assembles the
/// final [`Answer`].
pub struct AnswerGenerator {
    model: Arc<dyn GenerationModel>,
    prompts: Prompts,
    timeout: Duration,
}

impl AnswerGenerator {
    /// Create an answer generator over a generation backend.
    pub fn new(model: Arc<dyn GenerationModel>, prompts: Prompts, timeout: Duration) -> Self {
        Self {
            model,
            prompts,
            timeout,
        }
    }

    /// Generate an answer for a question given assembled context.
    ///
    /// An empty context short-circuits into a sentinel low-confidence answer
    /// without touching the model: "no relevant content" is a legitimate
    /// outcome, not a failure. A model that does not respond in time
    /// surfaces as `GenerationTimeout` and is never retried here.
    #[instrument(skip(self, context), fields(question = %question, sources = context.sources.len()))]
    pub async fn generate(&self, question: &str, context: &AssembledContext) -> Result<Answer> {
        if context.is_empty() {
            info!("No retrieval candidates matched; returning sentinel answer");
            return Ok(Answer {
                text: self.prompts.qa.no_context.clone(),
                sources: Vec::new(),
                confidence: Confidence::Low,
            });
        }

        let mut vars = HashMap::new();
        vars.insert("video_title".to_string(), context.video_title.clone());
        vars.insert("channel".to_string(), context.channel.clone());
        vars.insert("context".to_string(), context.text.clone());
        vars.insert("question".to_string(), question.to_string());

        let user_prompt = Prompts::render(&self.prompts.qa.user, &vars);

        let text = tokio::time::timeout(
            self.timeout,
            self.model.complete(&self.prompts.qa.system, &user_prompt),
        )
        .await
        .map_err(|_| SvarError::GenerationTimeout(self.timeout.as_secs()))??;

        debug!("Generated answer with {} sources", context.sources.len());

        Ok(Answer {
            text,
            sources: context.sources.clone(),
            confidence: confidence_from_sources(&context.sources),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedGenerator;
    use super::*;

    fn source(score: f32) -> SourceRef {
        SourceRef {
            start_seconds: 10.0,
            relevance_score: score,
        }
    }

    #[test]
    fn test_confidence_high_needs_two_supported_sources() {
        assert_eq!(
            confidence_from_sources(&[source(0.9), source(0.6)]),
            Confidence::High
        );
        // Strong top score alone is not enough for high.
        assert_eq!(
            confidence_from_sources(&[source(0.9), source(0.3)]),
            Confidence::Medium
        );
    }

    #[test]
    fn test_confidence_medium_and_low_thresholds() {
        assert_eq!(confidence_from_sources(&[source(0.5)]), Confidence::Medium);
        assert_eq!(confidence_from_sources(&[source(0.49)]), Confidence::Low);
        assert_eq!(confidence_from_sources(&[source(0.1), source(0.2)]), Confidence::Low);
    }

    #[tokio::test]
    async fn test_empty_context_never_calls_the_model() {
        let model = Arc::new(FixedGenerator::new("should not appear"));
        let generator = AnswerGenerator::new(
            model.clone(),
            Prompts::default(),
            Duration::from_secs(5),
        );

        let answer = generator
            .generate("Anything?", &AssembledContext::empty())
            .await
            .unwrap();

        assert_eq!(model.call_count(), 0);
        assert_eq!(answer.confidence, Confidence::Low);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.text, Prompts::default().qa.no_context);
    }

    #[tokio::test]
    async fn test_generate_passes_context_through() {
        let model = Arc::new(FixedGenerator::new("The video is about Rust."));
        let generator = AnswerGenerator::new(
            model.clone(),
            Prompts::default(),
            Duration::from_secs(5),
        );

        let context = AssembledContext {
            text: "[00:10] Rust is a systems language.".to_string(),
            sources: vec![source(0.9), source(0.6)],
            video_title: "Intro to Rust".to_string(),
            channel: "Rust Channel".to_string(),
        };

        let answer = generator.generate("What is this about?", &context).await.unwrap();

        assert_eq!(model.call_count(), 1);
        assert_eq!(answer.text, "The video is about Rust.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        struct SlowGenerator;

        #[async_trait]
        impl GenerationModel for SlowGenerator {
            async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("too late".to_string())
            }
        }

        let generator = AnswerGenerator::new(
            Arc::new(SlowGenerator),
            Prompts::default(),
            Duration::from_millis(10),
        );

        let context = AssembledContext {
            text: "[00:10] something".to_string(),
            sources: vec![source(0.8)],
            video_title: "T".to_string(),
            channel: "C".to_string(),
        };

        let err = generator.generate("q", &context).await.unwrap_err();
        assert!(matches!(err, SvarError::GenerationTimeout(_)));
    }

    #[test]
    fn test_answer_display_includes_sources_and_confidence() {
        let answer = Answer {
            text: "An answer.".to_string(),
            sources: vec![SourceRef {
                start_seconds: 125.0,
                relevance_score: 0.87,
            }],
            confidence: Confidence::Medium,
        };

        let display = answer.format_for_display();
        assert!(display.contains("02:05"));
        assert!(display.contains("0.87"));
        assert!(display.contains("Confidence: medium"));
    }
}
