//! Prompt templates for answer generation.
//!
//! Templates use `{{variable}}` placeholders and can be overridden from a
//! TOML file; the defaults constrain the model to the supplied context and
//! ask for timestamp citations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub qa: QaPrompts,
}

/// Prompts for question answering over a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaPrompts {
    /// System instruction for the generation model.
    pub system: String,
    /// User prompt template. Variables: `video_title`, `channel`,
    /// `context`, `question`.
    pub user: String,
    /// Fixed answer text returned when retrieval found nothing.
    pub no_context: String,
}

impl Default for QaPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful AI assistant that answers questions about videos based on their transcripts.

You will be provided with relevant excerpts from a video transcript, along with timestamps.
Your task is to answer the user's question using ONLY the information provided in the context.

Guidelines:
- Base your answer strictly on the provided context
- Include specific timestamps when referencing information
- If the context doesn't contain enough information to answer, say so honestly
- Be concise but complete
- Use natural language, as if explaining to a friend
- If multiple parts of the video discuss the topic, synthesize the information"#
                .to_string(),

            user: r#"Video: {{video_title}}
Channel: {{channel}}

Context from video transcript:
{{context}}

Question: {{question}}

Answer the question based on the context above. Include relevant timestamps in your response."#
                .to_string(),

            no_context: "I don't have enough information from the video transcript to answer \
                         that question. The video might not cover that topic, or the transcript \
                         might be incomplete."
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from a TOML file, or the defaults if `path` is None.
    pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
        match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                Ok(toml::from_str(&content)?)
            }
            _ => Ok(Prompts::default()),
        }
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts_have_content() {
        let prompts = Prompts::default();
        assert!(prompts.qa.system.contains("ONLY"));
        assert!(prompts.qa.user.contains("{{question}}"));
        assert!(!prompts.qa.no_context.is_empty());
    }

    #[test]
    fn test_render_substitutes_variables() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "What is Rust?".to_string());
        vars.insert("context".to_string(), "[00:10] Rust is a language.".to_string());

        let rendered = Prompts::render("Q: {{question}}\nC: {{context}}", &vars);
        assert_eq!(rendered, "Q: What is Rust?\nC: [00:10] Rust is a language.");
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let prompts = Prompts::load(Some(Path::new("/nonexistent/qa.toml"))).unwrap();
        assert_eq!(prompts.qa.system, Prompts::default().qa.system);
    }
}
