//! The generation boundary: prompt assembly and answer generators.
//!
//! The engine never generates text itself. It builds one prompt string and
//! hands it to an [`AnswerGenerator`]; the returned text is not parsed.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{QaError, Result};
use crate::locale::Language;

/// Produces answer text from a prompt.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Assemble the prompt: instruction preamble, packed context, then the question.
pub fn build_prompt(language: Language, context: &str, question: &str) -> String {
    let (context_heading, question_heading, answer_cue) = language.prompt_headings();
    format!(
        "{preamble}\n\n{context_heading}\n{context}\n\n{question_heading}\n{question}\n\n{answer_cue}",
        preamble = language.prompt_preamble(),
    )
}

/// Chat-completions generator for OpenAI-compatible servers.
pub struct OpenAiChatGenerator {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_message: String,
}

impl OpenAiChatGenerator {
    /// Create a generator, reading `OPENAI_API_KEY` from the environment.
    pub fn new(language: Language) -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            system_message: language.system_message().to_string(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiChatGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| QaError::Generation("OPENAI_API_KEY is not set".to_string()))?;

        debug!("Requesting completion from model: {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_message},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| QaError::Generation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(QaError::Generation(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| QaError::Generation(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| QaError::Generation("No choices in response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Returns the prompt unchanged. Useful offline, where the assembled
/// context is the most helpful thing to show.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextOnlyGenerator;

#[async_trait]
impl AnswerGenerator for ContextOnlyGenerator {
    fn name(&self) -> &str {
        "context-only"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(Language::English, "[Fragment 1] Source: a\ntext", "Why?");

        assert!(prompt.starts_with(Language::English.prompt_preamble()));
        assert!(prompt.contains("\n\nContext:\n[Fragment 1] Source: a\ntext\n\nQuestion:\nWhy?"));
        assert!(prompt.ends_with("Please provide a detailed and accurate answer:"));
    }

    #[tokio::test]
    async fn test_context_only_echoes_prompt() {
        let answer = ContextOnlyGenerator.generate("prompt").await;
        assert_eq!(tokio_test::assert_ok!(answer), "prompt");
    }

    #[tokio::test]
    async fn test_openai_generator_sends_chat_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "max_tokens": 1500,
                "messages": [
                    {"role": "system", "content": Language::English.system_message()},
                    {"role": "user", "content": "the prompt"},
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Cats are mammals."}}]
            })))
            .mount(&server)
            .await;

        let generator = OpenAiChatGenerator::new(Language::English)
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_model("test-model");

        let answer = generator.generate("the prompt").await.unwrap();
        assert_eq!(answer, "Cats are mammals.");
    }

    #[tokio::test]
    async fn test_openai_generator_reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let generator = OpenAiChatGenerator::new(Language::English)
            .with_api_key("test-key")
            .with_base_url(server.uri());

        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, QaError::Generation(message) if message.contains("boom")));
    }

    #[tokio::test]
    async fn test_openai_generator_requires_key() {
        let mut generator = OpenAiChatGenerator::new(Language::English);
        generator.api_key = None;
        assert!(!generator.is_available());
        assert!(generator.generate("prompt").await.is_err());
    }
}
