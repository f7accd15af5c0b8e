//! The LLM client boundary.
//!
//! The core's responsibility ends at producing resolved prompt text; actually
//! executing it belongs to an implementation of [`LlmClient`]. The trait is
//! deliberately narrow — one prompt in, one completion out — so tests can
//! swap in a mock and the service layer can choose its provider.

use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

/// A generic client for executing a resolved prompt against an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Executes one prompt and returns the raw completion text.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// An implementation of [`LlmClient`] for any OpenAI-compatible API.
pub struct OpenAiCompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("LLM response had no text content"))?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_satisfies_the_trait_object() {
        let mut mock = MockLlmClient::new();
        mock.expect_complete()
            .returning(|_, _| Ok("{\"ok\": true}".to_string()));

        let client: std::sync::Arc<dyn LlmClient> = std::sync::Arc::new(mock);
        let reply = client.complete("system", "user").await.unwrap();
        assert_eq!(reply, "{\"ok\": true}");
    }
}
