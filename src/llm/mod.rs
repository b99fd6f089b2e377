use crate::config::LlmConfig;
use anyhow::Result;
use async_trait::async_trait;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
mod extraction;
pub use extraction::{
    parse_reply, ExtractionResult, Extractor, LlmExtractor, EXTRACTION_PROMPT,
};

#[cfg(test)]
mod tests;

// Text completion backend used by the extractor
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_response(&self, system_prompt: &str, input: &str) -> Result<String>;
}

// Builder for OpenAI Client
pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Default for OpenAiClientBuilder {
    fn default() -> Self {
        let defaults = LlmConfig::default();
        Self {
            api_key: None,
            base_url: None,
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }
}

impl OpenAiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: Some(config.api_key.clone()).filter(|k| !k.is_empty()),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn build(self) -> Result<OpenAiClient> {
        let api_key = self
            .api_key
            .ok_or_else(|| anyhow::anyhow!("API key is required"))?;

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = self.base_url {
            config = config.with_api_base(base_url);
        }

        Ok(OpenAiClient {
            client: Client::with_config(config),
            model: self.model,
            temperature: self.temperature.unwrap_or(0.2),
            max_tokens: self.max_tokens.unwrap_or(256),
        })
    }
}

// OpenAI LLM client implementation
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        OpenAiClientBuilder::new().with_api_key(api_key).build()
    }

    fn prepare_messages(
        system_prompt: &str,
        input: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(input)
                .build()?
                .into(),
        ])
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_response(&self, system_prompt: &str, input: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .max_tokens(self.max_tokens)
            .model(&self.model)
            .messages(Self::prepare_messages(system_prompt, input)?)
            .temperature(self.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();
        Ok(text)
    }
}
