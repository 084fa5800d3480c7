//! LLM provider clients with automatic failover.
//!
//! Supports Anthropic (Claude) and OpenAI chat APIs. Providers are tried
//! in configuration order; the first success wins. A semaphore bounds
//! concurrent in-flight calls, and every request carries its own timeout.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAI,
}

/// Configuration for one provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Response from a provider
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tokens_used: u32,
    pub provider: LlmProvider,
}

/// Multi-provider LLM client with failover
pub struct LlmClient {
    client: Client,
    providers: Vec<ProviderConfig>,
    rate_limiter: Arc<Semaphore>,
}

impl LlmClient {
    /// Create a client over an explicit provider list
    pub fn new(providers: Vec<ProviderConfig>, max_concurrent: usize) -> Result<Self> {
        if providers.is_empty() {
            return Err(anyhow!("at least one provider must be configured"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            providers,
            rate_limiter: Arc::new(Semaphore::new(max_concurrent)),
        })
    }

    /// Create from environment variables. Providers are added in
    /// preference order: Anthropic first, then OpenAI.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut providers = Vec::new();

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            providers.push(ProviderConfig {
                provider: LlmProvider::Anthropic,
                api_key,
                model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
                base_url: "https://api.anthropic.com/v1".to_string(),
                max_tokens: 1024,
                temperature: 0.1,
                timeout_seconds: 30,
            });
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            providers.push(ProviderConfig {
                provider: LlmProvider::OpenAI,
                api_key,
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
                base_url: "https://api.openai.com/v1".to_string(),
                max_tokens: 1024,
                temperature: 0.1,
                timeout_seconds: 30,
            });
        }

        Self::new(providers, 5)
    }

    /// Generate a completion, failing over across providers
    pub async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<LlmResponse> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|_| anyhow!("failed to acquire rate limit permit"))?;

        let mut last_error = None;

        for config in &self.providers {
            match self.call_provider(config, system_prompt, user_prompt).await {
                Ok(response) => {
                    info!("LLM request successful via {:?}", config.provider);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("provider {:?} failed: {e}", config.provider);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("all providers failed")))
    }

    async fn call_provider(
        &self,
        config: &ProviderConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse> {
        match config.provider {
            LlmProvider::Anthropic => {
                self.call_anthropic(config, system_prompt, user_prompt).await
            }
            LlmProvider::OpenAI => self.call_openai(config, system_prompt, user_prompt).await,
        }
    }

    async fn call_anthropic(
        &self,
        config: &ProviderConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: u32,
            system: String,
            messages: Vec<AnthropicMessage>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage {
            role: String,
            content: String,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<ContentBlock>,
            usage: AnthropicUsage,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            text: String,
        }

        #[derive(Deserialize)]
        struct AnthropicUsage {
            input_tokens: u32,
            output_tokens: u32,
        }

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: system_prompt.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
        };

        debug!("calling Anthropic API with model {}", config.model);

        let response = self
            .client
            .post(format!("{}/messages", config.base_url))
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .json(&request)
            .send()
            .await
            .context("failed to send Anthropic request")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error: {error_text}"));
        }

        let result: AnthropicResponse = response
            .json()
            .await
            .context("failed to parse Anthropic response")?;

        let content = result
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            tokens_used: result.usage.input_tokens + result.usage.output_tokens,
            provider: LlmProvider::Anthropic,
        })
    }

    async fn call_openai(
        &self,
        config: &ProviderConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse> {
        #[derive(Serialize)]
        struct OpenAiRequest {
            model: String,
            messages: Vec<OpenAiMessage>,
            max_tokens: u32,
            temperature: f32,
        }

        #[derive(Serialize, Deserialize)]
        struct OpenAiMessage {
            role: String,
            content: String,
        }

        #[derive(Deserialize)]
        struct OpenAiResponse {
            choices: Vec<OpenAiChoice>,
            usage: Option<OpenAiUsage>,
        }

        #[derive(Deserialize)]
        struct OpenAiChoice {
            message: OpenAiMessage,
        }

        #[derive(Deserialize)]
        struct OpenAiUsage {
            total_tokens: u32,
        }

        let request = OpenAiRequest {
            model: config.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        debug!("calling OpenAI API with model {}", config.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", config.base_url))
            .header("Authorization", format!("Bearer {}", config.api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .json(&request)
            .send()
            .await
            .context("failed to send OpenAI request")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error: {error_text}"));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .context("failed to parse OpenAI response")?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            tokens_used: result.usage.map(|u| u.total_tokens).unwrap_or(0),
            provider: LlmProvider::OpenAI,
        })
    }
}
