//! Chat-completion client.
//!
//! Supports OpenAI-compatible endpoints (`/chat/completions`) and Ollama
//! (`/api/chat`). Each request carries a single user message.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Anything that can turn a prompt into reply text.
#[allow(async_fn_in_trait)]
pub trait CompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String, QueryError>;
}

/// Wire format of the text-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions (default)
    #[default]
    Openai,
    /// Local Ollama server
    Ollama,
}

/// Configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Environment variable holding the API key (OpenAI only).
    pub api_key_env: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4.1-mini".to_string(),
            temperature: 0.4,
            timeout_seconds: 300,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// OpenAI chat completions request.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// HTTP client for the configured provider.
pub struct ChatClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl ChatClient {
    /// Create a client, reading the API key from the environment when the
    /// provider needs one.
    pub fn new(config: ClientConfig) -> Result<Self, QueryError> {
        let api_key = match config.provider {
            Provider::Openai => Some(
                std::env::var(&config.api_key_env)
                    .map_err(|_| QueryError::MissingApiKey(config.api_key_env.clone()))?,
            ),
            Provider::Ollama => None,
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            api_key,
        })
    }

    /// Endpoint URL for the configured provider.
    pub fn endpoint(&self) -> String {
        endpoint_for(self.config.provider, &self.config.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> QueryError {
        if e.is_timeout() {
            QueryError::Timeout(self.config.timeout_seconds)
        } else if e.is_connect() {
            QueryError::Connect(self.config.base_url.clone())
        } else {
            QueryError::Transport(e.to_string())
        }
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<reqwest::Response, QueryError> {
        let url = self.endpoint();
        debug!("POST {} (model {})", url, self.config.model_name);

        let mut request = self.http_client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Api { status, body });
        }

        Ok(response)
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, QueryError> {
        let request = OpenAiChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.config.temperature,
        };

        let response: OpenAiChatResponse = self
            .post(&request)
            .await?
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(QueryError::EmptyCompletion)
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String, QueryError> {
        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response: OllamaChatResponse = self
            .post(&request)
            .await?
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        Ok(response.message.content)
    }
}

impl CompletionBackend for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, QueryError> {
        let content = match self.config.provider {
            Provider::Openai => self.complete_openai(prompt).await?,
            Provider::Ollama => self.complete_ollama(prompt).await?,
        };

        if content.trim().is_empty() {
            return Err(QueryError::EmptyCompletion);
        }

        Ok(content)
    }
}

fn endpoint_for(provider: Provider, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match provider {
        Provider::Openai => format!("{}/chat/completions", base),
        Provider::Ollama => format!("{}/api/chat", base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.model_name, "gpt-4.1-mini");
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.provider, Provider::Openai);
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            endpoint_for(Provider::Openai, "https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_for(Provider::Ollama, "http://localhost:11434"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = ClientConfig {
            provider: Provider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key_env: "QOL_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ClientConfig::default()
        };
        assert!(ChatClient::new(config).is_ok());
    }

    #[test]
    fn test_openai_requires_key() {
        let config = ClientConfig {
            api_key_env: "QOL_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            ChatClient::new(config),
            Err(QueryError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = OpenAiChatRequest {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![ChatMessage::user("hello")],
            temperature: 0.4,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert!(json.get("stream").is_none());

        let reply: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"\"a\",\"b\""}}]}"#,
        )
        .unwrap();
        assert_eq!(reply.choices[0].message.content, "\"a\",\"b\"");
    }
}
