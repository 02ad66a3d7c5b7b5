//! HTTP reasoning service client.
//!
//! Talks to any OpenAI-compatible chat-completions endpoint. The prompt
//! context goes in the system message and the encoded frames in the user
//! message; the verdict is read leniently out of the first choice.

use crate::analysis::reasoning::{
    ReasoningError, ReasoningRequest, ReasoningResponse, ReasoningService,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Default endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable names.
pub const ENV_BASE_URL: &str = "FORM_REASONING_URL";
pub const ENV_MODEL: &str = "FORM_REASONING_MODEL";
pub const ENV_API_KEY: &str = "FORM_REASONING_API_KEY";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Endpoint base, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer credential
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Transport-level request timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create a new gateway configuration.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Load configuration from the environment.
    ///
    /// Endpoint and model fall back to defaults; a missing key is only
    /// reported when a call is attempted.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self::new(
            read(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            read(ENV_API_KEY).unwrap_or_default(),
            read(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the chat-completions endpoint URL.
    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Whether a credential is present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Reasoning service backed by a chat-completions endpoint.
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
    client_id: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    pub fn new(config: GatewayConfig) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ReasoningError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        // Client ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let client_id = format!(
            "form-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            client_id,
        })
    }

    /// Create a new gateway client from environment configuration.
    pub fn from_env() -> Result<Self, ReasoningError> {
        Self::new(GatewayConfig::from_env())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn body(&self, request: &ReasoningRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.prompt_context },
                { "role": "user", "content": request.encoded },
            ],
            "temperature": 0,
            "user": self.client_id,
        })
    }

    fn map_transport(&self, error: reqwest::Error) -> ReasoningError {
        if error.is_timeout() {
            ReasoningError::Timeout {
                elapsed_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            ReasoningError::Connection(error.to_string())
        }
    }
}

/// Read the verdict out of a chat-completions body.
fn parse_completion(body: &str) -> Result<ReasoningResponse, ReasoningError> {
    let completion: ChatCompletion =
        serde_json::from_str(body).map_err(|e| ReasoningError::Format(e.to_string()))?;
    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ReasoningError::Format("response has no message content".to_string()))?;
    ReasoningResponse::from_text(&content)
}

#[async_trait]
impl ReasoningService for GatewayClient {
    fn check_ready(&self) -> Result<(), ReasoningError> {
        if !self.config.has_credentials() {
            return Err(ReasoningError::Configuration(format!(
                "{ENV_API_KEY} is not set"
            )));
        }
        if !self.config.base_url.starts_with("http") {
            return Err(ReasoningError::Configuration(format!(
                "Invalid endpoint '{}'",
                self.config.base_url
            )));
        }
        Ok(())
    }

    async fn analyze(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError> {
        self.check_ready()?;

        let response = self
            .client
            .post(self.config.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReasoningError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| self.map_transport(e))?;
        parse_completion(&body)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::SampleMode;

    #[test]
    fn test_chat_url() {
        let config = GatewayConfig::new("http://127.0.0.1:8080/v1/", "key", "local");
        assert_eq!(config.chat_url(), "http://127.0.0.1:8080/v1/chat/completions");
    }

    #[test]
    fn test_missing_key_not_ready() {
        let client = GatewayClient::new(GatewayConfig::new(DEFAULT_BASE_URL, " ", DEFAULT_MODEL))
            .unwrap();
        assert!(matches!(
            client.check_ready(),
            Err(ReasoningError::Configuration(_))
        ));

        let client =
            GatewayClient::new(GatewayConfig::new(DEFAULT_BASE_URL, "sk-test", DEFAULT_MODEL))
                .unwrap();
        assert!(client.check_ready().is_ok());
        assert!(client.client_id().starts_with("form-"));
    }

    #[test]
    fn test_request_body_shape() {
        let client =
            GatewayClient::new(GatewayConfig::new(DEFAULT_BASE_URL, "sk-test", "coach")).unwrap();
        let body = client.body(&ReasoningRequest {
            mode: SampleMode::Full,
            exercise: Some("squat".to_string()),
            prompt_context: "count reps".to_string(),
            encoded: "t:0.0|lw:0.100,0.200".to_string(),
            frame_count: 1,
        });

        assert_eq!(body["model"], "coach");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "count reps");
        assert_eq!(body["messages"][1]["content"], "t:0.0|lw:0.100,0.200");
        assert_eq!(body["user"], client.client_id());
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"```json\n{\"repCount\":5,\"formScore\":7}\n```"}}]}"#;
        let response = parse_completion(body).unwrap();
        assert_eq!(response.rep_count, Some(5));
        assert_eq!(response.form_score, Some(7.0));

        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(ReasoningError::Format(_))
        ));
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(ReasoningError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let config = GatewayConfig::new("http://127.0.0.1:9/v1", "sk-test", "coach")
            .with_timeout(Duration::from_secs(2));
        let client = GatewayClient::new(config).unwrap();
        let error = client
            .analyze(ReasoningRequest {
                mode: SampleMode::Live,
                exercise: None,
                prompt_context: String::new(),
                encoded: "t:0.0|lw:0.100,0.200".to_string(),
                frame_count: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(error.category(), "connection");
    }
}
