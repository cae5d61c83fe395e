//! OpenAI-compatible chat completion client

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::CompletionError;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first generated message; empty when the endpoint returned none
    pub fn first_content(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

/// A single synchronous request/response exchange with a completion endpoint
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `messages` and return the first generated message's text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Client for any endpoint speaking the OpenAI `/chat/completions` schema
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client from endpoint settings
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            temperature: endpoint.temperature,
            client,
        })
    }

    /// Check if the endpoint answers on `/models`
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        let mut req = self.client.get(&url).timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        match req.send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
        };

        debug!(model = %self.model, messages = messages.len(), "Sending chat completion");

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        let payload: ChatResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(payload.first_content())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Replays canned replies in order and records every request.
///
/// Once the script runs out it answers with an empty string, or with
/// [`CompletionError::Unavailable`] when built with [`ScriptedClient::failing_when_exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    fail_when_exhausted: bool,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            fail_when_exhausted: false,
        }
    }

    pub fn failing_when_exhausted(mut self) -> Self {
        self.fail_when_exhausted = true;
        self
    }

    /// Every message list sent so far, in order
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self
            .replies
            .lock()
            .map_err(|e| CompletionError::Unavailable(e.to_string()))?
            .pop_front();

        match next {
            Some(reply) => Ok(reply),
            None if self.fail_when_exhausted => Err(CompletionError::Unavailable(
                "scripted replies exhausted".to_string(),
            )),
            None => Ok(String::new()),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_first_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Thought: hi"}},{"message":{"content":"second"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content(), "Thought: hi");
    }

    #[test]
    fn test_response_without_choices_is_empty() {
        let resp: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(resp.first_content(), "");

        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(resp.first_content(), "");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::user("go up")];
        let req = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: None,
            stream: false,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "go up");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_client_trims_base_url() {
        let endpoint = EndpointConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..EndpointConfig::default()
        };
        let client = OpenAiClient::new(&endpoint).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_scripted_client_replays_and_records() {
        let client = ScriptedClient::new(["one", "two"]);
        assert_eq!(client.complete(&[ChatMessage::user("a")]).await.unwrap(), "one");
        assert_eq!(client.complete(&[ChatMessage::user("b")]).await.unwrap(), "two");
        assert_eq!(client.complete(&[ChatMessage::user("c")]).await.unwrap(), "");

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1][0].content, "b");
    }

    #[tokio::test]
    async fn test_scripted_client_failing_when_exhausted() {
        let client = ScriptedClient::new(Vec::<String>::new()).failing_when_exhausted();
        let err = client.complete(&[ChatMessage::user("a")]).await.unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable(_)));
    }
}
