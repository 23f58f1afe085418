//! Anthropic messages API adapter.

use super::{AgentSettings, build_client, status_error, transport_error};
use async_trait::async_trait;
use consensus_application::{Agent, AgentError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Agent backed by the Anthropic messages API
pub struct AnthropicAgent {
    settings: AgentSettings,
    client: reqwest::Client,
}

impl AnthropicAgent {
    pub fn new(settings: AgentSettings) -> Result<Self, reqwest::Error> {
        let client = build_client(settings.timeout)?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url)
    }

    pub(crate) fn request_body(&self, prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: self.settings.system_prompt.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

/// Concatenated text blocks of a response
pub(crate) fn extract_text(response: MessagesResponse) -> Result<String, AgentError> {
    let text: Vec<String> = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    let text = text.join("\n");
    if text.trim().is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl Agent for AnthropicAgent {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn generate_response(&self, prompt: &str) -> Result<String, AgentError> {
        info!(
            "Requesting response from {} ({})",
            self.settings.name, self.settings.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Anthropic", status, &body));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
        let text = extract_text(body)?;
        debug!("{} returned {} bytes", self.settings.name, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn agent() -> AnthropicAgent {
        AnthropicAgent::new(AgentSettings {
            name: "claude".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            temperature: 0.2,
            max_tokens: 1024,
            system_prompt: "Be cooperative.".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(agent().request_body("Hello")).unwrap();
        assert_eq!(body["model"], "claude-3-5-sonnet-latest");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["system"], "Be cooperative.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(agent().endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"IMPLEMENTATION: 4"},{"type":"tool_use","id":"t"},{"type":"text","text":"CONFIDENCE: 0.9"}]}"#,
        )
        .unwrap();
        assert_eq!(
            extract_text(response).unwrap(),
            "IMPLEMENTATION: 4\nCONFIDENCE: 0.9"
        );
    }

    #[test]
    fn test_extract_text_empty() {
        let response: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert_eq!(extract_text(response), Err(AgentError::EmptyResponse));
    }
}
