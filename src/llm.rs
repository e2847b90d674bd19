use crate::config::LlmConfig;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that turns a message list into response text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::Config("LLM API key is not set (LLM_API_KEY)".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
        };

        debug!("Calling {} with {} messages", self.model, messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        completion_content(&response_json)
    }
}

/// Pull `choices[0].message.content` out of a completion body.
pub fn completion_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(AgentError::Llm(format!("LLM API error: {}", error)));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| AgentError::Llm(format!("No choices in LLM response: {}", response_json)))?;

    if choice.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
        warn!("LLM response was truncated due to length limit");
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| AgentError::Llm(format!("No content in LLM response: {}", response_json)))?
        .trim();

    if content.is_empty() {
        return Err(AgentError::Llm("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_content() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "  {\"a\": 1}\n"}, "finish_reason": "stop"}]
        });
        assert_eq!(completion_content(&body).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_completion_error_payload() {
        let body = json!({"error": {"code": "1113", "message": "余额不足"}});
        assert!(matches!(completion_content(&body), Err(AgentError::Llm(_))));
    }

    #[test]
    fn test_completion_without_choices() {
        assert!(completion_content(&json!({"choices": []})).is_err());
        assert!(completion_content(&json!({"choices": [{"message": {"content": "  "}}]})).is_err());
    }

    #[test]
    fn test_request_carries_sampling_parameters() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: "glm-4",
            messages: &messages,
            temperature: 0.5,
            top_p: 0.25,
        })
        .unwrap();
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "u"}));
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["top_p"], json!(0.25));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        assert!(matches!(
            LlmClient::new(&LlmConfig::default()),
            Err(AgentError::Config(_))
        ));
    }
}
