use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};

use super::{
    Generation, GenerationError, GenerationRequest, GenerationResult, Modality, TextGenerator,
};
use crate::config::LlmConfig;

/// Client for OpenAI-compatible chat and image endpoints (Groq by default)
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    config: LlmConfig,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(config: LlmConfig) -> GenerationResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.config.timeout)
        } else if err.is_decode() {
            GenerationError::Decode(err.to_string())
        } else {
            GenerationError::Http(err.to_string())
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> GenerationResult<Value> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "generation service rejected request");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| self.map_transport_error(e))
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult<Generation> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for message in &request.messages {
            messages.push(json!({ "role": message.role.to_string(), "content": message.content }));
        }

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.params.temperature,
            "max_tokens": request.params.max_tokens.min(self.config.max_tokens),
        });

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let response = self.post_json("chat/completions", &body).await?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GenerationError::Decode("missing choices[0].message.content".to_string()))?;

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(Generation::Text(content.to_string()))
    }

    async fn render_image(&self, request: &GenerationRequest) -> GenerationResult<Generation> {
        let model = self.config.image_model.as_deref().ok_or_else(|| {
            GenerationError::Unsupported("no image model configured".to_string())
        })?;
        let prompt = request
            .last_user_message()
            .ok_or_else(|| GenerationError::Unsupported("image request without a prompt".to_string()))?;

        let body = json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "response_format": "b64_json",
        });

        let response = self.post_json("images/generations", &body).await?;
        let encoded = response["data"][0]["b64_json"]
            .as_str()
            .ok_or(GenerationError::EmptyResponse)?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        if bytes.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(Generation::Image {
            mime_type: "image/png".to_string(),
            bytes,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<Generation> {
        match request.params.modality {
            Modality::Text => self.complete(&request).await,
            Modality::Image => self.render_image(&request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> LlmConfig {
        LlmConfig {
            api_key: "test-key".to_string(),
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            image_model: None,
            max_tokens: 2048,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = OpenAiCompatClient::new(test_config()).unwrap();
        assert_eq!(
            client.endpoint("chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(client.model(), "llama-3.3-70b-versatile");
    }

    #[tokio::test]
    async fn image_request_without_image_model_is_unsupported() {
        let client = OpenAiCompatClient::new(test_config()).unwrap();
        let request = GenerationRequest::prompt("a cell diagram").with_modality(Modality::Image);

        let result = client.generate(request).await;
        assert!(matches!(result, Err(GenerationError::Unsupported(_))));
    }
}
