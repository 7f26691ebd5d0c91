use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::extract::extract_json_object;
use crate::provider::{
    triage_system_prompt, ClassificationRequest, ClassificationResponse, ClassifierProvider,
    ProviderError,
};

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }
    }
}

#[async_trait]
impl ClassifierProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(
        &self,
        req: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError> {
        let body = json!({
            "model": req.model,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": triage_system_prompt()},
                {"role": "user", "content": req.text},
            ],
        });

        debug!(model = %req.model, "sending classification request to OpenAI");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1_000)
                .unwrap_or(5_000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = api_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("no choices in OpenAI response".into()))?;

        let json_str = extract_json_object(&text)
            .ok_or_else(|| ProviderError::Parse("no JSON object in response text".into()))?;

        serde_json::from_str::<ClassificationResponse>(&json_str)
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
