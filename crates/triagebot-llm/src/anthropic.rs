use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::extract::extract_json_object;
use crate::provider::{
    triage_system_prompt, ClassificationRequest, ClassificationResponse, ClassifierProvider,
    ProviderError,
};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[async_trait]
impl ClassifierProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn classify(
        &self,
        req: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError> {
        let body = json!({
            "model": req.model,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "system": triage_system_prompt(),
            "messages": [
                {"role": "user", "content": req.text}
            ],
        });

        debug!(model = %req.model, "sending classification request to Anthropic");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
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
                .unwrap_or(5_000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
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
            .content
            .into_iter()
            .find_map(|b| b.text)
            .ok_or_else(|| ProviderError::Parse("no text block in Anthropic response".into()))?;

        let json_str = extract_json_object(&text)
            .ok_or_else(|| ProviderError::Parse("no JSON object in response text".into()))?;

        serde_json::from_str::<ClassificationResponse>(&json_str)
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}
