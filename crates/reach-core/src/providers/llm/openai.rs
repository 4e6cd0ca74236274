use super::{build_prompt, max_tokens, ContentGenerator};
use crate::config::Secret;
use crate::providers::{ensure_success, ContentRequest};
use async_trait::async_trait;
use serde_json::json;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAIClient {
    pub model: String,
    api_key: Secret,
    pub temperature: f32,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(client: reqwest::Client, model: String, api_key: Secret) -> Self {
        Self {
            model,
            api_key,
            temperature: 0.7,
            client,
        }
    }
}

#[async_trait]
impl ContentGenerator for OpenAIClient {
    async fn generate(&self, req: &ContentRequest) -> anyhow::Result<String> {
        let (system, user) = build_prompt(req);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": self.temperature,
            "max_tokens": max_tokens(req),
        });

        let resp = self
            .client
            .post(CHAT_URL)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await?;
        let json: serde_json::Value = ensure_success("OpenAI", resp).await?.json().await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("OpenAI API response missing content"))?
            .trim()
            .to_string();
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
