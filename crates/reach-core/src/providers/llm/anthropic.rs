use super::{build_prompt, max_tokens, ContentGenerator};
use crate::config::Secret;
use crate::providers::{ensure_success, ContentRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: Secret,
    model: String,
}

impl AnthropicClient {
    pub fn new(client: reqwest::Client, model: String, api_key: Secret) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn first_text(resp: MessagesResponse) -> Option<String> {
    resp.content
        .into_iter()
        .find_map(|b| b.text)
        .map(|t| t.trim().to_string())
}

#[async_trait]
impl ContentGenerator for AnthropicClient {
    async fn generate(&self, req: &ContentRequest) -> anyhow::Result<String> {
        let (system, user) = build_prompt(req);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: max_tokens(req),
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let parsed: MessagesResponse = ensure_success("Anthropic", resp).await?.json().await?;
        first_text(parsed).ok_or_else(|| anyhow::anyhow!("Anthropic API response missing text"))
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
