use super::ContentRequest;
use async_trait::async_trait;

pub mod anthropic;
pub mod openai;

/// Upper bound on completion tokens when the request gives no word budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, req: &ContentRequest) -> anyhow::Result<String>;
    fn provider_name(&self) -> &'static str;
}

/// Builds the (system, user) prompt pair shared by every generator.
pub fn build_prompt(req: &ContentRequest) -> (String, String) {
    let system = format!(
        "You are a senior B2B marketing copywriter. Write {} in a {} tone. \
         Output only the finished copy, without preamble or markdown fences.",
        req.content_type.describe(),
        req.tone
    );

    let mut user = format!("Topic: {}", req.topic);
    if let Some(audience) = &req.audience {
        user.push_str(&format!("\nAudience: {audience}"));
    }
    if !req.keywords.is_empty() {
        user.push_str(&format!("\nWork in these keywords: {}", req.keywords.join(", ")));
    }
    if let Some(words) = req.max_words {
        user.push_str(&format!("\nKeep it under {words} words."));
    }
    (system, user)
}

/// Roughly 1.5 tokens per word, with headroom.
pub fn max_tokens(req: &ContentRequest) -> u32 {
    req.max_words
        .map(|w| (w.saturating_mul(3) / 2).saturating_add(64))
        .unwrap_or(DEFAULT_MAX_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;

    fn req() -> ContentRequest {
        ContentRequest {
            content_type: ContentType::AdCopy,
            topic: "Zero-downtime deploys".into(),
            tone: "playful".into(),
            audience: Some("platform engineers".into()),
            keywords: vec!["rollouts".into(), "canary".into()],
            max_words: Some(100),
        }
    }

    #[test]
    fn test_prompt_carries_request_fields() {
        let (system, user) = build_prompt(&req());
        assert!(system.contains("playful"));
        assert!(user.contains("Zero-downtime deploys"));
        assert!(user.contains("platform engineers"));
        assert!(user.contains("rollouts, canary"));
        assert!(user.contains("under 100 words"));
    }

    #[test]
    fn test_max_tokens() {
        assert_eq!(max_tokens(&req()), 214);
        let mut r = req();
        r.max_words = None;
        assert_eq!(max_tokens(&r), DEFAULT_MAX_TOKENS);
    }
}
