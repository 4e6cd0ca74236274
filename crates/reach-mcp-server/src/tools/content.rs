use super::{parse_args, success, ToolContext, ToolError};
use crate::cache::sha256_hex;
use anyhow::Result;
use chrono::Utc;
use reach_core::model::{new_id, ContentItem};
use reach_core::providers::ContentRequest;
use reach_core::publish::{self, Channel, EmailDefaults};
use reach_core::report;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct GenerateArgs {
    #[serde(flatten)]
    request: ContentRequest,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default = "yes")]
    use_library: bool,
}

fn yes() -> bool {
    true
}

/// Library key: identical requests to the same provider share one item.
fn library_key(req: &ContentRequest, provider: &str) -> Result<String> {
    let canonical = serde_json::to_vec(&json!({ "provider": provider, "request": req }))?;
    Ok(sha256_hex(&canonical))
}

pub async fn generate_content(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: GenerateArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };

    let generator = ctx.providers.content(a.provider.as_deref())?;
    let key = library_key(&a.request, generator.provider_name())?;

    if a.use_library {
        if let Some(item) = ctx.caches.library.get(&key) {
            tracing::debug!(event = "cache_hit", cache = "content_library", key = %key);
            return success(
                report::content(&item, true),
                json!({ "content": item, "from_library": true }),
            );
        }
    }

    let body = generator.generate(&a.request).await?;
    let item = ContentItem {
        id: new_id(),
        content_type: a.request.content_type,
        topic: a.request.topic.clone(),
        provider: generator.provider_name().to_string(),
        body,
        created_at: Utc::now(),
    };
    ctx.caches.library.insert(key, item.clone());
    tracing::info!(
        event = "content_generated",
        content_id = %item.id,
        provider = generator.provider_name(),
        content_type = item.content_type.as_str()
    );

    success(
        report::content(&item, false),
        json!({ "content": item, "from_library": false }),
    )
}

#[derive(Deserialize, Default)]
struct ChannelFlags {
    #[serde(default)]
    linkedin: bool,
    #[serde(default)]
    email: bool,
}

#[derive(Deserialize)]
struct PublishArgs {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content_id: Option<String>,
    channels: ChannelFlags,
    #[serde(default)]
    email: EmailDefaults,
}

pub async fn publish_content(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: PublishArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };

    let text = match (a.text, a.content_id) {
        (Some(t), None) => t,
        (None, Some(id)) => match ctx.caches.library.find_by_id(&id) {
            Some(item) => item.body,
            None => {
                return ToolError::new("E_NOT_FOUND", &format!("content {id} not in library"))
                    .result()
            }
        },
        _ => {
            return ToolError::invalid_args("provide exactly one of text or content_id").result()
        }
    };

    let mut channels = Vec::new();
    if a.channels.linkedin {
        channels.push(Channel::Linkedin);
    }
    if a.channels.email {
        channels.push(Channel::Email);
    }
    if channels.is_empty() {
        return ToolError::invalid_args("no channel selected").result();
    }

    let outcome = publish::publish(&ctx.providers, &text, &channels, &a.email).await;
    tracing::info!(
        event = "content_published",
        succeeded = outcome.succeeded(),
        failed = outcome.failed()
    );
    success(report::publish(&outcome), json!({ "report": outcome }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::handle_call;
    use crate::tools::test_support::*;

    fn gen_args() -> Value {
        json!({
            "content_type": "social_post",
            "topic": "release notes",
            "keywords": ["changelog"]
        })
    }

    #[tokio::test]
    async fn test_identical_request_served_from_library() {
        let (ctx, _) = sandbox_ctx();
        let first = handle_call(&ctx, "generate_content", &gen_args()).await.unwrap();
        assert_eq!(first["data"]["from_library"], false);
        assert!(first["summary"]
            .as_str()
            .unwrap()
            .contains("[social_post] release notes"));

        let second = handle_call(&ctx, "generate_content", &gen_args()).await.unwrap();
        assert_eq!(second["data"]["from_library"], true);
        assert_eq!(second["data"]["content"]["id"], first["data"]["content"]["id"]);

        let mut fresh = gen_args();
        fresh["use_library"] = json!(false);
        let third = handle_call(&ctx, "generate_content", &fresh).await.unwrap();
        assert_ne!(third["data"]["content"]["id"], first["data"]["content"]["id"]);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_named() {
        let (ctx, _) = sandbox_ctx();
        let mut args = gen_args();
        args["provider"] = json!("openai");
        let out = handle_call(&ctx, "generate_content", &args).await.unwrap();
        assert_eq!(error_code_of(&out), Some("E_NOT_CONFIGURED"));
    }

    #[tokio::test]
    async fn test_publish_library_item_with_partial_failure() {
        let (ctx, sb) = sandbox_ctx();
        let gen = handle_call(&ctx, "generate_content", &gen_args()).await.unwrap();
        let id = gen["data"]["content"]["id"].as_str().unwrap();
        sb.email.set_failing(true);

        let out = handle_call(
            &ctx,
            "publish_content",
            &json!({
                "content_id": id,
                "channels": { "linkedin": true, "email": true },
                "email": { "list_ids": ["l-1"] }
            }),
        )
        .await
        .unwrap();
        assert!(out.get("error").is_none());
        let summary = out["summary"].as_str().unwrap();
        assert!(summary.starts_with("Published to 1 of 2 channel(s)"));
        assert_eq!(out["data"]["report"]["outcomes"][1]["ok"], false);
        assert_eq!(sb.social.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_requires_a_channel_and_one_source() {
        let (ctx, _) = sandbox_ctx();
        let none = handle_call(
            &ctx,
            "publish_content",
            &json!({ "text": "hi", "channels": {} }),
        )
        .await
        .unwrap();
        assert_eq!(error_code_of(&none), Some("E_INVALID_ARGS"));

        let both = handle_call(
            &ctx,
            "publish_content",
            &json!({ "text": "hi", "content_id": "x", "channels": { "linkedin": true } }),
        )
        .await
        .unwrap();
        assert_eq!(error_code_of(&both), Some("E_INVALID_ARGS"));
    }
}
