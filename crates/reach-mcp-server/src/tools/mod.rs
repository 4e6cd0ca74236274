use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::{CompiledSchema, ToolCaches};
use crate::config::ServerConfig;
use reach_core::errors::error_code;
use reach_core::monitor::MonitorContext;
use reach_core::providers::Providers;
use reach_core::registry::{CampaignRegistry, ExperimentRegistry};

pub mod analytics;
pub mod campaigns;
pub mod content;
pub mod experiments;

pub struct ToolContext {
    pub cfg: ServerConfig,
    pub campaigns: CampaignRegistry,
    pub experiments: ExperimentRegistry,
    pub providers: Arc<Providers>,
    pub caches: ToolCaches,
}

impl ToolContext {
    pub fn new(cfg: ServerConfig, providers: Providers) -> Self {
        let caches = ToolCaches::new(cfg.cache_entries);
        Self {
            cfg,
            campaigns: CampaignRegistry::new(),
            experiments: ExperimentRegistry::new(),
            providers: Arc::new(providers),
            caches,
        }
    }

    /// The view of shared state the background monitors work on.
    pub fn monitor_context(&self) -> MonitorContext {
        MonitorContext {
            campaigns: self.campaigns.clone(),
            experiments: self.experiments.clone(),
            providers: self.providers.clone(),
            min_trials: self.cfg.min_trials,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_args(message: impl std::fmt::Display) -> Self {
        Self::new("E_INVALID_ARGS", &message.to_string())
    }

    pub fn result(self) -> anyhow::Result<Value> {
        Ok(json!({ "error": self }))
    }
}

/// Successful tool output: the text summary plus the structured record.
pub fn success(summary: String, data: Value) -> anyhow::Result<Value> {
    Ok(json!({ "summary": summary, "data": data }))
}

/// Deserializes tool arguments, reporting serde failures as `E_INVALID_ARGS`.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(ToolError::invalid_args)
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

const DATE_PATTERN: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}$";

fn metrics_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "impressions": { "type": "integer", "minimum": 0 },
            "clicks": { "type": "integer", "minimum": 0 },
            "conversions": { "type": "integer", "minimum": 0 },
            "opens": { "type": "integer", "minimum": 0 },
            "spend": { "type": "number", "minimum": 0 }
        },
        "additionalProperties": false
    })
}

pub fn list_tools() -> Vec<Value> {
    vec![
        json!({
            "name": "create_linkedin_campaign",
            "description": "Launch a LinkedIn Ads campaign and start monitoring its performance.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "campaign_type": {
                        "type": "string",
                        "enum": ["sponsored_content", "text_ads", "message_ads", "dynamic_ads"]
                    },
                    "objective": {
                        "type": "string",
                        "enum": ["brand_awareness", "website_visits", "engagement", "lead_generation", "website_conversions", "video_views"]
                    },
                    "daily_budget": { "type": "number", "exclusiveMinimum": 0 },
                    "currency": { "type": "string", "pattern": "^[A-Z]{3}$" },
                    "start_date": { "type": "string", "pattern": DATE_PATTERN },
                    "end_date": { "type": "string", "pattern": DATE_PATTERN },
                    "targeting": {
                        "type": "object",
                        "properties": {
                            "locations": string_array(),
                            "industries": string_array(),
                            "job_titles": string_array(),
                            "seniorities": string_array(),
                            "company_sizes": string_array(),
                            "campaign_group_id": { "type": "string" }
                        }
                    },
                    "creative": { "type": "object" }
                },
                "required": ["name", "campaign_type", "daily_budget", "start_date"]
            }
        }),
        json!({
            "name": "create_google_ads_campaign",
            "description": "Launch a Google Ads campaign (budget, campaign, optional keyword ad group) and start monitoring it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "campaign_type": {
                        "type": "string",
                        "enum": ["search", "display", "video", "shopping", "performance_max"]
                    },
                    "daily_budget": { "type": "number", "exclusiveMinimum": 0 },
                    "currency": { "type": "string", "pattern": "^[A-Z]{3}$" },
                    "start_date": { "type": "string", "pattern": DATE_PATTERN },
                    "end_date": { "type": "string", "pattern": DATE_PATTERN },
                    "targeting": {
                        "type": "object",
                        "properties": {
                            "keywords": string_array(),
                            "locations": string_array()
                        }
                    },
                    "creative": {
                        "type": "object",
                        "properties": {
                            "bidding_strategy": {
                                "type": "string",
                                "enum": ["manual_cpc", "maximize_clicks", "maximize_conversions", "target_cpa"]
                            },
                            "headlines": string_array(),
                            "descriptions": string_array()
                        }
                    }
                },
                "required": ["name", "campaign_type", "daily_budget", "start_date"]
            }
        }),
        json!({
            "name": "send_email_campaign",
            "description": "Create an email campaign and send it now or schedule it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "subject": { "type": "string", "minLength": 1 },
                    "html_content": { "type": "string", "minLength": 1 },
                    "plain_content": { "type": "string" },
                    "list_ids": string_array(),
                    "segment_ids": string_array(),
                    "send_at": { "type": "string", "description": "RFC 3339 timestamp; omit to send now" }
                },
                "required": ["name", "subject", "html_content"]
            }
        }),
        json!({
            "name": "generate_content",
            "description": "Generate marketing copy with an AI provider. Identical requests are served from the content library.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content_type": {
                        "type": "string",
                        "enum": ["blog_post", "social_post", "ad_copy", "email", "landing_page"]
                    },
                    "topic": { "type": "string", "minLength": 1 },
                    "tone": { "type": "string" },
                    "audience": { "type": "string" },
                    "keywords": string_array(),
                    "max_words": { "type": "integer", "minimum": 10, "maximum": 5000 },
                    "provider": { "type": "string", "enum": ["openai", "anthropic", "sandbox"] },
                    "use_library": { "type": "boolean" }
                },
                "required": ["content_type", "topic"]
            }
        }),
        json!({
            "name": "publish_content",
            "description": "Publish text (or a content library item) to several channels, reporting each channel's outcome.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string", "minLength": 1 },
                    "content_id": { "type": "string" },
                    "channels": {
                        "type": "object",
                        "properties": {
                            "linkedin": { "type": "boolean" },
                            "email": { "type": "boolean" }
                        },
                        "additionalProperties": false
                    },
                    "email": {
                        "type": "object",
                        "properties": {
                            "subject": { "type": "string" },
                            "list_ids": string_array(),
                            "segment_ids": string_array()
                        }
                    }
                },
                "required": ["channels"]
            }
        }),
        json!({
            "name": "start_ab_test",
            "description": "Start an A/B test over two or more variants.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "test_type": {
                        "type": "string",
                        "enum": ["ad_creative", "email_subject", "landing_page", "audience"]
                    },
                    "channel": { "type": "string", "enum": ["linkedin", "google_ads", "email"] },
                    "variants": {
                        "type": "array",
                        "minItems": 2,
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string", "minLength": 1 },
                                "config": { "type": "object" },
                                "external_id": { "type": "string" }
                            },
                            "required": ["name"]
                        }
                    },
                    "sample_size": { "type": "integer", "minimum": 1 },
                    "success_metric": { "type": "string", "enum": ["ctr", "conversion_rate", "open_rate"] },
                    "confidence_level": { "type": "number", "exclusiveMinimum": 0.5, "exclusiveMaximum": 1 },
                    "campaign_id": { "type": "string" },
                    "auto_implement": { "type": "boolean" }
                },
                "required": ["test_type", "channel", "variants", "sample_size", "success_metric"]
            }
        }),
        json!({
            "name": "get_ab_test_results",
            "description": "Current per-variant results and the significance decision for an A/B test.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "test_id": { "type": "string" },
                    "refresh": { "type": "boolean", "description": "Run a significance check now" }
                },
                "required": ["test_id"]
            }
        }),
        json!({
            "name": "manage_ab_test",
            "description": "Pause or resume an A/B test, or record metrics for a variant without a platform id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "test_id": { "type": "string" },
                    "action": { "type": "string", "enum": ["pause", "resume", "record_metrics"] },
                    "variant": { "type": "string" },
                    "metrics": metrics_schema()
                },
                "required": ["test_id", "action"]
            }
        }),
        json!({
            "name": "get_campaign_metrics",
            "description": "Metrics for one campaign (optionally refreshed from its platform) or an overview of all.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "string" },
                    "refresh": { "type": "boolean" }
                }
            }
        }),
        json!({
            "name": "pause_campaign",
            "description": "Pause or resume an ad campaign on its platform.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "string" },
                    "action": { "type": "string", "enum": ["pause", "resume"] }
                },
                "required": ["campaign_id"]
            }
        }),
        json!({
            "name": "calculate_roi",
            "description": "ROI, ROAS, CAC, LTV and funnel ratios from supplied numbers. Ratios over zero are reported as n/a.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "spend": { "type": "number", "minimum": 0 },
                    "revenue": { "type": "number", "minimum": 0 },
                    "impressions": { "type": "integer", "minimum": 0 },
                    "clicks": { "type": "integer", "minimum": 0 },
                    "conversions": { "type": "integer", "minimum": 0 },
                    "new_customers": { "type": "integer", "minimum": 0 },
                    "average_order_value": { "type": "number", "minimum": 0 },
                    "purchase_frequency": { "type": "number", "minimum": 0 },
                    "customer_lifespan_years": { "type": "number", "minimum": 0 },
                    "gross_margin": { "type": "number", "minimum": 0, "maximum": 1 },
                    "currency": { "type": "string", "pattern": "^[A-Z]{3}$" }
                },
                "required": ["spend", "revenue"]
            }
        }),
        json!({
            "name": "get_analytics_dashboard",
            "description": "Channel-level traffic, conversions and revenue from the analytics provider.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "days": { "type": "integer", "minimum": 1, "maximum": 365 },
                    "start_date": { "type": "string", "pattern": DATE_PATTERN },
                    "end_date": { "type": "string", "pattern": DATE_PATTERN }
                }
            }
        }),
    ]
}

pub fn is_known_tool(name: &str) -> bool {
    list_tools().iter().any(|t| t["name"] == name)
}

#[cfg(test)]
pub static COMPILE_CT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn compiled_schema(ctx: &ToolContext, name: &str) -> Result<CompiledSchema, ToolError> {
    if let Some(s) = ctx.caches.schemas.get(name) {
        return Ok(s);
    }
    let tools = list_tools();
    let schema = tools
        .iter()
        .find(|t| t["name"] == name)
        .map(|t| &t["inputSchema"])
        .ok_or_else(|| ToolError::new("E_INTERNAL", &format!("no schema for {name}")))?;

    #[cfg(test)]
    COMPILE_CT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| ToolError::new("E_INTERNAL", &format!("schema for {name}: {e}")))?;
    let arc = Arc::new(compiled);
    ctx.caches.schemas.insert(name.to_string(), arc.clone());
    Ok(arc)
}

fn longest_string(v: &Value) -> usize {
    match v {
        Value::String(s) => s.len(),
        Value::Array(a) => a.iter().map(longest_string).max().unwrap_or(0),
        Value::Object(o) => o
            .iter()
            .map(|(k, v)| k.len().max(longest_string(v)))
            .max()
            .unwrap_or(0),
        _ => 0,
    }
}

/// Field-size limit and JSON Schema validation for a tool's arguments.
pub fn validate_args(ctx: &ToolContext, name: &str, args: &Value) -> Result<(), ToolError> {
    let longest = longest_string(args);
    if longest > ctx.cfg.max_field_bytes {
        return Err(ToolError::new(
            "E_LIMIT_EXCEEDED",
            &format!("field bytes={} > max={}", longest, ctx.cfg.max_field_bytes),
        ));
    }

    let schema = compiled_schema(ctx, name)?;
    if let Err(errors) = schema.validate(args) {
        let violations: Vec<Value> = errors
            .map(|e| {
                json!({
                    "path": e.instance_path.to_string(),
                    "message": e.to_string()
                })
            })
            .collect();
        return Err(ToolError::new(
            "E_INVALID_ARGS",
            &format!("{} argument violation(s)", violations.len()),
        )
        .with_details(json!({ "violations": violations })));
    }
    Ok(())
}

async fn dispatch(ctx: &ToolContext, name: &str, args: &Value) -> anyhow::Result<Value> {
    match name {
        "create_linkedin_campaign" => campaigns::create_linkedin_campaign(ctx, args).await,
        "create_google_ads_campaign" => campaigns::create_google_ads_campaign(ctx, args).await,
        "send_email_campaign" => campaigns::send_email_campaign(ctx, args).await,
        "get_campaign_metrics" => campaigns::get_campaign_metrics(ctx, args).await,
        "pause_campaign" => campaigns::pause_campaign(ctx, args).await,
        "generate_content" => content::generate_content(ctx, args).await,
        "publish_content" => content::publish_content(ctx, args).await,
        "start_ab_test" => experiments::start_ab_test(ctx, args).await,
        "get_ab_test_results" => experiments::get_ab_test_results(ctx, args).await,
        "manage_ab_test" => experiments::manage_ab_test(ctx, args).await,
        "calculate_roi" => analytics::calculate_roi(ctx, args).await,
        "get_analytics_dashboard" => analytics::get_analytics_dashboard(ctx, args).await,
        _ => Err(anyhow::anyhow!("Unknown tool: {}", name)),
    }
}

/// Validates and runs a tool. Domain failures come back as `{"error": ...}`
/// values; only unexpected internal errors are returned as `Err`.
pub async fn handle_call(ctx: &ToolContext, name: &str, args: &Value) -> anyhow::Result<Value> {
    if let Err(e) = validate_args(ctx, name, args) {
        return e.result();
    }
    match dispatch(ctx, name, args).await {
        Ok(v) => Ok(v),
        Err(e) => match error_code(&e) {
            "E_INTERNAL" => Err(e),
            code => ToolError::new(code, &format!("{e:#}")).result(),
        },
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use reach_core::providers::sandbox::SandboxHandles;

    pub fn sandbox_ctx() -> (ToolContext, SandboxHandles) {
        let sb = SandboxHandles::new();
        let ctx = ToolContext::new(ServerConfig::default(), sb.providers());
        (ctx, sb)
    }

    pub fn error_code_of(v: &Value) -> Option<&str> {
        v.pointer("/error/code").and_then(|c| c.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_every_tool_schema_compiles() {
        let (ctx, _) = sandbox_ctx();
        for t in list_tools() {
            let name = t["name"].as_str().unwrap();
            assert!(compiled_schema(&ctx, name).is_ok(), "{name}");
        }
        assert_eq!(list_tools().len(), 12);
    }

    #[test]
    fn test_schema_compiled_once() {
        let (ctx, _) = sandbox_ctx();
        let before = COMPILE_CT.load(std::sync::atomic::Ordering::Relaxed);
        let first = compiled_schema(&ctx, "calculate_roi").unwrap();
        let second = compiled_schema(&ctx, "calculate_roi").unwrap();
        // Second lookup is served from the cache, not recompiled.
        assert!(Arc::ptr_eq(&first, &second));
        assert!(COMPILE_CT.load(std::sync::atomic::Ordering::Relaxed) > before);
        assert!(ctx.caches.schemas.get("calculate_roi").is_some());
    }

    #[tokio::test]
    async fn test_schema_violation_reports_paths() {
        let (ctx, _) = sandbox_ctx();
        let out = handle_call(
            &ctx,
            "create_linkedin_campaign",
            &json!({ "name": "x", "campaign_type": "billboard", "daily_budget": -5, "start_date": "2026-01-01" }),
        )
        .await
        .unwrap();
        assert_eq!(error_code_of(&out), Some("E_INVALID_ARGS"));
        let violations = out["error"]["details"]["violations"].as_array().unwrap();
        let paths: Vec<&str> = violations.iter().map(|v| v["path"].as_str().unwrap()).collect();
        assert!(paths.contains(&"/campaign_type"));
        assert!(paths.contains(&"/daily_budget"));
    }

    #[tokio::test]
    async fn test_oversized_field_rejected_before_schema() {
        let (mut ctx, _) = sandbox_ctx();
        ctx.cfg.max_field_bytes = 16;
        let out = handle_call(
            &ctx,
            "calculate_roi",
            &json!({ "spend": 1, "revenue": 2, "currency": "A_VERY_LONG_CURRENCY_CODE" }),
        )
        .await
        .unwrap();
        assert_eq!(error_code_of(&out), Some("E_LIMIT_EXCEEDED"));
    }

    #[test]
    fn test_known_tools() {
        assert!(is_known_tool("start_ab_test"));
        assert!(!is_known_tool("launch_rocket"));
    }
}
