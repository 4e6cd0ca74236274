//! Read-only JSON resources over the shared registries.

use crate::tools::ToolContext;
use reach_core::model::{safe_ratio, ExperimentStatus, Platform};
use serde_json::{json, Value};

pub const ACTIVE_CAMPAIGNS: &str = "reach://campaigns/active";
pub const DASHBOARD: &str = "reach://analytics/dashboard";
pub const CONTENT_LIBRARY: &str = "reach://content/library";

pub fn list_resources() -> Vec<Value> {
    vec![
        json!({
            "uri": ACTIVE_CAMPAIGNS,
            "name": "Active campaigns",
            "description": "Campaigns that are running or scheduled, with their latest metrics.",
            "mimeType": "application/json"
        }),
        json!({
            "uri": DASHBOARD,
            "name": "Performance dashboard",
            "description": "Totals across registered campaigns and A/B test counts.",
            "mimeType": "application/json"
        }),
        json!({
            "uri": CONTENT_LIBRARY,
            "name": "Content library",
            "description": "Generated content kept for reuse.",
            "mimeType": "application/json"
        }),
    ]
}

fn dashboard(ctx: &ToolContext) -> Value {
    let campaigns = ctx.campaigns.list();
    let (mut impressions, mut clicks, mut conversions, mut spend) = (0u64, 0u64, 0u64, 0.0f64);
    let mut by_platform = serde_json::Map::new();
    for p in [Platform::Linkedin, Platform::GoogleAds, Platform::Email] {
        let n = campaigns.iter().filter(|c| c.platform == p).count();
        by_platform.insert(p.as_str().to_string(), json!(n));
    }
    for c in &campaigns {
        impressions = impressions.saturating_add(c.metrics.impressions);
        clicks = clicks.saturating_add(c.metrics.clicks);
        conversions = conversions.saturating_add(c.metrics.conversions);
        spend += c.metrics.spend;
    }

    let tests = ctx.experiments.list();
    let count = |s: ExperimentStatus| tests.iter().filter(|e| e.status == s).count();

    json!({
        "campaigns": {
            "total": campaigns.len(),
            "active": ctx.campaigns.list_active().len(),
            "by_platform": by_platform,
        },
        "totals": {
            "impressions": impressions,
            "clicks": clicks,
            "conversions": conversions,
            "spend": spend,
            "ctr": safe_ratio(clicks as f64, impressions as f64),
            "conversion_rate": safe_ratio(conversions as f64, clicks as f64),
            "cost_per_conversion": safe_ratio(spend, conversions as f64),
        },
        "ab_tests": {
            "running": count(ExperimentStatus::Running),
            "paused": count(ExperimentStatus::Paused),
            "completed": count(ExperimentStatus::Completed),
        },
        "providers": ctx.providers.configured(),
    })
}

/// `None` for an unknown URI.
pub fn read_resource(ctx: &ToolContext, uri: &str) -> anyhow::Result<Option<Value>> {
    let body = match uri {
        ACTIVE_CAMPAIGNS => json!({ "campaigns": ctx.campaigns.list_active() }),
        DASHBOARD => dashboard(ctx),
        CONTENT_LIBRARY => json!({ "items": ctx.caches.library.list() }),
        _ => return Ok(None),
    };
    Ok(Some(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "application/json",
            "text": serde_json::to_string_pretty(&body)?
        }]
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::handle_call;
    use crate::tools::test_support::sandbox_ctx;

    fn body(v: &Value) -> Value {
        serde_json::from_str(v["contents"][0]["text"].as_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_dashboard_aggregates_registries() {
        let (ctx, _) = sandbox_ctx();
        handle_call(
            &ctx,
            "create_google_ads_campaign",
            &json!({ "name": "g", "campaign_type": "search", "daily_budget": 10, "start_date": "2026-01-01" }),
        )
        .await
        .unwrap();

        let out = read_resource(&ctx, DASHBOARD).unwrap().unwrap();
        let d = body(&out);
        assert_eq!(d["campaigns"]["total"], 1);
        assert_eq!(d["campaigns"]["by_platform"]["google_ads"], 1);
        assert!(d["totals"]["ctr"].is_null());
        assert_eq!(d["providers"][0], "linkedin");
    }

    #[tokio::test]
    async fn test_active_campaigns_and_library() {
        let (ctx, _) = sandbox_ctx();
        let out = read_resource(&ctx, ACTIVE_CAMPAIGNS).unwrap().unwrap();
        assert_eq!(out["contents"][0]["mimeType"], "application/json");
        assert_eq!(body(&out)["campaigns"].as_array().unwrap().len(), 0);

        handle_call(
            &ctx,
            "generate_content",
            &json!({ "content_type": "ad_copy", "topic": "pricing" }),
        )
        .await
        .unwrap();
        let lib = read_resource(&ctx, CONTENT_LIBRARY).unwrap().unwrap();
        assert_eq!(body(&lib)["items"][0]["topic"], "pricing");
    }

    #[test]
    fn test_unknown_uri() {
        let (ctx, _) = sandbox_ctx();
        assert!(read_resource(&ctx, "reach://nope").unwrap().is_none());
        assert_eq!(list_resources().len(), 3);
    }
}
