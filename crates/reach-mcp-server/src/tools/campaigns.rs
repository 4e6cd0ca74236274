use super::{parse_args, success, ToolContext, ToolError};
use anyhow::Result;
use chrono::Utc;
use reach_core::errors::RegistryError;
use reach_core::model::{new_id, Campaign, CampaignStatus, MetricsSnapshot, Platform};
use reach_core::monitor::refresh_campaign;
use reach_core::providers::{default_currency, CampaignRequest, EmailCampaignRequest};
use reach_core::report;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn create_linkedin_campaign(ctx: &ToolContext, args: &Value) -> Result<Value> {
    launch_ad_campaign(ctx, Platform::Linkedin, args).await
}

pub async fn create_google_ads_campaign(ctx: &ToolContext, args: &Value) -> Result<Value> {
    launch_ad_campaign(ctx, Platform::GoogleAds, args).await
}

async fn launch_ad_campaign(ctx: &ToolContext, platform: Platform, args: &Value) -> Result<Value> {
    let req: CampaignRequest = match parse_args(args) {
        Ok(r) => r,
        Err(e) => return e.result(),
    };
    if let Some(end) = req.end_date {
        if end < req.start_date {
            return ToolError::invalid_args("end_date is before start_date").result();
        }
    }

    let adapter = ctx.providers.ad_platform(platform)?;
    let launched = adapter.launch(&req).await?;

    let config = if req.creative.is_object() {
        req.creative.clone()
    } else {
        json!({})
    };
    let campaign = Campaign {
        id: new_id(),
        platform,
        campaign_type: req.campaign_type,
        name: req.name,
        external_id: launched.external_id,
        start_date: req.start_date,
        daily_budget: req.daily_budget,
        currency: req.currency,
        status: launched.status,
        metrics: MetricsSnapshot::default(),
        config,
        created_at: Utc::now(),
    };
    ctx.campaigns.insert(campaign.clone());
    tracing::info!(
        event = "campaign_registered",
        campaign_id = %campaign.id,
        platform = platform.as_str(),
        external_id = %campaign.external_id
    );

    success(
        report::campaign_launched(&campaign),
        json!({ "campaign": campaign }),
    )
}

pub async fn send_email_campaign(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let req: EmailCampaignRequest = match parse_args(args) {
        Ok(r) => r,
        Err(e) => return e.result(),
    };
    if req.list_ids.is_empty() && req.segment_ids.is_empty() {
        return ToolError::invalid_args("provide at least one of list_ids or segment_ids").result();
    }

    let launched = ctx.providers.email()?.send_campaign(&req).await?;
    let campaign = Campaign {
        id: new_id(),
        platform: Platform::Email,
        campaign_type: "single_send".into(),
        name: req.name.clone(),
        external_id: launched.external_id,
        start_date: req.send_at.unwrap_or_else(Utc::now).date_naive(),
        daily_budget: 0.0,
        currency: default_currency(),
        status: launched.status,
        metrics: MetricsSnapshot::default(),
        config: json!({ "subject": req.subject }),
        created_at: Utc::now(),
    };
    ctx.campaigns.insert(campaign.clone());

    let when = match req.send_at {
        Some(t) => format!("Scheduled for: {}", t.to_rfc3339()),
        None => "Sent: now".to_string(),
    };
    let summary = [
        "Email campaign created".to_string(),
        format!("Campaign ID: {}", campaign.id),
        format!("Provider ID: {}", campaign.external_id),
        format!("Subject: {}", req.subject),
        format!(
            "Recipients: {} list(s), {} segment(s)",
            req.list_ids.len(),
            req.segment_ids.len()
        ),
        when,
    ]
    .join("\n");
    success(summary, json!({ "campaign": campaign }))
}

#[derive(Deserialize)]
struct MetricsArgs {
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default)]
    refresh: bool,
}

pub async fn get_campaign_metrics(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: MetricsArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };

    let Some(id) = a.campaign_id else {
        let all = ctx.campaigns.list();
        return success(report::campaigns_overview(&all), json!({ "campaigns": all }));
    };

    let campaign = if a.refresh {
        refresh_campaign(&ctx.monitor_context(), &id).await?
    } else {
        ctx.campaigns
            .get(&id)
            .ok_or_else(|| RegistryError::NotFound(format!("campaign {id}")))?
    };
    success(
        report::campaign_metrics(&campaign),
        json!({
            "campaign": campaign,
            "rates": {
                "ctr": campaign.metrics.ctr(),
                "conversion_rate": campaign.metrics.conversion_rate(),
                "open_rate": campaign.metrics.open_rate(),
                "cost_per_click": campaign.metrics.cost_per_click(),
                "cost_per_conversion": campaign.metrics.cost_per_conversion(),
            }
        }),
    )
}

#[derive(Deserialize)]
struct PauseArgs {
    campaign_id: String,
    #[serde(default)]
    action: Option<String>,
}

pub async fn pause_campaign(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: PauseArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };
    let target = match a.action.as_deref().unwrap_or("pause") {
        "resume" => CampaignStatus::Active,
        _ => CampaignStatus::Paused,
    };

    let campaign = ctx
        .campaigns
        .get(&a.campaign_id)
        .ok_or_else(|| RegistryError::NotFound(format!("campaign {}", a.campaign_id)))?;
    if campaign.platform == Platform::Email {
        return Err(RegistryError::InvalidState(
            "email campaigns cannot be paused once sent".into(),
        )
        .into());
    }
    if campaign.status == target {
        return ToolError::new(
            "E_INVALID_STATE",
            &format!("campaign {} is already {}", campaign.id, target.as_str()),
        )
        .result();
    }

    ctx.providers
        .ad_platform(campaign.platform)?
        .set_status(&campaign.external_id, target)
        .await?;
    ctx.campaigns.set_status(&campaign.id, target)?;
    tracing::info!(event = "campaign_status", campaign_id = %campaign.id, status = target.as_str());

    success(
        format!(
            "Campaign {} ({}) is now {}",
            campaign.name,
            campaign.platform.display_name(),
            target.as_str()
        ),
        json!({ "campaign_id": campaign.id, "status": target }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::handle_call;
    use crate::tools::test_support::*;

    fn linkedin_args() -> Value {
        json!({
            "name": "Q3 ABM",
            "campaign_type": "sponsored_content",
            "objective": "lead_generation",
            "daily_budget": 75,
            "start_date": "2026-07-01",
            "targeting": { "job_titles": ["urn:li:title:10"] },
            "creative": { "headline": "Ship faster" }
        })
    }

    #[tokio::test]
    async fn test_linkedin_launch_registers_campaign() {
        let (ctx, sb) = sandbox_ctx();
        let out = handle_call(&ctx, "create_linkedin_campaign", &linkedin_args())
            .await
            .unwrap();
        let summary = out["summary"].as_str().unwrap();
        assert!(summary.contains("LinkedIn Ads campaign created"));
        assert!(summary.contains("Daily budget: 75.00 USD"));

        let id = out["data"]["campaign"]["id"].as_str().unwrap();
        let c = ctx.campaigns.get(id).unwrap();
        assert_eq!(c.external_id, "sbx-li-000001");
        assert_eq!(c.config["headline"], "Ship faster");
        assert_eq!(sb.linkedin.status_of("sbx-li-000001"), Some(CampaignStatus::Active));
    }

    #[tokio::test]
    async fn test_end_before_start_rejected() {
        let (ctx, _) = sandbox_ctx();
        let mut args = linkedin_args();
        args["end_date"] = json!("2026-06-01");
        let out = handle_call(&ctx, "create_linkedin_campaign", &args).await.unwrap();
        assert_eq!(error_code_of(&out), Some("E_INVALID_ARGS"));
        assert!(ctx.campaigns.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_platform() {
        let ctx = ToolContext::new(Default::default(), Default::default());
        let out = handle_call(&ctx, "create_linkedin_campaign", &linkedin_args())
            .await
            .unwrap();
        assert_eq!(error_code_of(&out), Some("E_NOT_CONFIGURED"));
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_provider_code() {
        let (ctx, sb) = sandbox_ctx();
        sb.linkedin.set_failing(true);
        let out = handle_call(&ctx, "create_linkedin_campaign", &linkedin_args())
            .await
            .unwrap();
        assert_eq!(error_code_of(&out), Some("E_PROVIDER"));
    }

    #[tokio::test]
    async fn test_email_needs_recipients() {
        let (ctx, sb) = sandbox_ctx();
        let args = json!({ "name": "n", "subject": "s", "html_content": "<p>h</p>" });
        let out = handle_call(&ctx, "send_email_campaign", &args).await.unwrap();
        assert_eq!(error_code_of(&out), Some("E_INVALID_ARGS"));
        assert!(sb.email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_email() {
        let (ctx, _) = sandbox_ctx();
        let args = json!({
            "name": "Webinar invite",
            "subject": "Join us",
            "html_content": "<p>Thursday</p>",
            "list_ids": ["l-1"],
            "send_at": "2026-09-01T15:00:00Z"
        });
        let out = handle_call(&ctx, "send_email_campaign", &args).await.unwrap();
        assert_eq!(out["data"]["campaign"]["status"], "scheduled");
        assert_eq!(out["data"]["campaign"]["start_date"], "2026-09-01");
        assert!(out["summary"].as_str().unwrap().contains("Scheduled for:"));
    }

    #[tokio::test]
    async fn test_metrics_refresh_and_overview() {
        let (ctx, sb) = sandbox_ctx();
        let out = handle_call(&ctx, "create_linkedin_campaign", &linkedin_args())
            .await
            .unwrap();
        let id = out["data"]["campaign"]["id"].as_str().unwrap().to_string();
        sb.linkedin.set_metrics(
            "sbx-li-000001",
            MetricsSnapshot {
                impressions: 1000,
                clicks: 30,
                ..MetricsSnapshot::default()
            },
        );

        let out = handle_call(
            &ctx,
            "get_campaign_metrics",
            &json!({ "campaign_id": id, "refresh": true }),
        )
        .await
        .unwrap();
        assert!(out["summary"].as_str().unwrap().contains("CTR: 3.00%"));
        assert_eq!(out["data"]["rates"]["conversion_rate"], 0.0);

        let all = handle_call(&ctx, "get_campaign_metrics", &json!({})).await.unwrap();
        assert!(all["summary"].as_str().unwrap().starts_with("1 campaign(s)"));
    }

    #[tokio::test]
    async fn test_unknown_campaign_not_found() {
        let (ctx, _) = sandbox_ctx();
        let out = handle_call(&ctx, "get_campaign_metrics", &json!({ "campaign_id": "nope" }))
            .await
            .unwrap();
        assert_eq!(error_code_of(&out), Some("E_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (ctx, sb) = sandbox_ctx();
        let out = handle_call(&ctx, "create_linkedin_campaign", &linkedin_args())
            .await
            .unwrap();
        let id = out["data"]["campaign"]["id"].as_str().unwrap().to_string();

        let out = handle_call(&ctx, "pause_campaign", &json!({ "campaign_id": id }))
            .await
            .unwrap();
        assert!(out["summary"].as_str().unwrap().ends_with("is now paused"));
        assert_eq!(sb.linkedin.status_of("sbx-li-000001"), Some(CampaignStatus::Paused));
        assert!(ctx.campaigns.list_active().is_empty());

        let again = handle_call(&ctx, "pause_campaign", &json!({ "campaign_id": id }))
            .await
            .unwrap();
        assert_eq!(error_code_of(&again), Some("E_INVALID_STATE"));

        handle_call(
            &ctx,
            "pause_campaign",
            &json!({ "campaign_id": id, "action": "resume" }),
        )
        .await
        .unwrap();
        assert_eq!(ctx.campaigns.list_active().len(), 1);
    }
}
