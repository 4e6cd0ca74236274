use chrono::{NaiveDate, Utc};
use reach_core::experiment::{ExperimentSpec, VariantSpec};
use reach_core::model::{
    new_id, Campaign, ExperimentStatus, ExperimentType, MetricsSnapshot, Platform, SuccessMetric,
};
use reach_core::monitor::{check_significance, poll_campaign_metrics, MonitorContext};
use reach_core::providers::sandbox::SandboxHandles;
use reach_core::providers::CampaignRequest;
use reach_core::registry::{CampaignRegistry, ExperimentRegistry};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_launch_monitor_and_auto_implement() -> anyhow::Result<()> {
    let sb = SandboxHandles::new();
    let ctx = MonitorContext {
        campaigns: CampaignRegistry::new(),
        experiments: ExperimentRegistry::new(),
        providers: Arc::new(sb.providers()),
        min_trials: 100,
    };

    // 1. Launch through the adapter and register
    let req = CampaignRequest {
        name: "Search launch".into(),
        campaign_type: "search".into(),
        objective: None,
        daily_budget: 30.0,
        currency: "USD".into(),
        start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        end_date: None,
        targeting: json!({ "keywords": ["ci pipelines"] }),
        creative: json!({ "headline": "Ship faster" }),
    };
    let launched = ctx
        .providers
        .ad_platform(Platform::GoogleAds)?
        .launch(&req)
        .await?;
    let campaign_id = new_id();
    ctx.campaigns.insert(Campaign {
        id: campaign_id.clone(),
        platform: Platform::GoogleAds,
        campaign_type: req.campaign_type.clone(),
        name: req.name.clone(),
        external_id: launched.external_id.clone(),
        start_date: req.start_date,
        daily_budget: req.daily_budget,
        currency: req.currency.clone(),
        status: launched.status,
        metrics: MetricsSnapshot::default(),
        config: req.creative.clone(),
        created_at: Utc::now(),
    });

    // 2. Metrics tick picks up platform totals
    sb.google_ads.set_metrics(
        &launched.external_id,
        MetricsSnapshot {
            impressions: 8000,
            clicks: 240,
            conversions: 9,
            spend: 210.0,
            ..MetricsSnapshot::default()
        },
    );
    poll_campaign_metrics(&ctx).await;
    assert_eq!(ctx.campaigns.get(&campaign_id).unwrap().metrics.clicks, 240);

    // 3. Headline test linked to the campaign
    let exp = ExperimentSpec {
        test_type: ExperimentType::AdCreative,
        channel: Platform::GoogleAds,
        variants: vec![
            VariantSpec {
                name: "control".into(),
                config: json!({ "headline": "Ship faster" }),
                external_id: Some("111".into()),
            },
            VariantSpec {
                name: "challenger".into(),
                config: json!({ "headline": "Deploy in minutes" }),
                external_id: Some("222".into()),
            },
        ],
        sample_size: 3000,
        success_metric: SuccessMetric::Ctr,
        confidence_level: 0.99,
        campaign_id: Some(campaign_id.clone()),
        auto_implement: true,
    }
    .into_experiment()?;
    let test_id = exp.id.clone();
    ctx.experiments.insert(exp);

    sb.google_ads.set_metrics(
        "111",
        MetricsSnapshot {
            impressions: 3000,
            clicks: 60,
            ..MetricsSnapshot::default()
        },
    );
    sb.google_ads.set_metrics(
        "222",
        MetricsSnapshot {
            impressions: 3000,
            clicks: 150,
            ..MetricsSnapshot::default()
        },
    );

    // 4. Significance tick completes and implements
    let summary = check_significance(&ctx).await;
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.failed, 0);

    let exp = ctx.experiments.get(&test_id).unwrap();
    assert_eq!(exp.status, ExperimentStatus::Completed);
    assert_eq!(exp.winner.as_ref().unwrap().name, "challenger");
    assert_eq!(
        exp.implemented.as_ref().unwrap().previous_config["headline"],
        "Ship faster"
    );
    assert_eq!(
        ctx.campaigns.get(&campaign_id).unwrap().config["headline"],
        "Deploy in minutes"
    );
    assert_eq!(sb.google_ads.applied().len(), 1);
    Ok(())
}
