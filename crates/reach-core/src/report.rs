//! Plain-text summaries returned to tool callers. One fact per line.

use crate::experiment::{Decision, Evaluation};
use crate::model::{Campaign, ContentItem, Experiment, MetricsSnapshot};
use crate::publish::PublishReport;
use crate::roi::RoiReport;

pub fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0))
        .unwrap_or_else(|| "n/a".into())
}

pub fn money(v: Option<f64>, currency: &str) -> String {
    v.map(|x| format!("{x:.2} {currency}"))
        .unwrap_or_else(|| "n/a".into())
}

fn ratio(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}x")).unwrap_or_else(|| "n/a".into())
}

fn metric_lines(m: &MetricsSnapshot, currency: &str, out: &mut Vec<String>) {
    out.push(format!("Impressions: {}", m.impressions));
    out.push(format!("Clicks: {}", m.clicks));
    out.push(format!("CTR: {}", pct(m.ctr())));
    out.push(format!("Conversions: {}", m.conversions));
    out.push(format!("Conversion rate: {}", pct(m.conversion_rate())));
    out.push(format!("Spend: {}", money(Some(m.spend), currency)));
    out.push(format!("Cost per conversion: {}", money(m.cost_per_conversion(), currency)));
    if m.opens > 0 {
        out.push(format!("Opens: {}", m.opens));
        out.push(format!("Open rate: {}", pct(m.open_rate())));
    }
    match m.fetched_at {
        Some(t) => out.push(format!("Metrics as of: {}", t.to_rfc3339())),
        None => out.push("Metrics as of: not fetched yet".into()),
    }
}

pub fn campaign_launched(c: &Campaign) -> String {
    [
        format!("{} campaign created", c.platform.display_name()),
        format!("Campaign ID: {}", c.id),
        format!("Platform ID: {}", c.external_id),
        format!("Name: {}", c.name),
        format!("Type: {}", c.campaign_type),
        format!("Daily budget: {}", money(Some(c.daily_budget), &c.currency)),
        format!("Start date: {}", c.start_date),
        format!("Status: {}", c.status.as_str()),
        "Performance monitoring is active.".to_string(),
    ]
    .join("\n")
}

pub fn campaign_metrics(c: &Campaign) -> String {
    let mut out = vec![
        format!("{} ({})", c.name, c.platform.display_name()),
        format!("Campaign ID: {}", c.id),
        format!("Status: {}", c.status.as_str()),
    ];
    metric_lines(&c.metrics, &c.currency, &mut out);
    out.join("\n")
}

pub fn campaigns_overview(campaigns: &[Campaign]) -> String {
    if campaigns.is_empty() {
        return "No campaigns registered.".into();
    }
    let mut out = vec![format!("{} campaign(s)", campaigns.len())];
    for c in campaigns {
        out.push(format!(
            "- {} [{}] {} | {} | impressions {} | clicks {} | CTR {} | spend {}",
            c.id,
            c.platform.as_str(),
            c.name,
            c.status.as_str(),
            c.metrics.impressions,
            c.metrics.clicks,
            pct(c.metrics.ctr()),
            money(Some(c.metrics.spend), &c.currency)
        ));
    }
    out.join("\n")
}

pub fn experiment_started(e: &Experiment) -> String {
    let mut out = vec![
        "A/B test started".to_string(),
        format!("Test ID: {}", e.id),
        format!("Type: {}", e.experiment_type.as_str()),
        format!("Channel: {}", e.channel.display_name()),
        format!(
            "Variants: {}",
            e.variants
                .iter()
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        format!("Sample size per variant: {}", e.sample_size),
        format!("Success metric: {}", e.success_metric.as_str()),
        format!("Confidence level: {:.0}%", e.confidence_level * 100.0),
    ];
    if let Some(c) = &e.campaign_id {
        out.push(format!("Linked campaign: {c}"));
    }
    out.push(format!(
        "Auto-implement winner: {}",
        if e.auto_implement { "yes" } else { "no" }
    ));
    out.join("\n")
}

pub fn experiment_results(e: &Experiment, eval: &Evaluation) -> String {
    let mut out = vec![
        format!("A/B test {}", e.id),
        format!("Status: {}", e.status.as_str()),
        format!("Success metric: {}", e.success_metric.as_str()),
    ];
    for s in &eval.ranking {
        out.push(format!(
            "- {}: {} / {} = {}",
            s.name,
            s.successes,
            s.trials,
            pct(s.rate)
        ));
    }
    if let Some(c) = &eval.comparison {
        out.push(format!("z = {:.3}, p = {:.4}", c.z, c.p_value));
        out.push(format!("Lift of leader over runner-up: {}", pct(c.lift)));
    }
    match &eval.decision {
        Decision::Continue { reason } => out.push(format!("Decision: continue ({reason})")),
        Decision::Winner { index, .. } => out.push(format!(
            "Decision: winner is {}",
            e.variants
                .get(*index)
                .map(|v| v.name.as_str())
                .unwrap_or("?")
        )),
        Decision::Inconclusive { .. } => {
            out.push("Decision: inconclusive, sample size reached without significance".into())
        }
    }
    if let Some(w) = &e.winner {
        out.push(format!("Recorded winner: {} (p = {:.4})", w.name, w.p_value));
    }
    if let Some(imp) = &e.implemented {
        out.push(format!(
            "Implemented on campaign {} at {}",
            imp.campaign_id,
            imp.applied_at.to_rfc3339()
        ));
    }
    if let Some(err) = &e.implementation_error {
        out.push(format!("Auto-implement failed: {err}"));
    }
    out.join("\n")
}

pub fn roi(r: &RoiReport, currency: &str) -> String {
    [
        "ROI report".to_string(),
        format!("Spend: {}", money(Some(r.spend), currency)),
        format!("Revenue: {}", money(Some(r.revenue), currency)),
        format!("Profit: {}", money(Some(r.profit), currency)),
        format!("ROI: {}", pct(r.roi)),
        format!("ROAS: {}", ratio(r.roas)),
        format!("CAC: {}", money(r.cac, currency)),
        format!("LTV: {}", money(r.ltv, currency)),
        format!("LTV:CAC: {}", ratio(r.ltv_to_cac)),
        format!("CTR: {}", pct(r.ctr)),
        format!("Conversion rate: {}", pct(r.conversion_rate)),
        format!("CPC: {}", money(r.cpc, currency)),
        format!("CPA: {}", money(r.cpa, currency)),
    ]
    .join("\n")
}

pub fn publish(r: &PublishReport) -> String {
    let mut out = vec![format!(
        "Published to {} of {} channel(s)",
        r.succeeded(),
        r.outcomes.len()
    )];
    for o in &r.outcomes {
        if o.ok {
            out.push(format!(
                "- {}: ok ({})",
                o.channel.as_str(),
                o.external_id.as_deref().unwrap_or("-")
            ));
        } else {
            out.push(format!(
                "- {}: failed ({})",
                o.channel.as_str(),
                o.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out.join("\n")
}

pub fn content(item: &ContentItem, from_library: bool) -> String {
    let source = if from_library {
        "content library"
    } else {
        item.provider.as_str()
    };
    format!(
        "Content ID: {}\nType: {}\nSource: {}\n\n{}",
        item.id,
        item.content_type.as_str(),
        source,
        item.body
    )
}

/// Renders the analytics provider's channel report.
pub fn dashboard(d: &serde_json::Value) -> String {
    let num = |v: &serde_json::Value, k: &str| v.get(k).and_then(|x| x.as_f64()).unwrap_or(0.0);
    let mut out = vec![format!(
        "Analytics dashboard {} to {}",
        d.pointer("/date_range/start").and_then(|v| v.as_str()).unwrap_or("?"),
        d.pointer("/date_range/end").and_then(|v| v.as_str()).unwrap_or("?")
    )];
    for c in d
        .get("channels")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        out.push(format!(
            "- {}: sessions {:.0}, users {:.0}, conversions {:.0}, revenue {:.2}",
            c.get("channel").and_then(|v| v.as_str()).unwrap_or("(other)"),
            num(c, "sessions"),
            num(c, "totalUsers"),
            num(c, "conversions"),
            num(c, "totalRevenue")
        ));
    }
    let t = d.get("totals").cloned().unwrap_or_default();
    out.push(format!(
        "Totals: sessions {:.0}, conversions {:.0}, revenue {:.2}",
        num(&t, "sessions"),
        num(&t, "conversions"),
        num(&t, "totalRevenue")
    ));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CampaignStatus, Platform};
    use crate::publish::{Channel, ChannelOutcome};
    use crate::roi::{calculate, RoiInputs};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn campaign() -> Campaign {
        Campaign {
            id: "c-1".into(),
            platform: Platform::GoogleAds,
            campaign_type: "search".into(),
            name: "Brand search".into(),
            external_id: "9876".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            daily_budget: 25.0,
            currency: "EUR".into(),
            status: CampaignStatus::Active,
            metrics: MetricsSnapshot {
                impressions: 2000,
                clicks: 50,
                conversions: 5,
                spend: 100.0,
                ..MetricsSnapshot::default()
            },
            config: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_launch_summary_facts() {
        let s = campaign_launched(&campaign());
        assert!(s.contains("Google Ads campaign created"));
        assert!(s.contains("Platform ID: 9876"));
        assert!(s.contains("Daily budget: 25.00 EUR"));
        assert!(s.contains("Start date: 2026-05-04"));
    }

    #[test]
    fn test_metrics_summary_rates() {
        let s = campaign_metrics(&campaign());
        assert!(s.contains("CTR: 2.50%"));
        assert!(s.contains("Conversion rate: 10.00%"));
        assert!(s.contains("Cost per conversion: 20.00 EUR"));
        assert!(!s.contains("Open rate"));
    }

    #[test]
    fn test_roi_zero_spend_renders_na() {
        let r = calculate(&RoiInputs {
            spend: 0.0,
            revenue: 500.0,
            ..RoiInputs::default()
        });
        let s = roi(&r, "USD");
        assert!(s.contains("ROI: n/a"));
        assert!(s.contains("ROAS: n/a"));
        assert!(s.contains("Profit: 500.00 USD"));
    }

    #[test]
    fn test_publish_summary_lists_failures() {
        let r = PublishReport {
            outcomes: vec![
                ChannelOutcome {
                    channel: Channel::Linkedin,
                    ok: false,
                    external_id: None,
                    error: Some("LinkedIn API error (401): bad token".into()),
                    error_code: Some("E_PROVIDER".into()),
                },
                ChannelOutcome {
                    channel: Channel::Email,
                    ok: true,
                    external_id: Some("ss-1".into()),
                    error: None,
                    error_code: None,
                },
            ],
        };
        let s = publish(&r);
        assert!(s.starts_with("Published to 1 of 2 channel(s)"));
        assert!(s.contains("- linkedin: failed (LinkedIn API error (401): bad token)"));
        assert!(s.contains("- email: ok (ss-1)"));
    }

    #[test]
    fn test_dashboard_lines() {
        let d = json!({
            "date_range": { "start": "2026-01-01", "end": "2026-01-31" },
            "channels": [{ "channel": "Email", "sessions": 30.0, "totalUsers": 28.0, "conversions": 2.0, "totalRevenue": 99.5 }],
            "totals": { "sessions": 30.0, "conversions": 2.0, "totalRevenue": 99.5 }
        });
        let s = dashboard(&d);
        assert!(s.starts_with("Analytics dashboard 2026-01-01 to 2026-01-31"));
        assert!(s.contains("- Email: sessions 30, users 28, conversions 2, revenue 99.50"));
        assert!(s.ends_with("Totals: sessions 30, conversions 2, revenue 99.50"));
    }

    #[test]
    fn test_empty_overview() {
        assert_eq!(campaigns_overview(&[]), "No campaigns registered.");
    }
}
