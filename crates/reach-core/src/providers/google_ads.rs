//! Google Ads REST interface (mutate + GAQL search).

use super::{ensure_success, AdPlatform, CampaignRequest, LaunchedCampaign};
use crate::config::GoogleAdsCredentials;
use crate::model::{CampaignStatus, MetricsSnapshot, Platform};
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

const API_BASE: &str = "https://googleads.googleapis.com/v17";

pub struct GoogleAdsClient {
    client: reqwest::Client,
    creds: GoogleAdsCredentials,
}

impl GoogleAdsClient {
    pub fn new(client: reqwest::Client, creds: GoogleAdsCredentials) -> Self {
        Self { client, creds }
    }

    fn customer_url(&self, suffix: &str) -> String {
        format!("{}/customers/{}/{}", API_BASE, self.creds.customer_id, suffix)
    }

    fn campaign_resource(&self, external_id: &str) -> String {
        format!("customers/{}/campaigns/{}", self.creds.customer_id, external_id)
    }

    async fn post(&self, suffix: &str, body: &Value) -> anyhow::Result<Value> {
        let mut req = self
            .client
            .post(self.customer_url(suffix))
            .bearer_auth(self.creds.access_token.expose())
            .header("developer-token", self.creds.developer_token.expose());
        if let Some(login) = &self.creds.login_customer_id {
            req = req.header("login-customer-id", login);
        }
        let resp = req.json(body).send().await?;
        let resp = ensure_success("Google Ads", resp).await?;
        Ok(resp.json().await?)
    }

    /// Runs a single-create mutate and returns the created resource name.
    async fn mutate_create(&self, service: &str, create: Value) -> anyhow::Result<String> {
        let body = json!({ "operations": [{ "create": create }] });
        let resp = self.post(&format!("{service}:mutate"), &body).await?;
        first_resource_name(&resp).with_context(|| format!("{service}:mutate returned no resourceName"))
    }

    async fn mutate_update(&self, update: Value, mask: &str) -> anyhow::Result<()> {
        let body = json!({ "operations": [{ "update": update, "updateMask": mask }] });
        self.post("campaigns:mutate", &body).await?;
        Ok(())
    }
}

fn first_resource_name(resp: &Value) -> Option<String> {
    resp.pointer("/results/0/resourceName")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// `customers/1/campaigns/42` -> `42`
pub fn id_from_resource_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

pub fn channel_type(campaign_type: &str) -> &'static str {
    match campaign_type {
        "display" => "DISPLAY",
        "video" => "VIDEO",
        "shopping" => "SHOPPING",
        "performance_max" => "PERFORMANCE_MAX",
        _ => "SEARCH",
    }
}

fn bidding(strategy: Option<&str>) -> (&'static str, Value) {
    match strategy.unwrap_or("maximize_clicks") {
        "manual_cpc" => ("manualCpc", json!({})),
        "maximize_conversions" => ("maximizeConversions", json!({})),
        "target_cpa" => ("targetCpa", json!({})),
        _ => ("targetSpend", json!({})),
    }
}

/// Budgets are expressed in micros of the account currency.
pub fn to_micros(amount: f64) -> i64 {
    (amount * 1_000_000.0).round() as i64
}

fn int64(v: Option<&Value>) -> u64 {
    // int64 fields are JSON strings in the REST encoding.
    match v {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(other) => other.as_u64().unwrap_or(0),
        None => 0,
    }
}

pub fn parse_search(body: &Value) -> MetricsSnapshot {
    let mut m = MetricsSnapshot::default();
    let Some(rows) = body.get("results").and_then(|v| v.as_array()) else {
        return m;
    };
    for row in rows {
        let Some(metrics) = row.get("metrics") else {
            continue;
        };
        m.impressions += int64(metrics.get("impressions"));
        m.clicks += int64(metrics.get("clicks"));
        m.conversions += metrics
            .get("conversions")
            .and_then(|v| v.as_f64())
            .map(|c| c.round() as u64)
            .unwrap_or(0);
        m.spend += int64(metrics.get("costMicros")) as f64 / 1_000_000.0;
    }
    m
}

#[async_trait]
impl AdPlatform for GoogleAdsClient {
    fn platform(&self) -> Platform {
        Platform::GoogleAds
    }

    async fn launch(&self, req: &CampaignRequest) -> anyhow::Result<LaunchedCampaign> {
        let budget = self
            .mutate_create(
                "campaignBudgets",
                json!({
                    "name": format!("{} budget {}", req.name, crate::model::new_id()),
                    "amountMicros": to_micros(req.daily_budget).to_string(),
                    "deliveryMethod": "STANDARD",
                    "explicitlyShared": false,
                }),
            )
            .await?;

        let (bid_key, bid_value) = bidding(
            req.creative
                .get("bidding_strategy")
                .and_then(|v| v.as_str()),
        );
        let mut campaign = json!({
            "name": req.name,
            "status": "ENABLED",
            "advertisingChannelType": channel_type(&req.campaign_type),
            "campaignBudget": budget,
            "startDate": req.start_date.format("%Y-%m-%d").to_string(),
            "networkSettings": {
                "targetGoogleSearch": true,
                "targetSearchNetwork": true,
                "targetContentNetwork": req.campaign_type == "display",
            },
        });
        campaign[bid_key] = bid_value;
        if let Some(end) = req.end_date {
            campaign["endDate"] = json!(end.format("%Y-%m-%d").to_string());
        }
        let campaign_rn = self.mutate_create("campaigns", campaign).await?;

        let keywords: Vec<&str> = req
            .targeting
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|k| k.as_str()).collect())
            .unwrap_or_default();
        if !keywords.is_empty() {
            let ad_group = self
                .mutate_create(
                    "adGroups",
                    json!({
                        "name": format!("{} ad group", req.name),
                        "campaign": campaign_rn,
                        "status": "ENABLED",
                        "type": "SEARCH_STANDARD",
                    }),
                )
                .await?;
            let operations: Vec<Value> = keywords
                .iter()
                .map(|k| {
                    json!({ "create": {
                        "adGroup": ad_group,
                        "status": "ENABLED",
                        "keyword": { "text": k, "matchType": "BROAD" }
                    }})
                })
                .collect();
            self.post(
                "adGroupCriteria:mutate",
                &json!({ "operations": operations }),
            )
            .await?;
        }

        let external_id = id_from_resource_name(&campaign_rn).to_string();
        tracing::info!(event = "provider_launch", provider = "google_ads", external_id = %external_id);
        Ok(LaunchedCampaign {
            external_id,
            status: CampaignStatus::Active,
        })
    }

    async fn fetch_metrics(
        &self,
        external_id: &str,
        since: NaiveDate,
    ) -> anyhow::Result<MetricsSnapshot> {
        anyhow::ensure!(
            external_id.chars().all(|c| c.is_ascii_digit()),
            "invalid Google Ads campaign id '{external_id}'"
        );
        let query = format!(
            "SELECT metrics.impressions, metrics.clicks, metrics.conversions, metrics.cost_micros \
             FROM campaign WHERE campaign.id = {} AND segments.date >= '{}'",
            external_id,
            since.format("%Y-%m-%d")
        );
        let body = self.post("googleAds:search", &json!({ "query": query })).await?;
        Ok(parse_search(&body))
    }

    async fn set_status(&self, external_id: &str, status: CampaignStatus) -> anyhow::Result<()> {
        let code = match status {
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Active | CampaignStatus::Scheduled => "ENABLED",
        };
        self.mutate_update(
            json!({ "resourceName": self.campaign_resource(external_id), "status": code }),
            "status",
        )
        .await
    }

    async fn apply_variant(&self, external_id: &str, config: &Value) -> anyhow::Result<()> {
        let obj = config
            .as_object()
            .context("variant config must be a JSON object")?;
        anyhow::ensure!(!obj.is_empty(), "variant config is empty");
        let mask = obj.keys().cloned().collect::<Vec<_>>().join(",");
        let mut update = config.clone();
        update["resourceName"] = json!(self.campaign_resource(external_id));
        self.mutate_update(update, &mask).await
    }
}
