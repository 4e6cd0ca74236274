//! LinkedIn Marketing API (versioned REST endpoints).

use super::{ensure_success, AdPlatform, CampaignRequest, LaunchedCampaign, SocialPublisher};
use crate::config::LinkedinCredentials;
use crate::model::{CampaignStatus, MetricsSnapshot, Platform};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde_json::{json, Value};

const API_BASE: &str = "https://api.linkedin.com/rest";
const API_VERSION: &str = "202406";

pub struct LinkedinClient {
    client: reqwest::Client,
    creds: LinkedinCredentials,
}

impl LinkedinClient {
    pub fn new(client: reqwest::Client, creds: LinkedinCredentials) -> Self {
        Self { client, creds }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.creds.access_token.expose())
            .header("LinkedIn-Version", API_VERSION)
            .header("X-Restli-Protocol-Version", "2.0.0")
    }

    fn campaigns_url(&self) -> String {
        format!(
            "{}/adAccounts/{}/adCampaigns",
            API_BASE, self.creds.ad_account_id
        )
    }

    async fn partial_update(&self, external_id: &str, set: Value) -> anyhow::Result<()> {
        let url = format!("{}/{}", self.campaigns_url(), external_id);
        let resp = self
            .request(reqwest::Method::POST, &url)
            .header("X-RestLi-Method", "PARTIAL_UPDATE")
            .json(&json!({ "patch": { "$set": set } }))
            .send()
            .await?;
        ensure_success("LinkedIn", resp).await?;
        Ok(())
    }
}

/// Maps our campaign type names onto LinkedIn's campaign `type` enum.
pub fn campaign_type_code(campaign_type: &str) -> &'static str {
    match campaign_type {
        "text_ads" => "TEXT_AD",
        "message_ads" => "SPONSORED_INMAILS",
        "dynamic_ads" => "DYNAMIC",
        _ => "SPONSORED_UPDATES",
    }
}

fn objective_code(objective: Option<&str>) -> &'static str {
    match objective.unwrap_or("website_visits") {
        "brand_awareness" => "BRAND_AWARENESS",
        "engagement" => "ENGAGEMENT",
        "lead_generation" => "LEAD_GENERATION",
        "website_conversions" => "WEBSITE_CONVERSION",
        "video_views" => "VIDEO_VIEW",
        _ => "WEBSITE_VISIT",
    }
}

/// Builds `targetingCriteria` from lists of facet URNs.
pub fn targeting_criteria(targeting: &Value) -> Value {
    const FACETS: &[(&str, &str)] = &[
        ("locations", "urn:li:adTargetingFacet:locations"),
        ("industries", "urn:li:adTargetingFacet:industries"),
        ("job_titles", "urn:li:adTargetingFacet:titles"),
        ("seniorities", "urn:li:adTargetingFacet:seniorities"),
        ("company_sizes", "urn:li:adTargetingFacet:staffCountRanges"),
    ];

    let mut and = Vec::new();
    for (key, facet) in FACETS {
        let values: Vec<&str> = targeting
            .get(*key)
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|x| x.as_str()).collect())
            .unwrap_or_default();
        if !values.is_empty() {
            let mut or = serde_json::Map::new();
            or.insert(facet.to_string(), json!(values));
            and.push(json!({ "or": or }));
        }
    }
    json!({ "include": { "and": and } })
}

fn epoch_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn status_code(status: CampaignStatus) -> &'static str {
    match status {
        CampaignStatus::Paused => "PAUSED",
        CampaignStatus::Active | CampaignStatus::Scheduled => "ACTIVE",
    }
}

/// Sums the analytics elements into one snapshot. Cost arrives as a decimal string.
pub fn parse_analytics(body: &Value) -> MetricsSnapshot {
    let mut m = MetricsSnapshot::default();
    let Some(elements) = body.get("elements").and_then(|v| v.as_array()) else {
        return m;
    };
    for e in elements {
        let n = |k: &str| e.get(k).and_then(|v| v.as_u64()).unwrap_or(0);
        m.impressions += n("impressions");
        m.clicks += n("clicks");
        m.conversions += n("externalWebsiteConversions");
        m.spend += e
            .get("costInLocalCurrency")
            .and_then(|v| match v {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            })
            .unwrap_or(0.0);
    }
    m
}

#[async_trait]
impl AdPlatform for LinkedinClient {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn launch(&self, req: &CampaignRequest) -> anyhow::Result<LaunchedCampaign> {
        let mut run_schedule = json!({ "start": epoch_millis(req.start_date) });
        if let Some(end) = req.end_date {
            run_schedule["end"] = json!(epoch_millis(end));
        }

        let mut body = json!({
            "account": format!("urn:li:sponsoredAccount:{}", self.creds.ad_account_id),
            "name": req.name,
            "type": campaign_type_code(&req.campaign_type),
            "objectiveType": objective_code(req.objective.as_deref()),
            "costType": "CPM",
            "dailyBudget": {
                "amount": format!("{:.2}", req.daily_budget),
                "currencyCode": req.currency,
            },
            "runSchedule": run_schedule,
            "locale": { "country": "US", "language": "en" },
            "targetingCriteria": targeting_criteria(&req.targeting),
            "offsiteDeliveryEnabled": false,
            "status": "ACTIVE",
        });
        if let Some(group) = req.targeting.get("campaign_group_id").and_then(|v| v.as_str()) {
            body["campaignGroup"] = json!(format!("urn:li:sponsoredCampaignGroup:{group}"));
        }

        let resp = self
            .request(reqwest::Method::POST, &self.campaigns_url())
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success("LinkedIn", resp).await?;

        // The created id comes back in a header; some API versions echo it in the body too.
        let header_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let external_id = match header_id {
            Some(id) => id,
            None => {
                let v: Value = resp.json().await.unwrap_or(Value::Null);
                v.get("id")
                    .map(|id| id.to_string().trim_matches('"').to_string())
                    .context("LinkedIn API response missing campaign id")?
            }
        };

        tracing::info!(event = "provider_launch", provider = "linkedin", external_id = %external_id);
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
        // Rest.li query syntax must not be re-encoded, so the URL is built by hand.
        let urn = urlencoding::encode(&format!("urn:li:sponsoredCampaign:{external_id}")).into_owned();
        let url = format!(
            "{}/adAnalytics?q=analytics&pivot=CAMPAIGN&timeGranularity=ALL\
             &dateRange=(start:(year:{},month:{},day:{}))\
             &campaigns=List({})\
             &fields=impressions,clicks,externalWebsiteConversions,costInLocalCurrency",
            API_BASE,
            since.year(),
            since.month(),
            since.day(),
            urn
        );
        let resp = self.request(reqwest::Method::GET, &url).send().await?;
        let resp = ensure_success("LinkedIn", resp).await?;
        let body: Value = resp.json().await?;
        Ok(parse_analytics(&body))
    }

    async fn set_status(&self, external_id: &str, status: CampaignStatus) -> anyhow::Result<()> {
        self.partial_update(external_id, json!({ "status": status_code(status) }))
            .await
    }

    async fn apply_variant(&self, external_id: &str, config: &Value) -> anyhow::Result<()> {
        anyhow::ensure!(config.is_object(), "variant config must be a JSON object");
        self.partial_update(external_id, config.clone()).await
    }
}

#[async_trait]
impl SocialPublisher for LinkedinClient {
    async fn publish(&self, text: &str) -> anyhow::Result<String> {
        let org = self
            .creds
            .organization_id
            .as_deref()
            .context("LINKEDIN_ORGANIZATION_ID is required for posting")?;
        let body = json!({
            "author": format!("urn:li:organization:{org}"),
            "commentary": text,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": []
            },
            "lifecycleState": "PUBLISHED",
            "isReshareDisabledByAuthor": false
        });
        let url = format!("{API_BASE}/posts");
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success("LinkedIn", resp).await?;
        resp.headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .context("LinkedIn API response missing post id")
    }
}
