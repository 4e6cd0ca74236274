//! Integration adapters for the external marketing services.
//!
//! Every adapter is stateless apart from its HTTP client and credentials;
//! the traits are the seams the server and the monitors talk to.

use crate::config::Credentials;
use crate::errors::NotConfigured;
use crate::model::{CampaignStatus, ContentType, MetricsSnapshot, Platform};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod analytics;
pub mod email;
pub mod google_ads;
pub mod linkedin;
pub mod llm;
pub mod sandbox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRequest {
    pub name: String,
    pub campaign_type: String,
    #[serde(default)]
    pub objective: Option<String>,
    pub daily_budget: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Platform-specific targeting (locations, industries, keywords, ...).
    #[serde(default)]
    pub targeting: serde_json::Value,
    /// Creative / bidding settings kept on the campaign record.
    #[serde(default)]
    pub creative: serde_json::Value,
}

pub fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchedCampaign {
    pub external_id: String,
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailCampaignRequest {
    pub name: String,
    pub subject: String,
    pub html_content: String,
    #[serde(default)]
    pub plain_content: Option<String>,
    #[serde(default)]
    pub list_ids: Vec<String>,
    #[serde(default)]
    pub segment_ids: Vec<String>,
    /// `None` sends immediately.
    #[serde(default)]
    pub send_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content_type: ContentType,
    pub topic: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub max_words: Option<u32>,
}

fn default_tone() -> String {
    "professional".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn last_days(days: i64, today: NaiveDate) -> Self {
        Self {
            start: today - chrono::Duration::days(days),
            end: today,
        }
    }
}

#[async_trait]
pub trait AdPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    async fn launch(&self, req: &CampaignRequest) -> anyhow::Result<LaunchedCampaign>;

    /// Lifetime totals for the campaign since `since`.
    async fn fetch_metrics(
        &self,
        external_id: &str,
        since: NaiveDate,
    ) -> anyhow::Result<MetricsSnapshot>;

    async fn set_status(&self, external_id: &str, status: CampaignStatus) -> anyhow::Result<()>;

    /// Pushes a winning variant's settings onto the live campaign.
    async fn apply_variant(
        &self,
        external_id: &str,
        config: &serde_json::Value,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_campaign(&self, req: &EmailCampaignRequest) -> anyhow::Result<LaunchedCampaign>;
    async fn fetch_metrics(&self, external_id: &str) -> anyhow::Result<MetricsSnapshot>;
}

#[async_trait]
pub trait SocialPublisher: Send + Sync {
    /// Publishes an organic post, returning the platform's post id.
    async fn publish(&self, text: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn dashboard(&self, range: &DateRange) -> anyhow::Result<serde_json::Value>;
}

pub use llm::ContentGenerator;

#[derive(Clone, Default)]
pub struct Providers {
    pub linkedin: Option<Arc<dyn AdPlatform>>,
    pub google_ads: Option<Arc<dyn AdPlatform>>,
    pub email: Option<Arc<dyn EmailProvider>>,
    pub social: Option<Arc<dyn SocialPublisher>>,
    pub analytics: Option<Arc<dyn AnalyticsProvider>>,
    /// Content generators in preference order.
    pub content: Vec<Arc<dyn ContentGenerator>>,
}

impl Providers {
    /// Real HTTP adapters for every provider that has credentials.
    pub fn from_credentials(creds: &Credentials, http: reqwest::Client) -> Self {
        let mut p = Providers::default();

        if let Some(c) = &creds.linkedin {
            let client = Arc::new(linkedin::LinkedinClient::new(http.clone(), c.clone()));
            p.linkedin = Some(client.clone());
            if c.organization_id.is_some() {
                p.social = Some(client);
            }
        }
        if let Some(c) = &creds.google_ads {
            p.google_ads = Some(Arc::new(google_ads::GoogleAdsClient::new(http.clone(), c.clone())));
        }
        if let Some(c) = &creds.sendgrid {
            p.email = Some(Arc::new(email::SendgridClient::new(http.clone(), c.clone())));
        }
        if let Some(c) = &creds.ga4 {
            p.analytics = Some(Arc::new(analytics::Ga4Client::new(http.clone(), c.clone())));
        }
        if let Some(c) = &creds.openai {
            p.content.push(Arc::new(llm::openai::OpenAIClient::new(
                http.clone(),
                c.model.clone(),
                c.api_key.clone(),
            )));
        }
        if let Some(c) = &creds.anthropic {
            p.content.push(Arc::new(llm::anthropic::AnthropicClient::new(
                http,
                c.model.clone(),
                c.api_key.clone(),
            )));
        }
        p
    }

    pub fn ad_platform(&self, platform: Platform) -> anyhow::Result<Arc<dyn AdPlatform>> {
        let slot = match platform {
            Platform::Linkedin => &self.linkedin,
            Platform::GoogleAds => &self.google_ads,
            Platform::Email => {
                anyhow::bail!("email campaigns are not managed through an ad platform")
            }
        };
        slot.clone()
            .ok_or_else(|| NotConfigured(platform.display_name()).into())
    }

    pub fn email(&self) -> anyhow::Result<Arc<dyn EmailProvider>> {
        self.email.clone().ok_or_else(|| NotConfigured("Email (SendGrid)").into())
    }

    pub fn social(&self) -> anyhow::Result<Arc<dyn SocialPublisher>> {
        self.social
            .clone()
            .ok_or_else(|| NotConfigured("LinkedIn organic posting").into())
    }

    pub fn analytics(&self) -> anyhow::Result<Arc<dyn AnalyticsProvider>> {
        self.analytics
            .clone()
            .ok_or_else(|| NotConfigured("Analytics (GA4)").into())
    }

    /// The named generator, or the first configured one.
    pub fn content(&self, provider: Option<&str>) -> anyhow::Result<Arc<dyn ContentGenerator>> {
        let found = match provider {
            Some(name) => self.content.iter().find(|g| g.provider_name() == name),
            None => self.content.first(),
        };
        found
            .cloned()
            .ok_or_else(|| NotConfigured("AI content generation").into())
    }

    /// Current totals for a campaign on whichever service runs it.
    pub async fn fetch_metrics(
        &self,
        platform: Platform,
        external_id: &str,
        since: NaiveDate,
    ) -> anyhow::Result<MetricsSnapshot> {
        let mut m = match platform {
            Platform::Email => self.email()?.fetch_metrics(external_id).await?,
            other => self.ad_platform(other)?.fetch_metrics(external_id, since).await?,
        };
        m.fetched_at = Some(Utc::now());
        Ok(m)
    }

    pub fn configured(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.linkedin.is_some() {
            out.push("linkedin");
        }
        if self.google_ads.is_some() {
            out.push("google_ads");
        }
        if self.email.is_some() {
            out.push("email");
        }
        if self.social.is_some() {
            out.push("linkedin_posts");
        }
        if self.analytics.is_some() {
            out.push("analytics");
        }
        out.extend(self.content.iter().map(|g| g.provider_name()));
        out
    }
}

/// Reads a non-2xx response into an error carrying status and body.
pub(crate) async fn ensure_success(
    service: &str,
    resp: reqwest::Response,
) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{} API error ({}): {}", service, status, body)
}
