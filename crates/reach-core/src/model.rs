use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    GoogleAds,
    Email,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::GoogleAds => "google_ads",
            Platform::Email => "email",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Linkedin => "LinkedIn Ads",
            Platform::GoogleAds => "Google Ads",
            Platform::Email => "Email",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Active,
    Paused,
    Scheduled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Scheduled => "scheduled",
        }
    }
}

/// Point-in-time performance counters as reported by a platform.
///
/// Snapshots are replaced wholesale on every poll; nothing accumulates locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(default)]
    pub spend: f64,
    #[serde(default)]
    pub opens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    pub fn ctr(&self) -> Option<f64> {
        safe_ratio(self.clicks as f64, self.impressions as f64)
    }

    pub fn conversion_rate(&self) -> Option<f64> {
        safe_ratio(self.conversions as f64, self.clicks as f64)
    }

    pub fn open_rate(&self) -> Option<f64> {
        safe_ratio(self.opens as f64, self.impressions as f64)
    }

    pub fn cost_per_click(&self) -> Option<f64> {
        safe_ratio(self.spend, self.clicks as f64)
    }

    pub fn cost_per_conversion(&self) -> Option<f64> {
        safe_ratio(self.spend, self.conversions as f64)
    }
}

/// Division that refuses to produce infinities or NaNs.
pub fn safe_ratio(num: f64, den: f64) -> Option<f64> {
    if !num.is_finite() || !den.is_finite() || den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub platform: Platform,
    pub campaign_type: String,
    pub name: String,
    /// Identifier assigned by the ad platform / email provider.
    pub external_id: String,
    pub start_date: NaiveDate,
    pub daily_budget: f64,
    pub currency: String,
    pub status: CampaignStatus,
    pub metrics: MetricsSnapshot,
    #[serde(default)]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentType {
    AdCreative,
    EmailSubject,
    LandingPage,
    Audience,
}

impl ExperimentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentType::AdCreative => "ad_creative",
            ExperimentType::EmailSubject => "email_subject",
            ExperimentType::LandingPage => "landing_page",
            ExperimentType::Audience => "audience",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessMetric {
    Ctr,
    ConversionRate,
    OpenRate,
}

impl SuccessMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuccessMetric::Ctr => "ctr",
            SuccessMetric::ConversionRate => "conversion_rate",
            SuccessMetric::OpenRate => "open_rate",
        }
    }

    /// (successes, trials) for this metric.
    pub fn observations(&self, m: &MetricsSnapshot) -> (u64, u64) {
        match self {
            SuccessMetric::Ctr => (m.clicks, m.impressions),
            SuccessMetric::ConversionRate => (m.conversions, m.clicks),
            SuccessMetric::OpenRate => (m.opens, m.impressions),
        }
    }

    pub fn rate(&self, m: &MetricsSnapshot) -> Option<f64> {
        let (s, n) = self.observations(m);
        safe_ratio(s as f64, n as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    #[default]
    Running,
    Paused,
    Completed,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Running => "running",
            ExperimentStatus::Paused => "paused",
            ExperimentStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Creative / campaign id on the platform; variants without one only
    /// change when metrics are recorded directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub index: usize,
    pub name: String,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lift: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub campaign_id: String,
    pub applied_at: DateTime<Utc>,
    /// Campaign config before the winner was pushed; kept for manual rollback.
    pub previous_config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub experiment_type: ExperimentType,
    pub channel: Platform,
    pub variants: Vec<Variant>,
    pub sample_size: u64,
    pub success_metric: SuccessMetric,
    pub confidence_level: f64,
    pub status: ExperimentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub auto_implement: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implemented: Option<Implementation>,
    /// Why the winner could not be pushed to the linked campaign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BlogPost,
    SocialPost,
    AdCopy,
    Email,
    LandingPage,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::BlogPost => "blog_post",
            ContentType::SocialPost => "social_post",
            ContentType::AdCopy => "ad_copy",
            ContentType::Email => "email",
            ContentType::LandingPage => "landing_page",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ContentType::BlogPost => "a long-form blog post with a title and section headings",
            ContentType::SocialPost => "a short social media post suitable for LinkedIn",
            ContentType::AdCopy => "ad copy with a headline, a description and a call to action",
            ContentType::Email => "a marketing email with a subject line and body",
            ContentType::LandingPage => "landing page copy with a hero headline, benefits and a call to action",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub content_type: ContentType,
    pub topic: String,
    pub provider: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_guard_zero_denominators() {
        let m = MetricsSnapshot::default();
        assert_eq!(m.ctr(), None);
        assert_eq!(m.conversion_rate(), None);
        assert_eq!(m.cost_per_conversion(), None);

        let m = MetricsSnapshot {
            impressions: 1000,
            clicks: 50,
            conversions: 5,
            spend: 100.0,
            ..Default::default()
        };
        assert_eq!(m.ctr(), Some(0.05));
        assert_eq!(m.conversion_rate(), Some(0.1));
        assert_eq!(m.cost_per_conversion(), Some(20.0));
    }

    #[test]
    fn test_success_metric_observations() {
        let m = MetricsSnapshot {
            impressions: 200,
            clicks: 20,
            conversions: 2,
            opens: 80,
            ..Default::default()
        };
        assert_eq!(SuccessMetric::Ctr.observations(&m), (20, 200));
        assert_eq!(SuccessMetric::ConversionRate.observations(&m), (2, 20));
        assert_eq!(SuccessMetric::OpenRate.rate(&m), Some(0.4));
    }

    #[test]
    fn test_safe_ratio_rejects_non_finite() {
        assert_eq!(safe_ratio(f64::NAN, 1.0), None);
        assert_eq!(safe_ratio(1.0, f64::INFINITY), None);
        assert_eq!(safe_ratio(1.0, 0.0), None);
    }

    #[test]
    fn test_enum_wire_names() {
        let p: Platform = serde_json::from_str("\"google_ads\"").unwrap();
        assert_eq!(p, Platform::GoogleAds);
        assert_eq!(
            serde_json::to_string(&ExperimentStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
