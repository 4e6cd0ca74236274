//! Deterministic in-process stand-ins for every provider.
//!
//! Selected with `REACH_SANDBOX=1` (or `--sandbox`); no network traffic.
//! External ids are sequential per fake, and metrics come from a table the
//! caller can overwrite, so tests can drive the monitors tick by tick.

use super::{
    analytics::reshape_report, AdPlatform, AnalyticsProvider, CampaignRequest, ContentGenerator,
    ContentRequest, DateRange, EmailCampaignRequest, EmailProvider, LaunchedCampaign, Providers,
    SocialPublisher,
};
use crate::model::{CampaignStatus, MetricsSnapshot, Platform};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Metrics reported for ids that have no explicit entry.
pub fn default_metrics() -> MetricsSnapshot {
    MetricsSnapshot {
        impressions: 10_000,
        clicks: 250,
        conversions: 12,
        spend: 480.0,
        opens: 0,
        fetched_at: None,
    }
}

/// Shared bookkeeping for the fakes: id sequence, metric table, failure
/// and latency switches.
#[derive(Default)]
struct Ledger {
    seq: AtomicU64,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    metrics: Mutex<HashMap<String, MetricsSnapshot>>,
}

impl Ledger {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("sbx-{prefix}-{n:06}")
    }

    /// Every fake call passes through here: the configured latency, then the failure switch.
    async fn check(&self, service: &str) -> anyhow::Result<()> {
        let delay = self.delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::Relaxed) {
            anyhow::bail!("{service} API error (503 Service Unavailable): sandbox failure");
        }
        Ok(())
    }

    fn set_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(ms, Ordering::Relaxed);
    }

    fn metrics_for(&self, external_id: &str, fallback: MetricsSnapshot) -> MetricsSnapshot {
        lock(&self.metrics)
            .get(external_id)
            .cloned()
            .unwrap_or(fallback)
    }
}

pub struct SandboxAdPlatform {
    platform: Platform,
    ledger: Ledger,
    statuses: Mutex<HashMap<String, CampaignStatus>>,
    applied: Mutex<Vec<(String, Value)>>,
}

impl SandboxAdPlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ledger: Ledger::default(),
            statuses: Mutex::new(HashMap::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn set_metrics(&self, external_id: &str, metrics: MetricsSnapshot) {
        lock(&self.ledger.metrics).insert(external_id.to_string(), metrics);
    }

    pub fn set_failing(&self, failing: bool) {
        self.ledger.failing.store(failing, Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.ledger.set_delay(delay);
    }

    pub fn status_of(&self, external_id: &str) -> Option<CampaignStatus> {
        lock(&self.statuses).get(external_id).copied()
    }

    /// Every `(external_id, config)` pushed through `apply_variant`, oldest first.
    pub fn applied(&self) -> Vec<(String, Value)> {
        lock(&self.applied).clone()
    }

    fn prefix(&self) -> &'static str {
        match self.platform {
            Platform::Linkedin => "li",
            Platform::GoogleAds => "gads",
            Platform::Email => "email",
        }
    }
}

#[async_trait]
impl AdPlatform for SandboxAdPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn launch(&self, req: &CampaignRequest) -> anyhow::Result<LaunchedCampaign> {
        self.ledger.check(self.platform.display_name()).await?;
        anyhow::ensure!(req.daily_budget > 0.0, "daily budget must be positive");
        let external_id = self.ledger.next_id(self.prefix());
        lock(&self.statuses).insert(external_id.clone(), CampaignStatus::Active);
        Ok(LaunchedCampaign {
            external_id,
            status: CampaignStatus::Active,
        })
    }

    async fn fetch_metrics(
        &self,
        external_id: &str,
        _since: NaiveDate,
    ) -> anyhow::Result<MetricsSnapshot> {
        self.ledger.check(self.platform.display_name()).await?;
        Ok(self.ledger.metrics_for(external_id, default_metrics()))
    }

    async fn set_status(&self, external_id: &str, status: CampaignStatus) -> anyhow::Result<()> {
        self.ledger.check(self.platform.display_name()).await?;
        lock(&self.statuses).insert(external_id.to_string(), status);
        Ok(())
    }

    async fn apply_variant(&self, external_id: &str, config: &Value) -> anyhow::Result<()> {
        self.ledger.check(self.platform.display_name()).await?;
        anyhow::ensure!(config.is_object(), "variant config must be a JSON object");
        lock(&self.applied).push((external_id.to_string(), config.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct SandboxEmail {
    ledger: Ledger,
    sent: Mutex<Vec<EmailCampaignRequest>>,
}

impl SandboxEmail {
    pub fn set_metrics(&self, external_id: &str, metrics: MetricsSnapshot) {
        lock(&self.ledger.metrics).insert(external_id.to_string(), metrics);
    }

    pub fn set_failing(&self, failing: bool) {
        self.ledger.failing.store(failing, Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.ledger.set_delay(delay);
    }

    pub fn sent(&self) -> Vec<EmailCampaignRequest> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EmailProvider for SandboxEmail {
    async fn send_campaign(&self, req: &EmailCampaignRequest) -> anyhow::Result<LaunchedCampaign> {
        self.ledger.check("SendGrid").await?;
        lock(&self.sent).push(req.clone());
        Ok(LaunchedCampaign {
            external_id: self.ledger.next_id("email"),
            status: if req.send_at.is_some() {
                CampaignStatus::Scheduled
            } else {
                CampaignStatus::Active
            },
        })
    }

    async fn fetch_metrics(&self, external_id: &str) -> anyhow::Result<MetricsSnapshot> {
        self.ledger.check("SendGrid").await?;
        let fallback = MetricsSnapshot {
            impressions: 5_000,
            opens: 1_100,
            clicks: 140,
            ..MetricsSnapshot::default()
        };
        Ok(self.ledger.metrics_for(external_id, fallback))
    }
}

#[derive(Default)]
pub struct SandboxSocial {
    ledger: Ledger,
    posts: Mutex<Vec<String>>,
}

impl SandboxSocial {
    pub fn set_failing(&self, failing: bool) {
        self.ledger.failing.store(failing, Ordering::Relaxed);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.ledger.set_delay(delay);
    }

    pub fn posts(&self) -> Vec<String> {
        lock(&self.posts).clone()
    }
}

#[async_trait]
impl SocialPublisher for SandboxSocial {
    async fn publish(&self, text: &str) -> anyhow::Result<String> {
        self.ledger.check("LinkedIn").await?;
        lock(&self.posts).push(text.to_string());
        Ok(format!("urn:li:share:{}", self.ledger.next_id("post")))
    }
}

pub struct SandboxAnalytics;

#[async_trait]
impl AnalyticsProvider for SandboxAnalytics {
    async fn dashboard(&self, range: &DateRange) -> anyhow::Result<Value> {
        let days = (range.end - range.start).num_days().max(1) as f64;
        let row = |channel: &str, sessions: f64, conv: f64, revenue: f64| {
            json!({
                "dimensionValues": [{ "value": channel }],
                "metricValues": [
                    { "value": (sessions * days).to_string() },
                    { "value": (sessions * days * 0.8).round().to_string() },
                    { "value": (conv * days).to_string() },
                    { "value": (revenue * days).to_string() },
                ]
            })
        };
        let body = json!({
            "rows": [
                row("Paid Search", 120.0, 4.0, 360.0),
                row("Paid Social", 80.0, 2.0, 150.0),
                row("Email", 40.0, 3.0, 210.0),
                row("Organic Search", 200.0, 5.0, 400.0),
            ]
        });
        Ok(reshape_report(range, &body))
    }
}

pub struct SandboxContent;

#[async_trait]
impl ContentGenerator for SandboxContent {
    async fn generate(&self, req: &ContentRequest) -> anyhow::Result<String> {
        let mut text = format!(
            "[{}] {}\n\nA {} take on {} for {}.",
            req.content_type.as_str(),
            req.topic,
            req.tone,
            req.topic,
            req.audience.as_deref().unwrap_or("a general audience")
        );
        if !req.keywords.is_empty() {
            text.push_str(&format!("\nKeywords: {}", req.keywords.join(", ")));
        }
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "sandbox"
    }
}

/// Concrete handles to the fakes behind a sandbox `Providers` bundle.
#[derive(Clone)]
pub struct SandboxHandles {
    pub linkedin: Arc<SandboxAdPlatform>,
    pub google_ads: Arc<SandboxAdPlatform>,
    pub email: Arc<SandboxEmail>,
    pub social: Arc<SandboxSocial>,
}

impl SandboxHandles {
    pub fn new() -> Self {
        Self {
            linkedin: Arc::new(SandboxAdPlatform::new(Platform::Linkedin)),
            google_ads: Arc::new(SandboxAdPlatform::new(Platform::GoogleAds)),
            email: Arc::new(SandboxEmail::default()),
            social: Arc::new(SandboxSocial::default()),
        }
    }

    pub fn providers(&self) -> Providers {
        Providers {
            linkedin: Some(self.linkedin.clone()),
            google_ads: Some(self.google_ads.clone()),
            email: Some(self.email.clone()),
            social: Some(self.social.clone()),
            analytics: Some(Arc::new(SandboxAnalytics)),
            content: vec![Arc::new(SandboxContent)],
        }
    }
}

impl Default for SandboxHandles {
    fn default() -> Self {
        Self::new()
    }
}

impl Providers {
    pub fn sandbox() -> Self {
        SandboxHandles::new().providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_code;
    use crate::model::ContentType;

    fn request() -> CampaignRequest {
        CampaignRequest {
            name: "Q3 launch".into(),
            campaign_type: "sponsored_content".into(),
            objective: None,
            daily_budget: 50.0,
            currency: "USD".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            end_date: None,
            targeting: json!({}),
            creative: json!({}),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let p = SandboxAdPlatform::new(Platform::Linkedin);
        let a = p.launch(&request()).await.unwrap();
        let b = p.launch(&request()).await.unwrap();
        assert_eq!(a.external_id, "sbx-li-000001");
        assert_eq!(b.external_id, "sbx-li-000002");
        assert_eq!(p.status_of("sbx-li-000001"), Some(CampaignStatus::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_calls_back() {
        let p = SandboxAdPlatform::new(Platform::Linkedin);
        p.set_delay(Duration::from_secs(5));
        let slow = tokio::time::timeout(Duration::from_secs(1), p.launch(&request())).await;
        assert!(slow.is_err());

        let done = tokio::time::timeout(Duration::from_secs(10), p.launch(&request())).await;
        assert!(done.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_metrics_table_overrides_default() {
        let p = SandboxAdPlatform::new(Platform::GoogleAds);
        let since = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(p.fetch_metrics("x", since).await.unwrap(), default_metrics());
        let custom = MetricsSnapshot {
            impressions: 3,
            ..MetricsSnapshot::default()
        };
        p.set_metrics("x", custom.clone());
        assert_eq!(p.fetch_metrics("x", since).await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_failing_switch_reports_provider_error() {
        let s = SandboxSocial::default();
        s.set_failing(true);
        let err = s.publish("hello").await.unwrap_err();
        assert_eq!(error_code(&err), "E_PROVIDER");
        assert!(s.posts().is_empty());
    }

    #[tokio::test]
    async fn test_content_is_deterministic() {
        let req = ContentRequest {
            content_type: ContentType::SocialPost,
            topic: "observability".into(),
            tone: "friendly".into(),
            audience: None,
            keywords: vec!["tracing".into()],
            max_words: None,
        };
        let a = SandboxContent.generate(&req).await.unwrap();
        let b = SandboxContent.generate(&req).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("[social_post] observability"));
        assert!(a.contains("Keywords: tracing"));
    }

    #[tokio::test]
    async fn test_dashboard_scales_with_range() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let week = SandboxAnalytics
            .dashboard(&DateRange::last_days(7, today))
            .await
            .unwrap();
        assert_eq!(week["channels"].as_array().unwrap().len(), 4);
        assert_eq!(week["totals"]["sessions"], 3080.0);
    }
}
