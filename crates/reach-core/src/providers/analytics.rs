//! Google Analytics 4 Data API.

use super::{ensure_success, AnalyticsProvider, DateRange};
use crate::config::Ga4Credentials;
use async_trait::async_trait;
use serde_json::{json, Value};

const API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const METRICS: &[&str] = &["sessions", "totalUsers", "conversions", "totalRevenue"];

pub struct Ga4Client {
    client: reqwest::Client,
    creds: Ga4Credentials,
}

impl Ga4Client {
    pub fn new(client: reqwest::Client, creds: Ga4Credentials) -> Self {
        Self { client, creds }
    }
}

/// Flattens a `runReport` response into per-channel rows plus totals.
pub fn reshape_report(range: &DateRange, body: &Value) -> Value {
    let mut channels = Vec::new();
    let mut totals = [0.0f64; 4];

    for row in body
        .get("rows")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let channel = row
            .pointer("/dimensionValues/0/value")
            .and_then(|v| v.as_str())
            .unwrap_or("(other)");
        let mut entry = json!({ "channel": channel });
        for (i, name) in METRICS.iter().enumerate() {
            let value = row
                .pointer(&format!("/metricValues/{i}/value"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            totals[i] += value;
            entry[*name] = json!(value);
        }
        channels.push(entry);
    }

    let mut total = json!({});
    for (i, name) in METRICS.iter().enumerate() {
        total[*name] = json!(totals[i]);
    }

    json!({
        "date_range": { "start": range.start, "end": range.end },
        "channels": channels,
        "totals": total,
    })
}

#[async_trait]
impl AnalyticsProvider for Ga4Client {
    async fn dashboard(&self, range: &DateRange) -> anyhow::Result<Value> {
        let body = json!({
            "dateRanges": [{
                "startDate": range.start.format("%Y-%m-%d").to_string(),
                "endDate": range.end.format("%Y-%m-%d").to_string(),
            }],
            "dimensions": [{ "name": "sessionDefaultChannelGroup" }],
            "metrics": METRICS.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>(),
        });
        let url = format!("{}/properties/{}:runReport", API_BASE, self.creds.property_id);
        let resp = self
            .client
            .post(url)
            .bearer_auth(self.creds.access_token.expose())
            .json(&body)
            .send()
            .await?;
        let report: Value = ensure_success("GA4", resp).await?.json().await?;
        Ok(reshape_report(range, &report))
    }
}
