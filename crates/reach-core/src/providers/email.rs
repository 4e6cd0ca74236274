//! SendGrid Marketing Campaigns (Single Sends).

use super::{ensure_success, EmailCampaignRequest, EmailProvider, LaunchedCampaign};
use crate::config::SendgridCredentials;
use crate::model::{CampaignStatus, MetricsSnapshot};
use anyhow::Context;
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::{json, Value};

const API_BASE: &str = "https://api.sendgrid.com/v3";

pub struct SendgridClient {
    client: reqwest::Client,
    creds: SendgridCredentials,
}

impl SendgridClient {
    pub fn new(client: reqwest::Client, creds: SendgridCredentials) -> Self {
        Self { client, creds }
    }

    fn single_send_body(&self, req: &EmailCampaignRequest) -> Value {
        let mut email_config = json!({
            "subject": req.subject,
            "html_content": req.html_content,
            "sender_id": self.creds.sender_id,
        });
        if let Some(plain) = &req.plain_content {
            email_config["plain_content"] = json!(plain);
        } else {
            email_config["generate_plain_content"] = json!(true);
        }
        if let Some(group) = self.creds.suppression_group_id {
            email_config["suppression_group_id"] = json!(group);
        }
        json!({
            "name": req.name,
            "send_to": {
                "list_ids": req.list_ids,
                "segment_ids": req.segment_ids,
            },
            "email_config": email_config,
        })
    }
}

pub fn parse_stats(body: &Value) -> MetricsSnapshot {
    let mut m = MetricsSnapshot::default();
    let Some(results) = body.get("results").and_then(|v| v.as_array()) else {
        return m;
    };
    for r in results {
        let Some(stats) = r.get("stats") else {
            continue;
        };
        let n = |k: &str| stats.get(k).and_then(|v| v.as_u64()).unwrap_or(0);
        m.impressions += n("delivered");
        m.opens += n("unique_opens");
        m.clicks += n("unique_clicks");
    }
    m
}

#[async_trait]
impl EmailProvider for SendgridClient {
    async fn send_campaign(&self, req: &EmailCampaignRequest) -> anyhow::Result<LaunchedCampaign> {
        anyhow::ensure!(
            !req.list_ids.is_empty() || !req.segment_ids.is_empty(),
            "an email campaign needs at least one list or segment"
        );

        let resp = self
            .client
            .post(format!("{API_BASE}/marketing/singlesends"))
            .bearer_auth(self.creds.api_key.expose())
            .json(&self.single_send_body(req))
            .send()
            .await?;
        let created: Value = ensure_success("SendGrid", resp).await?.json().await?;
        let id = created
            .get("id")
            .and_then(|v| v.as_str())
            .context("SendGrid API response missing single send id")?
            .to_string();

        let send_at = req
            .send_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "now".to_string());
        let resp = self
            .client
            .put(format!("{API_BASE}/marketing/singlesends/{id}/schedule"))
            .bearer_auth(self.creds.api_key.expose())
            .json(&json!({ "send_at": send_at }))
            .send()
            .await?;
        ensure_success("SendGrid", resp).await?;

        tracing::info!(event = "provider_launch", provider = "sendgrid", external_id = %id, send_at = %send_at);
        Ok(LaunchedCampaign {
            external_id: id,
            status: if req.send_at.is_some() {
                CampaignStatus::Scheduled
            } else {
                CampaignStatus::Active
            },
        })
    }

    async fn fetch_metrics(&self, external_id: &str) -> anyhow::Result<MetricsSnapshot> {
        let resp = self
            .client
            .get(format!("{API_BASE}/marketing/stats/singlesends/{external_id}"))
            .bearer_auth(self.creds.api_key.expose())
            .send()
            .await?;
        let body: Value = ensure_success("SendGrid", resp).await?.json().await?;
        Ok(parse_stats(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn client() -> SendgridClient {
        SendgridClient::new(
            reqwest::Client::new(),
            SendgridCredentials {
                api_key: Secret::new("k"),
                sender_id: 7,
                suppression_group_id: Some(3),
            },
        )
    }

    #[test]
    fn test_single_send_body() {
        let req = EmailCampaignRequest {
            name: "Launch".into(),
            subject: "Big news".into(),
            html_content: "<p>Hi</p>".into(),
            plain_content: None,
            list_ids: vec!["l1".into()],
            segment_ids: vec![],
            send_at: None,
        };
        let body = client().single_send_body(&req);
        assert_eq!(body["email_config"]["sender_id"], 7);
        assert_eq!(body["email_config"]["suppression_group_id"], 3);
        assert_eq!(body["email_config"]["generate_plain_content"], true);
        assert_eq!(body["send_to"]["list_ids"][0], "l1");
    }

    #[test]
    fn test_parse_stats() {
        let m = parse_stats(&json!({
            "results": [{ "id": "x", "stats": { "delivered": 950, "unique_opens": 300, "unique_clicks": 45 } }]
        }));
        assert_eq!(m.impressions, 950);
        assert_eq!(m.opens, 300);
        assert_eq!(m.clicks, 45);
        assert_eq!(m.open_rate().map(|r| (r * 1000.0).round()), Some(316.0));
    }
}
