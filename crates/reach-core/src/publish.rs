//! Multi-channel publishing of one piece of content.
//!
//! Channels are attempted in the order given; a failure on one channel is
//! recorded in its outcome and the remaining channels still run.

use crate::errors::error_code;
use crate::providers::{EmailCampaignRequest, Providers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Linkedin,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Linkedin => "linkedin",
            Channel::Email => "email",
        }
    }
}

/// Settings the email channel needs beyond the content itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailDefaults {
    pub subject: Option<String>,
    #[serde(default)]
    pub list_ids: Vec<String>,
    #[serde(default)]
    pub segment_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl PublishReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

fn html_paragraphs(text: &str) -> String {
    text.split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

async fn publish_one(
    providers: &Providers,
    channel: Channel,
    text: &str,
    email: &EmailDefaults,
) -> anyhow::Result<String> {
    match channel {
        Channel::Linkedin => providers.social()?.publish(text).await,
        Channel::Email => {
            let subject = email
                .subject
                .clone()
                .or_else(|| text.lines().next().map(|l| l.chars().take(78).collect()))
                .unwrap_or_default();
            let req = EmailCampaignRequest {
                name: format!("Content: {subject}"),
                subject,
                html_content: html_paragraphs(text),
                plain_content: Some(text.to_string()),
                list_ids: email.list_ids.clone(),
                segment_ids: email.segment_ids.clone(),
                send_at: None,
            };
            Ok(providers.email()?.send_campaign(&req).await?.external_id)
        }
    }
}

pub async fn publish(
    providers: &Providers,
    text: &str,
    channels: &[Channel],
    email: &EmailDefaults,
) -> PublishReport {
    let mut outcomes = Vec::with_capacity(channels.len());
    for &channel in channels {
        let outcome = match publish_one(providers, channel, text, email).await {
            Ok(id) => ChannelOutcome {
                channel,
                ok: true,
                external_id: Some(id),
                error: None,
                error_code: None,
            },
            Err(e) => {
                tracing::warn!(event = "publish_failed", channel = channel.as_str(), error = %e);
                ChannelOutcome {
                    channel,
                    ok: false,
                    external_id: None,
                    error: Some(format!("{e:#}")),
                    error_code: Some(error_code(&e).to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }
    PublishReport { outcomes }
}
