//! Provider credentials, read once from the environment at startup.
//!
//! Each provider is optional: a missing variable leaves that provider
//! unconfigured and the tools that need it report `E_NOT_CONFIGURED`.

use std::fmt;

/// A credential value that never prints.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct LinkedinCredentials {
    pub access_token: Secret,
    pub ad_account_id: String,
    /// Needed only for organic posts.
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleAdsCredentials {
    pub developer_token: Secret,
    pub access_token: Secret,
    pub customer_id: String,
    pub login_customer_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendgridCredentials {
    pub api_key: Secret,
    pub sender_id: i64,
    pub suppression_group_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Ga4Credentials {
    pub property_id: String,
    pub access_token: Secret,
}

#[derive(Debug, Clone)]
pub struct LlmCredentials {
    pub api_key: Secret,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub linkedin: Option<LinkedinCredentials>,
    pub google_ads: Option<GoogleAdsCredentials>,
    pub sendgrid: Option<SendgridCredentials>,
    pub ga4: Option<Ga4Credentials>,
    pub openai: Option<LlmCredentials>,
    pub anthropic: Option<LlmCredentials>,
}

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds credentials from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let linkedin = match (get("LINKEDIN_ACCESS_TOKEN"), get("LINKEDIN_AD_ACCOUNT_ID")) {
            (Some(token), Some(account)) => Some(LinkedinCredentials {
                access_token: Secret::new(token),
                ad_account_id: account,
                organization_id: get("LINKEDIN_ORGANIZATION_ID"),
            }),
            _ => None,
        };

        let google_ads = match (
            get("GOOGLE_ADS_DEVELOPER_TOKEN"),
            get("GOOGLE_ADS_ACCESS_TOKEN"),
            get("GOOGLE_ADS_CUSTOMER_ID"),
        ) {
            (Some(dev), Some(token), Some(cid)) => Some(GoogleAdsCredentials {
                developer_token: Secret::new(dev),
                access_token: Secret::new(token),
                customer_id: cid.replace('-', ""),
                login_customer_id: get("GOOGLE_ADS_LOGIN_CUSTOMER_ID").map(|s| s.replace('-', "")),
            }),
            _ => None,
        };

        let sendgrid = match (
            get("SENDGRID_API_KEY"),
            get("SENDGRID_SENDER_ID").and_then(|v| v.parse().ok()),
        ) {
            (Some(key), Some(sender_id)) => Some(SendgridCredentials {
                api_key: Secret::new(key),
                sender_id,
                suppression_group_id: get("SENDGRID_SUPPRESSION_GROUP_ID")
                    .and_then(|v| v.parse().ok()),
            }),
            _ => None,
        };

        let ga4 = match (get("GA4_PROPERTY_ID"), get("GA4_ACCESS_TOKEN")) {
            (Some(property_id), Some(token)) => Some(Ga4Credentials {
                property_id,
                access_token: Secret::new(token),
            }),
            _ => None,
        };

        let openai = get("OPENAI_API_KEY").map(|key| LlmCredentials {
            api_key: Secret::new(key),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        let anthropic = get("ANTHROPIC_API_KEY").map(|key| LlmCredentials {
            api_key: Secret::new(key),
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
        });

        Self {
            linkedin,
            google_ads,
            sendgrid,
            ga4,
            openai,
            anthropic,
        }
    }

    /// Names of the providers that have credentials, for startup logging.
    pub fn configured(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.linkedin.is_some() {
            out.push("linkedin");
        }
        if self.google_ads.is_some() {
            out.push("google_ads");
        }
        if self.sendgrid.is_some() {
            out.push("sendgrid");
        }
        if self.ga4.is_some() {
            out.push("ga4");
        }
        if self.openai.is_some() {
            out.push("openai");
        }
        if self.anthropic.is_some() {
            out.push("anthropic");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_empty_env_configures_nothing() {
        let creds = Credentials::from_lookup(|_| None);
        assert!(creds.configured().is_empty());
    }

    #[test]
    fn test_partial_credentials_are_ignored() {
        let creds = Credentials::from_lookup(lookup(&[
            ("LINKEDIN_ACCESS_TOKEN", "tok"),
            ("SENDGRID_API_KEY", "key"),
            ("SENDGRID_SENDER_ID", "not-a-number"),
        ]));
        assert!(creds.linkedin.is_none());
        assert!(creds.sendgrid.is_none());
    }

    #[test]
    fn test_google_ads_ids_normalised() {
        let creds = Credentials::from_lookup(lookup(&[
            ("GOOGLE_ADS_DEVELOPER_TOKEN", "dev"),
            ("GOOGLE_ADS_ACCESS_TOKEN", "tok"),
            ("GOOGLE_ADS_CUSTOMER_ID", "123-456-7890"),
        ]));
        let g = creds.google_ads.unwrap();
        assert_eq!(g.customer_id, "1234567890");
        assert!(g.login_customer_id.is_none());
    }

    #[test]
    fn test_llm_default_models_and_order() {
        let creds = Credentials::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("ANTHROPIC_MODEL", "claude-x"),
        ]));
        assert_eq!(creds.openai.as_ref().unwrap().model, DEFAULT_OPENAI_MODEL);
        assert_eq!(creds.anthropic.as_ref().unwrap().model, "claude-x");
        assert_eq!(creds.configured(), vec!["openai", "anthropic"]);
    }

    #[test]
    fn test_secret_debug_redacted() {
        let creds = Credentials::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-very-secret")]));
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("sk-very-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
