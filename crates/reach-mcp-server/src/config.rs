use std::env;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub timeout_ms: u64,
    pub max_msg_bytes: usize,
    pub max_field_bytes: usize,
    pub cache_entries: u64,
    pub http_timeout_ms: u64,
    pub metrics_poll_secs: u64,
    pub significance_poll_secs: u64,
    pub min_trials: u64,
    pub sandbox: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_msg_bytes: 1_000_000,
            max_field_bytes: 64_000,
            cache_entries: 256,
            http_timeout_ms: 20_000,
            metrics_poll_secs: 3600,
            significance_poll_secs: 6 * 3600,
            min_trials: 100,
            sandbox: false,
            log_level: "info".to_string(),
        }
    }
}

fn parse_into<T: std::str::FromStr>(v: Option<String>, slot: &mut T) {
    if let Some(n) = v.and_then(|s| s.trim().parse().ok()) {
        *slot = n;
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Unparseable values keep the default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        parse_into(get("REACH_MCP_TIMEOUT_MS"), &mut cfg.timeout_ms);
        parse_into(get("REACH_MCP_MAX_BYTES"), &mut cfg.max_msg_bytes);
        parse_into(get("REACH_MCP_MAX_FIELD_BYTES"), &mut cfg.max_field_bytes);
        parse_into(get("REACH_MCP_CACHE_ENTRIES"), &mut cfg.cache_entries);
        parse_into(get("REACH_HTTP_TIMEOUT_MS"), &mut cfg.http_timeout_ms);
        parse_into(get("REACH_METRICS_POLL_SECS"), &mut cfg.metrics_poll_secs);
        parse_into(get("REACH_SIGNIFICANCE_POLL_SECS"), &mut cfg.significance_poll_secs);
        parse_into(get("REACH_MIN_TRIALS"), &mut cfg.min_trials);
        if let Some(v) = get("REACH_SANDBOX") {
            cfg.sandbox = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("REACH_LOG") {
            cfg.log_level = v;
        }
        // A zero period would spin the timers.
        cfg.metrics_poll_secs = cfg.metrics_poll_secs.max(1);
        cfg.significance_poll_secs = cfg.significance_poll_secs.max(1);
        cfg
    }
}
