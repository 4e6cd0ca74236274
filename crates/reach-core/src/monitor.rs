//! Background polling: campaign metrics refresh and A/B significance checks.
//!
//! Both loops share the registries with the tool handlers. A failure on one
//! campaign or test is logged and skipped; the loop carries on with the rest.

use crate::errors::RegistryError;
use crate::experiment::{evaluate, Decision, Evaluation};
use crate::model::{Campaign, Experiment, Implementation, Platform, Winner};
use crate::providers::Providers;
use crate::registry::{CampaignRegistry, ExperimentRegistry};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Clone)]
pub struct MonitorContext {
    pub campaigns: CampaignRegistry,
    pub experiments: ExperimentRegistry,
    pub providers: Arc<Providers>,
    /// Trials every variant needs before significance is checked.
    pub min_trials: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub metrics: Duration,
    pub significance: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            metrics: Duration::from_secs(3600),
            significance: Duration::from_secs(6 * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub checked: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub evaluation: Evaluation,
    /// True when this check moved the test to `completed`.
    pub completed: bool,
    pub implemented: Option<Implementation>,
}

pub struct Monitor {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Monitor {
    pub fn spawn(ctx: MonitorContext, intervals: Intervals) -> Self {
        let (tx, rx) = watch::channel(false);

        let metrics = {
            let ctx = ctx.clone();
            tokio::spawn(run_loop("metrics_poll", intervals.metrics, rx.clone(), move || {
                let ctx = ctx.clone();
                async move { poll_campaign_metrics(&ctx).await }
            }))
        };
        let significance = tokio::spawn(run_loop(
            "significance_check",
            intervals.significance,
            rx,
            move || {
                let ctx = ctx.clone();
                async move { check_significance(&ctx).await }
            },
        ));

        tracing::info!(
            event = "monitor_start",
            metrics_secs = intervals.metrics.as_secs(),
            significance_secs = intervals.significance.as_secs()
        );
        Self {
            shutdown: tx,
            handles: vec![metrics, significance],
        }
    }

    /// Stops both loops and waits for any in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for h in self.handles {
            if let Err(e) = h.await {
                tracing::warn!(event = "monitor_join_error", error = %e);
            }
        }
        tracing::info!(event = "monitor_stop");
    }
}

async fn run_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = TickSummary>,
{
    // The first tick fires after one full period, not immediately.
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let started = std::time::Instant::now();
                let s = tick().await;
                tracing::info!(
                    event = name,
                    checked = s.checked,
                    failed = s.failed,
                    duration_ms = started.elapsed().as_millis() as u64
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// One metrics pass over every non-paused campaign.
pub async fn poll_campaign_metrics(ctx: &MonitorContext) -> TickSummary {
    let mut summary = TickSummary::default();
    for c in ctx.campaigns.list_active() {
        summary.checked += 1;
        if let Err(e) = refresh_campaign(ctx, &c.id).await {
            summary.failed += 1;
            tracing::warn!(event = "metrics_poll_failed", campaign_id = %c.id, platform = c.platform.as_str(), error = %e);
        }
    }
    summary
}

/// Fetches current totals for one campaign and overwrites its snapshot.
pub async fn refresh_campaign(ctx: &MonitorContext, id: &str) -> anyhow::Result<Campaign> {
    let c = ctx
        .campaigns
        .get(id)
        .ok_or_else(|| RegistryError::NotFound(format!("campaign {id}")))?;
    let metrics = ctx
        .providers
        .fetch_metrics(c.platform, &c.external_id, c.start_date)
        .await?;
    ctx.campaigns.update_metrics(id, metrics.clone())?;
    Ok(Campaign { metrics, ..c })
}

/// One significance pass over every running test.
pub async fn check_significance(ctx: &MonitorContext) -> TickSummary {
    let mut summary = TickSummary::default();
    for exp in ctx.experiments.list_running() {
        summary.checked += 1;
        if let Err(e) = check_experiment(ctx, &exp.id).await {
            summary.failed += 1;
            tracing::warn!(event = "significance_check_failed", test_id = %exp.id, error = %e);
        }
    }
    summary
}

async fn refresh_variants(ctx: &MonitorContext, exp: &Experiment) {
    let since: NaiveDate = exp.started_at.date_naive();
    for (i, v) in exp.variants.iter().enumerate() {
        let Some(ext) = &v.external_id else {
            continue;
        };
        match ctx.providers.fetch_metrics(exp.channel, ext, since).await {
            Ok(m) => {
                if let Err(e) = ctx.experiments.update_variant_metrics(&exp.id, i, m) {
                    tracing::warn!(event = "variant_update_failed", test_id = %exp.id, variant = %v.name, error = %e);
                }
            }
            Err(e) => {
                tracing::warn!(event = "variant_fetch_failed", test_id = %exp.id, variant = %v.name, error = %e);
            }
        }
    }
}

/// Refreshes variant metrics, evaluates the test and applies the decision.
pub async fn check_experiment(ctx: &MonitorContext, id: &str) -> anyhow::Result<CheckOutcome> {
    let exp = ctx
        .experiments
        .get(id)
        .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
    refresh_variants(ctx, &exp).await;
    let exp = ctx
        .experiments
        .get(id)
        .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;

    let evaluation = evaluate(&exp, ctx.min_trials);
    let winner = match &evaluation.decision {
        Decision::Continue { .. } => {
            return Ok(CheckOutcome {
                evaluation,
                completed: false,
                implemented: None,
            })
        }
        Decision::Winner { index, comparison } => Some(Winner {
            index: *index,
            name: exp.variants[*index].name.clone(),
            p_value: comparison.p_value,
            lift: comparison.lift,
        }),
        Decision::Inconclusive { .. } => None,
    };

    let completed = ctx.experiments.complete(id, winner.clone())?;
    tracing::info!(
        event = "test_completed",
        test_id = %id,
        winner = winner.as_ref().map(|w| w.name.as_str()).unwrap_or("none"),
        newly = completed
    );

    let mut implemented = None;
    if let (true, Some(w), true, Some(campaign_id)) =
        (completed, &winner, exp.auto_implement, exp.campaign_id.as_deref())
    {
        match implement_winner(ctx, &exp, w, campaign_id).await {
            Ok(imp) => {
                ctx.experiments.set_implementation(id, imp.clone())?;
                tracing::info!(event = "auto_implement", test_id = %id, campaign_id = %campaign_id, variant = %w.name);
                implemented = Some(imp);
            }
            Err(e) => {
                tracing::warn!(event = "auto_implement_failed", test_id = %id, campaign_id = %campaign_id, error = %e);
                ctx.experiments.set_implementation_error(id, format!("{e:#}"))?;
            }
        }
    }

    Ok(CheckOutcome {
        evaluation,
        completed,
        implemented,
    })
}

async fn implement_winner(
    ctx: &MonitorContext,
    exp: &Experiment,
    winner: &Winner,
    campaign_id: &str,
) -> anyhow::Result<Implementation> {
    let campaign = ctx
        .campaigns
        .get(campaign_id)
        .ok_or_else(|| RegistryError::NotFound(format!("campaign {campaign_id}")))?;
    if campaign.platform == Platform::Email {
        return Err(RegistryError::InvalidState(
            "sent email campaigns cannot be changed in place".into(),
        )
        .into());
    }
    if campaign.platform != exp.channel {
        return Err(RegistryError::InvalidState(format!(
            "campaign {campaign_id} runs on {}, test variants on {}",
            campaign.platform.as_str(),
            exp.channel.as_str()
        ))
        .into());
    }
    let config = &exp.variants[winner.index].config;
    ctx.providers
        .ad_platform(campaign.platform)?
        .apply_variant(&campaign.external_id, config)
        .await?;
    let previous_config = ctx.campaigns.merge_config(campaign_id, config)?;
    Ok(Implementation {
        campaign_id: campaign_id.to_string(),
        applied_at: Utc::now(),
        previous_config,
    })
}
