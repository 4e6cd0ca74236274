use super::{parse_args, success, ToolContext, ToolError};
use anyhow::Result;
use reach_core::errors::RegistryError;
use reach_core::experiment::{evaluate, ExperimentSpec};
use reach_core::model::{ExperimentStatus, MetricsSnapshot, Platform};
use reach_core::monitor::check_experiment;
use reach_core::report;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn start_ab_test(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let spec: ExperimentSpec = match parse_args(args) {
        Ok(s) => s,
        Err(e) => return e.result(),
    };
    if let Some(cid) = &spec.campaign_id {
        let Some(campaign) = ctx.campaigns.get(cid) else {
            return ToolError::new("E_NOT_FOUND", &format!("campaign {cid} is not registered"))
                .result();
        };
        // Variants are read through `channel` and winners pushed to the
        // campaign's platform, so the two must agree.
        if campaign.platform != spec.channel {
            return ToolError::invalid_args(format!(
                "campaign {cid} runs on {}, not {}",
                campaign.platform.as_str(),
                spec.channel.as_str()
            ))
            .result();
        }
        if spec.auto_implement && campaign.platform == Platform::Email {
            return ToolError::invalid_args("auto_implement is not available for email campaigns")
                .result();
        }
    }
    let exp = match spec.into_experiment() {
        Ok(e) => e,
        Err(e) => return ToolError::invalid_args(e).result(),
    };

    ctx.experiments.insert(exp.clone());
    tracing::info!(
        event = "test_started",
        test_id = %exp.id,
        variants = exp.variants.len(),
        metric = exp.success_metric.as_str()
    );
    success(report::experiment_started(&exp), json!({ "test": exp }))
}

#[derive(Deserialize)]
struct ResultsArgs {
    test_id: String,
    #[serde(default)]
    refresh: bool,
}

pub async fn get_ab_test_results(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: ResultsArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };
    let exp = ctx
        .experiments
        .get(&a.test_id)
        .ok_or_else(|| RegistryError::NotFound(format!("test {}", a.test_id)))?;

    let evaluation = if a.refresh && exp.status == ExperimentStatus::Running {
        check_experiment(&ctx.monitor_context(), &exp.id)
            .await?
            .evaluation
    } else {
        evaluate(&exp, ctx.cfg.min_trials)
    };
    // Re-read: a refresh may have completed the test.
    let exp = ctx.experiments.get(&exp.id).unwrap_or(exp);

    success(
        report::experiment_results(&exp, &evaluation),
        json!({ "test": exp, "evaluation": evaluation }),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Pause,
    Resume,
    RecordMetrics,
}

#[derive(Deserialize)]
struct ManageArgs {
    test_id: String,
    action: Action,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    metrics: Option<MetricsSnapshot>,
}

pub async fn manage_ab_test(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: ManageArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };
    let exp = ctx
        .experiments
        .get(&a.test_id)
        .ok_or_else(|| RegistryError::NotFound(format!("test {}", a.test_id)))?;

    let summary = match a.action {
        Action::Pause => {
            ctx.experiments.set_status(&exp.id, ExperimentStatus::Paused)?;
            format!("A/B test {} paused", exp.id)
        }
        Action::Resume => {
            ctx.experiments.set_status(&exp.id, ExperimentStatus::Running)?;
            format!("A/B test {} resumed", exp.id)
        }
        Action::RecordMetrics => {
            let (Some(name), Some(metrics)) = (a.variant, a.metrics) else {
                return ToolError::invalid_args("record_metrics needs variant and metrics")
                    .result();
            };
            let Some(index) = exp.variants.iter().position(|v| v.name == name) else {
                return ToolError::new(
                    "E_NOT_FOUND",
                    &format!("variant '{name}' not in test {}", exp.id),
                )
                .result();
            };
            if exp.variants[index].external_id.is_some() {
                return ToolError::new(
                    "E_INVALID_STATE",
                    &format!("variant '{name}' reports its own metrics from {}", exp.channel.as_str()),
                )
                .result();
            }
            ctx.experiments
                .update_variant_metrics(&exp.id, index, metrics)?;
            format!("Recorded metrics for variant {name} of A/B test {}", exp.id)
        }
    };

    let exp = ctx.experiments.get(&exp.id).unwrap_or(exp);
    tracing::info!(event = "test_managed", test_id = %exp.id, status = exp.status.as_str());
    success(summary, json!({ "test": exp }))
}
