//! A/B test lifecycle: creation and the significance decision.

use crate::model::{
    new_id, Experiment, ExperimentStatus, ExperimentType, Platform, SuccessMetric, Variant,
};
use crate::stats::{two_proportion_z_test, Comparison, Proportion};
use anyhow::ensure;
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Arguments accepted when starting a test.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSpec {
    pub test_type: ExperimentType,
    pub channel: Platform,
    pub variants: Vec<VariantSpec>,
    pub sample_size: u64,
    pub success_metric: SuccessMetric,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub auto_implement: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub external_id: Option<String>,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl ExperimentSpec {
    pub fn into_experiment(self) -> anyhow::Result<Experiment> {
        ensure!(self.variants.len() >= 2, "an A/B test needs at least two variants");
        ensure!(self.sample_size > 0, "sample_size must be positive");
        ensure!(
            self.confidence_level > 0.5 && self.confidence_level < 1.0,
            "confidence_level must be in (0.5, 1.0), got {}",
            self.confidence_level
        );
        let mut names = std::collections::HashSet::new();
        for v in &self.variants {
            ensure!(!v.name.trim().is_empty(), "variant names must not be empty");
            ensure!(names.insert(v.name.as_str()), "duplicate variant name '{}'", v.name);
        }

        Ok(Experiment {
            id: new_id(),
            experiment_type: self.test_type,
            channel: self.channel,
            variants: self
                .variants
                .into_iter()
                .map(|v| Variant {
                    name: v.name,
                    config: v.config,
                    external_id: v.external_id,
                    metrics: Default::default(),
                })
                .collect(),
            sample_size: self.sample_size,
            success_metric: self.success_metric,
            confidence_level: self.confidence_level,
            status: ExperimentStatus::Running,
            winner: None,
            campaign_id: self.campaign_id,
            auto_implement: self.auto_implement,
            implemented: None,
            implementation_error: None,
            started_at: Utc::now(),
            completed_at: None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub index: usize,
    pub name: String,
    pub successes: u64,
    pub trials: u64,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Continue { reason: String },
    Winner { index: usize, comparison: Comparison },
    Inconclusive { comparison: Comparison },
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    /// Variants ordered best first; ties keep declaration order.
    pub ranking: Vec<Standing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    pub decision: Decision,
}

/// Compares the leading variant with the runner-up.
///
/// The test is only checked for significance once every variant has seen
/// `min_trials` trials (or the full `sample_size`). A significant lead
/// produces a winner; reaching `sample_size` without one is inconclusive.
pub fn evaluate(exp: &Experiment, min_trials: u64) -> Evaluation {
    let mut ranking: Vec<Standing> = exp
        .variants
        .iter()
        .enumerate()
        .map(|(index, v)| {
            let (s, n) = exp.success_metric.observations(&v.metrics);
            let p = Proportion::new(s, n);
            Standing {
                index,
                name: v.name.clone(),
                successes: p.successes,
                trials: p.trials,
                rate: p.rate(),
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        let ra = a.rate.unwrap_or(f64::NEG_INFINITY);
        let rb = b.rate.unwrap_or(f64::NEG_INFINITY);
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });

    if ranking.len() < 2 {
        return Evaluation {
            ranking,
            comparison: None,
            decision: Decision::Continue {
                reason: "fewer than two variants".into(),
            },
        };
    }

    let min_seen = ranking.iter().map(|s| s.trials).min().unwrap_or(0);
    let reached_sample = min_seen >= exp.sample_size;
    let ready = reached_sample || min_seen >= min_trials;

    if !ready {
        let needed = min_trials.min(exp.sample_size);
        return Evaluation {
            ranking,
            comparison: None,
            decision: Decision::Continue {
                reason: format!(
                    "waiting for data: smallest variant has {min_seen} of {needed} trials"
                ),
            },
        };
    }

    let best = &ranking[0];
    let runner_up = &ranking[1];
    let comparison = two_proportion_z_test(
        Proportion::new(best.successes, best.trials),
        Proportion::new(runner_up.successes, runner_up.trials),
        exp.confidence_level,
    );

    let decision = if comparison.significant && comparison.z > 0.0 {
        Decision::Winner {
            index: best.index,
            comparison,
        }
    } else if reached_sample {
        Decision::Inconclusive { comparison }
    } else {
        Decision::Continue {
            reason: format!(
                "not significant yet (p = {:.4}, need < {:.4})",
                comparison.p_value,
                1.0 - exp.confidence_level
            ),
        }
    };

    Evaluation {
        ranking,
        comparison: Some(comparison),
        decision,
    }
}
