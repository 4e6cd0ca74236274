use super::{parse_args, success, ToolContext, ToolError};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use reach_core::providers::{default_currency, DateRange};
use reach_core::report;
use reach_core::roi::{self, RoiInputs};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct RoiArgs {
    #[serde(flatten)]
    inputs: RoiInputs,
    #[serde(default = "default_currency")]
    currency: String,
}

pub async fn calculate_roi(_ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: RoiArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };
    let r = roi::calculate(&a.inputs);
    success(report::roi(&r, &a.currency), json!({ "roi": r }))
}

#[derive(Deserialize)]
struct DashboardArgs {
    #[serde(default)]
    days: Option<i64>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

const DEFAULT_DAYS: i64 = 30;

pub async fn get_analytics_dashboard(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let a: DashboardArgs = match parse_args(args) {
        Ok(a) => a,
        Err(e) => return e.result(),
    };
    let today = Utc::now().date_naive();
    let range = match (a.start_date, a.end_date) {
        (Some(start), end) => DateRange {
            start,
            end: end.unwrap_or(today),
        },
        (None, Some(_)) => {
            return ToolError::invalid_args("end_date needs a start_date").result();
        }
        (None, None) => DateRange::last_days(a.days.unwrap_or(DEFAULT_DAYS), today),
    };
    if range.end < range.start {
        return ToolError::invalid_args("end_date is before start_date").result();
    }

    let dashboard = ctx.providers.analytics()?.dashboard(&range).await?;
    success(report::dashboard(&dashboard), json!({ "dashboard": dashboard }))
}
