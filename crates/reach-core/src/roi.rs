//! Return-on-investment figures computed from caller-supplied numbers.
//!
//! Any ratio whose denominator is zero is reported as `None` ("n/a").

use crate::model::safe_ratio;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoiInputs {
    pub spend: f64,
    pub revenue: f64,
    #[serde(default)]
    pub impressions: Option<u64>,
    #[serde(default)]
    pub clicks: Option<u64>,
    #[serde(default)]
    pub conversions: Option<u64>,
    #[serde(default)]
    pub new_customers: Option<u64>,
    #[serde(default)]
    pub average_order_value: Option<f64>,
    /// Purchases per customer per year.
    #[serde(default)]
    pub purchase_frequency: Option<f64>,
    #[serde(default)]
    pub customer_lifespan_years: Option<f64>,
    /// Fraction of revenue kept as margin (0..=1). Defaults to 1.
    #[serde(default)]
    pub gross_margin: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoiReport {
    pub spend: f64,
    pub revenue: f64,
    pub profit: f64,
    pub roi: Option<f64>,
    pub roas: Option<f64>,
    pub cac: Option<f64>,
    pub ltv: Option<f64>,
    pub ltv_to_cac: Option<f64>,
    pub ctr: Option<f64>,
    pub conversion_rate: Option<f64>,
    pub cpc: Option<f64>,
    pub cpa: Option<f64>,
}

pub fn calculate(i: &RoiInputs) -> RoiReport {
    let customers = i.new_customers.or(i.conversions).map(|n| n as f64);
    let cac = customers.and_then(|n| safe_ratio(i.spend, n));

    let margin = i.gross_margin.unwrap_or(1.0);
    let ltv = match (i.average_order_value, i.purchase_frequency, i.customer_lifespan_years) {
        (Some(aov), Some(freq), Some(years)) => {
            let v = aov * freq * years * margin;
            v.is_finite().then_some(v)
        }
        _ => None,
    };

    RoiReport {
        spend: i.spend,
        revenue: i.revenue,
        profit: i.revenue - i.spend,
        roi: safe_ratio(i.revenue - i.spend, i.spend),
        roas: safe_ratio(i.revenue, i.spend),
        cac,
        ltv,
        ltv_to_cac: ltv.zip(cac).and_then(|(l, c)| safe_ratio(l, c)),
        ctr: i
            .clicks
            .zip(i.impressions)
            .and_then(|(c, n)| safe_ratio(c as f64, n as f64)),
        conversion_rate: i
            .conversions
            .zip(i.clicks)
            .and_then(|(c, n)| safe_ratio(c as f64, n as f64)),
        cpc: i.clicks.and_then(|c| safe_ratio(i.spend, c as f64)),
        cpa: i.conversions.and_then(|c| safe_ratio(i.spend, c as f64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_roi() {
        let r = calculate(&RoiInputs {
            spend: 1000.0,
            revenue: 3000.0,
            clicks: Some(500),
            impressions: Some(50_000),
            conversions: Some(20),
            ..Default::default()
        });
        assert_eq!(r.profit, 2000.0);
        assert_eq!(r.roi, Some(2.0));
        assert_eq!(r.roas, Some(3.0));
        assert_eq!(r.ctr, Some(0.01));
        assert_eq!(r.conversion_rate, Some(0.04));
        assert_eq!(r.cpc, Some(2.0));
        assert_eq!(r.cpa, Some(50.0));
        // conversions stand in for customers
        assert_eq!(r.cac, Some(50.0));
    }

    #[test]
    fn test_zero_spend_is_not_infinite() {
        let r = calculate(&RoiInputs {
            spend: 0.0,
            revenue: 500.0,
            conversions: Some(0),
            ..Default::default()
        });
        assert_eq!(r.roi, None);
        assert_eq!(r.roas, None);
        assert_eq!(r.cpa, None);
        assert_eq!(r.profit, 500.0);
    }

    #[test]
    fn test_ltv_and_ratio() {
        let r = calculate(&RoiInputs {
            spend: 2000.0,
            revenue: 5000.0,
            new_customers: Some(10),
            average_order_value: Some(100.0),
            purchase_frequency: Some(4.0),
            customer_lifespan_years: Some(3.0),
            gross_margin: Some(0.5),
            ..Default::default()
        });
        assert_eq!(r.cac, Some(200.0));
        assert_eq!(r.ltv, Some(600.0));
        assert_eq!(r.ltv_to_cac, Some(3.0));
    }

    #[test]
    fn test_ltv_needs_all_inputs() {
        let r = calculate(&RoiInputs {
            spend: 100.0,
            revenue: 100.0,
            average_order_value: Some(50.0),
            ..Default::default()
        });
        assert_eq!(r.ltv, None);
        assert_eq!(r.ltv_to_cac, None);
        assert_eq!(r.roi, Some(0.0));
    }
}
