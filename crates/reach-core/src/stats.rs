use serde::Serialize;

/// Successes out of trials for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Proportion {
    pub successes: u64,
    pub trials: u64,
}

impl Proportion {
    pub fn new(successes: u64, trials: u64) -> Self {
        // Platforms occasionally report more clicks than impressions; clamp so
        // the rate stays a probability.
        Self {
            successes: successes.min(trials),
            trials,
        }
    }

    pub fn rate(&self) -> Option<f64> {
        if self.trials == 0 {
            None
        } else {
            Some(self.successes as f64 / self.trials as f64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Comparison {
    pub z: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    pub significant: bool,
    /// Relative lift of `a` over `b`; `None` when `b` has a zero rate.
    pub lift: Option<f64>,
}

impl Comparison {
    fn none() -> Self {
        Self {
            z: 0.0,
            p_value: 1.0,
            significant: false,
            lift: None,
        }
    }
}

/// Pooled two-proportion z-test of `a` against `b`.
///
/// `confidence` is the confidence level (e.g. 0.95); the result is
/// significant when the two-sided p-value is below `1 - confidence`.
pub fn two_proportion_z_test(a: Proportion, b: Proportion, confidence: f64) -> Comparison {
    let (Some(ra), Some(rb)) = (a.rate(), b.rate()) else {
        return Comparison::none();
    };

    let lift = if rb > 0.0 { Some((ra - rb) / rb) } else { None };

    let n_a = a.trials as f64;
    let n_b = b.trials as f64;
    // Summed in f64: counters near u64::MAX must not overflow.
    let pooled = (a.successes as f64 + b.successes as f64) / (n_a + n_b);
    let se = (pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b)).sqrt();
    if se == 0.0 || !se.is_finite() {
        // Both rates are 0 or both are 1: nothing to distinguish.
        return Comparison { lift, ..Comparison::none() };
    }

    let z = (ra - rb) / se;
    let p_value = (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0);
    let alpha = 1.0 - confidence;

    Comparison {
        z,
        p_value,
        significant: p_value < alpha,
        lift,
    }
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}
