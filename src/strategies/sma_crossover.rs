//! Simple Moving Average crossover strategy.
//!
//! Classic trend following: long while the fast MA is above the slow MA,
//! short while it is below.

use crate::error::{EngineError, Result};
use crate::strategy::{SignalStrategy, StrategyContext};
use crate::types::Signal;
use serde::{Deserialize, Serialize};

/// Parameters for [`SmaCrossover`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmaCrossoverParams {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
}

fn default_fast_period() -> usize {
    10
}

fn default_slow_period() -> usize {
    30
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
        }
    }
}

/// SMA crossover stance strategy.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    params: SmaCrossoverParams,
}

impl SmaCrossover {
    pub fn new(params: SmaCrossoverParams) -> Result<Self> {
        if params.fast_period == 0 {
            return Err(EngineError::ConfigError(
                "fast_period must be positive".to_string(),
            ));
        }
        if params.fast_period >= params.slow_period {
            return Err(EngineError::ConfigError(format!(
                "fast_period ({}) must be less than slow_period ({})",
                params.fast_period, params.slow_period
            )));
        }
        Ok(Self { params })
    }
}

fn sma(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

impl SignalStrategy for SmaCrossover {
    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal {
        if ctx.history().len() < self.params.slow_period {
            return Signal::Flat;
        }

        let fast = sma(ctx.window(self.params.fast_period));
        let slow = sma(ctx.window(self.params.slow_period));

        if fast > slow {
            Signal::Long
        } else if fast < slow {
            Signal::Short
        } else {
            Signal::Flat
        }
    }

    fn warmup_period(&self) -> usize {
        self.params.slow_period
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("fast_period".to_string(), self.params.fast_period.to_string()),
            ("slow_period".to_string(), self.params.slow_period.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn trending(trend: f64, count: usize) -> (Vec<NaiveDate>, Vec<f64>) {
        let dates = (0..count)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64))
            .collect();
        let closes = (0..count).map(|i| 100.0 + trend * i as f64).collect();
        (dates, closes)
    }

    #[test]
    fn test_invalid_periods_rejected() {
        assert!(SmaCrossover::new(SmaCrossoverParams {
            fast_period: 20,
            slow_period: 5,
        })
        .is_err());
        assert!(SmaCrossover::new(SmaCrossoverParams {
            fast_period: 0,
            slow_period: 5,
        })
        .is_err());
    }

    #[test]
    fn test_uptrend_goes_long() {
        let mut strategy = SmaCrossover::new(SmaCrossoverParams {
            fast_period: 3,
            slow_period: 10,
        })
        .unwrap();
        let (dates, closes) = trending(1.0, 40);

        let ctx = StrategyContext {
            bar_index: 39,
            dates: &dates,
            closes: &closes,
        };
        assert_eq!(strategy.on_bar(&ctx), Signal::Long);
    }

    #[test]
    fn test_downtrend_goes_short() {
        let mut strategy = SmaCrossover::new(SmaCrossoverParams {
            fast_period: 3,
            slow_period: 10,
        })
        .unwrap();
        let (dates, closes) = trending(-1.0, 40);

        let ctx = StrategyContext {
            bar_index: 39,
            dates: &dates,
            closes: &closes,
        };
        assert_eq!(strategy.on_bar(&ctx), Signal::Short);
    }

    #[test]
    fn test_flat_during_warmup() {
        let mut strategy = SmaCrossover::new(SmaCrossoverParams::default()).unwrap();
        let (dates, closes) = trending(1.0, 5);
        let ctx = StrategyContext {
            bar_index: 4,
            dates: &dates,
            closes: &closes,
        };
        assert_eq!(strategy.on_bar(&ctx), Signal::Flat);
        assert_eq!(strategy.warmup_period(), 30);
    }
}
