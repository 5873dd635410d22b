//! Price momentum strategy.

use crate::error::{EngineError, Result};
use crate::strategy::{SignalStrategy, StrategyContext};
use crate::types::Signal;
use serde::{Deserialize, Serialize};

/// Parameters for [`Momentum`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumParams {
    /// Bars to measure the price change over.
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Minimum percent change to take a stance.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_lookback() -> usize {
    20
}

fn default_threshold() -> f64 {
    0.0
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            threshold: default_threshold(),
        }
    }
}

/// Long when the trailing percent change exceeds the threshold, short when
/// it falls below the negative threshold, flat in between.
#[derive(Debug, Clone)]
pub struct Momentum {
    params: MomentumParams,
}

impl Momentum {
    pub fn new(params: MomentumParams) -> Result<Self> {
        if params.lookback == 0 {
            return Err(EngineError::ConfigError(
                "lookback must be positive".to_string(),
            ));
        }
        if params.threshold < 0.0 {
            return Err(EngineError::ConfigError(
                "threshold must be non-negative".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn momentum_pct(&self, ctx: &StrategyContext) -> Option<f64> {
        let past = ctx.close_at(self.params.lookback)?;
        if past == 0.0 {
            return None;
        }
        Some((ctx.close() - past) / past * 100.0)
    }
}

impl SignalStrategy for Momentum {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal {
        let momentum = match self.momentum_pct(ctx) {
            Some(m) => m,
            None => return Signal::Flat,
        };

        if momentum > self.params.threshold {
            Signal::Long
        } else if momentum < -self.params.threshold {
            Signal::Short
        } else {
            Signal::Flat
        }
    }

    fn warmup_period(&self) -> usize {
        self.params.lookback + 1
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("lookback".to_string(), self.params.lookback.to_string()),
            (
                "threshold".to_string(),
                format!("{:.2}%", self.params.threshold),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn context<'a>(closes: &'a [f64], dates: &'a [NaiveDate]) -> StrategyContext<'a> {
        StrategyContext {
            bar_index: closes.len() - 1,
            dates,
            closes,
        }
    }

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn test_rising_price_signals_long() {
        let mut strategy = Momentum::new(MomentumParams {
            lookback: 5,
            threshold: 1.0,
        })
        .unwrap();

        let closes: Vec<f64> = (0..10).map(|i| 100.0 + 2.0 * i as f64).collect();
        let d = dates(10);
        assert_eq!(strategy.on_bar(&context(&closes, &d)), Signal::Long);
    }

    #[test]
    fn test_falling_price_signals_short() {
        let mut strategy = Momentum::new(MomentumParams {
            lookback: 5,
            threshold: 1.0,
        })
        .unwrap();

        let closes: Vec<f64> = (0..10).map(|i| 100.0 - 2.0 * i as f64).collect();
        let d = dates(10);
        assert_eq!(strategy.on_bar(&context(&closes, &d)), Signal::Short);
    }

    #[test]
    fn test_small_move_stays_flat() {
        let mut strategy = Momentum::new(MomentumParams {
            lookback: 5,
            threshold: 5.0,
        })
        .unwrap();

        let closes = vec![100.0, 100.1, 100.2, 100.1, 100.3, 100.2, 100.4];
        let d = dates(7);
        assert_eq!(strategy.on_bar(&context(&closes, &d)), Signal::Flat);
    }

    #[test]
    fn test_flat_without_enough_history() {
        let mut strategy = Momentum::new(MomentumParams::default()).unwrap();
        let closes = vec![100.0, 101.0];
        let d = dates(2);
        assert_eq!(strategy.on_bar(&context(&closes, &d)), Signal::Flat);
    }
}
