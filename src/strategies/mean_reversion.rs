//! Z-score mean reversion strategy.
//!
//! Takes a contrarian stance when the price stretches beyond `entry_std`
//! standard deviations from its rolling mean and holds it until the price
//! reverts to within `exit_std`.

use crate::error::{EngineError, Result};
use crate::strategy::{SignalStrategy, StrategyContext};
use crate::types::Signal;
use serde::{Deserialize, Serialize};

/// Parameters for [`MeanReversion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanReversionParams {
    /// Rolling window for mean and standard deviation.
    #[serde(default = "default_period")]
    pub period: usize,
    /// Entry threshold in standard deviations from the mean.
    #[serde(default = "default_entry_std")]
    pub entry_std: f64,
    /// Exit threshold in standard deviations from the mean.
    #[serde(default = "default_exit_std")]
    pub exit_std: f64,
}

fn default_period() -> usize {
    20
}

fn default_entry_std() -> f64 {
    2.0
}

fn default_exit_std() -> f64 {
    0.5
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            period: default_period(),
            entry_std: default_entry_std(),
            exit_std: default_exit_std(),
        }
    }
}

/// Stateful mean-reversion stance strategy.
#[derive(Debug, Clone)]
pub struct MeanReversion {
    params: MeanReversionParams,
    stance: Signal,
}

impl MeanReversion {
    pub fn new(params: MeanReversionParams) -> Result<Self> {
        if params.period < 2 {
            return Err(EngineError::ConfigError(
                "period must be at least 2".to_string(),
            ));
        }
        if params.entry_std <= params.exit_std {
            return Err(EngineError::ConfigError(format!(
                "entry_std ({}) must exceed exit_std ({})",
                params.entry_std, params.exit_std
            )));
        }
        Ok(Self {
            params,
            stance: Signal::Flat,
        })
    }

    fn zscore(&self, ctx: &StrategyContext) -> Option<f64> {
        if ctx.history().len() < self.params.period {
            return None;
        }
        let window = ctx.window(self.params.period);
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let var = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / window.len() as f64;
        let std = var.sqrt();
        if std == 0.0 {
            return Some(0.0);
        }
        Some((ctx.close() - mean) / std)
    }
}

impl SignalStrategy for MeanReversion {
    fn name(&self) -> &str {
        "Mean Reversion"
    }

    fn init(&mut self) {
        self.stance = Signal::Flat;
    }

    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal {
        let zscore = match self.zscore(ctx) {
            Some(z) => z,
            None => return self.stance,
        };

        self.stance = match self.stance {
            Signal::Flat => {
                if zscore < -self.params.entry_std {
                    Signal::Long
                } else if zscore > self.params.entry_std {
                    Signal::Short
                } else {
                    Signal::Flat
                }
            }
            Signal::Long => {
                if zscore > -self.params.exit_std {
                    Signal::Flat
                } else {
                    Signal::Long
                }
            }
            Signal::Short => {
                if zscore < self.params.exit_std {
                    Signal::Flat
                } else {
                    Signal::Short
                }
            }
        };

        self.stance
    }

    fn warmup_period(&self) -> usize {
        self.params.period
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("period".to_string(), self.params.period.to_string()),
            ("entry_std".to_string(), format!("{:.1}", self.params.entry_std)),
            ("exit_std".to_string(), format!("{:.1}", self.params.exit_std)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(MeanReversion::new(MeanReversionParams {
            period: 20,
            entry_std: 0.5,
            exit_std: 2.0,
        })
        .is_err());
        assert!(MeanReversion::new(MeanReversionParams {
            period: 1,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_oversold_spike_goes_long_then_exits() {
        let mut strategy = MeanReversion::new(MeanReversionParams {
            period: 10,
            entry_std: 1.5,
            exit_std: 0.5,
        })
        .unwrap();
        strategy.init();

        // Stable around 100, then a sharp drop, then reversion
        let mut closes = vec![100.0, 100.5, 99.5, 100.2, 99.8, 100.1, 99.9, 100.3, 99.7, 100.0];
        closes.push(96.0); // deep below the band
        closes.push(100.0); // reverted

        let d = dates(closes.len());
        let mut last = Signal::Flat;
        for i in 0..closes.len() {
            let ctx = StrategyContext {
                bar_index: i,
                dates: &d,
                closes: &closes,
            };
            last = strategy.on_bar(&ctx);
            if i == closes.len() - 2 {
                assert_eq!(last, Signal::Long, "spike down should trigger a long");
            }
        }
        assert_eq!(last, Signal::Flat, "reversion to mean should close out");
    }

    #[test]
    fn test_constant_prices_stay_flat() {
        let mut strategy = MeanReversion::new(MeanReversionParams::default()).unwrap();
        let closes = vec![100.0; 30];
        let d = dates(30);
        for i in 0..30 {
            let ctx = StrategyContext {
                bar_index: i,
                dates: &d,
                closes: &closes,
            };
            assert_eq!(strategy.on_bar(&ctx), Signal::Flat);
        }
    }
}
