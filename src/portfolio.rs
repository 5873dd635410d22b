//! Multi-strategy portfolio with calendar rebalancing.
//!
//! Combines the directional signals of several sub-strategies through
//! weights fitted by a `PortfolioOptimizer` over each strategy's trailing
//! realized returns. Weights are refreshed on a calendar schedule; between
//! rebalances the last fitted weights are reused.

use crate::error::{EngineError, Result};
use crate::optimizer::PortfolioOptimizer;
use crate::strategy::{SignalStrategy, StrategyContext};
use crate::types::{ReturnMatrix, Signal, Weights};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Minimum trailing observations before the optimizer is trusted.
const MIN_LOOKBACK_OBS: usize = 10;

/// How often strategy weights are refitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RebalanceFrequency {
    /// Whether a rebalance is due at `current`, given the last rebalance
    /// date. The first bar (no prior rebalance) is always due.
    pub fn is_due(&self, last: Option<NaiveDate>, current: NaiveDate) -> bool {
        let last = match last {
            Some(d) => d,
            None => return true,
        };
        match self {
            RebalanceFrequency::Daily => true,
            RebalanceFrequency::Weekly => (current - last).num_days() >= 7,
            RebalanceFrequency::Monthly => {
                current.year() != last.year() || current.month() != last.month()
            }
            RebalanceFrequency::Quarterly => {
                current.year() != last.year()
                    || (current.month() - 1) / 3 != (last.month() - 1) / 3
            }
            RebalanceFrequency::Yearly => current.year() != last.year(),
        }
    }
}

/// Weighting scheme applied at each rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    EqualWeight,
    MaxSharpe,
    MinVolatility,
    RiskParity,
}

/// Current weights and the date they were last fitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceState {
    pub current_weights: Weights,
    pub last_rebalance: Option<NaiveDate>,
}

/// What the portfolio wants done with the position after a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionAction {
    OpenLong,
    Close,
    Hold,
}

/// Outcome of processing one bar.
#[derive(Debug, Clone)]
pub struct BarDecision {
    pub date: NaiveDate,
    /// Weighted sum of sub-strategy signal values.
    pub combined_signal: f64,
    pub action: PositionAction,
    pub weights: Weights,
    pub rebalanced: bool,
}

/// Calendar-rebalanced combination of signal strategies.
pub struct MultiStrategyPortfolio {
    strategies: Vec<Box<dyn SignalStrategy>>,
    labels: Vec<String>,
    frequency: RebalanceFrequency,
    method: OptimizationMethod,
    lookback: usize,
    threshold: f64,
    risk_free_rate: f64,
    state: RebalanceState,
    /// Realized daily return per strategy, aligned with `return_dates`.
    strategy_returns: Vec<Vec<f64>>,
    return_dates: Vec<NaiveDate>,
    prev_signals: Vec<Signal>,
    initialized: bool,
}

impl MultiStrategyPortfolio {
    /// Default signal threshold for opening/closing the position.
    pub const DEFAULT_THRESHOLD: f64 = 0.3;
    /// Default trailing window for weight fitting.
    pub const DEFAULT_LOOKBACK: usize = 60;

    pub fn new(frequency: RebalanceFrequency, method: OptimizationMethod) -> Self {
        Self {
            strategies: Vec::new(),
            labels: Vec::new(),
            frequency,
            method,
            lookback: Self::DEFAULT_LOOKBACK,
            threshold: Self::DEFAULT_THRESHOLD,
            risk_free_rate: 0.02,
            state: RebalanceState {
                current_weights: Weights::new(),
                last_rebalance: None,
            },
            strategy_returns: Vec::new(),
            return_dates: Vec::new(),
            prev_signals: Vec::new(),
            initialized: false,
        }
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn SignalStrategy>) {
        self.strategies.push(strategy);
    }

    /// Unique labels per strategy, in attachment order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn state(&self) -> &RebalanceState {
        &self.state
    }

    /// Longest warmup across sub-strategies.
    pub fn warmup_period(&self) -> usize {
        self.strategies
            .iter()
            .map(|s| s.warmup_period())
            .max()
            .unwrap_or(0)
    }

    /// Attach labels, reset state, and call each strategy's `init`.
    pub fn init(&mut self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(EngineError::StrategyError(
                "Portfolio has no strategies attached".to_string(),
            ));
        }

        // Disambiguate duplicate names so weight maps stay keyed uniquely
        let mut labels = Vec::with_capacity(self.strategies.len());
        for (i, strategy) in self.strategies.iter().enumerate() {
            let base = strategy.name().to_string();
            if self.strategies.iter().filter(|s| s.name() == base).count() > 1 {
                labels.push(format!("{} #{}", base, i + 1));
            } else {
                labels.push(base);
            }
        }
        self.labels = labels;

        for strategy in &mut self.strategies {
            strategy.init();
        }

        let n = self.strategies.len();
        self.prev_signals = vec![Signal::Flat; n];
        self.strategy_returns = vec![Vec::new(); n];
        self.return_dates.clear();
        self.state = RebalanceState {
            current_weights: self
                .labels
                .iter()
                .map(|l| (l.clone(), 1.0 / n as f64))
                .collect(),
            last_rebalance: None,
        };
        self.initialized = true;
        Ok(())
    }

    /// Process one bar of the consolidated price history.
    ///
    /// `index` must advance monotonically from 0 across calls.
    pub fn process_bar(
        &mut self,
        dates: &[NaiveDate],
        closes: &[f64],
        index: usize,
    ) -> Result<BarDecision> {
        if !self.initialized {
            return Err(EngineError::StrategyError(
                "Portfolio not initialized; call init() first".to_string(),
            ));
        }

        let date = dates[index];

        // Realize each strategy's return: yesterday's stance applied to
        // today's price move, so signals never see the bar they act on.
        if index > 0 {
            let bar_return = closes[index] / closes[index - 1] - 1.0;
            for (returns, signal) in self.strategy_returns.iter_mut().zip(&self.prev_signals) {
                returns.push(signal.value() * bar_return);
            }
            self.return_dates.push(date);
        }

        let rebalanced = self.frequency.is_due(self.state.last_rebalance, date);
        if rebalanced {
            self.state.current_weights = self.fit_weights();
            self.state.last_rebalance = Some(date);
        }

        let mut combined = 0.0;
        for (i, strategy) in self.strategies.iter_mut().enumerate() {
            let ctx = StrategyContext {
                bar_index: index,
                dates,
                closes,
            };
            let signal = strategy.on_bar(&ctx);
            let weight = self
                .state
                .current_weights
                .get(&self.labels[i])
                .copied()
                .unwrap_or(0.0);
            combined += weight * signal.value();
            self.prev_signals[i] = signal;
        }

        let action = if combined > self.threshold {
            PositionAction::OpenLong
        } else if combined < -self.threshold {
            PositionAction::Close
        } else {
            PositionAction::Hold
        };

        Ok(BarDecision {
            date,
            combined_signal: combined,
            action,
            weights: self.state.current_weights.clone(),
            rebalanced,
        })
    }

    /// Fit weights over the trailing realized-return window.
    ///
    /// Falls back to equal weights when the method is `EqualWeight`, the
    /// window is too short, or the optimizer cannot be fitted. A strategy
    /// whose return window is unusable is excluded with zero weight for
    /// this cycle.
    fn fit_weights(&self) -> Weights {
        let n = self.strategies.len();
        let available = self.return_dates.len();

        if self.method == OptimizationMethod::EqualWeight || available < MIN_LOOKBACK_OBS {
            return self
                .labels
                .iter()
                .map(|l| (l.clone(), 1.0 / n as f64))
                .collect();
        }

        let window = available.min(self.lookback);
        let start = available - window;
        let dates: Vec<NaiveDate> = self.return_dates[start..].to_vec();

        let mut included = Vec::new();
        let mut columns = Vec::new();
        for (i, returns) in self.strategy_returns.iter().enumerate() {
            let column: Vec<f64> = returns[start..].to_vec();
            if column.iter().any(|r| !r.is_finite()) {
                warn!(
                    strategy = %self.labels[i],
                    "Unusable return window, assigning zero weight this cycle"
                );
                continue;
            }
            included.push(i);
            columns.push(column);
        }

        let mut weights: Weights = self.labels.iter().map(|l| (l.clone(), 0.0)).collect();
        if included.is_empty() {
            warn!("No strategy has a usable return window, all weights zero");
            return weights;
        }

        let names: Vec<String> = included.iter().map(|&i| self.labels[i].clone()).collect();
        let equal = 1.0 / included.len() as f64;

        let fitted = ReturnMatrix::from_columns(dates, names.clone(), columns)
            .and_then(|matrix| PortfolioOptimizer::new(&matrix, self.risk_free_rate))
            .and_then(|optimizer| match self.method {
                OptimizationMethod::MaxSharpe => optimizer.maximum_sharpe_portfolio(),
                OptimizationMethod::MinVolatility => optimizer.minimum_volatility_portfolio(),
                OptimizationMethod::RiskParity => optimizer.risk_parity(),
                OptimizationMethod::EqualWeight => unreachable!("handled above"),
            });

        match fitted {
            Ok(result) => {
                for name in &names {
                    let w = result.weights.get(name).copied().unwrap_or(equal);
                    weights.insert(name.clone(), w);
                }
            }
            Err(e) => {
                warn!("Weight fitting failed, using equal weights: {}", e);
                for name in &names {
                    weights.insert(name.clone(), equal);
                }
            }
        }

        weights
    }
}
