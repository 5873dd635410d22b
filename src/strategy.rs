//! Strategy trait and execution context.

use crate::types::Signal;
use chrono::NaiveDate;

/// Context provided to strategies on each bar.
#[derive(Debug)]
pub struct StrategyContext<'a> {
    /// Current bar index.
    pub bar_index: usize,
    /// Dates for every bar up to and including the current one.
    pub dates: &'a [NaiveDate],
    /// Closing prices, same length as `dates`.
    pub closes: &'a [f64],
}

impl<'a> StrategyContext<'a> {
    /// Current closing price.
    pub fn close(&self) -> f64 {
        self.closes[self.bar_index]
    }

    /// Current date.
    pub fn date(&self) -> NaiveDate {
        self.dates[self.bar_index]
    }

    /// Previous close, if available.
    pub fn prev_close(&self) -> Option<f64> {
        if self.bar_index > 0 {
            Some(self.closes[self.bar_index - 1])
        } else {
            None
        }
    }

    /// Close at a specific lookback (0 = current, 1 = previous, etc.).
    pub fn close_at(&self, lookback: usize) -> Option<f64> {
        if lookback <= self.bar_index {
            Some(self.closes[self.bar_index - lookback])
        } else {
            None
        }
    }

    /// Closing prices for the last n bars (fewer when history is short).
    pub fn window(&self, n: usize) -> &[f64] {
        let start = (self.bar_index + 1).saturating_sub(n);
        &self.closes[start..=self.bar_index]
    }

    /// All closes up to and including the current bar.
    pub fn history(&self) -> &[f64] {
        &self.closes[..=self.bar_index]
    }
}

/// Trait implemented by every signal-generating strategy.
pub trait SignalStrategy: Send + Sync {
    /// Returns the name of the strategy.
    fn name(&self) -> &str;

    /// Called once before the first bar.
    fn init(&mut self) {}

    /// Generate a trading signal based on the price history so far.
    fn on_bar(&mut self, ctx: &StrategyContext) -> Signal;

    /// Minimum bars needed before the strategy can generate signals.
    fn warmup_period(&self) -> usize {
        0
    }

    /// Strategy parameters as key-value pairs for logging.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}
