//! Bar-by-bar multi-strategy backtest over a single price series.
//!
//! Builds the configured strategies through the factory, attaches them to a
//! `MultiStrategyPortfolio`, walks the price history, and settles the
//! portfolio's position decisions into a trade ledger and equity curve. The
//! result is a uniform `BacktestSummary`, printable via `ResultFormatter`.

use crate::error::{EngineError, Result};
use crate::metrics::RiskMetricsCalculator;
use crate::optimizer::TRADING_DAYS;
use crate::portfolio::{
    MultiStrategyPortfolio, OptimizationMethod, PositionAction, RebalanceFrequency,
};
use crate::strategies::StrategyConfig;
use crate::types::{EquityPoint, PriceSeries, ReturnSeries, Trade, Weights};
use chrono::NaiveDate;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{builder::Builder, settings::Style};
use tracing::info;

/// Strategy weights as of a rebalance date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub date: NaiveDate,
    pub weights: Weights,
}

/// Uniform result of a multi-strategy backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_days: usize,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annual_return_pct: f64,
    /// Annualized volatility of the equity curve, in percent.
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Deepest equity drawdown, as a positive percentage.
    pub max_drawdown_pct: f64,
    /// Share of closed trades with a positive return, in percent.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub weight_history: Vec<WeightSnapshot>,
}

impl BacktestSummary {
    /// Daily returns of the equity curve, for post-hoc risk analysis.
    pub fn equity_returns(&self) -> Result<ReturnSeries> {
        let dates: Vec<NaiveDate> = self.equity_curve.iter().skip(1).map(|p| p.date).collect();
        let values: Vec<f64> = self
            .equity_curve
            .windows(2)
            .map(|w| w[1].equity / w[0].equity - 1.0)
            .collect();
        ReturnSeries::new(format!("{} backtest", self.symbol), dates, values)
    }

    /// Risk calculator over the equity-curve returns.
    pub fn risk_calculator(&self) -> Result<RiskMetricsCalculator> {
        RiskMetricsCalculator::new(self.equity_returns()?, None)
    }
}

/// Backtest driver for a portfolio of signal strategies.
pub struct MultiStrategyBacktester {
    prices: PriceSeries,
    portfolio: MultiStrategyPortfolio,
    initial_capital: f64,
}

impl MultiStrategyBacktester {
    pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

    /// Build strategies from configuration and attach them to a portfolio.
    pub fn new(
        prices: PriceSeries,
        frequency: RebalanceFrequency,
        method: OptimizationMethod,
        strategy_configs: &[StrategyConfig],
    ) -> Result<Self> {
        if strategy_configs.is_empty() {
            return Err(EngineError::ConfigError(
                "At least one strategy must be configured".to_string(),
            ));
        }
        let mut portfolio = MultiStrategyPortfolio::new(frequency, method);
        for config in strategy_configs {
            portfolio.add_strategy(config.build()?);
        }
        Ok(Self::with_portfolio(prices, portfolio))
    }

    /// Use an already-assembled portfolio.
    pub fn with_portfolio(prices: PriceSeries, portfolio: MultiStrategyPortfolio) -> Self {
        Self {
            prices,
            portfolio,
            initial_capital: Self::DEFAULT_INITIAL_CAPITAL,
        }
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    /// Run the full bar loop and summarize.
    pub fn run(&mut self) -> Result<BacktestSummary> {
        let n = self.prices.dates.len();
        if n < 2 {
            return Err(EngineError::InsufficientData {
                needed: 2,
                available: n,
            });
        }

        self.portfolio.init()?;
        info!(
            symbol = %self.prices.symbol,
            bars = n,
            strategies = self.portfolio.labels().len(),
            "Starting multi-strategy backtest"
        );

        let dates = self.prices.dates.clone();
        let closes = self.prices.closes.clone();

        let mut equity = self.initial_capital;
        let mut peak = equity;
        let mut equity_curve = Vec::with_capacity(n);
        let mut weight_history = Vec::new();
        let mut trades: Vec<Trade> = Vec::new();
        let mut open_trade: Option<Trade> = None;

        for i in 0..n {
            // Position entered on a previous bar earns this bar's move
            if i > 0 && open_trade.is_some() {
                equity *= closes[i] / closes[i - 1];
            }

            let decision = self.portfolio.process_bar(&dates, &closes, i)?;
            if decision.rebalanced {
                weight_history.push(WeightSnapshot {
                    date: decision.date,
                    weights: decision.weights.clone(),
                });
            }

            match decision.action {
                PositionAction::OpenLong => {
                    if open_trade.is_none() {
                        open_trade = Some(Trade::open(dates[i], closes[i]));
                    }
                }
                PositionAction::Close => {
                    if let Some(mut trade) = open_trade.take() {
                        trade.close(dates[i], closes[i]);
                        trades.push(trade);
                    }
                }
                PositionAction::Hold => {}
            }

            peak = peak.max(equity);
            equity_curve.push(EquityPoint {
                date: dates[i],
                equity,
                drawdown_pct: (equity / peak - 1.0) * 100.0,
            });
        }

        // A position still open at the end stays in the ledger unclosed
        if let Some(trade) = open_trade {
            trades.push(trade);
        }

        Ok(self.summarize(equity_curve, weight_history, trades))
    }

    fn summarize(
        &self,
        equity_curve: Vec<EquityPoint>,
        weight_history: Vec<WeightSnapshot>,
        trades: Vec<Trade>,
    ) -> BacktestSummary {
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(0.0);
        let total_return_pct = (final_equity / self.initial_capital - 1.0) * 100.0;

        let daily: Vec<f64> = equity_curve
            .windows(2)
            .map(|w| w[1].equity / w[0].equity - 1.0)
            .collect();
        let mean = if daily.is_empty() {
            0.0
        } else {
            daily.iter().sum::<f64>() / daily.len() as f64
        };
        let std = deviation(&daily, mean);

        let annual_return_pct = mean * TRADING_DAYS * 100.0;
        let volatility_pct = std * TRADING_DAYS.sqrt() * 100.0;
        let sharpe_ratio = if std == 0.0 {
            0.0
        } else {
            mean * TRADING_DAYS / (std * TRADING_DAYS.sqrt())
        };

        let downside: Vec<f64> = daily.iter().copied().filter(|r| *r < 0.0).collect();
        let downside_std =
            (downside.iter().map(|r| r * r).sum::<f64>() / daily.len().max(1) as f64).sqrt();
        let sortino_ratio = if downside_std == 0.0 {
            0.0
        } else {
            mean * TRADING_DAYS / (downside_std * TRADING_DAYS.sqrt())
        };

        let max_drawdown_pct = equity_curve
            .iter()
            .map(|p| -p.drawdown_pct)
            .fold(0.0, f64::max);

        let closed: Vec<f64> = trades.iter().filter_map(|t| t.return_pct()).collect();
        let winning_trades = closed.iter().filter(|r| **r > 0.0).count();
        let losing_trades = closed.iter().filter(|r| **r < 0.0).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            winning_trades as f64 / closed.len() as f64 * 100.0
        };

        let gross_win: f64 = closed.iter().filter(|r| **r > 0.0).sum();
        let gross_loss: f64 = closed.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();
        let profit_factor = if gross_loss == 0.0 {
            if gross_win > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            gross_win / gross_loss
        };

        BacktestSummary {
            symbol: self.prices.symbol.clone(),
            start_date: self.prices.dates[0],
            end_date: *self.prices.dates.last().unwrap_or(&self.prices.dates[0]),
            trading_days: equity_curve.len(),
            initial_capital: self.initial_capital,
            final_equity,
            total_return_pct,
            annual_return_pct,
            volatility_pct,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_pct,
            win_rate,
            profit_factor,
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            trades,
            equity_curve,
            weight_history,
        }
    }
}

fn deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Terminal and JSON presentation for backtest summaries.
pub struct ResultFormatter;

impl ResultFormatter {
    /// Print a full results report to stdout.
    pub fn print_report(summary: &BacktestSummary) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", " MULTI-STRATEGY BACKTEST ".bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();

        println!("{}", "Overview".bold().underline());
        println!("  Symbol:          {}", summary.symbol);
        println!(
            "  Period:          {} to {}",
            summary.start_date, summary.end_date
        );
        println!("  Trading Days:    {}", summary.trading_days);
        println!();

        println!("{}", "Performance".bold().underline());
        println!("  Initial Capital: ${:>12.2}", summary.initial_capital);
        println!(
            "  Final Equity:    ${:>12.2}  {}",
            summary.final_equity,
            Self::format_pct_change(summary.total_return_pct)
        );
        println!("  Total Return:    {:>12.2}%", summary.total_return_pct);
        println!("  Annual Return:   {:>12.2}%", summary.annual_return_pct);
        println!();

        println!("{}", "Risk".bold().underline());
        println!("  Max Drawdown:    {:>12.2}%", -summary.max_drawdown_pct);
        println!("  Volatility:      {:>12.2}%", summary.volatility_pct);
        println!("  Sharpe Ratio:    {:>12.2}", summary.sharpe_ratio);
        println!("  Sortino Ratio:   {:>12.2}", summary.sortino_ratio);
        println!();

        println!("{}", "Trades".bold().underline());
        println!("  Total Trades:    {:>12}", summary.total_trades);
        println!(
            "  Winning Trades:  {:>12}  ({:.1}%)",
            summary.winning_trades, summary.win_rate
        );
        println!("  Losing Trades:   {:>12}", summary.losing_trades);
        println!("  Profit Factor:   {:>12.2}", summary.profit_factor);
        println!();

        println!("{}", "═".repeat(60).blue());
    }

    /// Print the trade ledger as a table.
    pub fn print_trades(summary: &BacktestSummary) {
        let mut builder = Builder::new();
        builder.push_record(["Entry", "Entry Px", "Exit", "Exit Px", "Return %", "Days"]);

        for trade in &summary.trades {
            builder.push_record([
                trade.entry_date.to_string(),
                format!("{:.2}", trade.entry_price),
                trade
                    .exit_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "open".to_string()),
                trade
                    .exit_price
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "-".to_string()),
                trade
                    .return_pct()
                    .map(|r| format!("{:.2}", r))
                    .unwrap_or_else(|| "-".to_string()),
                trade
                    .holding_days()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        println!("{}", table);
    }

    /// Print weight history as a table, one row per rebalance.
    pub fn print_weights(summary: &BacktestSummary) {
        let Some(first) = summary.weight_history.first() else {
            return;
        };
        let mut labels: Vec<String> = first.weights.keys().cloned().collect();
        labels.sort();

        let mut builder = Builder::new();
        let mut header = vec!["Date".to_string()];
        header.extend(labels.clone());
        builder.push_record(header);

        for snapshot in &summary.weight_history {
            let mut row = vec![snapshot.date.to_string()];
            for label in &labels {
                row.push(format!(
                    "{:.1}%",
                    snapshot.weights.get(label).copied().unwrap_or(0.0) * 100.0
                ));
            }
            builder.push_record(row);
        }

        let table = builder.build().with(Style::rounded()).to_string();
        println!("{}", table);
    }

    /// Export a summary to pretty JSON.
    pub fn to_json(summary: &BacktestSummary) -> String {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_pct_change(pct: f64) -> String {
        if pct >= 0.0 {
            format!("(+{:.2}%)", pct).green().to_string()
        } else {
            format!("({:.2}%)", pct).red().to_string()
        }
    }
}
