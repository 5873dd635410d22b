//! Quantfolio - portfolio optimization and risk analytics engine.
//!
//! # Overview
//!
//! Quantfolio is a self-contained engine for allocation, risk measurement,
//! and multi-strategy backtesting over daily return data:
//!
//! - **Portfolio optimization**: mean-variance, minimum volatility, maximum
//!   Sharpe, efficient frontier, risk parity, and Black-Litterman, solved as
//!   convex QPs
//! - **Risk analytics**: distribution moments, five-method Value-at-Risk,
//!   drawdown episode analysis, ratio families, benchmark-relative metrics
//! - **Multi-strategy portfolios**: calendar-rebalanced signal combination
//!   with optimizer-fitted strategy weights
//! - **Backtesting**: bar-by-bar simulation with a trade ledger, equity
//!   curve, and uniform summary result
//! - **Configuration files**: TOML-based run configuration for
//!   reproducibility
//!
//! # Quick Start
//!
//! ```no_run
//! use quantfolio::{
//!     config::RunFileConfig,
//!     backtester::ResultFormatter,
//!     types::PriceSeries,
//! };
//!
//! let config = RunFileConfig::load("run.toml").unwrap();
//!
//! # let (dates, closes) = (vec![], vec![]);
//! let prices = PriceSeries::new("SPY".to_string(), dates, closes).unwrap();
//! let mut backtester = config.build_backtester(prices).unwrap();
//!
//! let summary = backtester.run().unwrap();
//! ResultFormatter::print_report(&summary);
//! println!("{}", ResultFormatter::to_json(&summary));
//! ```
//!
//! # Optimizing a portfolio directly
//!
//! ```no_run
//! use quantfolio::{optimizer::PortfolioOptimizer, types::ReturnMatrix};
//!
//! # let (dates, columns, rows) = (vec![], vec![], vec![]);
//! let returns = ReturnMatrix::new(dates, columns, rows).unwrap();
//! let optimizer = PortfolioOptimizer::new(&returns, 0.02).unwrap();
//!
//! let max_sharpe = optimizer.maximum_sharpe_portfolio().unwrap();
//! let frontier = optimizer.efficient_frontier(50).unwrap();
//! println!("Sharpe: {:.2}", max_sharpe.sharpe_ratio);
//! ```
//!
//! # Creating custom strategies
//!
//! Implement the `SignalStrategy` trait to plug your own signals into the
//! portfolio:
//!
//! ```
//! use quantfolio::strategy::{SignalStrategy, StrategyContext};
//! use quantfolio::types::Signal;
//!
//! struct MyStrategy {
//!     threshold: f64,
//! }
//!
//! impl SignalStrategy for MyStrategy {
//!     fn name(&self) -> &str {
//!         "My Custom Strategy"
//!     }
//!
//!     fn on_bar(&mut self, ctx: &StrategyContext) -> Signal {
//!         let price = ctx.close();
//!         // Your logic here
//!         Signal::Flat
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (ReturnSeries, ReturnMatrix, PriceSeries,
//!   Signal, Trade)
//! - [`optimizer`]: Markowitz-family portfolio optimization
//! - [`metrics`]: Risk and performance analytics
//! - [`strategy`]: SignalStrategy trait and context
//! - [`strategies`]: Built-in strategies and the configuration factory
//! - [`portfolio`]: Calendar-rebalanced multi-strategy portfolio
//! - [`backtester`]: Bar-by-bar backtest driver and result formatting
//! - [`config`]: TOML configuration file support

pub mod backtester;
pub mod config;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod strategies;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use backtester::{BacktestSummary, MultiStrategyBacktester, ResultFormatter, WeightSnapshot};
pub use config::RunFileConfig;
pub use error::{EngineError, Result};
pub use metrics::{
    AdvancedRatios, BasicStatistics, DrawdownAnalysis, DrawdownEpisode, RelativeMetrics,
    RiskAdjustedMetrics, RiskMetricsCalculator, RiskReport, ValueAtRisk, VarEstimate,
};
pub use optimizer::{
    FrontierPoint, OptimizationResult, PortfolioOptimizer, View, TRADING_DAYS,
};
pub use portfolio::{
    BarDecision, MultiStrategyPortfolio, OptimizationMethod, PositionAction, RebalanceFrequency,
    RebalanceState,
};
pub use strategies::{
    MeanReversion, MeanReversionParams, Momentum, MomentumParams, SmaCrossover,
    SmaCrossoverParams, StrategyConfig,
};
pub use strategy::{SignalStrategy, StrategyContext};
pub use types::{EquityPoint, PriceSeries, ReturnMatrix, ReturnSeries, Signal, Trade, Weights};
