//! Configuration file support for backtest runs.
//!
//! Allows loading run configurations from TOML files for reproducibility.

use crate::backtester::MultiStrategyBacktester;
use crate::error::{EngineError, Result};
use crate::portfolio::{MultiStrategyPortfolio, OptimizationMethod, RebalanceFrequency};
use crate::strategies::StrategyConfig;
use crate::types::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFileConfig {
    /// General backtest settings.
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// Portfolio rebalancing settings.
    #[serde(default)]
    pub portfolio: PortfolioSettings,
    /// One table per strategy.
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

/// General backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Initial capital.
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    /// Annualized risk-free rate.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

fn default_capital() -> f64 {
    100_000.0
}

fn default_risk_free_rate() -> f64 {
    0.02
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

/// Portfolio rebalancing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSettings {
    #[serde(default = "default_frequency")]
    pub rebalance_frequency: RebalanceFrequency,
    #[serde(default = "default_method")]
    pub optimization_method: OptimizationMethod,
    /// Trailing window of strategy returns used to fit weights.
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Combined-signal threshold for opening/closing the position.
    #[serde(default = "default_threshold")]
    pub signal_threshold: f64,
}

fn default_frequency() -> RebalanceFrequency {
    RebalanceFrequency::Monthly
}

fn default_method() -> OptimizationMethod {
    OptimizationMethod::MaxSharpe
}

fn default_lookback() -> usize {
    MultiStrategyPortfolio::DEFAULT_LOOKBACK
}

fn default_threshold() -> f64 {
    MultiStrategyPortfolio::DEFAULT_THRESHOLD
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            rebalance_frequency: default_frequency(),
            optimization_method: default_method(),
            lookback: default_lookback(),
            signal_threshold: default_threshold(),
        }
    }
}

impl RunFileConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        info!(
            path = %path.as_ref().display(),
            strategies = config.strategies.len(),
            "Loaded run configuration"
        );
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::ConfigError(format!("Serialization failed: {}", e)))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(EngineError::ConfigError(
                "At least one [[strategies]] table is required".to_string(),
            ));
        }
        if self.backtest.initial_capital <= 0.0 {
            return Err(EngineError::ConfigError(
                "initial_capital must be positive".to_string(),
            ));
        }
        if self.portfolio.signal_threshold <= 0.0 || self.portfolio.signal_threshold > 1.0 {
            return Err(EngineError::ConfigError(
                "signal_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.portfolio.lookback < 2 {
            return Err(EngineError::ConfigError(
                "lookback must be at least 2".to_string(),
            ));
        }
        // Parameter validation happens at build time as well
        for strategy in &self.strategies {
            strategy.build()?;
        }
        Ok(())
    }

    /// Assemble a ready-to-run backtester over the given price series.
    pub fn build_backtester(&self, prices: PriceSeries) -> Result<MultiStrategyBacktester> {
        let mut portfolio = MultiStrategyPortfolio::new(
            self.portfolio.rebalance_frequency,
            self.portfolio.optimization_method,
        )
        .with_lookback(self.portfolio.lookback)
        .with_threshold(self.portfolio.signal_threshold)
        .with_risk_free_rate(self.backtest.risk_free_rate);

        for strategy in &self.strategies {
            portfolio.add_strategy(strategy.build()?);
        }

        Ok(MultiStrategyBacktester::with_portfolio(prices, portfolio)
            .with_initial_capital(self.backtest.initial_capital))
    }
}
