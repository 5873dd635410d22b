//! Built-in signal strategies and the configuration-driven factory.
//!
//! - [`SmaCrossover`]: fast/slow moving average trend following
//! - [`Momentum`]: trailing percent-change stance
//! - [`MeanReversion`]: z-score contrarian stance
//!
//! Each strategy owns a serde-deserializable params struct, so a
//! [`StrategyConfig`] can come straight out of a TOML run file and be turned
//! into a boxed strategy with [`StrategyConfig::build`].

mod mean_reversion;
mod momentum;
mod sma_crossover;

pub use mean_reversion::{MeanReversion, MeanReversionParams};
pub use momentum::{Momentum, MomentumParams};
pub use sma_crossover::{SmaCrossover, SmaCrossoverParams};

use crate::error::Result;
use crate::strategy::SignalStrategy;
use serde::{Deserialize, Serialize};

/// Tagged strategy configuration, one variant per built-in strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    SmaCrossover(SmaCrossoverParams),
    Momentum(MomentumParams),
    MeanReversion(MeanReversionParams),
}

impl StrategyConfig {
    /// Instantiate the configured strategy, validating its parameters.
    pub fn build(&self) -> Result<Box<dyn SignalStrategy>> {
        Ok(match self {
            StrategyConfig::SmaCrossover(params) => {
                Box::new(SmaCrossover::new(params.clone())?)
            }
            StrategyConfig::Momentum(params) => Box::new(Momentum::new(params.clone())?),
            StrategyConfig::MeanReversion(params) => {
                Box::new(MeanReversion::new(params.clone())?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_kind() {
        let configs = vec![
            StrategyConfig::SmaCrossover(SmaCrossoverParams::default()),
            StrategyConfig::Momentum(MomentumParams::default()),
            StrategyConfig::MeanReversion(MeanReversionParams::default()),
        ];
        let names: Vec<String> = configs
            .iter()
            .map(|c| c.build().unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["SMA Crossover", "Momentum", "Mean Reversion"]);
    }

    #[test]
    fn test_factory_rejects_bad_params() {
        let config = StrategyConfig::SmaCrossover(SmaCrossoverParams {
            fast_period: 50,
            slow_period: 10,
        });
        assert!(config.build().is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let toml_str = r#"
            kind = "sma_crossover"
            fast_period = 5
            slow_period = 20
        "#;
        let config: StrategyConfig = toml::from_str(toml_str).unwrap();
        let strategy = config.build().unwrap();
        assert_eq!(strategy.warmup_period(), 20);
    }
}
