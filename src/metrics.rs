//! Risk and performance analytics for a single return series.
//!
//! `RiskMetricsCalculator` wraps a daily return series (optionally paired
//! with a benchmark) and produces grouped statistics: distribution moments,
//! Value-at-Risk under five estimators, drawdown episode analysis, ratio
//! families, and benchmark-relative metrics. `calculate_all_metrics` bundles
//! everything into a serializable `RiskReport`.

use crate::error::{EngineError, Result};
use crate::types::ReturnSeries;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal as GaussianSampler;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::optimizer::TRADING_DAYS;

/// Number of Gaussian draws for Monte Carlo VaR.
const MONTE_CARLO_DRAWS: usize = 10_000;

/// Distribution statistics of the daily return series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicStatistics {
    pub mean_daily: f64,
    pub mean_annual: f64,
    pub volatility_daily: f64,
    pub volatility_annual: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
    /// Std of returns below zero, annualized.
    pub downside_deviation: f64,
    /// Std of returns above zero, annualized.
    pub upside_deviation: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub n_observations: usize,
}

/// One VaR estimate, daily and annualized (x sqrt(252)).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VarEstimate {
    pub daily: f64,
    pub annual: f64,
}

impl VarEstimate {
    fn from_daily(daily: f64) -> Self {
        Self {
            daily,
            annual: daily * TRADING_DAYS.sqrt(),
        }
    }
}

/// Value-at-Risk under five estimators at one confidence level.
///
/// All values are return quantiles (losses are negative numbers), so the
/// conditional estimate is always at or below the historical one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueAtRisk {
    pub confidence_level: f64,
    pub historical: VarEstimate,
    pub parametric: VarEstimate,
    pub cornish_fisher: VarEstimate,
    pub conditional: VarEstimate,
    pub monte_carlo: VarEstimate,
}

/// A peak-to-recovery drawdown episode. `end` is `None` while the series
/// finishes underwater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    pub start: NaiveDate,
    pub trough: NaiveDate,
    pub end: Option<NaiveDate>,
    /// Depth at the trough as a negative percentage.
    pub depth_pct: f64,
}

impl DrawdownEpisode {
    /// Peak-to-recovery length in calendar days; `None` while open.
    pub fn duration_days(&self) -> Option<i64> {
        self.end.map(|end| (end - self.start).num_days())
    }

    /// Trough-to-recovery length in calendar days; `None` while open.
    pub fn recovery_days(&self) -> Option<i64> {
        self.end.map(|end| (end - self.trough).num_days())
    }
}

/// Drawdown summary over the cumulative wealth curve.
///
/// Duration and recovery statistics cover closed episodes only; an episode
/// still open at the end of the series contributes its depth but no
/// duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    /// Deepest drawdown as a negative percentage.
    pub max_drawdown_pct: f64,
    pub max_drawdown_date: Option<NaiveDate>,
    /// Mean episode depth as a negative percentage.
    pub avg_drawdown_pct: f64,
    pub longest_duration_days: i64,
    pub avg_duration_days: f64,
    pub longest_recovery_days: i64,
    pub avg_recovery_days: f64,
    pub n_episodes: usize,
    pub episodes: Vec<DrawdownEpisode>,
}

/// Gain/loss shape ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedRatios {
    /// Sum of gains over sum of losses above/below zero; `+inf` with no
    /// losing days.
    pub omega_ratio: f64,
    /// Mean gain over mean loss magnitude.
    pub gain_loss_ratio: f64,
    /// Gross gains over gross losses.
    pub profit_factor: f64,
    /// 95th percentile over the magnitude of the 5th.
    pub tail_ratio: f64,
    /// Share of positive days.
    pub hit_rate: f64,
}

/// Benchmark-relative metrics (inner join on dates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelativeMetrics {
    pub beta: f64,
    /// Annualized Jensen's alpha.
    pub alpha: f64,
    pub correlation: f64,
    /// Annualized std of active returns.
    pub tracking_error: f64,
    pub information_ratio: f64,
    pub n_aligned: usize,
}

/// Classic risk-adjusted ratios, each 0 when its denominator is 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustedMetrics {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub sterling_ratio: f64,
    pub burke_ratio: f64,
}

/// Full report produced by `calculate_all_metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub series_name: String,
    pub basic: BasicStatistics,
    pub value_at_risk: Vec<ValueAtRisk>,
    pub drawdowns: DrawdownAnalysis,
    pub ratios: AdvancedRatios,
    pub risk_adjusted: RiskAdjustedMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative: Option<RelativeMetrics>,
}

/// Calculator over one return series, optional benchmark, and an annualized
/// risk-free rate.
pub struct RiskMetricsCalculator {
    returns: ReturnSeries,
    benchmark: Option<ReturnSeries>,
    risk_free_rate: f64,
    mc_seed: Option<u64>,
}

impl RiskMetricsCalculator {
    /// Default annualized risk-free rate.
    pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

    pub fn new(returns: ReturnSeries, benchmark: Option<ReturnSeries>) -> Result<Self> {
        Self::with_risk_free_rate(returns, benchmark, Self::DEFAULT_RISK_FREE_RATE)
    }

    pub fn with_risk_free_rate(
        returns: ReturnSeries,
        benchmark: Option<ReturnSeries>,
        risk_free_rate: f64,
    ) -> Result<Self> {
        if returns.values.len() < 2 {
            return Err(EngineError::InsufficientData {
                needed: 2,
                available: returns.values.len(),
            });
        }
        Ok(Self {
            returns,
            benchmark,
            risk_free_rate,
            mc_seed: None,
        })
    }

    /// Fix the Monte Carlo RNG seed for reproducible VaR estimates.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.mc_seed = Some(seed);
        self
    }

    pub fn basic_statistics(&self) -> BasicStatistics {
        let values = &self.returns.values;
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = standard_deviation(values, mean);

        let (skewness, kurtosis) = if std > 0.0 {
            let m3 = values.iter().map(|r| (r - mean).powi(3)).sum::<f64>() / n;
            let m4 = values.iter().map(|r| (r - mean).powi(4)).sum::<f64>() / n;
            (m3 / std.powi(3), m4 / std.powi(4) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let downside: Vec<f64> = values.iter().copied().filter(|r| *r < 0.0).collect();
        let upside: Vec<f64> = values.iter().copied().filter(|r| *r > 0.0).collect();

        BasicStatistics {
            mean_daily: mean,
            mean_annual: mean * TRADING_DAYS,
            volatility_daily: std,
            volatility_annual: std * TRADING_DAYS.sqrt(),
            skewness,
            kurtosis,
            downside_deviation: partial_deviation(&downside) * TRADING_DAYS.sqrt(),
            upside_deviation: partial_deviation(&upside) * TRADING_DAYS.sqrt(),
            best_day: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            worst_day: values.iter().copied().fold(f64::INFINITY, f64::min),
            n_observations: values.len(),
        }
    }

    /// VaR at `confidence` (e.g. 0.95) under five estimators.
    pub fn value_at_risk(&self, confidence: f64) -> Result<ValueAtRisk> {
        if !(0.5..1.0).contains(&confidence) {
            return Err(EngineError::InvalidInput(
                "Confidence level must be in [0.5, 1.0)".to_string(),
            ));
        }

        let values = &self.returns.values;
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = standard_deviation(values, mean);
        let alpha = 1.0 - confidence;

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let historical = percentile(&sorted, alpha * 100.0);

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| EngineError::InvalidInput(format!("Normal distribution: {}", e)))?;
        let z = normal.inverse_cdf(alpha);
        let parametric = mean + z * std;

        let stats = self.basic_statistics();
        let (s, k) = (stats.skewness, stats.kurtosis);
        let z_cf = z + (z * z - 1.0) * s / 6.0 + (z.powi(3) - 3.0 * z) * k / 24.0
            - (2.0 * z.powi(3) - 5.0 * z) * s * s / 36.0;
        let cornish_fisher = mean + z_cf * std;

        let tail: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|r| *r <= historical)
            .collect();
        let conditional = if tail.is_empty() {
            historical
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        };

        let monte_carlo = self.monte_carlo_var(mean, std, alpha)?;

        Ok(ValueAtRisk {
            confidence_level: confidence,
            historical: VarEstimate::from_daily(historical),
            parametric: VarEstimate::from_daily(parametric),
            cornish_fisher: VarEstimate::from_daily(cornish_fisher),
            conditional: VarEstimate::from_daily(conditional),
            monte_carlo: VarEstimate::from_daily(monte_carlo),
        })
    }

    fn monte_carlo_var(&self, mean: f64, std: f64, alpha: f64) -> Result<f64> {
        if std == 0.0 {
            return Ok(mean);
        }
        let sampler = GaussianSampler::new(mean, std)
            .map_err(|e| EngineError::InvalidInput(format!("Monte Carlo sampler: {}", e)))?;
        let mut rng = match self.mc_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut draws: Vec<f64> = (0..MONTE_CARLO_DRAWS)
            .map(|_| rng.sample(sampler))
            .collect();
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Ok(percentile(&draws, alpha * 100.0))
    }

    /// Segment the cumulative wealth curve into drawdown episodes.
    pub fn drawdown_analysis(&self) -> DrawdownAnalysis {
        let dates = &self.returns.dates;
        let values = &self.returns.values;

        let mut episodes: Vec<DrawdownEpisode> = Vec::new();
        let mut wealth = 1.0;
        let mut peak = 1.0;
        let mut peak_date = dates[0];

        let mut max_drawdown = 0.0;
        let mut max_drawdown_date = None;

        // Currently open episode: (start, trough date, trough depth)
        let mut open: Option<(NaiveDate, NaiveDate, f64)> = None;

        for (date, ret) in dates.iter().zip(values.iter()) {
            wealth *= 1.0 + ret;

            if wealth >= peak {
                if let Some((start, trough, depth)) = open.take() {
                    episodes.push(DrawdownEpisode {
                        start,
                        trough,
                        end: Some(*date),
                        depth_pct: depth,
                    });
                }
                peak = wealth;
                peak_date = *date;
            } else {
                let drawdown = (wealth / peak - 1.0) * 100.0;
                match &mut open {
                    Some((_, trough, depth)) => {
                        if drawdown < *depth {
                            *trough = *date;
                            *depth = drawdown;
                        }
                    }
                    None => open = Some((peak_date, *date, drawdown)),
                }
                if drawdown < max_drawdown {
                    max_drawdown = drawdown;
                    max_drawdown_date = Some(*date);
                }
            }
        }

        if let Some((start, trough, depth)) = open {
            episodes.push(DrawdownEpisode {
                start,
                trough,
                end: None,
                depth_pct: depth,
            });
        }

        let depths: Vec<f64> = episodes.iter().map(|e| e.depth_pct).collect();
        let durations: Vec<i64> = episodes.iter().filter_map(|e| e.duration_days()).collect();
        let recoveries: Vec<i64> = episodes.iter().filter_map(|e| e.recovery_days()).collect();

        DrawdownAnalysis {
            max_drawdown_pct: max_drawdown,
            max_drawdown_date,
            avg_drawdown_pct: mean_or_zero(&depths),
            longest_duration_days: durations.iter().copied().max().unwrap_or(0),
            avg_duration_days: mean_or_zero_i64(&durations),
            longest_recovery_days: recoveries.iter().copied().max().unwrap_or(0),
            avg_recovery_days: mean_or_zero_i64(&recoveries),
            n_episodes: episodes.len(),
            episodes,
        }
    }

    pub fn advanced_ratios(&self) -> AdvancedRatios {
        let values = &self.returns.values;
        let n = values.len() as f64;

        let gains: Vec<f64> = values.iter().copied().filter(|r| *r > 0.0).collect();
        let losses: Vec<f64> = values.iter().copied().filter(|r| *r < 0.0).collect();

        let gross_gain: f64 = gains.iter().sum();
        let gross_loss: f64 = losses.iter().map(|r| r.abs()).sum();

        let omega_ratio = if gross_loss == 0.0 {
            f64::INFINITY
        } else {
            gross_gain / gross_loss
        };

        let gain_loss_ratio = if losses.is_empty() || gains.is_empty() {
            0.0
        } else {
            (gross_gain / gains.len() as f64) / (gross_loss / losses.len() as f64)
        };

        let profit_factor = if gross_loss == 0.0 {
            if gross_gain > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            gross_gain / gross_loss
        };

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p95 = percentile(&sorted, 95.0);
        let p5 = percentile(&sorted, 5.0);
        let tail_ratio = if p5.abs() == 0.0 { 0.0 } else { p95 / p5.abs() };

        AdvancedRatios {
            omega_ratio,
            gain_loss_ratio,
            profit_factor,
            tail_ratio,
            hit_rate: gains.len() as f64 / n,
        }
    }

    /// Benchmark-relative metrics. Errors when no benchmark was provided or
    /// the date intersection is too short.
    pub fn relative_metrics(&self) -> Result<RelativeMetrics> {
        let benchmark = self.benchmark.as_ref().ok_or(EngineError::MissingBenchmark)?;
        let (_, port, bench) = self.returns.align(benchmark);

        if port.len() < 2 {
            return Err(EngineError::InsufficientData {
                needed: 2,
                available: port.len(),
            });
        }

        let n = port.len() as f64;
        let mean_p = port.iter().sum::<f64>() / n;
        let mean_b = bench.iter().sum::<f64>() / n;

        let covariance = port
            .iter()
            .zip(bench.iter())
            .map(|(p, b)| (p - mean_p) * (b - mean_b))
            .sum::<f64>()
            / n;
        let var_b = bench.iter().map(|b| (b - mean_b).powi(2)).sum::<f64>() / n;
        let std_p = standard_deviation(&port, mean_p);
        let std_b = var_b.sqrt();

        let beta = if var_b == 0.0 { 0.0 } else { covariance / var_b };
        let correlation = if std_p == 0.0 || std_b == 0.0 {
            0.0
        } else {
            covariance / (std_p * std_b)
        };

        // Jensen's alpha on annualized terms
        let annual_p = mean_p * TRADING_DAYS;
        let annual_b = mean_b * TRADING_DAYS;
        let alpha =
            annual_p - (self.risk_free_rate + beta * (annual_b - self.risk_free_rate));

        let active: Vec<f64> = port.iter().zip(bench.iter()).map(|(p, b)| p - b).collect();
        let mean_active = active.iter().sum::<f64>() / n;
        let tracking_error = standard_deviation(&active, mean_active) * TRADING_DAYS.sqrt();
        let information_ratio = if tracking_error == 0.0 {
            0.0
        } else {
            mean_active * TRADING_DAYS / tracking_error
        };

        Ok(RelativeMetrics {
            beta,
            alpha,
            correlation,
            tracking_error,
            information_ratio,
            n_aligned: port.len(),
        })
    }

    pub fn risk_adjusted_metrics(&self) -> RiskAdjustedMetrics {
        let stats = self.basic_statistics();
        let drawdowns = self.drawdown_analysis();

        let excess = stats.mean_annual - self.risk_free_rate;

        let sharpe_ratio = ratio_or_zero(excess, stats.volatility_annual);
        let sortino_ratio = ratio_or_zero(excess, stats.downside_deviation);
        let calmar_ratio = ratio_or_zero(
            stats.mean_annual,
            drawdowns.max_drawdown_pct.abs() / 100.0,
        );
        let sterling_ratio = ratio_or_zero(
            stats.mean_annual,
            drawdowns.avg_drawdown_pct.abs() / 100.0,
        );

        // Burke: excess return over the root of summed squared drawdowns
        let dd_sq_sum: f64 = drawdowns
            .episodes
            .iter()
            .map(|e| (e.depth_pct / 100.0).powi(2))
            .sum();
        let burke_ratio = ratio_or_zero(excess, dd_sq_sum.sqrt());

        RiskAdjustedMetrics {
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            sterling_ratio,
            burke_ratio,
        }
    }

    /// Compute every metric group; the single external entry point.
    pub fn calculate_all_metrics(&self, confidence_levels: &[f64]) -> Result<RiskReport> {
        let mut value_at_risk = Vec::with_capacity(confidence_levels.len());
        for &level in confidence_levels {
            value_at_risk.push(self.value_at_risk(level)?);
        }

        let relative = match self.relative_metrics() {
            Ok(m) => Some(m),
            Err(EngineError::MissingBenchmark) => None,
            Err(e) => return Err(e),
        };

        Ok(RiskReport {
            series_name: self.returns.name.clone(),
            basic: self.basic_statistics(),
            value_at_risk,
            drawdowns: self.drawdown_analysis(),
            ratios: self.advanced_ratios(),
            risk_adjusted: self.risk_adjusted_metrics(),
            relative,
        })
    }
}

/// Population standard deviation. Variance below 1e-24 is rounding residue
/// of a constant series and collapses to exactly 0, so the zero-denominator
/// ratio fallbacks engage.
fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    if var < 1e-24 {
        return 0.0;
    }
    var.sqrt()
}

/// RMS of a one-sided sample, 0 when empty.
fn partial_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Linear-interpolation percentile over a sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn mean_or_zero_i64(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(i as i64))
            .collect()
    }

    fn series(values: Vec<f64>) -> ReturnSeries {
        let n = values.len();
        ReturnSeries::new("test".to_string(), dates(n), values).unwrap()
    }

    fn oscillating(n: usize) -> ReturnSeries {
        series(
            (0..n)
                .map(|i| 0.0005 + 0.012 * (i as f64 * 0.9).sin())
                .collect(),
        )
    }

    #[test]
    fn test_basic_statistics_annualization() {
        let calc = RiskMetricsCalculator::new(oscillating(300), None).unwrap();
        let stats = calc.basic_statistics();

        assert_relative_eq!(stats.mean_annual, stats.mean_daily * 252.0, max_relative = 1e-12);
        assert_relative_eq!(
            stats.volatility_annual,
            stats.volatility_daily * 252.0_f64.sqrt(),
            max_relative = 1e-12
        );
        assert!(stats.best_day >= stats.worst_day);
        assert_eq!(stats.n_observations, 300);
    }

    #[test]
    fn test_constant_series_zero_fallbacks() {
        let calc = RiskMetricsCalculator::new(series(vec![0.001; 50]), None).unwrap();
        let stats = calc.basic_statistics();
        // Exactly zero despite the float residue of the two-pass variance
        assert_eq!(stats.volatility_daily, 0.0);
        assert_eq!(stats.volatility_annual, 0.0);
        assert_eq!(stats.skewness, 0.0);

        let ratios = calc.risk_adjusted_metrics();
        assert_eq!(ratios.sharpe_ratio, 0.0);
        assert!(ratios.sharpe_ratio.is_finite());
    }

    #[test]
    fn test_var_ordering_and_cvar() {
        let calc = RiskMetricsCalculator::new(oscillating(400), None)
            .unwrap()
            .with_seed(42);

        let var95 = calc.value_at_risk(0.95).unwrap();
        let var99 = calc.value_at_risk(0.99).unwrap();

        // Higher confidence means a deeper (more negative) quantile
        assert!(var99.historical.daily <= var95.historical.daily);
        assert!(var99.parametric.daily <= var95.parametric.daily);
        // CVaR averages the tail beyond VaR
        assert!(var95.conditional.daily <= var95.historical.daily);
        // Annualization is a fixed scaling
        assert!(
            (var95.historical.annual - var95.historical.daily * 252.0_f64.sqrt()).abs() < 1e-12
        );
    }

    #[test]
    fn test_monte_carlo_var_seeded_and_plausible() {
        let calc = RiskMetricsCalculator::new(oscillating(400), None)
            .unwrap()
            .with_seed(7);
        let a = calc.value_at_risk(0.95).unwrap();
        let b = calc.value_at_risk(0.95).unwrap();

        // Same seed, same estimate
        assert_eq!(a.monte_carlo.daily, b.monte_carlo.daily);
        // Sign and rough magnitude track the parametric estimate
        assert!(a.monte_carlo.daily < 0.0);
        assert!((a.monte_carlo.daily - a.parametric.daily).abs() < 0.01);
    }

    #[test]
    fn test_all_positive_series_has_no_drawdowns() {
        let calc = RiskMetricsCalculator::new(series(vec![0.002; 60]), None).unwrap();
        let dd = calc.drawdown_analysis();
        assert_eq!(dd.max_drawdown_pct, 0.0);
        assert_eq!(dd.n_episodes, 0);
        assert!(dd.episodes.is_empty());
    }

    #[test]
    fn test_drawdown_episode_segmentation() {
        // Up, crash, recover, then finish underwater
        let values = vec![0.05, 0.05, -0.10, -0.05, 0.20, 0.02, -0.08];
        let calc = RiskMetricsCalculator::new(series(values), None).unwrap();
        let dd = calc.drawdown_analysis();

        assert_eq!(dd.n_episodes, 2);
        assert!(dd.episodes[0].end.is_some());
        assert!(dd.episodes[1].end.is_none());
        assert!(dd.max_drawdown_pct < -13.0 && dd.max_drawdown_pct > -16.0);

        // Open episode contributes no duration stats
        let closed_duration = dd.episodes[0].duration_days().unwrap() as f64;
        assert!((dd.avg_duration_days - closed_duration).abs() < 1e-12);
    }

    #[test]
    fn test_omega_infinite_without_losses() {
        let calc = RiskMetricsCalculator::new(series(vec![0.01, 0.02, 0.005, 0.03]), None).unwrap();
        let ratios = calc.advanced_ratios();
        assert!(ratios.omega_ratio.is_infinite());
        assert_eq!(ratios.hit_rate, 1.0);
    }

    #[test]
    fn test_relative_metrics_requires_benchmark() {
        let calc = RiskMetricsCalculator::new(oscillating(100), None).unwrap();
        assert!(matches!(
            calc.relative_metrics(),
            Err(EngineError::MissingBenchmark)
        ));
    }

    #[test]
    fn test_beta_of_scaled_benchmark() {
        let bench = oscillating(200);
        // Portfolio = 1.5x benchmark, so beta must be 1.5 and correlation 1
        let port = ReturnSeries::new(
            "port".to_string(),
            bench.dates.clone(),
            bench.values.iter().map(|r| r * 1.5).collect(),
        )
        .unwrap();

        let calc = RiskMetricsCalculator::new(port, Some(bench)).unwrap();
        let rel = calc.relative_metrics().unwrap();
        assert_relative_eq!(rel.beta, 1.5, max_relative = 1e-9);
        assert_relative_eq!(rel.correlation, 1.0, max_relative = 1e-9);
        assert_eq!(rel.n_aligned, 200);
    }

    #[test]
    fn test_calculate_all_metrics_report() {
        let bench = oscillating(250);
        let port = series((0..250).map(|i| 0.0008 + 0.01 * (i as f64 * 1.3).cos()).collect());
        let calc = RiskMetricsCalculator::new(port, Some(bench))
            .unwrap()
            .with_seed(1);

        let report = calc.calculate_all_metrics(&[0.95, 0.99]).unwrap();
        assert_eq!(report.value_at_risk.len(), 2);
        assert!(report.relative.is_some());

        // Serializes into nested JSON
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("value_at_risk"));
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert!((percentile(&sorted, 25.0) - 2.0).abs() < 1e-12);
    }
}
