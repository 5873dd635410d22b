//! Portfolio optimization over a multi-asset return matrix.
//!
//! Implements the Markowitz mean-variance family (minimum volatility, maximum
//! Sharpe, target-return efficient frontier), risk parity, and the
//! Black-Litterman model. Quadratic subproblems are solved with the Clarabel
//! interior-point solver; solver failures are reported through
//! `OptimizationResult::success` rather than raised, so callers can decide
//! whether to surface or fall back.

use crate::error::{EngineError, Result};
use crate::types::{ReturnMatrix, Weights};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Trading periods per year for annualization of daily data.
pub const TRADING_DAYS: f64 = 252.0;

/// Default risk-aversion coefficient for Black-Litterman reverse optimization.
const DEFAULT_RISK_AVERSION: f64 = 2.5;

/// Result of a single optimization call. Created fresh per call, never
/// mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Asset weights (long-only regimes sum to ~1).
    pub weights: Weights,
    /// Annualized expected portfolio return under the fitted estimates.
    pub annual_return: f64,
    /// Annualized portfolio volatility.
    pub annual_volatility: f64,
    /// Sharpe ratio (0 when volatility is 0).
    pub sharpe_ratio: f64,
    /// Whether the solver converged. `false` carries best-effort weights.
    pub success: bool,
    /// Per-asset share of total portfolio risk (risk parity only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_contributions: Option<Weights>,
    /// Posterior annualized returns (Black-Litterman only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posterior_returns: Option<Weights>,
}

/// One point on the efficient frontier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Target annualized return the point was solved for.
    pub target_return: f64,
    /// Annualized volatility achieved.
    pub annual_volatility: f64,
    /// Sharpe ratio at this point.
    pub sharpe_ratio: f64,
    /// Optimal weights at this point.
    pub weights: Weights,
}

/// An investor view for the Black-Litterman model.
///
/// Confidence is in (0, 1]: higher means more certain, shrinking the view's
/// uncertainty `tau * (1 - confidence)` in the Omega diagonal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum View {
    /// Asset will return `expected_return` (annualized).
    Absolute {
        asset: String,
        expected_return: f64,
        confidence: f64,
    },
    /// `asset_a` will outperform `asset_b` by `outperformance` (annualized).
    Relative {
        asset_a: String,
        asset_b: String,
        outperformance: f64,
        confidence: f64,
    },
}

impl View {
    fn confidence(&self) -> f64 {
        match self {
            View::Absolute { confidence, .. } => *confidence,
            View::Relative { confidence, .. } => *confidence,
        }
    }
}

/// Markowitz-style portfolio optimizer.
///
/// Column means and the full covariance matrix are computed once at
/// construction and are immutable for the optimizer's lifetime; build a new
/// optimizer when the underlying data changes (e.g. on each rebalance).
pub struct PortfolioOptimizer {
    symbols: Vec<String>,
    /// Annualized expected returns per asset.
    mean_returns: Vec<f64>,
    /// Annualized covariance matrix.
    cov_matrix: Vec<Vec<f64>>,
    /// Annualized risk-free rate.
    risk_free_rate: f64,
}

impl PortfolioOptimizer {
    /// Fit an optimizer to a return matrix.
    ///
    /// Requires at least two observations so the covariance is defined.
    pub fn new(returns: &ReturnMatrix, risk_free_rate: f64) -> Result<Self> {
        let n = returns.n_assets();
        let t = returns.n_periods();
        if t < 2 {
            return Err(EngineError::InsufficientData {
                needed: 2,
                available: t,
            });
        }

        let columns: Vec<Vec<f64>> = (0..n).map(|i| returns.column_values(i)).collect();
        let daily_means: Vec<f64> = columns
            .iter()
            .map(|c| c.iter().sum::<f64>() / t as f64)
            .collect();

        let mean_returns: Vec<f64> = daily_means.iter().map(|m| m * TRADING_DAYS).collect();

        let mut cov_matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let cov = columns[i]
                    .iter()
                    .zip(columns[j].iter())
                    .map(|(ri, rj)| (ri - daily_means[i]) * (rj - daily_means[j]))
                    .sum::<f64>()
                    / t as f64;
                cov_matrix[i][j] = cov * TRADING_DAYS;
                cov_matrix[j][i] = cov_matrix[i][j];
            }
        }

        Ok(Self {
            symbols: returns.columns().to_vec(),
            mean_returns,
            cov_matrix,
            risk_free_rate,
        })
    }

    /// Build directly from precomputed annualized estimates.
    pub fn from_estimates(
        symbols: Vec<String>,
        mean_returns: Vec<f64>,
        cov_matrix: Vec<Vec<f64>>,
        risk_free_rate: f64,
    ) -> Result<Self> {
        let n = symbols.len();
        if n == 0 {
            return Err(EngineError::InvalidInput(
                "Need at least one asset".to_string(),
            ));
        }
        if mean_returns.len() != n {
            return Err(EngineError::InvalidInput(
                "Expected returns length must match number of assets".to_string(),
            ));
        }
        if cov_matrix.len() != n || cov_matrix.iter().any(|row| row.len() != n) {
            return Err(EngineError::InvalidInput(
                "Covariance matrix must be square and match number of assets".to_string(),
            ));
        }
        Ok(Self {
            symbols,
            mean_returns,
            cov_matrix,
            risk_free_rate,
        })
    }

    /// Asset identifiers in column order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Annualized expected returns, keyed by asset.
    pub fn mean_returns(&self) -> Weights {
        self.weights_map(&self.mean_returns)
    }

    /// Market-implied equilibrium returns `Pi = lambda * Sigma * w_mkt`,
    /// the prior the Black-Litterman blend starts from.
    pub fn implied_returns(&self, market_caps: &Weights) -> Result<Weights> {
        let market_weights = self.market_weights(market_caps)?;
        let implied: Vec<f64> = self
            .cov_times(&market_weights)
            .iter()
            .map(|v| v * DEFAULT_RISK_AVERSION)
            .collect();
        Ok(self.weights_map(&implied))
    }

    /// Minimize annualized volatility; with `target_return` set, additionally
    /// require the portfolio's annualized expected return to equal it.
    ///
    /// Always enforces `sum(w) = 1` and the long-only box `0 <= w_i <= 1`
    /// unless per-asset `bounds` are supplied. Without a target the Sharpe
    /// ratio is maximized instead; bounded max-Sharpe is solved as a sweep
    /// of bounded return-floor problems, since the homogeneous transform
    /// cannot carry box constraints. Solver failure or an infeasible target
    /// is reported via `success = false` with equal weights as best effort.
    pub fn mean_variance_optimization(
        &self,
        target_return: Option<f64>,
        bounds: Option<&[(f64, f64)]>,
    ) -> Result<OptimizationResult> {
        let n = self.symbols.len();
        if let Some(b) = bounds {
            if b.len() != n {
                return Err(EngineError::InvalidInput(
                    "Bounds length must match number of assets".to_string(),
                ));
            }
        }

        let solved = match (target_return, bounds) {
            (Some(target), _) => self.solve_qp(Some(ReturnTarget::Exact(target)), bounds),
            (None, Some(b)) => self.solve_max_sharpe_bounded(b),
            (None, None) => self.solve_max_sharpe(),
        };

        match solved {
            Ok(weights) => Ok(self.build_result(weights, true)),
            Err(e) => {
                warn!("Mean-variance optimization failed: {}", e);
                Ok(self.build_result(vec![1.0 / n as f64; n], false))
            }
        }
    }

    /// Minimum-volatility portfolio (no return target).
    pub fn minimum_volatility_portfolio(&self) -> Result<OptimizationResult> {
        let n = self.symbols.len();
        match self.solve_qp(None, None) {
            Ok(weights) => Ok(self.build_result(weights, true)),
            Err(e) => {
                warn!("Minimum-volatility optimization failed: {}", e);
                Ok(self.build_result(vec![1.0 / n as f64; n], false))
            }
        }
    }

    /// Maximum-Sharpe portfolio.
    pub fn maximum_sharpe_portfolio(&self) -> Result<OptimizationResult> {
        self.mean_variance_optimization(None, None)
    }

    /// Sweep target returns linearly between the lowest and highest
    /// single-asset annualized mean, solving a minimum-variance problem with
    /// the target as a return floor at each point. The floor keeps
    /// volatility non-decreasing in the target. Infeasible points are
    /// silently excluded.
    pub fn efficient_frontier(&self, n_portfolios: usize) -> Result<Vec<FrontierPoint>> {
        if n_portfolios < 2 {
            return Err(EngineError::InvalidInput(
                "Frontier needs at least 2 portfolios".to_string(),
            ));
        }

        let min_ret = self
            .mean_returns
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let max_ret = self
            .mean_returns
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let step = (max_ret - min_ret) / (n_portfolios - 1) as f64;
        let mut frontier = Vec::new();

        for k in 0..n_portfolios {
            let target = min_ret + step * k as f64;
            match self.solve_qp(Some(ReturnTarget::Floor(target)), None) {
                Ok(weights) => {
                    let vol = self.portfolio_volatility(&weights);
                    let ret = self.portfolio_return(&weights);
                    frontier.push(FrontierPoint {
                        target_return: target,
                        annual_volatility: vol,
                        sharpe_ratio: self.sharpe(ret, vol),
                        weights: self.weights_map(&weights),
                    });
                }
                Err(_) => continue, // infeasible target, skip point
            }
        }

        Ok(frontier)
    }

    /// Risk-parity portfolio: each asset contributes `1/n` of total risk.
    ///
    /// Uses a multiplicative fixed-point iteration on the covariance matrix;
    /// converges for non-degenerate covariance under the long-only simplex.
    pub fn risk_parity(&self) -> Result<OptimizationResult> {
        let n = self.symbols.len();
        let mut weights = vec![1.0 / n as f64; n];

        let mut converged = false;
        for _ in 0..10_000 {
            let marginal = self.cov_times(&weights);
            if marginal.iter().any(|&m| m <= 0.0) {
                break; // covariance too degenerate for the fixed point
            }

            let variance: f64 = weights.iter().zip(marginal.iter()).map(|(w, m)| w * m).sum();
            if variance <= 0.0 {
                break;
            }

            // Damped multiplicative update toward equal contributions:
            // w_i <- w_i * sqrt(target / RC_i), then renormalize
            let target = variance / n as f64;
            let mut next: Vec<f64> = weights
                .iter()
                .zip(marginal.iter())
                .map(|(&w, &m)| w * (target / (w * m)).sqrt())
                .collect();
            let total: f64 = next.iter().sum();
            for w in &mut next {
                *w /= total;
            }

            let delta: f64 = next
                .iter()
                .zip(weights.iter())
                .map(|(a, b)| (a - b).abs())
                .sum();
            weights = next;

            if delta < 1e-12 {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!("Risk parity iteration did not fully converge; reporting best effort");
        }

        let contributions = self.risk_contributions(&weights);
        let mut result = self.build_result(weights, converged);
        result.risk_contributions = Some(self.weights_map(&contributions));
        Ok(result)
    }

    /// Black-Litterman: blend market-implied equilibrium returns with
    /// investor views and return the maximum-Sharpe portfolio under the
    /// posterior estimates.
    ///
    /// This optimizer is left untouched; the posterior is solved on a fresh
    /// instance. Fails immediately if `market_caps` or `views` is empty, a
    /// view references an unknown asset, or a confidence is outside (0, 1].
    pub fn black_litterman(
        &self,
        market_caps: &Weights,
        views: &[View],
        tau: f64,
    ) -> Result<OptimizationResult> {
        let n = self.symbols.len();

        if market_caps.is_empty() {
            return Err(EngineError::InvalidInput(
                "Market caps must not be empty".to_string(),
            ));
        }
        if views.is_empty() {
            return Err(EngineError::InvalidInput(
                "At least one view is required".to_string(),
            ));
        }
        if tau <= 0.0 || tau > 1.0 {
            return Err(EngineError::InvalidInput(
                "Tau must be in (0, 1] (typically 0.025-0.05)".to_string(),
            ));
        }
        for view in views {
            let c = view.confidence();
            if c <= 0.0 || c > 1.0 {
                return Err(EngineError::InvalidInput(
                    "View confidence must be in (0, 1]".to_string(),
                ));
            }
        }

        let market_weights = self.market_weights(market_caps)?;

        // Equilibrium prior: Pi = lambda * Sigma * w_mkt
        let implied: Vec<f64> = self
            .cov_times(&market_weights)
            .iter()
            .map(|v| v * DEFAULT_RISK_AVERSION)
            .collect();

        // Pick matrix P, view vector Q, uncertainty diagonal Omega
        let k = views.len();
        let mut p_matrix = vec![vec![0.0; n]; k];
        let mut q_vector = vec![0.0; k];
        let mut omega_diag = vec![0.0; k];

        for (vi, view) in views.iter().enumerate() {
            match view {
                View::Absolute {
                    asset,
                    expected_return,
                    confidence,
                } => {
                    let i = self.index_of(asset)?;
                    p_matrix[vi][i] = 1.0;
                    q_vector[vi] = *expected_return;
                    omega_diag[vi] = (tau * (1.0 - confidence)).max(1e-8);
                }
                View::Relative {
                    asset_a,
                    asset_b,
                    outperformance,
                    confidence,
                } => {
                    let a = self.index_of(asset_a)?;
                    let b = self.index_of(asset_b)?;
                    p_matrix[vi][a] = 1.0;
                    p_matrix[vi][b] = -1.0;
                    q_vector[vi] = *outperformance;
                    omega_diag[vi] = (tau * (1.0 - confidence)).max(1e-8);
                }
            }
        }

        // Posterior: E[R] = [(tau Sigma)^-1 + P' Omega^-1 P]^-1
        //                   [(tau Sigma)^-1 Pi + P' Omega^-1 Q]
        let tau_cov: Vec<Vec<f64>> = self
            .cov_matrix
            .iter()
            .map(|row| row.iter().map(|v| tau * v).collect())
            .collect();
        let tau_cov_inv = invert_matrix(&tau_cov)?;

        let mut precision = tau_cov_inv.clone();
        for i in 0..n {
            for j in 0..n {
                for vi in 0..k {
                    precision[i][j] += p_matrix[vi][i] * p_matrix[vi][j] / omega_diag[vi];
                }
            }
        }
        let posterior_cov = invert_matrix(&precision)?;

        let mut rhs = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                rhs[i] += tau_cov_inv[i][j] * implied[j];
            }
            for vi in 0..k {
                rhs[i] += p_matrix[vi][i] * q_vector[vi] / omega_diag[vi];
            }
        }

        let mut posterior_returns = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                posterior_returns[i] += posterior_cov[i][j] * rhs[j];
            }
        }

        // Solve max-Sharpe on a fresh optimizer over the posterior estimates
        let posterior = Self::from_estimates(
            self.symbols.clone(),
            posterior_returns.clone(),
            self.cov_matrix.clone(),
            self.risk_free_rate,
        )?;
        let mut result = posterior.maximum_sharpe_portfolio()?;
        result.posterior_returns = Some(self.weights_map(&posterior_returns));
        Ok(result)
    }

    /// Annualized expected return of a weight vector (column order).
    fn portfolio_return(&self, weights: &[f64]) -> f64 {
        weights
            .iter()
            .zip(self.mean_returns.iter())
            .map(|(w, r)| w * r)
            .sum()
    }

    /// Annualized volatility of a weight vector (column order).
    fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        let marginal = self.cov_times(weights);
        let variance: f64 = weights.iter().zip(marginal.iter()).map(|(w, m)| w * m).sum();
        variance.max(0.0).sqrt()
    }

    fn sharpe(&self, annual_return: f64, annual_volatility: f64) -> f64 {
        if annual_volatility == 0.0 {
            0.0
        } else {
            (annual_return - self.risk_free_rate) / annual_volatility
        }
    }

    /// Sigma * w.
    fn cov_times(&self, weights: &[f64]) -> Vec<f64> {
        self.cov_matrix
            .iter()
            .map(|row| row.iter().zip(weights.iter()).map(|(c, w)| c * w).sum())
            .collect()
    }

    /// Normalized risk contributions (fractions of total variance).
    fn risk_contributions(&self, weights: &[f64]) -> Vec<f64> {
        let marginal = self.cov_times(weights);
        let variance: f64 = weights.iter().zip(marginal.iter()).map(|(w, m)| w * m).sum();
        if variance <= 0.0 {
            return vec![0.0; weights.len()];
        }
        weights
            .iter()
            .zip(marginal.iter())
            .map(|(w, m)| w * m / variance)
            .collect()
    }

    /// Cap weights in column order, normalized to sum to 1.
    fn market_weights(&self, market_caps: &Weights) -> Result<Vec<f64>> {
        let mut caps = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let cap = market_caps.get(symbol).copied().ok_or_else(|| {
                EngineError::InvalidInput(format!("Missing market cap for asset {}", symbol))
            })?;
            caps.push(cap);
        }
        let total_cap: f64 = caps.iter().sum();
        if total_cap <= 0.0 {
            return Err(EngineError::InvalidInput(
                "Total market cap must be positive".to_string(),
            ));
        }
        Ok(caps.iter().map(|c| c / total_cap).collect())
    }

    fn index_of(&self, symbol: &str) -> Result<usize> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("View references unknown asset: {}", symbol))
            })
    }

    fn weights_map(&self, values: &[f64]) -> Weights {
        self.symbols
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect()
    }

    fn build_result(&self, weights: Vec<f64>, success: bool) -> OptimizationResult {
        let annual_return = self.portfolio_return(&weights);
        let annual_volatility = self.portfolio_volatility(&weights);
        OptimizationResult {
            weights: self.weights_map(&weights),
            annual_return,
            annual_volatility,
            sharpe_ratio: self.sharpe(annual_return, annual_volatility),
            success,
            risk_contributions: None,
            posterior_returns: None,
        }
    }

    /// Minimize `w' Sigma w` s.t. `sum(w) = 1`, an optional return target
    /// (exact or floor), and per-asset box constraints (default long-only
    /// `[0, 1]`).
    fn solve_qp(
        &self,
        target: Option<ReturnTarget>,
        bounds: Option<&[(f64, f64)]>,
    ) -> Result<Vec<f64>> {
        use clarabel::algebra::*;
        use clarabel::solver::*;

        let n = self.symbols.len();
        let default_bounds = vec![(0.0, 1.0); n];
        let bounds = bounds.unwrap_or(&default_bounds);

        let exact = matches!(target, Some(ReturnTarget::Exact(_)));
        let floor = matches!(target, Some(ReturnTarget::Floor(_)));
        let n_eq = if exact { 2 } else { 1 };
        let n_floor = if floor { 1 } else { 0 };

        let p = csc_from_dense(&self.cov_matrix);
        let q = vec![0.0; n];

        // Constraint rows: [equalities | return floor | w >= lb | w <= ub]
        let mut a_data = Vec::new();
        let mut a_indices = Vec::new();
        let mut a_indptr = vec![0];

        for j in 0..n {
            a_data.push(1.0);
            a_indices.push(0); // sum(w) = 1
            if exact {
                a_data.push(self.mean_returns[j]);
                a_indices.push(1); // mu . w = target
            }
            if floor {
                a_data.push(-self.mean_returns[j]);
                a_indices.push(n_eq); // -(mu . w) <= -target
            }
            a_data.push(-1.0);
            a_indices.push(n_eq + n_floor + j); // -w_j <= -lb_j
            a_data.push(1.0);
            a_indices.push(n_eq + n_floor + n + j); // w_j <= ub_j

            a_indptr.push(a_data.len());
        }

        let a = CscMatrix::new(n_eq + n_floor + 2 * n, n, a_indptr, a_indices, a_data);

        let mut b = vec![1.0];
        match target {
            Some(ReturnTarget::Exact(t)) => b.push(t),
            Some(ReturnTarget::Floor(t)) => b.push(-t),
            None => {}
        }
        b.extend(bounds.iter().map(|(lb, _)| -lb));
        b.extend(bounds.iter().map(|(_, ub)| *ub));

        let cones = [ZeroConeT(n_eq), NonnegativeConeT(n_floor + 2 * n)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(200)
            .verbose(false)
            .build()
            .map_err(|e| {
                EngineError::OptimizationError(format!("Failed to build settings: {}", e))
            })?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            EngineError::OptimizationError(format!("Failed to create solver: {:?}", e))
        })?;

        solver.solve();

        if !matches!(solver.solution.status, SolverStatus::Solved) {
            return Err(EngineError::OptimizationError(format!(
                "Optimization failed with status: {:?}",
                solver.solution.status
            )));
        }

        // Clip numerical noise to each asset's own lower bound; a bound
        // below zero legitimately allows a short weight.
        Ok(solver
            .solution
            .x
            .iter()
            .zip(bounds.iter())
            .map(|(&w, &(lb, _))| w.max(lb))
            .collect())
    }

    /// Maximize Sharpe via the homogeneous transform: minimize `y' Sigma y`
    /// s.t. `(mu - rf)' y = 1`, `y >= 0`, then normalize `y` to sum to 1.
    fn solve_max_sharpe(&self) -> Result<Vec<f64>> {
        use clarabel::algebra::*;
        use clarabel::solver::*;

        let n = self.symbols.len();
        let excess: Vec<f64> = self
            .mean_returns
            .iter()
            .map(|r| r - self.risk_free_rate)
            .collect();

        // No asset with positive excess return: Sharpe ceiling is the
        // minimum-volatility portfolio.
        if excess.iter().all(|&r| r <= 0.0) {
            return self.solve_qp(None, None);
        }

        let p = csc_from_dense(&self.cov_matrix);
        let q = vec![0.0; n];

        let mut a_data = Vec::new();
        let mut a_indices = Vec::new();
        let mut a_indptr = vec![0];

        for (j, &e) in excess.iter().enumerate() {
            a_data.push(e);
            a_indices.push(0); // excess' y = 1
            a_data.push(-1.0);
            a_indices.push(1 + j); // y >= 0
            a_indptr.push(a_data.len());
        }

        let a = CscMatrix::new(1 + n, n, a_indptr, a_indices, a_data);
        let mut b = vec![1.0];
        b.extend(vec![0.0; n]);
        let cones = [ZeroConeT(1), NonnegativeConeT(n)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(200)
            .verbose(false)
            .build()
            .map_err(|e| {
                EngineError::OptimizationError(format!("Failed to build settings: {}", e))
            })?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            EngineError::OptimizationError(format!("Failed to create solver: {:?}", e))
        })?;

        solver.solve();

        if !matches!(solver.solution.status, SolverStatus::Solved) {
            return Err(EngineError::OptimizationError(format!(
                "Max Sharpe optimization failed: {:?}",
                solver.solution.status
            )));
        }

        let total: f64 = solver.solution.x.iter().sum();
        if total <= 0.0 {
            return Err(EngineError::OptimizationError(
                "Max Sharpe solution degenerate (non-positive weight sum)".to_string(),
            ));
        }

        Ok(solver
            .solution
            .x
            .iter()
            .map(|&y| (y / total).max(0.0))
            .collect())
    }

    /// Maximum Sharpe under per-asset box constraints: solve a grid of
    /// bounded minimum-variance problems with a return floor swept across
    /// the single-asset mean range and keep the best Sharpe. Infeasible
    /// floors are skipped; no feasible point at all is an error.
    fn solve_max_sharpe_bounded(&self, bounds: &[(f64, f64)]) -> Result<Vec<f64>> {
        const SWEEP_POINTS: usize = 50;

        let min_ret = self
            .mean_returns
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let max_ret = self
            .mean_returns
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let step = (max_ret - min_ret) / (SWEEP_POINTS - 1) as f64;

        let mut best: Option<(f64, Vec<f64>)> = None;
        for k in 0..SWEEP_POINTS {
            let target = min_ret + step * k as f64;
            let Ok(weights) = self.solve_qp(Some(ReturnTarget::Floor(target)), Some(bounds))
            else {
                continue;
            };
            let sharpe = self.sharpe(
                self.portfolio_return(&weights),
                self.portfolio_volatility(&weights),
            );
            if best.as_ref().map_or(true, |(s, _)| sharpe > *s) {
                best = Some((sharpe, weights));
            }
        }

        best.map(|(_, weights)| weights).ok_or_else(|| {
            EngineError::OptimizationError(
                "No feasible portfolio under the supplied bounds".to_string(),
            )
        })
    }
}

/// Return constraint attached to a minimum-variance solve.
#[derive(Debug, Clone, Copy)]
enum ReturnTarget {
    /// Portfolio return must equal the target.
    Exact(f64),
    /// Portfolio return must be at least the target.
    Floor(f64),
}

/// Build a Clarabel CSC matrix from a dense symmetric matrix.
fn csc_from_dense(dense: &[Vec<f64>]) -> clarabel::algebra::CscMatrix<f64> {
    let n = dense.len();
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = vec![0];

    for j in 0..n {
        for (i, row) in dense.iter().enumerate() {
            let val = row[j];
            if val.abs() > 1e-12 {
                data.push(val);
                indices.push(i);
            }
        }
        indptr.push(data.len());
    }

    clarabel::algebra::CscMatrix::new(n, n, indptr, indices, data)
}

/// Invert a small dense matrix via Gaussian elimination with partial
/// pivoting.
fn invert_matrix(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();

    let mut aug = vec![vec![0.0; 2 * n]; n];
    for (i, row) in matrix.iter().enumerate() {
        aug[i][..n].copy_from_slice(row);
        aug[i][n + i] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in (col + 1)..n {
            if aug[row][col].abs() > aug[max_row][col].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            aug.swap(col, max_row);
        }

        if aug[col][col].abs() < 1e-12 {
            return Err(EngineError::OptimizationError(
                "Matrix is singular or nearly singular".to_string(),
            ));
        }

        for row in (col + 1)..n {
            let factor = aug[row][col] / aug[col][col];
            for j in col..(2 * n) {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    for col in (0..n).rev() {
        let pivot = aug[col][col];
        for j in 0..(2 * n) {
            aug[col][j] /= pivot;
        }
        for row in 0..col {
            let factor = aug[row][col];
            for j in 0..(2 * n) {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}
