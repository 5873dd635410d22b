//! End-to-end scenarios across the optimizer, risk calculator, portfolio,
//! and backtester.

use chrono::{Datelike, Duration, NaiveDate};

use quantfolio::backtester::{MultiStrategyBacktester, ResultFormatter};
use quantfolio::metrics::RiskMetricsCalculator;
use quantfolio::optimizer::{PortfolioOptimizer, View};
use quantfolio::portfolio::{OptimizationMethod, RebalanceFrequency};
use quantfolio::strategies::{
    MeanReversionParams, MomentumParams, SmaCrossoverParams, StrategyConfig,
};
use quantfolio::types::{PriceSeries, ReturnMatrix, ReturnSeries, Weights};
use quantfolio::RunFileConfig;

fn daily_dates(n: usize) -> Vec<NaiveDate> {
    (0..n)
        .map(|i| NaiveDate::from_ymd_opt(2022, 1, 3).unwrap() + Duration::days(i as i64))
        .collect()
}

/// Three assets: high return / high vol, medium, low return / low vol.
fn three_asset_matrix() -> ReturnMatrix {
    let n = 504;
    let columns = vec![
        "GROWTH".to_string(),
        "BLEND".to_string(),
        "BOND".to_string(),
    ];
    // Distinct frequency pair per asset keeps the covariance full rank
    let make = |drift: f64, amp: f64, freq: f64| -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64 * freq;
                drift + amp * (x.sin() + 0.4 * (x * 2.3).cos())
            })
            .collect()
    };
    ReturnMatrix::from_columns(
        daily_dates(n),
        columns,
        vec![
            make(0.0012, 0.018, 0.61),
            make(0.0006, 0.010, 0.89),
            make(0.0002, 0.003, 1.27),
        ],
    )
    .unwrap()
}

#[test]
fn max_sharpe_prefers_better_risk_adjusted_assets() {
    let matrix = three_asset_matrix();
    let optimizer = PortfolioOptimizer::new(&matrix, 0.02).unwrap();

    let result = optimizer.maximum_sharpe_portfolio().unwrap();
    assert!(result.success);

    let sum: f64 = result.weights.values().sum();
    assert!((sum - 1.0).abs() < 1e-3);
    assert!(result.sharpe_ratio > 0.0);

    // The min-vol portfolio leans on the low-vol asset harder than max-Sharpe
    let min_vol = optimizer.minimum_volatility_portfolio().unwrap();
    assert!(min_vol.annual_volatility <= result.annual_volatility + 1e-9);
    let bond_min_vol = min_vol.weights.get("BOND").copied().unwrap();
    assert!(bond_min_vol > 0.5, "min-vol should favor BOND, got {}", bond_min_vol);
}

#[test]
fn efficient_frontier_spans_asset_means() {
    let optimizer = PortfolioOptimizer::new(&three_asset_matrix(), 0.02).unwrap();
    let frontier = optimizer.efficient_frontier(25).unwrap();
    assert!(frontier.len() >= 10);

    for pair in frontier.windows(2) {
        assert!(pair[1].target_return > pair[0].target_return);
        assert!(pair[1].annual_volatility >= pair[0].annual_volatility - 1e-6);
    }
}

#[test]
fn black_litterman_view_shifts_allocation() {
    let matrix = three_asset_matrix();
    let optimizer = PortfolioOptimizer::new(&matrix, 0.02).unwrap();

    let caps: Weights = [("GROWTH", 5.0e9), ("BLEND", 3.0e9), ("BOND", 2.0e9)]
        .iter()
        .map(|(s, c)| (s.to_string(), *c))
        .collect();

    let baseline = optimizer
        .black_litterman(
            &caps,
            &[View::Absolute {
                asset: "BOND".to_string(),
                expected_return: 0.05,
                confidence: 0.3,
            }],
            0.05,
        )
        .unwrap();

    let bullish_bond = optimizer
        .black_litterman(
            &caps,
            &[View::Absolute {
                asset: "BOND".to_string(),
                expected_return: 0.50,
                confidence: 0.95,
            }],
            0.05,
        )
        .unwrap();

    let baseline_bond = baseline.weights.get("BOND").copied().unwrap();
    let bullish_weight = bullish_bond.weights.get("BOND").copied().unwrap();
    assert!(
        bullish_weight > baseline_bond,
        "stronger view should raise the BOND weight: {} vs {}",
        bullish_weight,
        baseline_bond
    );

    // Relative views work too and the source optimizer is reusable
    let relative = optimizer
        .black_litterman(
            &caps,
            &[View::Relative {
                asset_a: "GROWTH".to_string(),
                asset_b: "BLEND".to_string(),
                outperformance: 0.10,
                confidence: 0.7,
            }],
            0.05,
        )
        .unwrap();
    assert!(relative.posterior_returns.is_some());
}

#[test]
fn full_risk_report_over_noisy_series() {
    let n = 504;
    let values: Vec<f64> = (0..n)
        .map(|i| 0.0004 + 0.011 * ((i as f64 * 0.83).sin() + 0.4 * (i as f64 * 0.17).cos()))
        .collect();
    let series = ReturnSeries::new("portfolio".to_string(), daily_dates(n), values).unwrap();

    let bench_values: Vec<f64> = (0..n)
        .map(|i| 0.0003 + 0.009 * (i as f64 * 0.83).sin())
        .collect();
    let benchmark =
        ReturnSeries::new("benchmark".to_string(), daily_dates(n), bench_values).unwrap();

    let calc = RiskMetricsCalculator::new(series, Some(benchmark))
        .unwrap()
        .with_seed(2024);
    let report = calc.calculate_all_metrics(&[0.90, 0.95, 0.99]).unwrap();

    assert_eq!(report.value_at_risk.len(), 3);
    let var95 = &report.value_at_risk[1];
    let var99 = &report.value_at_risk[2];
    assert!(var99.historical.daily <= var95.historical.daily);
    assert!(var95.conditional.daily <= var95.historical.daily);

    assert!(report.drawdowns.max_drawdown_pct < 0.0);
    assert!(report.drawdowns.n_episodes > 0);
    assert!(report.relative.is_some());
    let relative = report.relative.as_ref().unwrap();
    assert!(relative.beta > 0.0, "correlated benchmark implies positive beta");
    assert!(relative.correlation > 0.5);
}

#[test]
fn monthly_rebalanced_backtest_end_to_end() {
    // Two years of drifting, oscillating prices
    let n = 504;
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 * (1.0 + 0.0008 * i as f64 + 0.02 * (i as f64 * 0.23).sin()))
        .collect();
    let prices = PriceSeries::new("SPY".to_string(), daily_dates(n), closes).unwrap();

    let configs = vec![
        StrategyConfig::SmaCrossover(SmaCrossoverParams {
            fast_period: 10,
            slow_period: 30,
        }),
        StrategyConfig::Momentum(MomentumParams {
            lookback: 20,
            threshold: 0.5,
        }),
        StrategyConfig::MeanReversion(MeanReversionParams::default()),
    ];

    let mut backtester = MultiStrategyBacktester::new(
        prices,
        RebalanceFrequency::Monthly,
        OptimizationMethod::MaxSharpe,
        &configs,
    )
    .unwrap();

    let summary = backtester.run().unwrap();
    assert_eq!(summary.trading_days, n);
    assert_eq!(summary.equity_curve.len(), n);

    // One snapshot per calendar month boundary plus the first bar
    assert!(summary.weight_history.len() >= 12);
    for window in summary.weight_history.windows(2) {
        let (a, b) = (window[0].date, window[1].date);
        assert!(
            a.month() != b.month() || a.year() != b.year(),
            "two rebalances within one month: {} and {}",
            a,
            b
        );
        let sum: f64 = window[1].weights.values().sum();
        assert!(sum <= 1.0 + 1e-3, "weights must stay a valid allocation");
    }

    // Summary, trades, and equity curve agree with each other
    let last = summary.equity_curve.last().unwrap();
    assert!((last.equity - summary.final_equity).abs() < 1e-9);
    assert_eq!(
        summary.total_trades,
        summary.trades.len(),
    );

    // The equity curve feeds the risk calculator
    let report = summary
        .risk_calculator()
        .unwrap()
        .calculate_all_metrics(&[0.95])
        .unwrap();
    assert_eq!(report.basic.n_observations, n - 1);

    let json = ResultFormatter::to_json(&summary);
    assert!(json.contains("weight_history"));
}

#[test]
fn config_file_drives_a_run() {
    let toml = r#"
        [backtest]
        initial_capital = 10000.0

        [portfolio]
        rebalance_frequency = "weekly"
        optimization_method = "equal_weight"

        [[strategies]]
        kind = "sma_crossover"
        fast_period = 5
        slow_period = 15

        [[strategies]]
        kind = "momentum"
        lookback = 10
    "#;
    let config = RunFileConfig::from_toml(toml).unwrap();

    let n = 200;
    let closes: Vec<f64> = (0..n)
        .map(|i| 50.0 * (1.0 + 0.001 * i as f64 + 0.01 * (i as f64 * 0.4).cos()))
        .collect();
    let prices = PriceSeries::new("QQQ".to_string(), daily_dates(n), closes).unwrap();

    let summary = config.build_backtester(prices).unwrap().run().unwrap();
    assert_eq!(summary.initial_capital, 10_000.0);
    assert_eq!(summary.symbol, "QQQ");
    assert!(summary.trading_days == n);

    // Weekly schedule: rebalances at least every other week on daily data
    assert!(summary.weight_history.len() >= n / 14);
}

#[test]
fn constant_prices_produce_flat_summary() {
    let n = 120;
    let prices =
        PriceSeries::new("FLAT".to_string(), daily_dates(n), vec![100.0; n]).unwrap();

    let mut backtester = MultiStrategyBacktester::new(
        prices,
        RebalanceFrequency::Monthly,
        OptimizationMethod::EqualWeight,
        &[StrategyConfig::Momentum(MomentumParams::default())],
    )
    .unwrap();

    let summary = backtester.run().unwrap();
    assert_eq!(summary.total_return_pct, 0.0);
    assert_eq!(summary.sharpe_ratio, 0.0);
    assert_eq!(summary.max_drawdown_pct, 0.0);
    assert_eq!(summary.total_trades, 0);
}

#[test]
fn price_series_converts_to_returns() {
    let closes = vec![100.0, 102.0, 101.0, 103.02];
    let prices = PriceSeries::new("T".to_string(), daily_dates(4), closes).unwrap();
    let returns = prices.to_returns().unwrap();

    assert_eq!(returns.values.len(), 3);
    assert!((returns.values[0] - 0.02).abs() < 1e-12);
    assert!((returns.values[1] + 0.009803921568627416).abs() < 1e-9);
    assert_eq!(returns.dates[0], daily_dates(4)[1]);
}
