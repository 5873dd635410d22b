//! Core data types for the optimization and risk analytics engine.

use crate::error::{EngineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Mapping from asset identifier to portfolio weight.
pub type Weights = HashMap<String, f64>;

/// Directional signal emitted by a strategy for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Signal {
    /// Long exposure.
    Long,
    /// Short exposure.
    Short,
    /// No exposure.
    #[default]
    Flat,
}

impl Signal {
    /// Numeric value of the signal: +1 for long, -1 for short, 0 for flat.
    pub fn value(&self) -> f64 {
        match self {
            Signal::Long => 1.0,
            Signal::Short => -1.0,
            Signal::Flat => 0.0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
            Signal::Flat => write!(f, "FLAT"),
        }
    }
}

/// A dated series of periodic fractional returns for one asset or strategy.
///
/// Construction validates that dates are strictly increasing and drops any
/// observation with a non-finite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    /// Asset or strategy identifier.
    pub name: String,
    /// Strictly increasing observation dates.
    pub dates: Vec<NaiveDate>,
    /// Periodic fractional returns (not prices).
    pub values: Vec<f64>,
}

impl ReturnSeries {
    /// Create a new return series with validation.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        if dates.len() != values.len() {
            return Err(EngineError::InvalidInput(format!(
                "Series {}: {} dates but {} values",
                name,
                dates.len(),
                values.len()
            )));
        }

        // Drop non-finite observations
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = dates
            .into_iter()
            .zip(values)
            .filter(|(_, v)| v.is_finite())
            .unzip();

        if dates.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "Series {} has no finite observations",
                name
            )));
        }

        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EngineError::InvalidInput(format!(
                "Series {} dates must be strictly increasing",
                name
            )));
        }

        Ok(Self {
            name,
            dates,
            values,
        })
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Align this series with another on their common dates (inner join).
    ///
    /// Returns the shared dates together with both series' values on those
    /// dates. Unmatched dates are dropped.
    pub fn align(&self, other: &ReturnSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
        let other_index: HashMap<NaiveDate, f64> = other
            .dates
            .iter()
            .copied()
            .zip(other.values.iter().copied())
            .collect();

        let mut dates = Vec::new();
        let mut own = Vec::new();
        let mut theirs = Vec::new();

        for (date, value) in self.dates.iter().zip(self.values.iter()) {
            if let Some(&bench) = other_index.get(date) {
                dates.push(*date);
                own.push(*value);
                theirs.push(bench);
            }
        }

        (dates, own, theirs)
    }
}

/// A dated matrix of periodic fractional returns across multiple assets.
///
/// Rows are observation dates, columns are uniquely named assets or
/// strategies. Rows containing any NaN are dropped at construction; a column
/// that is entirely NaN is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMatrix {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    /// Row-major return data, `rows[t][i]` = return of asset i at date t.
    rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Create a new return matrix with validation.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(EngineError::InvalidInput(
                "Return matrix has no columns".to_string(),
            ));
        }
        if dates.len() != rows.len() {
            return Err(EngineError::InvalidInput(format!(
                "Return matrix: {} dates but {} rows",
                dates.len(),
                rows.len()
            )));
        }
        if rows.iter().any(|r| r.len() != columns.len()) {
            return Err(EngineError::InvalidInput(
                "Return matrix rows must match the number of columns".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "Duplicate column name: {}",
                    column
                )));
            }
        }

        // Reject columns with no usable data at all
        for (i, column) in columns.iter().enumerate() {
            if !rows.is_empty() && rows.iter().all(|r| !r[i].is_finite()) {
                return Err(EngineError::InvalidInput(format!(
                    "Column {} has no finite observations",
                    column
                )));
            }
        }

        // Alignment policy: drop any row with a non-finite entry
        let (dates, rows): (Vec<NaiveDate>, Vec<Vec<f64>>) = dates
            .into_iter()
            .zip(rows)
            .filter(|(_, r)| r.iter().all(|v| v.is_finite()))
            .unzip();

        if rows.is_empty() {
            return Err(EngineError::InvalidInput(
                "Return matrix has no complete rows".to_string(),
            ));
        }

        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EngineError::InvalidInput(
                "Return matrix dates must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            dates,
            columns,
            rows,
        })
    }

    /// Build a matrix from per-asset columns sharing one date index.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        names: Vec<String>,
        column_data: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if names.len() != column_data.len() {
            return Err(EngineError::InvalidInput(format!(
                "{} column names but {} columns",
                names.len(),
                column_data.len()
            )));
        }
        if column_data.iter().any(|c| c.len() != dates.len()) {
            return Err(EngineError::InvalidInput(
                "All columns must match the date index length".to_string(),
            ));
        }

        let n = dates.len();
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|t| column_data.iter().map(|c| c[t]).collect())
            .collect();

        Self::new(dates, names, rows)
    }

    /// Number of assets (columns).
    pub fn n_assets(&self) -> usize {
        self.columns.len()
    }

    /// Number of observations (rows).
    pub fn n_periods(&self) -> usize {
        self.rows.len()
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Observation dates in order.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Row of returns at observation index `t`.
    pub fn row(&self, t: usize) -> &[f64] {
        &self.rows[t]
    }

    /// Values of column `i` across all observations.
    pub fn column_values(&self, i: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[i]).collect()
    }

    /// Extract a single column as a return series.
    pub fn column(&self, name: &str) -> Result<ReturnSeries> {
        let i = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EngineError::InvalidInput(format!("Unknown column: {}", name)))?;
        ReturnSeries::new(name, self.dates.clone(), self.column_values(i))
    }
}

/// A dated series of closing prices for one symbol (or a consolidated
/// universe), the raw input to the backtester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Symbol or universe identifier.
    pub symbol: String,
    /// Strictly increasing observation dates.
    pub dates: Vec<NaiveDate>,
    /// Closing prices.
    pub closes: Vec<f64>,
}

impl PriceSeries {
    /// Create a new price series with validation.
    pub fn new(
        symbol: impl Into<String>,
        dates: Vec<NaiveDate>,
        closes: Vec<f64>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if dates.len() != closes.len() {
            return Err(EngineError::InvalidInput(format!(
                "Price series {}: {} dates but {} closes",
                symbol,
                dates.len(),
                closes.len()
            )));
        }
        if closes.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "Price series {} contains non-positive or non-finite prices",
                symbol
            )));
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EngineError::InvalidInput(format!(
                "Price series {} dates must be strictly increasing",
                symbol
            )));
        }

        Ok(Self {
            symbol,
            dates,
            closes,
        })
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// Whether the series holds no bars.
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Convert to periodic fractional returns (one fewer observation).
    pub fn to_returns(&self) -> Result<ReturnSeries> {
        if self.len() < 2 {
            return Err(EngineError::InsufficientData {
                needed: 2,
                available: self.len(),
            });
        }
        let values: Vec<f64> = self
            .closes
            .windows(2)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        ReturnSeries::new(self.symbol.clone(), self.dates[1..].to_vec(), values)
    }
}

/// A completed or open long trade recorded by the backtester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
}

impl Trade {
    /// Open a new trade.
    pub fn open(entry_date: NaiveDate, entry_price: f64) -> Self {
        Self {
            entry_date,
            entry_price,
            exit_date: None,
            exit_price: None,
        }
    }

    /// Close the trade.
    pub fn close(&mut self, exit_date: NaiveDate, exit_price: f64) {
        self.exit_date = Some(exit_date);
        self.exit_price = Some(exit_price);
    }

    /// Check if the trade is closed.
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some()
    }

    /// Return percentage of the trade, if closed.
    pub fn return_pct(&self) -> Option<f64> {
        self.exit_price
            .map(|exit| (exit - self.entry_price) / self.entry_price * 100.0)
    }

    /// Holding period in days, if closed.
    pub fn holding_days(&self) -> Option<i64> {
        self.exit_date
            .map(|exit| (exit - self.entry_date).num_days())
    }
}

/// Equity snapshot at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub drawdown_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_signal_values() {
        assert_eq!(Signal::Long.value(), 1.0);
        assert_eq!(Signal::Short.value(), -1.0);
        assert_eq!(Signal::Flat.value(), 0.0);
        assert_eq!(Signal::default(), Signal::Flat);
    }

    #[test]
    fn test_return_series_validation() {
        let series = ReturnSeries::new(
            "A",
            vec![d(2024, 1, 1), d(2024, 1, 2)],
            vec![0.01, -0.02],
        )
        .unwrap();
        assert_eq!(series.len(), 2);

        // Length mismatch
        assert!(ReturnSeries::new("A", vec![d(2024, 1, 1)], vec![0.01, 0.02]).is_err());

        // Non-increasing dates
        assert!(ReturnSeries::new(
            "A",
            vec![d(2024, 1, 2), d(2024, 1, 1)],
            vec![0.01, 0.02]
        )
        .is_err());
    }

    #[test]
    fn test_return_series_drops_nan() {
        let series = ReturnSeries::new(
            "A",
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![0.01, f64::NAN, 0.03],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.dates, vec![d(2024, 1, 1), d(2024, 1, 3)]);

        // All-NaN series is rejected
        assert!(ReturnSeries::new("B", vec![d(2024, 1, 1)], vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_series_alignment_inner_join() {
        let a = ReturnSeries::new(
            "A",
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![0.01, 0.02, 0.03],
        )
        .unwrap();
        let b = ReturnSeries::new(
            "B",
            vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)],
            vec![0.05, 0.06, 0.07],
        )
        .unwrap();

        let (dates, own, theirs) = a.align(&b);
        assert_eq!(dates, vec![d(2024, 1, 2), d(2024, 1, 3)]);
        assert_eq!(own, vec![0.02, 0.03]);
        assert_eq!(theirs, vec![0.05, 0.06]);
    }

    #[test]
    fn test_return_matrix_validation() {
        let matrix = ReturnMatrix::new(
            vec![d(2024, 1, 1), d(2024, 1, 2)],
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.01, 0.02], vec![0.03, 0.04]],
        )
        .unwrap();
        assert_eq!(matrix.n_assets(), 2);
        assert_eq!(matrix.n_periods(), 2);
        assert_eq!(matrix.column_values(1), vec![0.02, 0.04]);

        // Duplicate columns
        assert!(ReturnMatrix::new(
            vec![d(2024, 1, 1)],
            vec!["A".to_string(), "A".to_string()],
            vec![vec![0.01, 0.02]],
        )
        .is_err());

        // Zero assets
        assert!(ReturnMatrix::new(vec![d(2024, 1, 1)], vec![], vec![vec![]]).is_err());
    }

    #[test]
    fn test_return_matrix_drops_nan_rows() {
        let matrix = ReturnMatrix::new(
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec![0.01, 0.02],
                vec![f64::NAN, 0.04],
                vec![0.05, 0.06],
            ],
        )
        .unwrap();
        assert_eq!(matrix.n_periods(), 2);
        assert_eq!(matrix.dates(), &[d(2024, 1, 1), d(2024, 1, 3)]);
    }

    #[test]
    fn test_return_matrix_rejects_all_nan_column() {
        let result = ReturnMatrix::new(
            vec![d(2024, 1, 1), d(2024, 1, 2)],
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.01, f64::NAN], vec![0.02, f64::NAN]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_price_series_to_returns() {
        let prices = PriceSeries::new(
            "TEST",
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![100.0, 110.0, 99.0],
        )
        .unwrap();

        let returns = prices.to_returns().unwrap();
        assert_eq!(returns.len(), 2);
        assert!((returns.values[0] - 0.10).abs() < 1e-12);
        assert!((returns.values[1] + 0.10).abs() < 1e-12);
        assert_eq!(returns.dates[0], d(2024, 1, 2));

        // Non-positive prices rejected
        assert!(PriceSeries::new("X", vec![d(2024, 1, 1)], vec![0.0]).is_err());
    }

    #[test]
    fn test_trade_lifecycle() {
        let mut trade = Trade::open(d(2024, 1, 1), 100.0);
        assert!(!trade.is_closed());
        assert!(trade.return_pct().is_none());

        trade.close(d(2024, 1, 11), 110.0);
        assert!(trade.is_closed());
        assert!((trade.return_pct().unwrap() - 10.0).abs() < 1e-12);
        assert_eq!(trade.holding_days().unwrap(), 10);
    }
}
