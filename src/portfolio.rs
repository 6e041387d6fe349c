use crate::error::{CvarError, Result};
use std::collections::HashSet;
use std::fmt;

/// Ordered set of tickers. The position of a ticker is its index in every
/// weight, indicator and scenario vector of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUniverse {
    tickers: Vec<String>,
}

impl AssetUniverse {
    pub fn new(tickers: Vec<String>) -> Result<Self> {
        if tickers.is_empty() {
            return Err(CvarError::invalid_config("asset universe is empty"));
        }

        let mut seen = HashSet::new();
        for ticker in &tickers {
            if ticker.trim().is_empty() {
                return Err(CvarError::invalid_config("asset universe contains a blank ticker"));
            }
            if !seen.insert(ticker.as_str()) {
                return Err(CvarError::invalid_config(format!(
                    "ticker {} appears more than once",
                    ticker
                )));
            }
        }

        Ok(Self { tickers })
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tickers.iter().map(|t| t.as_str())
    }

    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetWeight {
    pub symbol: String,
    pub weight: f64,
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAllocation {
    /// Holdings above the weight tolerance, in universe order.
    pub weights: Vec<AssetWeight>,
    /// Assets whose inclusion indicator is set, in universe order.
    pub selected_assets: Vec<String>,
    /// Optimal CVaR as reported by the solver.
    pub cvar: f64,
    /// Optimal VaR threshold (the alpha variable).
    pub value_at_risk: f64,
}

impl PortfolioAllocation {
    pub fn weight(&self, symbol: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.symbol == symbol)
            .map(|w| w.weight)
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn is_selected(&self, symbol: &str) -> bool {
        self.selected_assets.iter().any(|s| s == symbol)
    }

    /// Dense weight vector in universe order, zero for assets not held.
    pub fn dense_weights(&self, universe: &AssetUniverse) -> Vec<f64> {
        universe
            .iter()
            .map(|ticker| self.weight(ticker).unwrap_or(0.0))
            .collect()
    }
}

impl fmt::Display for PortfolioAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimal Portfolio Allocation:")?;
        for w in &self.weights {
            writeln!(f, "  {:<8} {:>10.6}", w.symbol, w.weight)?;
        }
        writeln!(f, "Selected Assets: [{}]", self.selected_assets.join(", "))?;
        writeln!(f, "Value-at-Risk:   {:.6}", self.value_at_risk)?;
        write!(f, "Optimal CVaR:    {:.6}", self.cvar)
    }
}
