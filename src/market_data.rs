use crate::error::{CvarError, Result};
use crate::portfolio::AssetUniverse;
use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One date's worth of per-asset returns. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnObservation {
    pub date: Option<NaiveDate>,
    pub returns: Vec<Option<f64>>,
}

/// Aligned periodic returns, one column per asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    assets: Vec<String>,
    observations: Vec<ReturnObservation>,
}

/// Returns with every incomplete row removed. All columns share one length.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReturns {
    assets: Vec<String>,
    dates: Vec<Option<NaiveDate>>,
    columns: Vec<Vec<f64>>,
    dropped: usize,
}

impl ReturnSeries {
    pub fn new(assets: Vec<String>, observations: Vec<ReturnObservation>) -> Result<Self> {
        if let Some(row) = observations.iter().find(|o| o.returns.len() != assets.len()) {
            return Err(CvarError::data_unavailable(format!(
                "observation dated {:?} has {} values for {} assets",
                row.date,
                row.returns.len(),
                assets.len()
            )));
        }
        Ok(Self {
            assets,
            observations,
        })
    }

    /// Undated, complete rows (`rows[t][asset]`).
    pub fn from_rows(assets: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let observations = rows
            .into_iter()
            .map(|row| ReturnObservation {
                date: None,
                returns: row.into_iter().map(Some).collect(),
            })
            .collect();
        Self::new(assets, observations)
    }

    /// Simple returns `p_t / p_{t-1} - 1` from per-asset price columns. A
    /// missing or non-positive price on either side makes the return missing.
    pub fn from_prices(
        assets: Vec<String>,
        dates: &[NaiveDate],
        prices: &[Vec<Option<f64>>],
    ) -> Result<Self> {
        if prices.len() != assets.len() {
            return Err(CvarError::data_unavailable(format!(
                "{} price columns for {} assets",
                prices.len(),
                assets.len()
            )));
        }
        if let Some((asset, column)) = assets
            .iter()
            .zip(prices)
            .find(|(_, column)| column.len() != dates.len())
        {
            return Err(CvarError::data_unavailable(format!(
                "{} has {} prices for {} dates",
                asset,
                column.len(),
                dates.len()
            )));
        }

        let observations = (1..dates.len())
            .map(|t| ReturnObservation {
                date: Some(dates[t]),
                returns: prices
                    .iter()
                    .map(|column| simple_return(column[t - 1], column[t]))
                    .collect(),
            })
            .collect();

        Self::new(assets, observations)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn observations(&self) -> &[ReturnObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Reorders (and subsets) the columns to match `universe`.
    pub fn select(&self, universe: &AssetUniverse) -> Result<ReturnSeries> {
        let indices = universe
            .iter()
            .map(|ticker| {
                self.assets.iter().position(|a| a == ticker).ok_or_else(|| {
                    CvarError::data_unavailable(format!("no return series for {}", ticker))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let observations = self
            .observations
            .iter()
            .map(|o| ReturnObservation {
                date: o.date,
                returns: indices.iter().map(|&i| o.returns[i]).collect(),
            })
            .collect();

        Ok(ReturnSeries {
            assets: universe.tickers().to_vec(),
            observations,
        })
    }

    /// Drops every row where at least one asset is missing or non-finite.
    /// Covariance needs two observations, so fewer is an error.
    pub fn clean(&self) -> Result<CleanReturns> {
        let mut dates = Vec::new();
        let mut columns = vec![Vec::with_capacity(self.len()); self.assets.len()];

        for observation in &self.observations {
            let complete = observation
                .returns
                .iter()
                .all(|r| matches!(r, Some(v) if v.is_finite()));
            if !complete {
                continue;
            }
            dates.push(observation.date);
            for (column, value) in columns.iter_mut().zip(&observation.returns) {
                column.push(value.unwrap_or_default());
            }
        }

        let available = dates.len();
        let dropped = self.len() - available;
        debug!(
            "Cleaned return series: kept {} of {} observations",
            available,
            self.len()
        );

        if available < 2 {
            return Err(CvarError::InsufficientData { available });
        }

        Ok(CleanReturns {
            assets: self.assets.clone(),
            dates,
            columns,
            dropped,
        })
    }
}

fn simple_return(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(p0), Some(p1)) if p0 > 0.0 && p1 > 0.0 && p0.is_finite() && p1.is_finite() => {
            Some(p1 / p0 - 1.0)
        }
        _ => None,
    }
}

impl CleanReturns {
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn dates(&self) -> &[Option<NaiveDate>] {
        &self.dates
    }

    pub fn observation_count(&self) -> usize {
        self.dates.len()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn column(&self, asset: usize) -> &[f64] {
        &self.columns[asset]
    }

    /// Rows removed by cleaning.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

/// Supplier of historical returns for a universe and a date range.
pub trait PriceSource {
    /// Returns for `[start, end)`, columns in universe order.
    fn load_returns(
        &self,
        universe: &AssetUniverse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReturnSeries>;
}

#[derive(Debug, Deserialize)]
struct PriceFile {
    dates: Vec<NaiveDate>,
    prices: HashMap<String, Vec<Option<f64>>>,
}

/// Adjusted closing prices stored as JSON:
///
/// ```json
/// { "dates": ["2020-01-02", "2020-01-03"],
///   "prices": { "AAPL": [75.09, 74.36], "MSFT": [160.62, null] } }
/// ```
#[derive(Debug, Clone)]
pub struct JsonPriceSource {
    path: PathBuf,
}

impl JsonPriceSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<PriceFile> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            CvarError::data_unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let file: PriceFile = serde_json::from_str(&contents).map_err(|e| {
            CvarError::data_unavailable(format!("cannot parse {}: {}", self.path.display(), e))
        })?;

        if !file.dates.windows(2).all(|w| w[0] < w[1]) {
            return Err(CvarError::data_unavailable(format!(
                "dates in {} are not strictly increasing",
                self.path.display()
            )));
        }
        Ok(file)
    }
}

impl PriceSource for JsonPriceSource {
    fn load_returns(
        &self,
        universe: &AssetUniverse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReturnSeries> {
        let file = self.read()?;

        let window: Vec<usize> = file
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d < end)
            .map(|(i, _)| i)
            .collect();
        let dates: Vec<NaiveDate> = window.iter().map(|&i| file.dates[i]).collect();

        let mut prices = Vec::with_capacity(universe.len());
        for ticker in universe.iter() {
            let column = file.prices.get(ticker).ok_or_else(|| {
                CvarError::data_unavailable(format!(
                    "no price history for {} in {}",
                    ticker,
                    self.path.display()
                ))
            })?;
            if column.len() != file.dates.len() {
                return Err(CvarError::data_unavailable(format!(
                    "{} has {} prices for {} dates",
                    ticker,
                    column.len(),
                    file.dates.len()
                )));
            }
            prices.push(window.iter().map(|&i| column[i]).collect::<Vec<_>>());
        }

        info!(
            "Loaded {} price dates for {} tickers from {} ({} to {})",
            dates.len(),
            universe.len(),
            self.path.display(),
            start,
            end
        );

        ReturnSeries::from_prices(universe.tickers().to_vec(), &dates, &prices)
    }
}
