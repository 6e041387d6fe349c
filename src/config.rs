use crate::error::{CvarError, Result};
use crate::portfolio::AssetUniverse;
use anyhow::Context;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Weights at or below this value are solver noise and reported as zero.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Inclusion indicators above this value count as selected.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Diagonal shift (ε) applied to a covariance matrix that fails Cholesky factorisation.
pub const COVARIANCE_REGULARIZATION: f64 = 1e-10;

/// Run configuration as read from disk. Nothing in here is trusted until
/// [`OptimizerConfig::validate`] has turned it into [`RunParameters`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_budget")]
    pub budget: f64,
    #[serde(default = "default_max_assets")]
    pub max_assets: usize,
    #[serde(default = "default_scenario_count")]
    pub scenario_count: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_price_file")]
    pub price_file: String,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Settings handed through to the solver back end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Wall-clock limit for a single solve, in seconds.
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
    #[serde(default = "default_mip_rel_gap")]
    pub mip_rel_gap: f64,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: None,
            mip_rel_gap: default_mip_rel_gap(),
            verbose: false,
        }
    }
}

fn default_confidence_level() -> f64 {
    0.95 // CVaR over the worst 5% of scenarios
}

fn default_budget() -> f64 {
    1.0 // Fully invested
}

fn default_max_assets() -> usize {
    3
}

fn default_scenario_count() -> usize {
    1000
}

fn default_price_file() -> String {
    "prices.json".to_string()
}

fn default_mip_rel_gap() -> f64 {
    1e-6
}

/// Policy parameters of the CVaR model, valid by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    confidence_level: f64,
    budget: f64,
    max_assets: usize,
}

impl RiskParameters {
    /// Checks β ∈ (0,1), B > 0 and 1 ≤ K ≤ |universe|.
    pub fn new(
        confidence_level: f64,
        budget: f64,
        max_assets: usize,
        universe: &AssetUniverse,
    ) -> Result<Self> {
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(CvarError::invalid_config(format!(
                "confidence level must lie in (0, 1), got {}",
                confidence_level
            )));
        }
        if !(budget.is_finite() && budget > 0.0) {
            return Err(CvarError::invalid_config(format!(
                "budget must be positive, got {}",
                budget
            )));
        }
        if max_assets == 0 || max_assets > universe.len() {
            return Err(CvarError::invalid_config(format!(
                "max assets must lie in [1, {}], got {}",
                universe.len(),
                max_assets
            )));
        }

        Ok(Self {
            confidence_level,
            budget,
            max_assets,
        })
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn max_assets(&self) -> usize {
        self.max_assets
    }

    /// Objective coefficient of each shortfall variable: 1 / ((1-β)·S).
    pub fn shortfall_weight(&self, scenario_count: usize) -> f64 {
        1.0 / ((1.0 - self.confidence_level) * scenario_count as f64)
    }
}

/// Validated, immutable inputs of one run.
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub universe: AssetUniverse,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub risk: RiskParameters,
    pub scenario_count: usize,
    pub seed: Option<u64>,
    pub solver: SolverSettings,
}

impl OptimizerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let config: OptimizerConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("failed to parse configuration file {}", path.display()))?;

        info!(
            "Loaded configuration for {} tickers from {}",
            config.tickers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Single validation point for every run parameter. Downstream stages
    /// take the returned [`RunParameters`] and never re-check them.
    pub fn validate(&self) -> Result<RunParameters> {
        let universe = AssetUniverse::new(self.tickers.clone())?;

        if self.start_date >= self.end_date {
            return Err(CvarError::invalid_config(format!(
                "start date {} must precede end date {}",
                self.start_date, self.end_date
            )));
        }

        let risk = RiskParameters::new(
            self.confidence_level,
            self.budget,
            self.max_assets,
            &universe,
        )?;

        if self.scenario_count == 0 {
            return Err(CvarError::invalid_config(
                "scenario count must be at least 1",
            ));
        }

        if !(self.solver.mip_rel_gap >= 0.0) {
            return Err(CvarError::invalid_config(format!(
                "mip_rel_gap must be non-negative, got {}",
                self.solver.mip_rel_gap
            )));
        }
        if let Some(limit) = self.solver.time_limit_secs {
            if !(limit > 0.0) {
                return Err(CvarError::invalid_config(format!(
                    "time limit must be positive, got {}",
                    limit
                )));
            }
        }

        Ok(RunParameters {
            universe,
            start_date: self.start_date,
            end_date: self.end_date,
            risk,
            scenario_count: self.scenario_count,
            seed: self.seed,
            solver: self.solver.clone(),
        })
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tickers: ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            confidence_level: default_confidence_level(),
            budget: default_budget(),
            max_assets: default_max_assets(),
            scenario_count: default_scenario_count(),
            seed: None,
            price_file: default_price_file(),
            solver: SolverSettings::default(),
        }
    }
}
