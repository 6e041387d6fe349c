use crate::config::COVARIANCE_REGULARIZATION;
use crate::error::{CvarError, Result};
use crate::market_data::{CleanReturns, ReturnSeries};
use log::{debug, info, warn};
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use statrs::statistics::Statistics;

/// Sample mean and sample covariance of a cleaned return series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatistics {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
}

impl ReturnStatistics {
    pub fn new(mean: DVector<f64>, covariance: DMatrix<f64>) -> Result<Self> {
        let n = mean.len();
        if n == 0 {
            return Err(CvarError::Numerical("return statistics for zero assets".into()));
        }
        if covariance.nrows() != n || covariance.ncols() != n {
            return Err(CvarError::Numerical(format!(
                "covariance is {}x{} for {} assets",
                covariance.nrows(),
                covariance.ncols(),
                n
            )));
        }
        if !covariance.iter().chain(mean.iter()).all(|v| v.is_finite()) {
            return Err(CvarError::Numerical("non-finite return statistics".into()));
        }
        if (&covariance - covariance.transpose()).amax() > 1e-12 {
            return Err(CvarError::Numerical("covariance matrix is not symmetric".into()));
        }
        Ok(Self { mean, covariance })
    }

    /// Sample (n-1) estimates over the cleaned observations.
    pub fn estimate(returns: &CleanReturns) -> Self {
        let n = returns.num_assets();
        let mean = DVector::from_iterator(n, (0..n).map(|i| returns.column(i).mean()));

        let mut covariance = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let c = returns.column(i).covariance(returns.column(j));
                covariance[(i, j)] = c;
                covariance[(j, i)] = c;
            }
        }

        debug!(
            "Estimated return statistics for {} assets over {} observations",
            n,
            returns.observation_count()
        );
        Self { mean, covariance }
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn num_assets(&self) -> usize {
        self.mean.len()
    }

    /// Lower Cholesky factor of the covariance. A matrix that is not
    /// numerically positive definite is shifted by `max(ε, ε - λ_min)·I`
    /// first, where λ_min is its smallest eigenvalue.
    pub fn cholesky_factor(&self, regularization: f64) -> Result<DMatrix<f64>> {
        if let Some(chol) = Cholesky::new(self.covariance.clone()) {
            return Ok(chol.l());
        }

        let n = self.num_assets();
        let min_eigenvalue = SymmetricEigen::new(self.covariance.clone())
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let shift = regularization.max(regularization - min_eigenvalue);
        warn!(
            "Covariance matrix is not positive definite (smallest eigenvalue {:.3e}); adding {:.3e} to the diagonal",
            min_eigenvalue, shift
        );

        let shifted = &self.covariance + DMatrix::<f64>::identity(n, n) * shift;
        Cholesky::new(shifted).map(|chol| chol.l()).ok_or_else(|| {
            CvarError::Numerical(format!(
                "covariance matrix could not be factorised after a diagonal shift of {:e}",
                shift
            ))
        })
    }

    /// Draws `count` independent multivariate-normal scenarios. The result
    /// depends only on the statistics, `count` and `seed`.
    pub fn sample(&self, count: usize, seed: Option<u64>, regularization: f64) -> Result<ScenarioSet> {
        if count == 0 {
            return Err(CvarError::invalid_config("scenario count must be at least 1"));
        }

        let n = self.num_assets();
        let factor = self.cholesky_factor(regularization)?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut returns = Array2::zeros((count, n));
        for mut row in returns.rows_mut() {
            let z = DVector::from_iterator(n, (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)));
            let draw = &self.mean + &factor * z;
            for (cell, value) in row.iter_mut().zip(draw.iter()) {
                *cell = *value;
            }
        }

        Ok(ScenarioSet { returns })
    }
}

/// Simulated returns, one row per scenario and one column per asset.
/// Row order is fixed for the lifetime of the set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    returns: Array2<f64>,
}

impl ScenarioSet {
    pub fn new(returns: Array2<f64>) -> Result<Self> {
        if returns.nrows() == 0 || returns.ncols() == 0 {
            return Err(CvarError::invalid_config(format!(
                "scenario set must be non-empty, got {}x{}",
                returns.nrows(),
                returns.ncols()
            )));
        }
        Ok(Self { returns })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != n) {
            return Err(CvarError::invalid_config("scenario rows differ in length"));
        }
        let s = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let returns = Array2::from_shape_vec((s, n), flat)
            .map_err(|e| CvarError::invalid_config(format!("malformed scenario set: {}", e)))?;
        Self::new(returns)
    }

    pub fn len(&self) -> usize {
        self.returns.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.nrows() == 0
    }

    pub fn num_assets(&self) -> usize {
        self.returns.ncols()
    }

    pub fn scenario(&self, index: usize) -> ArrayView1<'_, f64> {
        self.returns.row(index)
    }

    pub fn returns(&self) -> &Array2<f64> {
        &self.returns
    }

    /// Portfolio return in each scenario for dense `weights`.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Vec<f64> {
        self.returns.dot(&Array1::from(weights.to_vec())).to_vec()
    }
}

/// Clean → estimate → sample.
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    count: usize,
    seed: Option<u64>,
    regularization: f64,
}

impl ScenarioGenerator {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(CvarError::invalid_config("scenario count must be at least 1"));
        }
        Ok(Self {
            count,
            seed: None,
            regularization: COVARIANCE_REGULARIZATION,
        })
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn generate(&self, series: &ReturnSeries) -> Result<ScenarioSet> {
        let clean = series.clean()?;
        if clean.dropped() > 0 {
            info!(
                "Dropped {} incomplete observations, {} remain",
                clean.dropped(),
                clean.observation_count()
            );
        }

        let statistics = ReturnStatistics::estimate(&clean);
        let scenarios = statistics.sample(self.count, self.seed, self.regularization)?;

        info!(
            "Generated {} scenarios for {} assets from {} observations",
            scenarios.len(),
            scenarios.num_assets(),
            clean.observation_count()
        );
        Ok(scenarios)
    }
}
