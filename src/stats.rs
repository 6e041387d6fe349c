use crate::error::{CvarError, Result};
use crate::scenarios::ScenarioSet;
use statrs::statistics::Statistics;

/// Empirical tail statistics of a fixed allocation over a scenario set.
#[derive(Debug, Clone, PartialEq)]
pub struct TailRisk {
    pub confidence_level: f64,
    /// Mean scenario return of the portfolio
    pub expected_return: f64,
    /// Loss at the ⌈βS⌉-th order statistic
    pub value_at_risk: f64,
    /// Rockafellar–Uryasev CVaR evaluated at `value_at_risk`
    pub cvar: f64,
    pub worst_loss: f64,
    /// Scenarios whose loss exceeds the VaR
    pub tail_scenarios: usize,
}

/// Empirical VaR of `losses` at level β: the smallest loss `l` such that at
/// least a β share of scenarios lose no more than `l`.
pub fn value_at_risk(losses: &[f64], confidence_level: f64) -> Result<f64> {
    if losses.is_empty() {
        return Err(CvarError::invalid_config("cannot compute VaR of an empty loss set"));
    }
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(CvarError::invalid_config(format!(
            "confidence level must lie in (0, 1), got {}",
            confidence_level
        )));
    }

    let mut sorted = losses.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (confidence_level * sorted.len() as f64).ceil() as usize;
    Ok(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// Empirical CVaR of `losses` at level β,
/// `VaR + 1/((1-β)·S) · Σ max(0, L_s - VaR)`.
pub fn conditional_value_at_risk(losses: &[f64], confidence_level: f64) -> Result<f64> {
    let var = value_at_risk(losses, confidence_level)?;
    let excess: f64 = losses.iter().map(|l| (l - var).max(0.0)).sum();
    Ok(var + excess / ((1.0 - confidence_level) * losses.len() as f64))
}

impl TailRisk {
    /// `weights` is dense, in the scenario set's asset order.
    pub fn evaluate(
        weights: &[f64],
        scenarios: &ScenarioSet,
        confidence_level: f64,
    ) -> Result<Self> {
        if weights.len() != scenarios.num_assets() {
            return Err(CvarError::invalid_config(format!(
                "{} weights for {} assets",
                weights.len(),
                scenarios.num_assets()
            )));
        }

        let returns = scenarios.portfolio_returns(weights);
        let losses: Vec<f64> = returns.iter().map(|r| -r).collect();

        let var = value_at_risk(&losses, confidence_level)?;
        let cvar = conditional_value_at_risk(&losses, confidence_level)?;
        let worst_loss = losses.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(TailRisk {
            confidence_level,
            expected_return: returns.as_slice().mean(),
            value_at_risk: var,
            cvar,
            worst_loss,
            tail_scenarios: losses.iter().filter(|&&l| l > var).count(),
        })
    }
}
