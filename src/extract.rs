use crate::config::{SELECTION_THRESHOLD, WEIGHT_TOLERANCE};
use crate::error::{CvarError, Result};
use crate::formulation::VariableLayout;
use crate::portfolio::{AssetWeight, PortfolioAllocation};
use crate::solver::{SolveStatus, SolverOutcome, VarId};
use log::info;

/// Turns an optimal solver outcome into a [`PortfolioAllocation`]. Any other
/// status is surfaced as the matching error and no allocation is produced.
pub fn extract_allocation(
    outcome: &SolverOutcome,
    layout: &VariableLayout,
) -> Result<PortfolioAllocation> {
    match &outcome.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible => return Err(CvarError::SolverInfeasible),
        SolveStatus::Unbounded => return Err(CvarError::SolverUnbounded),
        SolveStatus::Error(msg) => return Err(CvarError::SolverEngine(msg.clone())),
    }

    let value = |id: VarId| {
        outcome.value(id).ok_or_else(|| {
            CvarError::SolverEngine(format!(
                "optimal outcome carries no value for variable {}",
                id.index()
            ))
        })
    };
    let cvar = outcome.objective_value.ok_or_else(|| {
        CvarError::SolverEngine("optimal outcome carries no objective value".into())
    })?;

    let mut weights = Vec::new();
    let mut selected_assets = Vec::new();
    for ((ticker, &x), &y) in layout
        .universe
        .iter()
        .zip(&layout.weights)
        .zip(&layout.selections)
    {
        let weight = value(x)?;
        if weight > WEIGHT_TOLERANCE {
            weights.push(AssetWeight {
                symbol: ticker.to_string(),
                weight,
            });
        }
        if value(y)? > SELECTION_THRESHOLD {
            selected_assets.push(ticker.to_string());
        }
    }

    let allocation = PortfolioAllocation {
        weights,
        selected_assets,
        cvar,
        value_at_risk: value(layout.value_at_risk)?,
    };

    info!(
        "Extracted allocation: {} holdings, {} selected, CVaR {:.6}",
        allocation.weights.len(),
        allocation.selected_assets.len(),
        allocation.cvar
    );
    Ok(allocation)
}
