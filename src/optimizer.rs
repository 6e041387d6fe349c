use crate::config::{OptimizerConfig, RunParameters};
use crate::error::Result;
use crate::extract::extract_allocation;
use crate::formulation::formulate;
use crate::market_data::{PriceSource, ReturnSeries};
use crate::portfolio::PortfolioAllocation;
use crate::scenarios::ScenarioGenerator;
use crate::solver::Solver;
use crate::stats::TailRisk;
use log::{info, warn};

/// Result of one successful run.
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub allocation: PortfolioAllocation,
    /// The allocation re-evaluated on the scenarios it was optimised over.
    pub diagnostics: TailRisk,
    pub scenario_count: usize,
}

/// Runs generate → formulate → solve → extract for one set of parameters.
/// Holds no state between runs.
pub struct CvarOptimizer<S: Solver> {
    solver: S,
}

impl<S: Solver> CvarOptimizer<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn optimize(&self, params: &RunParameters, returns: &ReturnSeries) -> Result<OptimizationReport> {
        let returns = returns.select(&params.universe)?;

        let scenarios = ScenarioGenerator::new(params.scenario_count)?
            .with_seed(params.seed)
            .generate(&returns)?;

        let problem = formulate(&params.universe, &scenarios, &params.risk)?;
        let (model, layout) = problem.into_parts();

        info!(
            "Solving CVaR model with {} variables and {} constraints",
            model.num_variables(),
            model.constraints().len()
        );
        let outcome = self.solver.solve(model);
        info!("Solver finished with status {}", outcome.status);

        let allocation = extract_allocation(&outcome, &layout)?;

        let dense = allocation.dense_weights(&params.universe);
        let diagnostics = TailRisk::evaluate(&dense, &scenarios, params.risk.confidence_level())?;
        if (diagnostics.cvar - allocation.cvar).abs() > 1e-6 * (1.0 + allocation.cvar.abs()) {
            warn!(
                "Solver CVaR {:.6} differs from empirical scenario CVaR {:.6}",
                allocation.cvar, diagnostics.cvar
            );
        }
        info!(
            "Scenario diagnostics: expected return {:.6}, VaR {:.6}, CVaR {:.6}, worst loss {:.6}",
            diagnostics.expected_return,
            diagnostics.value_at_risk,
            diagnostics.cvar,
            diagnostics.worst_loss
        );

        Ok(OptimizationReport {
            allocation,
            diagnostics,
            scenario_count: scenarios.len(),
        })
    }

    /// Validates `config`, loads its returns from `source`, then optimises.
    /// Nothing is read from the source when the configuration is invalid.
    pub fn run(&self, config: &OptimizerConfig, source: &dyn PriceSource) -> Result<OptimizationReport> {
        let params = config.validate()?;
        info!(
            "Optimising {} assets, beta={}, budget={}, max_assets={}, scenarios={}",
            params.universe.len(),
            params.risk.confidence_level(),
            params.risk.budget(),
            params.risk.max_assets(),
            params.scenario_count
        );

        let returns = source.load_returns(&params.universe, params.start_date, params.end_date)?;
        self.optimize(&params, &returns)
    }
}
