use crate::config::RiskParameters;
use crate::error::{CvarError, Result};
use crate::portfolio::AssetUniverse;
use crate::scenarios::ScenarioSet;
use crate::solver::{MipModel, Relation, VarId};
use log::debug;

pub const BUDGET_ROW: &str = "budget";
pub const CARDINALITY_ROW: &str = "max_assets";

/// Where each decision variable of the CVaR model lives in the
/// [`MipModel`]. Kept by the caller to read a solution back.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    pub universe: AssetUniverse,
    /// x[asset], weight in [0, 1]
    pub weights: Vec<VarId>,
    /// y[asset], inclusion indicator
    pub selections: Vec<VarId>,
    /// z[scenario], shortfall beyond the VaR threshold
    pub shortfalls: Vec<VarId>,
    /// alpha, the VaR threshold (free)
    pub value_at_risk: VarId,
}

/// The assembled CVaR optimisation instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioProblem {
    model: MipModel,
    layout: VariableLayout,
}

impl PortfolioProblem {
    pub fn model(&self) -> &MipModel {
        &self.model
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    /// Splits the problem so the model can be handed to a solver while the
    /// layout stays behind for extraction.
    pub fn into_parts(self) -> (MipModel, VariableLayout) {
        (self.model, self.layout)
    }
}

pub fn link_row(ticker: &str) -> String {
    format!("link[{}]", ticker)
}

pub fn shortfall_row(scenario: usize) -> String {
    format!("cvar[{}]", scenario)
}

/// Builds the Rockafellar–Uryasev minimum-CVaR model
///
/// ```text
/// min   alpha + 1/((1-β)·S) · Σ_s z[s]
/// s.t.  Σ_a x[a]                       = B
///       x[a] - y[a]                   <= 0      for every asset
///       Σ_a y[a]                      <= K
///       Σ_a r[s][a]·x[a] + alpha + z[s] >= 0    for every scenario
///       x ∈ [0,1], y ∈ {0,1}, z >= 0, alpha free
/// ```
///
/// The scenario row is `z[s] >= L_s - alpha` with portfolio loss
/// `L_s = -Σ_a r[s][a]·x[a]`, so at the optimum alpha is the VaR and the
/// objective is the CVaR of the loss at level β. The cardinality row is
/// emitted even when K equals the universe size.
pub fn formulate(
    universe: &AssetUniverse,
    scenarios: &ScenarioSet,
    risk: &RiskParameters,
) -> Result<PortfolioProblem> {
    if scenarios.num_assets() != universe.len() {
        return Err(CvarError::invalid_config(format!(
            "scenarios cover {} assets but the universe has {}",
            scenarios.num_assets(),
            universe.len()
        )));
    }

    let mut model = MipModel::new("min_cvar_portfolio");

    let weights: Vec<VarId> = universe
        .iter()
        .map(|t| model.add_continuous(format!("x[{}]", t), 0.0, 1.0))
        .collect();
    let selections: Vec<VarId> = universe
        .iter()
        .map(|t| model.add_binary(format!("y[{}]", t)))
        .collect();
    let shortfalls: Vec<VarId> = (0..scenarios.len())
        .map(|s| model.add_continuous(format!("z[{}]", s), 0.0, f64::INFINITY))
        .collect();
    let value_at_risk = model.add_continuous("alpha", f64::NEG_INFINITY, f64::INFINITY);

    let tail_weight = risk.shortfall_weight(scenarios.len());
    let mut objective = Vec::with_capacity(shortfalls.len() + 1);
    objective.push((value_at_risk, 1.0));
    objective.extend(shortfalls.iter().map(|&z| (z, tail_weight)));
    model.set_objective(objective);

    model.add_constraint(
        BUDGET_ROW,
        weights.iter().map(|&x| (x, 1.0)).collect(),
        Relation::Equal,
        risk.budget(),
    );

    for ((ticker, &x), &y) in universe.iter().zip(&weights).zip(&selections) {
        model.add_constraint(
            link_row(ticker),
            vec![(x, 1.0), (y, -1.0)],
            Relation::LessEqual,
            0.0,
        );
    }

    model.add_constraint(
        CARDINALITY_ROW,
        selections.iter().map(|&y| (y, 1.0)).collect(),
        Relation::LessEqual,
        risk.max_assets() as f64,
    );

    for (s, &z) in shortfalls.iter().enumerate() {
        let mut terms: Vec<(VarId, f64)> = weights
            .iter()
            .zip(scenarios.scenario(s).iter())
            .map(|(&x, &r)| (x, r))
            .collect();
        terms.push((value_at_risk, 1.0));
        terms.push((z, 1.0));
        model.add_constraint(shortfall_row(s), terms, Relation::GreaterEqual, 0.0);
    }

    debug!(
        "Formulated CVaR model: {} variables, {} rows, beta={}, budget={}, max_assets={}",
        model.num_variables(),
        model.constraints().len(),
        risk.confidence_level(),
        risk.budget(),
        risk.max_assets()
    );

    Ok(PortfolioProblem {
        model,
        layout: VariableLayout {
            universe: universe.clone(),
            weights,
            selections,
            shortfalls,
            value_at_risk,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::VarKind;

    fn universe() -> AssetUniverse {
        AssetUniverse::new(vec!["A".into(), "B".into()]).unwrap()
    }

    fn scenarios() -> ScenarioSet {
        ScenarioSet::from_rows(vec![vec![0.01, -0.02], vec![-0.03, 0.04]]).unwrap()
    }

    fn risk(k: usize) -> RiskParameters {
        RiskParameters::new(0.95, 1.0, k, &universe()).unwrap()
    }

    #[test]
    fn test_variable_layout() {
        let problem = formulate(&universe(), &scenarios(), &risk(2)).unwrap();
        let model = problem.model();
        let layout = problem.layout();

        // 2 weights + 2 indicators + 2 shortfalls + alpha
        assert_eq!(model.num_variables(), 7);
        assert_eq!(model.num_binaries(), 2);
        for &x in &layout.weights {
            let v = model.variable(x);
            assert_eq!((v.kind, v.lower, v.upper), (VarKind::Continuous, 0.0, 1.0));
        }
        for &z in &layout.shortfalls {
            assert_eq!(model.variable(z).lower, 0.0);
            assert_eq!(model.variable(z).upper, f64::INFINITY);
        }
        let alpha = model.variable(layout.value_at_risk);
        assert_eq!(alpha.lower, f64::NEG_INFINITY);
        assert_eq!(alpha.upper, f64::INFINITY);
    }

    #[test]
    fn test_objective_coefficients() {
        let problem = formulate(&universe(), &scenarios(), &risk(2)).unwrap();
        let layout = problem.layout();
        let costs = problem.model().objective().dense_costs(7);

        assert_eq!(costs[layout.value_at_risk.index()], 1.0);
        for &z in &layout.shortfalls {
            // 1 / ((1 - 0.95) * 2)
            assert!((costs[z.index()] - 10.0).abs() < 1e-9);
        }
        for &x in &layout.weights {
            assert_eq!(costs[x.index()], 0.0);
        }
    }

    #[test]
    fn test_row_set() {
        let problem = formulate(&universe(), &scenarios(), &risk(1)).unwrap();
        let model = problem.model();

        // budget + 2 links + cardinality + 2 scenarios
        assert_eq!(model.constraints().len(), 6);

        let budget = model.constraint(BUDGET_ROW).unwrap();
        assert_eq!(budget.relation, Relation::Equal);
        assert_eq!(budget.rhs, 1.0);

        let card = model.constraint(CARDINALITY_ROW).unwrap();
        assert_eq!(card.relation, Relation::LessEqual);
        assert_eq!(card.rhs, 1.0);

        assert!(model.constraint(&link_row("A")).is_some());
        assert!(model.constraint(&link_row("B")).is_some());
    }

    #[test]
    fn test_cardinality_row_kept_when_not_binding() {
        let problem = formulate(&universe(), &scenarios(), &risk(2)).unwrap();
        let card = problem.model().constraint(CARDINALITY_ROW).unwrap();
        assert_eq!(card.rhs, 2.0);
        assert_eq!(card.terms.len(), 2);
    }

    #[test]
    fn test_scenario_row_encodes_shortfall() {
        let problem = formulate(&universe(), &scenarios(), &risk(2)).unwrap();
        let layout = problem.layout().clone();
        let row = problem.model().constraint(&shortfall_row(1)).unwrap();

        assert_eq!(row.relation, Relation::GreaterEqual);
        assert_eq!(row.rhs, 0.0);
        assert!(row.terms.contains(&(layout.weights[0], -0.03)));
        assert!(row.terms.contains(&(layout.weights[1], 0.04)));
        assert!(row.terms.contains(&(layout.value_at_risk, 1.0)));
        assert!(row.terms.contains(&(layout.shortfalls[1], 1.0)));

        // Loss of the 60/40 portfolio in scenario 1 is 0.002; with alpha at
        // that loss no shortfall is needed, one unit lower needs z = 1 unit.
        let mut values = vec![0.0; 7];
        values[layout.weights[0].index()] = 0.6;
        values[layout.weights[1].index()] = 0.4;
        values[layout.value_at_risk.index()] = 0.002;
        assert!(row.is_satisfied(&values, 1e-12));
        values[layout.value_at_risk.index()] = 0.001;
        assert!(!row.is_satisfied(&values, 1e-12));
        values[layout.shortfalls[1].index()] = 0.001;
        assert!(row.is_satisfied(&values, 1e-12));
    }

    #[test]
    fn test_scenario_width_must_match_universe() {
        let wide = ScenarioSet::from_rows(vec![vec![0.01, 0.02, 0.03]]).unwrap();
        assert!(matches!(
            formulate(&universe(), &wide, &risk(2)),
            Err(CvarError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_single_scenario_model() {
        let one = ScenarioSet::from_rows(vec![vec![0.01, -0.02]]).unwrap();
        let problem = formulate(&universe(), &one, &risk(1)).unwrap();
        let layout = problem.layout();
        assert_eq!(layout.shortfalls.len(), 1);
        let costs = problem.model().objective().dense_costs(problem.model().num_variables());
        assert!((costs[layout.shortfalls[0].index()] - 20.0).abs() < 1e-9);
    }
}
