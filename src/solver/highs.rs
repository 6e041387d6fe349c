use super::{MipModel, Relation, Solver, SolverOutcome, VarKind};
use crate::config::SolverSettings;
use ::highs::{Col, HighsModelStatus, RowProblem, Sense};
use log::{debug, warn};

/// [`Solver`] backed by the HiGHS MIP solver.
#[derive(Debug, Clone, Default)]
pub struct HighsSolver {
    settings: SolverSettings,
}

impl HighsSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    fn build_problem(model: &MipModel) -> RowProblem {
        let mut problem = RowProblem::default();
        let costs = model.objective().dense_costs(model.num_variables());

        let columns: Vec<Col> = model
            .variables()
            .iter()
            .zip(costs)
            .map(|(var, cost)| match var.kind {
                VarKind::Continuous => problem.add_column(cost, var.lower..=var.upper),
                VarKind::Binary => problem.add_integer_column(cost, 0.0..=1.0),
            })
            .collect();

        for row in model.constraints() {
            let factors: Vec<(Col, f64)> = row
                .terms
                .iter()
                .map(|&(v, coef)| (columns[v.index()], coef))
                .collect();
            match row.relation {
                Relation::LessEqual => problem.add_row(..=row.rhs, &factors),
                Relation::GreaterEqual => problem.add_row(row.rhs.., &factors),
                Relation::Equal => problem.add_row(row.rhs..=row.rhs, &factors),
            };
        }

        problem
    }
}

impl Solver for HighsSolver {
    fn solve(&self, model: MipModel) -> SolverOutcome {
        debug!(
            "Solving {} with HiGHS: {} variables ({} binary), {} rows",
            model.name(),
            model.num_variables(),
            model.num_binaries(),
            model.constraints().len()
        );

        let mut highs_model = Self::build_problem(&model).optimise(Sense::Minimise);
        if !self.settings.verbose {
            highs_model.make_quiet();
        }
        highs_model.set_option("mip_rel_gap", self.settings.mip_rel_gap);
        if let Some(limit) = self.settings.time_limit_secs {
            highs_model.set_option("time_limit", limit);
        }

        let solved = match highs_model.try_solve() {
            Ok(solved) => solved,
            Err(status) => return SolverOutcome::error(format!("HiGHS run failed: {:?}", status)),
        };

        match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                if values.len() != model.num_variables() {
                    return SolverOutcome::error(format!(
                        "HiGHS returned {} column values for {} variables",
                        values.len(),
                        model.num_variables()
                    ));
                }
                let objective = model.objective().evaluate(&values);
                SolverOutcome::optimal(values, objective)
            }
            HighsModelStatus::Infeasible => SolverOutcome::infeasible(),
            HighsModelStatus::Unbounded => SolverOutcome::unbounded(),
            HighsModelStatus::UnboundedOrInfeasible => {
                warn!("HiGHS could not distinguish infeasible from unbounded; reporting infeasible");
                SolverOutcome::infeasible()
            }
            other => SolverOutcome::error(format!("HiGHS stopped with status {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolveStatus;

    #[test]
    fn test_small_mip() {
        // max x + 2y  s.t. x + y <= 1.5, y binary, x in [0, 1]
        let mut model = MipModel::new("small");
        let x = model.add_continuous("x", 0.0, 1.0);
        let y = model.add_binary("y");
        model.add_constraint("cap", vec![(x, 1.0), (y, 1.0)], Relation::LessEqual, 1.5);
        model.set_objective(vec![(x, -1.0), (y, -2.0)]);

        let outcome = HighsSolver::default().solve(model);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert!((outcome.value(y).unwrap() - 1.0).abs() < 1e-6);
        assert!((outcome.value(x).unwrap() - 0.5).abs() < 1e-6);
        assert!((outcome.objective_value.unwrap() + 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_rows() {
        let mut model = MipModel::new("infeasible");
        let x = model.add_continuous("x", 0.0, 1.0);
        model.add_constraint("too_big", vec![(x, 1.0)], Relation::Equal, 2.0);
        model.set_objective(vec![(x, 1.0)]);

        let outcome = HighsSolver::default().solve(model);
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.values.is_empty());
    }

    #[test]
    fn test_free_variable_bounded_by_rows() {
        // min a  s.t. a >= -3
        let mut model = MipModel::new("free");
        let a = model.add_continuous("a", f64::NEG_INFINITY, f64::INFINITY);
        model.add_constraint("floor", vec![(a, 1.0)], Relation::GreaterEqual, -3.0);
        model.set_objective(vec![(a, 1.0)]);

        let outcome = HighsSolver::default().solve(model);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert!((outcome.value(a).unwrap() + 3.0).abs() < 1e-6);
    }
}
