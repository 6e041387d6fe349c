//! Backend-neutral mixed-integer linear model and the solver capability
//! the formulation depends on.
//!
//! A [`MipModel`] only records variables, rows and a minimisation
//! objective. Any type implementing [`Solver`] can consume it; the crate
//! ships a HiGHS back end in [`highs`].

pub mod highs;

pub use self::highs::HighsSolver;

use std::fmt;

/// Handle of a variable inside one [`MipModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEqual,
    GreaterEqual,
    Equal,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::LessEqual => write!(f, "<="),
            Relation::GreaterEqual => write!(f, ">="),
            Relation::Equal => write!(f, "="),
        }
    }
}

/// `Σ coef·var  (relation)  rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.index()]).sum()
    }

    /// Whether `values` satisfy the row within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.activity(values);
        match self.relation {
            Relation::LessEqual => lhs <= self.rhs + tolerance,
            Relation::GreaterEqual => lhs >= self.rhs - tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Linear minimisation objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearObjective {
    pub terms: Vec<(VarId, f64)>,
}

impl LinearObjective {
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.index()]).sum()
    }

    /// Dense cost vector of length `num_vars`; repeated terms accumulate.
    pub fn dense_costs(&self, num_vars: usize) -> Vec<f64> {
        let mut costs = vec![0.0; num_vars];
        for &(v, c) in &self.terms {
            costs[v.index()] += c;
        }
        costs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MipModel {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<LinearConstraint>,
    objective: LinearObjective,
}

impl MipModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Continuous variable in `[lower, upper]`; infinite bounds are allowed.
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.push_variable(name.into(), VarKind::Continuous, lower, upper)
    }

    /// Variable restricted to {0, 1}.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.push_variable(name.into(), VarKind::Binary, 0.0, 1.0)
    }

    fn push_variable(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name,
            kind,
            lower,
            upper,
        });
        id
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        relation: Relation,
        rhs: f64,
    ) {
        debug_assert!(terms.iter().all(|(v, _)| v.index() < self.variables.len()));
        self.constraints.push(LinearConstraint {
            name: name.into(),
            terms,
            relation,
            rhs,
        });
    }

    pub fn set_objective(&mut self, terms: Vec<(VarId, f64)>) {
        self.objective = LinearObjective { terms };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn constraint(&self, name: &str) -> Option<&LinearConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn objective(&self) -> &LinearObjective {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_binaries(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The engine failed internally; the message is its own.
    Error(String),
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Error(msg) => write!(f, "error ({})", msg),
        }
    }
}

/// What a solver returns. Values and objective are present only when the
/// status is optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    pub objective_value: Option<f64>,
}

impl SolverOutcome {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective_value: Some(objective_value),
        }
    }

    pub fn infeasible() -> Self {
        Self::without_solution(SolveStatus::Infeasible)
    }

    pub fn unbounded() -> Self {
        Self::without_solution(SolveStatus::Unbounded)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::without_solution(SolveStatus::Error(message.into()))
    }

    fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value: None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn value(&self, id: VarId) -> Option<f64> {
        self.values.get(id.index()).copied()
    }
}

/// Solver capability consumed by the pipeline. A solve is synchronous and
/// terminal: the caller never retries a non-optimal outcome.
#[cfg_attr(test, mockall::automock)]
pub trait Solver {
    fn solve(&self, model: MipModel) -> SolverOutcome;
}
