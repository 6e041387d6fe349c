//! Minimum-CVaR portfolio allocation under budget and cardinality
//! constraints.
//!
//! A run draws multivariate-normal return scenarios from historical data,
//! encodes the Rockafellar–Uryasev CVaR linearisation as a mixed-integer
//! program, hands it to a [`solver::Solver`] and reads the allocation back.

pub mod config;
pub mod error;
pub mod extract;
pub mod formulation;
pub mod market_data;
pub mod optimizer;
pub mod portfolio;
pub mod scenarios;
pub mod solver;
pub mod stats;

pub use config::{OptimizerConfig, RiskParameters, RunParameters, SolverSettings};
pub use error::{CvarError, Result};
pub use optimizer::{CvarOptimizer, OptimizationReport};
pub use portfolio::{AssetUniverse, PortfolioAllocation};
