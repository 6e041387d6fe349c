use thiserror::Error;

/// Terminal failure of an optimization run.
///
/// Every stage reports the first problem it observes and the pipeline
/// propagates it unchanged, so a run ends with exactly one of these or
/// exactly one allocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CvarError {
    /// A run parameter is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Fewer than two aligned observations survived cleaning.
    #[error("Insufficient data: {available} clean observation(s) available, at least 2 required")]
    InsufficientData { available: usize },

    /// The historical data source could not supply the requested series.
    #[error("Historical data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Solver reported the problem as infeasible")]
    SolverInfeasible,

    #[error("Solver reported the problem as unbounded")]
    SolverUnbounded,

    /// Internal solver failure, message passed through verbatim.
    #[error("Solver error: {0}")]
    SolverEngine(String),

    /// Covariance could not be factorised even after regularisation.
    #[error("Numerical error: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, CvarError>;

impl CvarError {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        CvarError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn data_unavailable(msg: impl Into<String>) -> Self {
        CvarError::DataUnavailable(msg.into())
    }
}
