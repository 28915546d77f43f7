//! Error taxonomy for a planning run.
//!
//! Each family maps to one stage of the pipeline: data errors stop the run
//! before a model exists, model errors stop it during construction, solve
//! errors come back across the solver boundary, and consistency errors mean
//! the model and the post-solve audit disagree (a defect, never data).

use thiserror::Error;

use crate::domain::Year;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("required table missing: {table}")]
    MissingTable { table: String },

    #[error("table {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("table {table}, row {row}: {message}")]
    Parse {
        table: String,
        row: usize,
        message: String,
    },

    #[error("carbon price scenario {scenario:?} not found (available: {})", available.join(", "))]
    UnknownScenario {
        scenario: String,
        available: Vec<String>,
    },

    #[error("no price for {commodity} in {year}")]
    MissingPrice { commodity: String, year: Year },

    #[error("table {table} has no value for {key}")]
    MissingValue { table: String, key: String },

    #[error("table {table}, {key}: {message}")]
    InvalidValue {
        table: String,
        key: String,
        message: String,
    },

    #[error("scenario years are not contiguous, missing: {missing:?}")]
    NonContiguousYears { missing: Vec<Year> },

    #[error("scenario defines no years")]
    EmptyHorizon,

    #[error("failed to read table {table}: {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("route {route} referenced in {table} is not a known route")]
    UnknownRoute { table: String, route: String },

    #[error("route {route} is defined more than once")]
    DuplicateRoute { route: String },

    #[error("product class {class} does not exist in product_shares")]
    UnknownProductClass { class: String },

    #[error("no technology routes defined")]
    NoRoutes,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("model is infeasible ({solver})")]
    Infeasible { solver: String },

    #[error("solver {solver} is not available in this build")]
    SolverUnavailable { solver: String },

    #[error("solver {solver} failed: {reason}")]
    Failed { solver: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error(
        "ETS cost mismatch in {year}: slack path {slack_cost:.6} vs audit path {audited_cost:.6} MUSD"
    )]
    EtsMismatch {
        year: Year,
        slack_cost: f64,
        audited_cost: f64,
    },

    #[error("demand not met in {year} for {class}: produced {produced:.6} Mt, demand {demand:.6} Mt")]
    DemandUnmet {
        year: Year,
        class: String,
        produced: f64,
        demand: f64,
    },

    #[error("objective mismatch: solver {solver:.6} vs audited {audited:.6} MUSD")]
    ObjectiveMismatch { solver: f64, audited: f64 },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error writing {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Umbrella error returned by the pipeline entry points.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("model construction error: {0}")]
    Model(#[from] ModelError),

    #[error("solve error: {0}")]
    Solve(#[from] SolveError),

    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

impl PlannerError {
    /// Short machine-readable tag, used as the run status in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerError::Data(_) => "data_error",
            PlannerError::Model(_) => "model_error",
            PlannerError::Solve(SolveError::Infeasible { .. }) => "infeasible",
            PlannerError::Solve(SolveError::SolverUnavailable { .. }) => "solver_unavailable",
            PlannerError::Solve(SolveError::Failed { .. }) => "solver_failed",
            PlannerError::Consistency(_) => "consistency_failed",
            PlannerError::Config(_) => "config_error",
            PlannerError::Export(_) => "export_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scenario_lists_available() {
        let err = DataError::UnknownScenario {
            scenario: "Mystery".into(),
            available: vec!["NGFS_NDCs".into(), "NGFS_NetZero2050".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Mystery"));
        assert!(msg.contains("NGFS_NDCs, NGFS_NetZero2050"));
    }

    #[test]
    fn test_kind_tags() {
        let err: PlannerError = SolveError::Infeasible {
            solver: "microlp".into(),
        }
        .into();
        assert_eq!(err.kind(), "infeasible");

        let err: PlannerError = DataError::EmptyHorizon.into();
        assert_eq!(err.kind(), "data_error");
    }
}
