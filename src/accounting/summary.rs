use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::Ledger;
use crate::domain::{DemandStructure, HydrogenCase};
use crate::error::{PlannerError, SolveError};

/// Terminal state of a run as recorded in its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Optimal,
    Feasible,
    Infeasible,
    SolverUnavailable,
    SolverFailed,
    ConsistencyFailed,
    DataError,
    ModelError,
    ConfigError,
    ExportError,
}

impl RunStatus {
    pub fn is_success(self) -> bool {
        matches!(self, RunStatus::Optimal | RunStatus::Feasible)
    }
}

impl From<&PlannerError> for RunStatus {
    fn from(err: &PlannerError) -> Self {
        match err {
            PlannerError::Data(_) => RunStatus::DataError,
            PlannerError::Model(_) => RunStatus::ModelError,
            PlannerError::Solve(SolveError::Infeasible { .. }) => RunStatus::Infeasible,
            PlannerError::Solve(SolveError::SolverUnavailable { .. }) => RunStatus::SolverUnavailable,
            PlannerError::Solve(SolveError::Failed { .. }) => RunStatus::SolverFailed,
            PlannerError::Consistency(_) => RunStatus::ConsistencyFailed,
            PlannerError::Config(_) => RunStatus::ConfigError,
            PlannerError::Export(_) => RunStatus::ExportError,
        }
    }
}

/// Run-level record written next to the per-year series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub scenario: String,
    pub discount_rate: f64,
    pub hydrogen_case: HydrogenCase,
    pub demand_structure: DemandStructure,
    pub solver: String,
    pub status: RunStatus,
    /// Discounted total cost (MUSD)
    pub objective_musd: Option<f64>,
    pub cumulative_emissions_mtco2: Option<f64>,
    pub total_production_mt: Option<f64>,
    pub series_path: Option<String>,
    pub message: Option<String>,
}

/// Fields shared by success and failure summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub scenario: String,
    pub discount_rate: f64,
    pub hydrogen_case: HydrogenCase,
    pub demand_structure: DemandStructure,
    pub solver: String,
}

impl RunSummary {
    fn base(ctx: &RunContext, status: RunStatus) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            scenario: ctx.scenario.clone(),
            discount_rate: ctx.discount_rate,
            hydrogen_case: ctx.hydrogen_case,
            demand_structure: ctx.demand_structure,
            solver: ctx.solver.clone(),
            status,
            objective_musd: None,
            cumulative_emissions_mtco2: None,
            total_production_mt: None,
            series_path: None,
            message: None,
        }
    }

    pub fn success(ctx: &RunContext, status: RunStatus, ledger: &Ledger, series_path: impl Into<String>) -> Self {
        Self {
            objective_musd: Some(ledger.solver_objective),
            cumulative_emissions_mtco2: Some(ledger.cumulative_emissions()),
            total_production_mt: Some(ledger.total_production()),
            series_path: Some(series_path.into()),
            ..Self::base(ctx, status)
        }
    }

    pub fn failure(ctx: &RunContext, err: &PlannerError) -> Self {
        Self {
            message: Some(err.to_string()),
            ..Self::base(ctx, RunStatus::from(err))
        }
    }
}
