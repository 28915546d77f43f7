//! Single-shot pipeline: resolve, build, solve, audit, export.
//!
//! Nothing is shared between runs. Results are written only for an optimal or
//! feasible solve that passes the audit; every other outcome writes a failure
//! summary and removes any series left by an earlier run of the scenario.

use std::path::PathBuf;

use tracing::{error, info};

use crate::accounting::{audit, Ledger, RunContext, RunStatus, RunSummary};
use crate::config::Config;
use crate::error::{PlannerError, SolveError};
use crate::export::{remove_stale_series, write_series, write_summary};
use crate::optimizer::{build_model, GoodLpSolver, ModelStats, SolveOutcome, SolverAdapter};
use crate::params::{resolve, CsvDirectory, TableSource};

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub summary_path: PathBuf,
    pub series_path: PathBuf,
    pub ledger: Ledger,
}

fn context(cfg: &Config, solver: &str) -> RunContext {
    RunContext {
        scenario: cfg.scenario.carbon_price.clone(),
        discount_rate: cfg.model.discount_rate,
        hydrogen_case: cfg.model.hydrogen_case,
        demand_structure: cfg.model.demand_structure,
        solver: solver.to_string(),
    }
}

/// Run against the configured data directory and solver backend.
pub fn run(cfg: &Config) -> Result<RunReport, PlannerError> {
    let source = CsvDirectory::new(&cfg.data.dir);
    match GoodLpSolver::from_name(&cfg.solver.name) {
        Ok(solver) => execute(cfg, &source, &solver),
        Err(e) => fail(cfg, &context(cfg, &cfg.solver.name), e.into()),
    }
}

/// Run against an explicit table source and solver.
pub fn execute(cfg: &Config, source: &dyn TableSource, solver: &dyn SolverAdapter) -> Result<RunReport, PlannerError> {
    let ctx = context(cfg, solver.name());
    info!(scenario = %ctx.scenario, solver = %ctx.solver, "run started");

    let (ledger, status) = match plan(cfg, source, solver) {
        Ok(planned) => planned,
        Err(e) => return fail(cfg, &ctx, e),
    };

    let series_path = match write_series(&cfg.output.dir, &ctx.scenario, &ledger) {
        Ok(path) => path,
        Err(e) => return fail(cfg, &ctx, e.into()),
    };
    let summary = RunSummary::success(&ctx, status, &ledger, series_path.display().to_string());
    // the series must not outlive a summary that failed to land
    let summary_path = match write_summary(&cfg.output.dir, &summary) {
        Ok(path) => path,
        Err(e) => return fail(cfg, &ctx, e.into()),
    };

    info!(
        status = %status,
        objective = ledger.solver_objective,
        cumulative_emissions = ledger.cumulative_emissions(),
        "run finished"
    );
    Ok(RunReport {
        summary,
        summary_path,
        series_path,
        ledger,
    })
}

/// Resolve and build without solving or writing anything.
pub fn dry_run(cfg: &Config, source: &dyn TableSource) -> Result<ModelStats, PlannerError> {
    let params = resolve(source, &cfg.resolve_options())?;
    let model = build_model(&params, &cfg.planning_options())?;
    info!(
        variables = model.stats.variables,
        constraints = model.stats.constraints,
        "dry run, nothing solved or written"
    );
    Ok(model.stats)
}

fn plan(cfg: &Config, source: &dyn TableSource, solver: &dyn SolverAdapter) -> Result<(Ledger, RunStatus), PlannerError> {
    let params = resolve(source, &cfg.resolve_options())?;
    let planning = cfg.planning_options();
    let model = build_model(&params, &planning)?;

    let name = solver.name().to_string();
    let (assignment, status) = match solver.solve(model) {
        SolveOutcome::Optimal(a) => (a, RunStatus::Optimal),
        SolveOutcome::Feasible(a) => (a, RunStatus::Feasible),
        SolveOutcome::Infeasible => return Err(SolveError::Infeasible { solver: name }.into()),
        SolveOutcome::SolverUnavailable => return Err(SolveError::SolverUnavailable { solver: name }.into()),
        SolveOutcome::Failed { reason } => return Err(SolveError::Failed { solver: name, reason }.into()),
    };

    let ledger = audit(&params, &planning, &assignment)?;
    Ok((ledger, status))
}

/// Record the failure and hand the error back.
fn fail(cfg: &Config, ctx: &RunContext, err: PlannerError) -> Result<RunReport, PlannerError> {
    error!(scenario = %ctx.scenario, kind = err.kind(), error = %err, "run failed");
    if let Err(e) = remove_stale_series(&cfg.output.dir, &ctx.scenario) {
        error!(error = %e, "could not remove stale series");
    }
    if let Err(e) = write_summary(&cfg.output.dir, &RunSummary::failure(ctx, &err)) {
        error!(error = %e, "could not write failure summary");
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{series_path, summary_path};
    use crate::optimizer::PlanningModel;
    use crate::params::resolver::fixtures::tables;

    struct Unavailable;

    impl SolverAdapter for Unavailable {
        fn name(&self) -> &str {
            "offline"
        }

        fn solve(&self, _model: PlanningModel) -> SolveOutcome {
            SolveOutcome::SolverUnavailable
        }
    }

    fn config(out: &std::path::Path) -> Config {
        let mut cfg = Config::default();
        cfg.output.dir = out.to_path_buf();
        cfg
    }

    #[test]
    fn test_unavailable_solver_writes_failure_summary_only() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::write(series_path(dir.path(), "NGFS_NetZero2050"), "stale").unwrap();

        let err = execute(&cfg, &tables(), &Unavailable).unwrap_err();
        assert_eq!(err.kind(), "solver_unavailable");
        assert!(!series_path(dir.path(), "NGFS_NetZero2050").exists());

        let text = std::fs::read_to_string(summary_path(dir.path(), "NGFS_NetZero2050")).unwrap();
        let summary: RunSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(summary.status, RunStatus::SolverUnavailable);
        assert_eq!(summary.solver, "offline");
    }

    #[test]
    fn test_unknown_backend_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.solver.name = "gurobi".into();
        let err = run(&cfg).unwrap_err();
        assert_eq!(err.kind(), "solver_unavailable");
        assert!(summary_path(dir.path(), "NGFS_NetZero2050").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let stats = dry_run(&cfg, &tables()).unwrap();
        assert_eq!(stats.constraints, 24);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(feature = "solver-microlp")]
    #[test]
    fn test_summary_write_failure_removes_series() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        // a directory where the summary's temporary file should go
        std::fs::create_dir(dir.path().join("summary_NGFS_NetZero2050.json.tmp")).unwrap();

        let err = execute(&cfg, &tables(), &GoodLpSolver::default()).unwrap_err();
        assert_eq!(err.kind(), "export_error");
        assert!(!series_path(dir.path(), "NGFS_NetZero2050").exists());
        assert!(!summary_path(dir.path(), "NGFS_NetZero2050").exists());
    }
}
