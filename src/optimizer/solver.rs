//! good_lp-backed [`SolverAdapter`].
//!
//! The backend is chosen by name at run time; backends whose cargo feature is
//! not compiled in report [`SolveOutcome::SolverUnavailable`].

use std::time::Instant;

use good_lp::{Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::{Assignment, DecisionVariables, PlanningModel, SolveOutcome, SolverAdapter};
use crate::error::SolveError;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SolverType {
    /// Pure-Rust simplex with branch and bound (default)
    #[default]
    Microlp,
    /// HiGHS, faster on larger horizons
    Highs,
    /// COIN-OR CBC
    Cbc,
}

impl SolverType {
    /// Whether this backend is compiled into the binary.
    pub fn is_available(self) -> bool {
        match self {
            SolverType::Microlp => cfg!(feature = "solver-microlp"),
            SolverType::Highs => cfg!(feature = "solver-highs"),
            SolverType::Cbc => cfg!(feature = "solver-cbc"),
        }
    }
}

pub struct GoodLpSolver {
    solver_type: SolverType,
}

impl Default for GoodLpSolver {
    fn default() -> Self {
        Self {
            solver_type: SolverType::Microlp,
        }
    }
}

impl GoodLpSolver {
    pub fn new(solver_type: SolverType) -> Self {
        Self { solver_type }
    }

    /// Look up a backend by its configured name.
    pub fn from_name(name: &str) -> Result<Self, SolveError> {
        name.parse::<SolverType>()
            .map(Self::new)
            .map_err(|_| SolveError::SolverUnavailable {
                solver: name.to_string(),
            })
    }

    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }
}

impl SolverAdapter for GoodLpSolver {
    fn name(&self) -> &str {
        self.solver_type.as_ref()
    }

    fn solve(&self, model: PlanningModel) -> SolveOutcome {
        let PlanningModel {
            problem,
            objective,
            constraints,
            variables,
            stats,
        } = model;
        info!(
            solver = %self.solver_type,
            variables = stats.variables,
            constraints = stats.constraints,
            "submitting model"
        );

        let started = Instant::now();
        let outcome = match self.solver_type {
            SolverType::Microlp => solve_microlp(problem, objective, constraints, &variables),
            SolverType::Highs => solve_highs(problem, objective, constraints, &variables),
            SolverType::Cbc => solve_cbc(problem, objective, constraints, &variables),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            SolveOutcome::Optimal(a) | SolveOutcome::Feasible(a) => info!(
                solver = %self.solver_type,
                status = outcome.status(),
                objective = a.objective,
                elapsed_ms,
                "solve finished"
            ),
            SolveOutcome::Failed { reason } => warn!(solver = %self.solver_type, %reason, elapsed_ms, "solve failed"),
            other => warn!(solver = %self.solver_type, status = other.status(), elapsed_ms, "solve finished without a solution"),
        }
        outcome
    }
}

fn with_constraints<M: SolverModel>(mut lp: M, constraints: Vec<Constraint>) -> M {
    for c in constraints {
        lp = lp.with(c);
    }
    lp
}

fn extract<S: Solution>(solution: &S, objective: &Expression, vars: &DecisionVariables) -> Assignment {
    let values = |row: &Vec<good_lp::Variable>| row.iter().map(|&v| solution.value(v)).collect::<Vec<f64>>();
    Assignment {
        objective: objective.eval_with(solution),
        production: vars
            .production
            .iter()
            .map(|classes| classes.iter().map(values).collect())
            .collect(),
        capacity: vars.capacity.iter().map(values).collect(),
        build: vars.build.iter().map(values).collect(),
        ets_position: values(&vars.ets_position),
    }
}

fn from_resolution_error(err: ResolutionError) -> SolveOutcome {
    match err {
        ResolutionError::Infeasible => SolveOutcome::Infeasible,
        other => SolveOutcome::Failed {
            reason: other.to_string(),
        },
    }
}

#[cfg(feature = "solver-microlp")]
fn solve_microlp(
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    vars: &DecisionVariables,
) -> SolveOutcome {
    let lp = with_constraints(
        problem
            .minimise(objective.clone())
            .using(good_lp::solvers::microlp::microlp),
        constraints,
    );
    match lp.solve() {
        Ok(solution) => SolveOutcome::Optimal(extract(&solution, &objective, vars)),
        Err(e) => from_resolution_error(e),
    }
}

#[cfg(not(feature = "solver-microlp"))]
fn solve_microlp(_: ProblemVariables, _: Expression, _: Vec<Constraint>, _: &DecisionVariables) -> SolveOutcome {
    SolveOutcome::SolverUnavailable
}

#[cfg(feature = "solver-highs")]
fn solve_highs(
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    vars: &DecisionVariables,
) -> SolveOutcome {
    let lp = with_constraints(
        problem
            .minimise(objective.clone())
            .using(good_lp::solvers::highs::highs),
        constraints,
    );
    match lp.solve() {
        Ok(solution) => SolveOutcome::Optimal(extract(&solution, &objective, vars)),
        Err(e) => from_resolution_error(e),
    }
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(_: ProblemVariables, _: Expression, _: Vec<Constraint>, _: &DecisionVariables) -> SolveOutcome {
    SolveOutcome::SolverUnavailable
}

#[cfg(feature = "solver-cbc")]
fn solve_cbc(
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    vars: &DecisionVariables,
) -> SolveOutcome {
    let lp = with_constraints(
        problem
            .minimise(objective.clone())
            .using(good_lp::solvers::coin_cbc::coin_cbc),
        constraints,
    );
    match lp.solve() {
        Ok(solution) => SolveOutcome::Optimal(extract(&solution, &objective, vars)),
        Err(e) => from_resolution_error(e),
    }
}

#[cfg(not(feature = "solver-cbc"))]
fn solve_cbc(_: ProblemVariables, _: Expression, _: Vec<Constraint>, _: &DecisionVariables) -> SolveOutcome {
    SolveOutcome::SolverUnavailable
}
