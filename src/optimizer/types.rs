use good_lp::{Constraint, Expression, ProblemVariables, Variable};
use serde::{Deserialize, Serialize};

/// Decision variables of one model instance.
///
/// Indices follow the [`ParameterSet`](crate::params::ParameterSet) route
/// order, the demand class order and the horizon year order.
#[derive(Debug, Clone)]
pub struct DecisionVariables {
    /// `Q[route][class][year]` production (Mt)
    pub production: Vec<Vec<Vec<Variable>>>,
    /// `K[route][year]` installed capacity (Mt/yr)
    pub capacity: Vec<Vec<Variable>>,
    /// `Build[route][year]` capacity units added
    pub build: Vec<Vec<Variable>>,
    /// `ETSpos[year]` emissions above free allocation (MtCO2)
    pub ets_position: Vec<Variable>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub variables: usize,
    pub integer_variables: usize,
    pub constraints: usize,
}

/// A built but unsolved planning model.
pub struct PlanningModel {
    pub problem: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    pub variables: DecisionVariables,
    pub stats: ModelStats,
}

/// Solved variable values, copied out of the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Objective value reported by the solve (MUSD, discounted)
    pub objective: f64,
    pub production: Vec<Vec<Vec<f64>>>,
    pub capacity: Vec<Vec<f64>>,
    pub build: Vec<Vec<f64>>,
    pub ets_position: Vec<f64>,
}

impl Assignment {
    /// Production of route `r` in year index `t`, summed over classes.
    pub fn route_production(&self, r: usize, t: usize) -> f64 {
        self.production[r].iter().map(|class| class[t]).sum()
    }

    /// Production of class `k` in year index `t`, summed over routes.
    pub fn class_production(&self, k: usize, t: usize) -> f64 {
        self.production.iter().map(|route| route[k][t]).sum()
    }
}

/// Termination of a solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(Assignment),
    Feasible(Assignment),
    Infeasible,
    SolverUnavailable,
    Failed { reason: String },
}

impl SolveOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SolveOutcome::Optimal(_) => "optimal",
            SolveOutcome::Feasible(_) => "feasible",
            SolveOutcome::Infeasible => "infeasible",
            SolveOutcome::SolverUnavailable => "solver_unavailable",
            SolveOutcome::Failed { .. } => "failed",
        }
    }

    /// Solved values, present only for optimal or feasible terminations.
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            SolveOutcome::Optimal(a) | SolveOutcome::Feasible(a) => Some(a),
            _ => None,
        }
    }
}

/// Boundary to an external optimization solver.
pub trait SolverAdapter {
    fn name(&self) -> &str;

    /// Solve synchronously, blocking until the solver terminates.
    fn solve(&self, model: PlanningModel) -> SolveOutcome;
}
