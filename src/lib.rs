//! Capacity-expansion and dispatch planning for industrial decarbonisation
//! routes.
//!
//! A run resolves tabular inputs into a [`params::ParameterSet`], builds a
//! MILP with [`optimizer::build_model`], solves it through a
//! [`optimizer::SolverAdapter`], audits the solution with
//! [`accounting::audit`] and writes the per-year series and run summary.

pub mod accounting;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod optimizer;
pub mod params;
pub mod run;
pub mod telemetry;

pub use error::{ConsistencyError, DataError, ModelError, PlannerError, SolveError};
