//! Capacity-expansion and dispatch MILP.
//!
//! Variables are indexed `[route][class][year]` for production and
//! `[route][year]` for capacity and builds. The aggregate demand structure has
//! a single class; the product-class structure splits demand by class and adds
//! the feedstock cap and monotonic adoption.
//!
//! All money terms are in million USD: quantities in Mt times prices in USD/t.

use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, Variable};
use tracing::{debug, info};

use super::constraints::{CostCoefficients, PlanningOptions};
use super::types::{DecisionVariables, ModelStats, PlanningModel};
use crate::domain::DemandStructure;
use crate::error::ModelError;
use crate::params::ParameterSet;

/// Build the planning model for one run.
pub fn build_model(params: &ParameterSet, options: &PlanningOptions) -> Result<PlanningModel, ModelError> {
    if params.routes.is_empty() {
        return Err(ModelError::NoRoutes);
    }
    let structure = params.demand.structure();
    let classes = params.demand.classes();
    let restricted = match structure {
        DemandStructure::Aggregate => None,
        DemandStructure::ProductClass => Some(
            classes
                .iter()
                .position(|c| *c == options.restricted_class)
                .ok_or_else(|| ModelError::UnknownProductClass {
                    class: options.restricted_class.clone(),
                })?,
        ),
    };

    let coeffs = CostCoefficients::new(params, options.discount_rate);
    let n_routes = coeffs.routes();
    let n_years = coeffs.years();
    let n_classes = classes.len();

    let mut problem = ProblemVariables::new();
    let mut stats = ModelStats::default();

    let production: Vec<Vec<Vec<Variable>>> = (0..n_routes)
        .map(|_| {
            (0..n_classes)
                .map(|_| problem.add_vector(variable().min(0.0), n_years))
                .collect()
        })
        .collect();
    let capacity: Vec<Vec<Variable>> = (0..n_routes)
        .map(|_| problem.add_vector(variable().min(0.0), n_years))
        .collect();
    let build: Vec<Vec<Variable>> = params
        .routes
        .iter()
        .map(|route| {
            let cap = route.max_build_units_per_year.map(f64::from);
            let def = match structure {
                DemandStructure::Aggregate => {
                    let def = variable().integer().min(0.0);
                    match cap {
                        Some(max) => def.max(max),
                        None => def,
                    }
                }
                DemandStructure::ProductClass => {
                    variable().integer().min(0.0).max(cap.map_or(1.0, |m| m.min(1.0)))
                }
            };
            problem.add_vector(def, n_years)
        })
        .collect();
    let ets_position = problem.add_vector(variable().min(0.0), n_years);

    stats.variables = n_routes * n_years * (n_classes + 2) + n_years;
    stats.integer_variables = n_routes * n_years;

    let vars = DecisionVariables {
        production,
        capacity,
        build,
        ets_position,
    };

    let objective = objective(&vars, &coeffs);
    let mut constraints = Vec::new();

    capacity_balance(&vars, &coeffs, &mut constraints);
    utilization(&vars, options.utilization_rate, &mut constraints);
    demand(&vars, params, structure, &mut constraints);
    ets_slack(&vars, &coeffs, &mut constraints);
    if let Some(k) = restricted {
        feedstock_cap(&vars, params, k, &mut constraints);
        monotonic_adoption(&vars, &mut constraints);
    }

    stats.constraints = constraints.len();
    info!(
        structure = %structure,
        routes = n_routes,
        classes = n_classes,
        years = n_years,
        variables = stats.variables,
        integer_variables = stats.integer_variables,
        constraints = stats.constraints,
        "planning model built"
    );

    Ok(PlanningModel {
        problem,
        objective,
        constraints,
        variables: vars,
        stats,
    })
}

/// `Σ_t df[t]·(CAPEX + FixedOM + VariableOPEX + ETSCost)` in MUSD.
fn objective(vars: &DecisionVariables, coeffs: &CostCoefficients) -> Expression {
    let mut total = Expression::from(0.0);
    for t in 0..coeffs.years() {
        let df = coeffs.discount[t];
        let mut year_cost = Expression::from(0.0);
        for r in 0..coeffs.routes() {
            year_cost += coeffs.capex_per_unit[r] * vars.build[r][t];
            year_cost += coeffs.fixed_opex[r] * vars.capacity[r][t];
            for q in &vars.production[r] {
                year_cost += coeffs.unit_cost[r][t] * q[t];
            }
        }
        // carbon price is non-negative, so the slack is tight at optimum
        year_cost += coeffs.carbon_price[t] * vars.ets_position[t];
        total += df * year_cost;
    }
    total
}

fn capacity_balance(vars: &DecisionVariables, coeffs: &CostCoefficients, out: &mut Vec<Constraint>) {
    for r in 0..coeffs.routes() {
        let unit = coeffs.unit_capacity[r];
        for t in 0..coeffs.years() {
            let k = vars.capacity[r][t];
            let b = vars.build[r][t];
            if t == 0 {
                let initial = coeffs.initial_capacity[r];
                out.push(constraint!(k == initial + unit * b));
            } else {
                let prev = vars.capacity[r][t - 1];
                out.push(constraint!(k == prev + unit * b));
            }
        }
    }
}

fn utilization(vars: &DecisionVariables, rate: f64, out: &mut Vec<Constraint>) {
    for (r, classes) in vars.production.iter().enumerate() {
        for (t, &k) in vars.capacity[r].iter().enumerate() {
            let produced: Expression = classes.iter().map(|q| q[t]).sum();
            out.push(constraint!(produced <= rate * k));
        }
    }
}

fn demand(vars: &DecisionVariables, params: &ParameterSet, structure: DemandStructure, out: &mut Vec<Constraint>) {
    let n_classes = vars.production.first().map_or(0, Vec::len);
    for t in 0..params.horizon.len() {
        for k in 0..n_classes {
            let produced: Expression = vars.production.iter().map(|route| route[k][t]).sum();
            let required = params.demand.class_demand(k, t);
            match structure {
                DemandStructure::Aggregate => out.push(constraint!(produced == required)),
                DemandStructure::ProductClass => out.push(constraint!(produced >= required)),
            }
        }
    }
}

fn ets_slack(vars: &DecisionVariables, coeffs: &CostCoefficients, out: &mut Vec<Constraint>) {
    for t in 0..coeffs.years() {
        let mut emissions = Expression::from(0.0);
        for (r, classes) in vars.production.iter().enumerate() {
            for q in classes {
                emissions += coeffs.emission_factor[r] * q[t];
            }
        }
        let free = coeffs.free_allocation[t];
        let slack = vars.ets_position[t];
        out.push(constraint!(slack >= emissions - free));
    }
}

/// Feedstock-limited routes may serve the restricted class only up to the
/// year's feedstock supply.
fn feedstock_cap(vars: &DecisionVariables, params: &ParameterSet, class: usize, out: &mut Vec<Constraint>) {
    let limited: Vec<usize> = params
        .routes
        .iter()
        .enumerate()
        .filter(|(_, route)| route.feedstock_limited)
        .map(|(r, _)| r)
        .collect();
    if limited.is_empty() {
        debug!("no feedstock-limited routes, feedstock cap skipped");
        return;
    }
    for (t, year) in params.horizon.iter().enumerate() {
        let served: Expression = limited.iter().map(|&r| vars.production[r][class][t]).sum();
        let supply = params.feedstock_supply.get_or_zero(year);
        out.push(constraint!(served <= supply));
    }
}

/// Once a route's build indicator is set it stays set.
fn monotonic_adoption(vars: &DecisionVariables, out: &mut Vec<Constraint>) {
    for builds in &vars.build {
        for pair in builds.windows(2) {
            out.push(constraint!(pair[1] >= pair[0]));
        }
    }
}
