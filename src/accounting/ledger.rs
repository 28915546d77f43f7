//! Post-solve audit of a solved plan.
//!
//! Every quantity is recomputed from solved values and the same
//! [`CostCoefficients`] the objective was built from. The ETS cost is computed
//! twice (slack path and emissions path) and the two must agree.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{DemandFill, DemandStructure, Year};
use crate::error::ConsistencyError;
use crate::optimizer::{Assignment, CostCoefficients, PlanningOptions};
use crate::params::ParameterSet;

/// Absolute tolerance between the two ETS cost paths (MUSD, i.e. 1000 USD).
pub const ETS_TOLERANCE_MUSD: f64 = 1e-3;
/// Absolute tolerance on demand satisfaction (Mt).
pub const DEMAND_TOLERANCE_MT: f64 = 1e-6;

/// Cost components of one year (MUSD).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub capex: f64,
    pub fixed_opex: f64,
    pub variable_opex: f64,
    pub ets: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.capex + self.fixed_opex + self.variable_opex + self.ets
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            capex: self.capex * factor,
            fixed_opex: self.fixed_opex * factor,
            variable_opex: self.variable_opex * factor,
            ets: self.ets * factor,
        }
    }
}

/// One route in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteYear {
    pub route: String,
    pub production_mt: f64,
    pub capacity_mtpa: f64,
    pub build_units: f64,
    pub emissions_mtco2: f64,
    pub capex_musd: f64,
    pub fixed_opex_musd: f64,
    pub variable_opex_musd: f64,
}

/// Audited results for one horizon year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub year: Year,
    pub discount_factor: f64,
    pub demand_mt: f64,
    pub demand_fill: DemandFill,
    pub routes: Vec<RouteYear>,
    pub total_production_mt: f64,
    pub emissions_mtco2: f64,
    pub free_allocation_mtco2: f64,
    /// USD/tCO2
    pub carbon_price: f64,
    /// ETS slack variable (MtCO2)
    pub ets_position_mtco2: f64,
    /// Slack times carbon price (MUSD)
    pub ets_cost_slack_musd: f64,
    /// `max(0, emissions - free allocation)` times carbon price (MUSD)
    pub ets_cost_audit_musd: f64,
    pub cost: CostBreakdown,
    pub discounted: CostBreakdown,
    pub cumulative_emissions_mtco2: f64,
    pub cumulative_production_mt: f64,
    /// Outcome of the year's demand check. A year that fails it raises
    /// `DemandUnmet` instead of producing a record.
    pub demand_satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub routes: Vec<String>,
    pub records: Vec<YearRecord>,
    /// Objective value reported by the solver (MUSD)
    pub solver_objective: f64,
}

impl Ledger {
    /// Sum of discounted yearly totals (MUSD).
    pub fn discounted_total(&self) -> f64 {
        self.records.iter().map(|r| r.discounted.total()).sum()
    }

    pub fn undiscounted_total(&self) -> f64 {
        self.records.iter().map(|r| r.cost.total()).sum()
    }

    pub fn cumulative_emissions(&self) -> f64 {
        self.records.last().map_or(0.0, |r| r.cumulative_emissions_mtco2)
    }

    pub fn total_production(&self) -> f64 {
        self.records.last().map_or(0.0, |r| r.cumulative_production_mt)
    }
}

/// Recompute and cross-check a solved plan.
///
/// `params` and `options` must be the ones the model was built from.
pub fn audit(
    params: &ParameterSet,
    options: &PlanningOptions,
    assignment: &Assignment,
) -> Result<Ledger, ConsistencyError> {
    let coeffs = CostCoefficients::new(params, options.discount_rate);
    let structure = params.demand.structure();
    let classes = params.demand.classes();

    let mut records = Vec::with_capacity(coeffs.years());
    let mut cumulative_emissions = 0.0;
    let mut cumulative_production = 0.0;

    for (t, year) in params.horizon.iter().enumerate() {
        let mut routes = Vec::with_capacity(coeffs.routes());
        let mut cost = CostBreakdown::default();
        let mut emissions = 0.0;

        for (r, route) in params.routes.iter().enumerate() {
            let production = assignment.route_production(r, t);
            let row = RouteYear {
                route: route.id.clone(),
                production_mt: production,
                capacity_mtpa: assignment.capacity[r][t],
                build_units: assignment.build[r][t],
                emissions_mtco2: coeffs.emission_factor[r] * production,
                capex_musd: coeffs.capex_per_unit[r] * assignment.build[r][t],
                fixed_opex_musd: coeffs.fixed_opex[r] * assignment.capacity[r][t],
                variable_opex_musd: coeffs.unit_cost[r][t] * production,
            };
            emissions += row.emissions_mtco2;
            cost.capex += row.capex_musd;
            cost.fixed_opex += row.fixed_opex_musd;
            cost.variable_opex += row.variable_opex_musd;
            routes.push(row);
        }

        let carbon_price = coeffs.carbon_price[t];
        let free = coeffs.free_allocation[t];
        let slack = assignment.ets_position[t];
        let ets_cost_slack = slack * carbon_price;
        let ets_cost_audit = (emissions - free).max(0.0) * carbon_price;
        if (ets_cost_slack - ets_cost_audit).abs() > ETS_TOLERANCE_MUSD {
            return Err(ConsistencyError::EtsMismatch {
                year,
                slack_cost: ets_cost_slack,
                audited_cost: ets_cost_audit,
            });
        }
        cost.ets = ets_cost_slack;

        let total_production: f64 = routes.iter().map(|r| r.production_mt).sum();
        let demand_satisfied = check_demand(params, assignment, structure, &classes, t, year)?;

        cumulative_emissions += emissions;
        cumulative_production += total_production;
        let df = coeffs.discount[t];

        debug!(year, emissions, ets_cost = ets_cost_slack, total = cost.total(), "year audited");
        records.push(YearRecord {
            year,
            discount_factor: df,
            demand_mt: params.demand.total(t),
            demand_fill: params.demand.fill(t),
            routes,
            total_production_mt: total_production,
            emissions_mtco2: emissions,
            free_allocation_mtco2: free,
            carbon_price,
            ets_position_mtco2: slack,
            ets_cost_slack_musd: ets_cost_slack,
            ets_cost_audit_musd: ets_cost_audit,
            cost,
            discounted: cost.scaled(df),
            cumulative_emissions_mtco2: cumulative_emissions,
            cumulative_production_mt: cumulative_production,
            demand_satisfied,
        });
    }

    let ledger = Ledger {
        routes: params.routes.iter().map(|r| r.id.clone()).collect(),
        records,
        solver_objective: assignment.objective,
    };

    let audited = ledger.discounted_total();
    let tolerance = ETS_TOLERANCE_MUSD.max(1e-6 * assignment.objective.abs());
    if (audited - assignment.objective).abs() > tolerance {
        return Err(ConsistencyError::ObjectiveMismatch {
            solver: assignment.objective,
            audited,
        });
    }

    info!(
        discounted_total = audited,
        undiscounted_total = ledger.undiscounted_total(),
        cumulative_emissions = ledger.cumulative_emissions(),
        total_production = ledger.total_production(),
        "plan audited"
    );
    Ok(ledger)
}

fn check_demand(
    params: &ParameterSet,
    assignment: &Assignment,
    structure: DemandStructure,
    classes: &[String],
    t: usize,
    year: Year,
) -> Result<bool, ConsistencyError> {
    let shortfall = classes.iter().enumerate().find_map(|(k, class)| {
        let produced = assignment.class_production(k, t);
        let demand = params.demand.class_demand(k, t);
        let met = match structure {
            DemandStructure::Aggregate => (produced - demand).abs() < DEMAND_TOLERANCE_MT,
            DemandStructure::ProductClass => produced >= demand - DEMAND_TOLERANCE_MT,
        };
        (!met).then(|| (class, produced, demand))
    });
    match shortfall {
        None => Ok(true),
        Some((class, produced, demand)) => Err(ConsistencyError::DemandUnmet {
            year,
            class: class.clone(),
            produced,
            demand,
        }),
    }
}
