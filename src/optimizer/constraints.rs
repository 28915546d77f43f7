use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;

/// Run switches the model builder needs beyond the parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningOptions {
    pub discount_rate: f64,
    /// Share of installed capacity that can produce in a year
    pub utilization_rate: f64,
    /// Product class whose supply from feedstock-limited routes is capped
    pub restricted_class: String,
}

impl Default for PlanningOptions {
    fn default() -> Self {
        Self {
            discount_rate: 0.05,
            utilization_rate: 0.90,
            restricted_class: "flat_auto_exposed".to_string(),
        }
    }
}

/// Per-route and per-year coefficients in model units (Mt, MtCO2, MUSD).
///
/// The objective and the post-solve audit are both written in terms of this
/// table so their cost terms agree by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CostCoefficients {
    /// `[year]` present-value weight
    pub discount: Vec<f64>,
    /// `[year]` USD/tCO2, i.e. MUSD per MtCO2
    pub carbon_price: Vec<f64>,
    /// `[year]` MtCO2
    pub free_allocation: Vec<f64>,
    /// `[route]` MUSD per build unit
    pub capex_per_unit: Vec<f64>,
    /// `[route]` MUSD per Mt/yr of installed capacity
    pub fixed_opex: Vec<f64>,
    /// `[route][year]` MUSD per Mt produced
    pub unit_cost: Vec<Vec<f64>>,
    /// `[route]` effective scope-1 factor, MtCO2 per Mt
    pub emission_factor: Vec<f64>,
    pub unit_capacity: Vec<f64>,
    pub initial_capacity: Vec<f64>,
}

impl CostCoefficients {
    pub fn new(params: &ParameterSet, discount_rate: f64) -> Self {
        let horizon = params.horizon;
        let years: Vec<_> = horizon.iter().collect();
        Self {
            discount: years
                .iter()
                .map(|&y| horizon.discount_factor(y, discount_rate))
                .collect(),
            carbon_price: years.iter().map(|&y| params.carbon_price_at(y)).collect(),
            free_allocation: years.iter().map(|&y| params.free_allocation_at(y)).collect(),
            capex_per_unit: params.routes.iter().map(|r| r.capex_per_unit_musd()).collect(),
            fixed_opex: params.routes.iter().map(|r| r.fixed_opex_usd_per_tpa).collect(),
            unit_cost: (0..params.routes.len())
                .map(|r| (0..years.len()).map(|t| params.unit_cost(r, t)).collect())
                .collect(),
            emission_factor: params.routes.iter().map(|r| r.ef_effective).collect(),
            unit_capacity: params.routes.iter().map(|r| r.unit_capacity_mtpa).collect(),
            initial_capacity: params.routes.iter().map(|r| r.initial_capacity_mtpa).collect(),
        }
    }

    pub fn routes(&self) -> usize {
        self.capex_per_unit.len()
    }

    pub fn years(&self) -> usize {
        self.discount.len()
    }
}
