use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A production technology pathway.
///
/// Capacities are in Mt/yr, capital and fixed costs in USD per t/yr of
/// capacity, intensities in commodity units per tonne of output and emission
/// factors in tCO2 per tonne.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    /// Capacity added by one build unit (Mt/yr)
    pub unit_capacity_mtpa: f64,
    pub capex_usd_per_tpa: f64,
    pub fixed_opex_usd_per_tpa: f64,
    /// Capacity in place before the first planning year (Mt/yr)
    pub initial_capacity_mtpa: f64,
    /// Variable cost not tied to a priced commodity (USD/t)
    pub other_opex_usd_per_t: f64,
    /// Commodity -> quantity per tonne of output
    pub intensities: BTreeMap<String, f64>,
    /// Scope-1 emission factor before capture (tCO2/t)
    pub ef_base: f64,
    pub ccus: bool,
    /// Fraction of scope-1 emissions captured; zero unless `ccus`
    pub capture_fraction: f64,
    /// Scope-1 emission factor after capture, computed once at load time
    pub ef_effective: f64,
    /// Route draws on the scarce feedstock that caps the restricted product class
    pub feedstock_limited: bool,
    /// Upper bound on build units per year, unbounded when `None`
    pub max_build_units_per_year: Option<u32>,
}

/// Effective scope-1 factor: `ef_base * (1 - capture_fraction)` for CCUS
/// routes, `ef_base` otherwise.
pub fn effective_emission_factor(ef_base: f64, ccus: bool, capture_fraction: f64) -> f64 {
    if ccus {
        ef_base * (1.0 - capture_fraction)
    } else {
        ef_base
    }
}

impl Route {
    /// Capital cost of one build unit (MUSD).
    pub fn capex_per_unit_musd(&self) -> f64 {
        self.unit_capacity_mtpa * self.capex_usd_per_tpa
    }
}
