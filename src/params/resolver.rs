//! Turns raw tables into one immutable [`ParameterSet`] per run.

use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::prices::{route_unit_cost, PriceTable};
use super::tables::{
    decode_rows, decode_wide_prices, CarbonPriceRow, DemandRow, EmissionFactorRow, FeedstockRow,
    FreeAllocationRow, IntensityRow, ProductShareRow, Table, TableSource, TechRouteRow,
    PRODUCT_CLASS_TABLES, REQUIRED_TABLES,
};
use crate::domain::{
    effective_emission_factor, forward_fill_then_zero, DemandFill, DemandStructure, FilledSeries,
    HydrogenCase, Route, Year, YearRange, YearSeries,
};
use crate::error::{DataError, ModelError, PlannerError};

/// Class label used for the single demand class of the aggregate structure.
pub const AGGREGATE_CLASS: &str = "total";

/// Inputs that select and shape the parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    pub scenario: String,
    pub ccus_capture_fraction: f64,
    pub hydrogen_case: HydrogenCase,
    pub demand_structure: DemandStructure,
}

/// Demand over the horizon, aggregate or split by product class.
#[derive(Debug, Clone, PartialEq)]
pub enum DemandSchedule {
    Aggregate {
        total: FilledSeries,
    },
    ProductClass {
        total: FilledSeries,
        classes: Vec<String>,
        /// `[class][year index]` in Mt
        by_class: Vec<Vec<f64>>,
    },
}

impl DemandSchedule {
    pub fn structure(&self) -> DemandStructure {
        match self {
            DemandSchedule::Aggregate { .. } => DemandStructure::Aggregate,
            DemandSchedule::ProductClass { .. } => DemandStructure::ProductClass,
        }
    }

    pub fn classes(&self) -> Vec<String> {
        match self {
            DemandSchedule::Aggregate { .. } => vec![AGGREGATE_CLASS.to_string()],
            DemandSchedule::ProductClass { classes, .. } => classes.clone(),
        }
    }

    /// Total demand in year index `t` (Mt).
    pub fn total(&self, t: usize) -> f64 {
        match self {
            DemandSchedule::Aggregate { total } | DemandSchedule::ProductClass { total, .. } => {
                total.values[t]
            }
        }
    }

    /// Demand of class index `k` in year index `t` (Mt).
    pub fn class_demand(&self, k: usize, t: usize) -> f64 {
        match self {
            DemandSchedule::Aggregate { total } => total.values[t],
            DemandSchedule::ProductClass { by_class, .. } => by_class[k][t],
        }
    }

    pub fn fill(&self, t: usize) -> DemandFill {
        match self {
            DemandSchedule::Aggregate { total } | DemandSchedule::ProductClass { total, .. } => {
                total.fill[t]
            }
        }
    }
}

/// Everything a run needs, resolved once and never mutated.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub scenario: String,
    pub horizon: YearRange,
    pub routes: Vec<Route>,
    pub hydrogen_case: HydrogenCase,
    pub prices: PriceTable,
    pub carbon_price: YearSeries,
    pub free_allocation: YearSeries,
    pub demand: DemandSchedule,
    pub feedstock_supply: YearSeries,
    /// `[route][year index]` variable operating cost (USD/t)
    unit_costs: Vec<Vec<f64>>,
}

impl ParameterSet {
    /// Variable operating cost for route index `r` in year index `t` (USD/t).
    ///
    /// The model objective and the post-solve audit both read this value.
    pub fn unit_cost(&self, r: usize, t: usize) -> f64 {
        self.unit_costs[r][t]
    }

    /// Price of `commodity` in `year`.
    pub fn price(&self, commodity: &str, year: Year) -> Result<f64, DataError> {
        self.prices.price(commodity, year)
    }

    /// Carbon price (USD/tCO2); defined for every horizon year.
    pub fn carbon_price_at(&self, year: Year) -> f64 {
        self.carbon_price.get_or_zero(year)
    }

    /// Free allocation (MtCO2); zero for unlisted years.
    pub fn free_allocation_at(&self, year: Year) -> f64 {
        self.free_allocation.get_or_zero(year)
    }

    pub fn route_index(&self, id: &str) -> Option<usize> {
        self.routes.iter().position(|r| r.id == id)
    }
}

fn require(source: &dyn TableSource, table: Table) -> Result<String, DataError> {
    source
        .read_table(table)?
        .ok_or_else(|| DataError::MissingTable {
            table: table.to_string(),
        })
}

fn invalid(table: Table, key: impl ToString, message: impl Into<String>) -> DataError {
    DataError::InvalidValue {
        table: table.to_string(),
        key: key.to_string(),
        message: message.into(),
    }
}

/// Resolve all tables for one run.
///
/// Every required table is checked for presence before anything is parsed,
/// and the carbon-price scenario is checked before any other content.
pub fn resolve(source: &dyn TableSource, opts: &ResolveOptions) -> Result<ParameterSet, PlannerError> {
    let mut needed: Vec<Table> = REQUIRED_TABLES.to_vec();
    if opts.demand_structure == DemandStructure::ProductClass {
        needed.extend(PRODUCT_CLASS_TABLES);
    }
    let mut texts = HashMap::new();
    for table in needed {
        texts.insert(table, require(source, table)?);
    }
    let text = |table: Table| texts.get(&table).map(String::as_str).unwrap_or_default();

    let (horizon, carbon_price) = resolve_carbon_price(text(Table::CarbonPrice), &opts.scenario)?;
    info!(scenario = %opts.scenario, %horizon, "selected carbon price scenario");

    let routes = resolve_routes(
        text(Table::TechRoutes),
        text(Table::EfScope1),
        text(Table::ProcessIntensity),
        opts.ccus_capture_fraction,
    )?;

    let prices = PriceTable::from_rows(decode_wide_prices(
        Table::FuelPrices,
        text(Table::FuelPrices),
        "commodity",
    )?);

    let mut unit_costs = Vec::with_capacity(routes.len());
    for route in &routes {
        let costs = horizon
            .iter()
            .map(|year| route_unit_cost(route, year, &prices, opts.hydrogen_case))
            .collect::<Result<Vec<_>, _>>()?;
        unit_costs.push(costs);
    }

    let free_allocation = resolve_year_values(
        decode_rows::<FreeAllocationRow>(
            Table::FreeAllocation,
            text(Table::FreeAllocation),
            &["year", "free_alloc_MtCO2"],
        )?
        .into_iter()
        .map(|r| (r.year, r.free_alloc_mtco2)),
        Table::FreeAllocation,
    )?;

    let total = resolve_demand(text(Table::DemandPath), horizon)?;

    let (demand, feedstock_supply) = match opts.demand_structure {
        DemandStructure::Aggregate => (DemandSchedule::Aggregate { total }, YearSeries::new()),
        DemandStructure::ProductClass => {
            let (classes, by_class) = resolve_class_shares(text(Table::ProductShares), &total, horizon)?;
            let supply = resolve_year_values(
                decode_rows::<FeedstockRow>(
                    Table::FeedstockSupply,
                    text(Table::FeedstockSupply),
                    &["year", "supply_Mt"],
                )?
                .into_iter()
                .map(|r| (r.year, r.supply_mt)),
                Table::FeedstockSupply,
            )?;
            (
                DemandSchedule::ProductClass {
                    total,
                    classes,
                    by_class,
                },
                supply,
            )
        }
    };

    info!(
        routes = routes.len(),
        years = horizon.len(),
        structure = %opts.demand_structure,
        hydrogen = %opts.hydrogen_case,
        "resolved parameter set"
    );

    Ok(ParameterSet {
        scenario: opts.scenario.clone(),
        horizon,
        routes,
        hydrogen_case: opts.hydrogen_case,
        prices,
        carbon_price,
        free_allocation,
        demand,
        feedstock_supply,
        unit_costs,
    })
}

fn resolve_carbon_price(text: &str, scenario: &str) -> Result<(YearRange, YearSeries), DataError> {
    let rows: Vec<CarbonPriceRow> = decode_rows(
        Table::CarbonPrice,
        text,
        &["scenario", "year", "price_USD_per_tCO2"],
    )?;

    let available: BTreeSet<&str> = rows.iter().map(|r| r.scenario.as_str()).collect();
    if !available.contains(scenario) {
        return Err(DataError::UnknownScenario {
            scenario: scenario.to_string(),
            available: available.into_iter().map(String::from).collect(),
        });
    }

    let mut series = YearSeries::new();
    for row in rows.iter().filter(|r| r.scenario == scenario) {
        if series.get(row.year).is_some() {
            return Err(invalid(Table::CarbonPrice, format!("{scenario}/{}", row.year), "duplicate year"));
        }
        if !row.price_usd_per_tco2.is_finite() || row.price_usd_per_tco2 < 0.0 {
            return Err(invalid(
                Table::CarbonPrice,
                format!("{scenario}/{}", row.year),
                format!("carbon price must be non-negative, got {}", row.price_usd_per_tco2),
            ));
        }
        series.insert(row.year, row.price_usd_per_tco2);
    }

    let (first, last) = match series.years().minmax().into_option() {
        Some(bounds) => bounds,
        None => return Err(DataError::EmptyHorizon),
    };
    let horizon = YearRange::new(first, last).ok_or(DataError::EmptyHorizon)?;
    let missing: Vec<Year> = horizon.iter().filter(|y| series.get(*y).is_none()).collect();
    if !missing.is_empty() {
        return Err(DataError::NonContiguousYears { missing });
    }
    Ok((horizon, series))
}

fn resolve_routes(
    routes_text: &str,
    ef_text: &str,
    intensity_text: &str,
    capture_fraction: f64,
) -> Result<Vec<Route>, PlannerError> {
    let rows: Vec<TechRouteRow> = decode_rows(
        Table::TechRoutes,
        routes_text,
        &[
            "route",
            "unit_capacity_Mtpy",
            "capex_USD_per_tpy",
            "fixed_opex_USD_per_tpy",
            "initial_capacity_Mtpy",
        ],
    )?;
    if rows.is_empty() {
        return Err(ModelError::NoRoutes.into());
    }

    let mut seen = BTreeSet::new();
    for row in &rows {
        if !seen.insert(row.route.clone()) {
            return Err(ModelError::DuplicateRoute {
                route: row.route.clone(),
            }
            .into());
        }
        if row.unit_capacity_mtpy <= 0.0 {
            return Err(invalid(Table::TechRoutes, &row.route, "unit capacity must be positive").into());
        }
        let costs = [
            row.capex_usd_per_tpy,
            row.fixed_opex_usd_per_tpy,
            row.initial_capacity_mtpy,
            row.other_opex_usd_per_t.unwrap_or(0.0),
        ];
        if costs.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid(Table::TechRoutes, &row.route, "costs and capacities must be non-negative").into());
        }
    }

    let mut ef: BTreeMap<String, f64> = BTreeMap::new();
    for row in decode_rows::<EmissionFactorRow>(Table::EfScope1, ef_text, &["route", "tCO2_per_t"])? {
        if !seen.contains(&row.route) {
            return Err(ModelError::UnknownRoute {
                table: Table::EfScope1.to_string(),
                route: row.route,
            }
            .into());
        }
        if !row.tco2_per_t.is_finite() || row.tco2_per_t < 0.0 {
            return Err(invalid(Table::EfScope1, &row.route, "emission factor must be non-negative").into());
        }
        ef.insert(row.route, row.tco2_per_t);
    }

    let mut intensities: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in decode_rows::<IntensityRow>(
        Table::ProcessIntensity,
        intensity_text,
        &["route", "commodity", "quantity_per_t"],
    )? {
        if !seen.contains(&row.route) {
            return Err(ModelError::UnknownRoute {
                table: Table::ProcessIntensity.to_string(),
                route: row.route,
            }
            .into());
        }
        if !row.quantity_per_t.is_finite() || row.quantity_per_t < 0.0 {
            let key = format!("{}/{}", row.route, row.commodity);
            return Err(invalid(Table::ProcessIntensity, key, "intensity must be non-negative").into());
        }
        *intensities
            .entry(row.route)
            .or_default()
            .entry(row.commodity)
            .or_insert(0.0) += row.quantity_per_t;
    }

    let mut routes = Vec::with_capacity(rows.len());
    for row in rows {
        let ef_base = ef.get(&row.route).copied().ok_or_else(|| DataError::MissingValue {
            table: Table::EfScope1.to_string(),
            key: row.route.clone(),
        })?;
        let ccus = row.ccus.unwrap_or(false);
        let capture = if ccus { capture_fraction } else { 0.0 };
        let route = Route {
            intensities: intensities.remove(&row.route).unwrap_or_default(),
            unit_capacity_mtpa: row.unit_capacity_mtpy,
            capex_usd_per_tpa: row.capex_usd_per_tpy,
            fixed_opex_usd_per_tpa: row.fixed_opex_usd_per_tpy,
            initial_capacity_mtpa: row.initial_capacity_mtpy,
            other_opex_usd_per_t: row.other_opex_usd_per_t.unwrap_or(0.0),
            ef_base,
            ccus,
            capture_fraction: capture,
            ef_effective: effective_emission_factor(ef_base, ccus, capture),
            feedstock_limited: row.feedstock_limited.unwrap_or(false),
            max_build_units_per_year: row.max_build_units_per_year,
            id: row.route,
        };
        debug!(route = %route.id, ef_base, ef_effective = route.ef_effective, "route resolved");
        routes.push(route);
    }
    Ok(routes)
}

fn resolve_year_values(
    rows: impl Iterator<Item = (Year, f64)>,
    table: Table,
) -> Result<YearSeries, DataError> {
    let mut series = YearSeries::new();
    for (year, value) in rows {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(table, year, format!("value must be non-negative, got {value}")));
        }
        if series.get(year).is_some() {
            return Err(invalid(table, year, "duplicate year"));
        }
        series.insert(year, value);
    }
    Ok(series)
}

fn resolve_demand(text: &str, horizon: YearRange) -> Result<FilledSeries, DataError> {
    let rows: Vec<DemandRow> = decode_rows(Table::DemandPath, text, &["year", "demand_Mt"])?;
    let mut observed: BTreeMap<Year, Option<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(v) = row.demand_mt {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(Table::DemandPath, row.year, "demand must be non-negative"));
            }
        }
        if observed.insert(row.year, row.demand_mt).is_some() {
            return Err(invalid(Table::DemandPath, row.year, "duplicate year"));
        }
    }

    let filled = forward_fill_then_zero(&observed, horizon);
    for (year, fill) in horizon.iter().zip(&filled.fill) {
        match fill {
            DemandFill::Observed => {}
            DemandFill::ForwardFilled => info!(year, "demand gap forward-filled"),
            DemandFill::ZeroFilled => warn!(year, "demand gap with no prior value, set to zero"),
        }
    }
    Ok(filled)
}

fn resolve_class_shares(
    text: &str,
    total: &FilledSeries,
    horizon: YearRange,
) -> Result<(Vec<String>, Vec<Vec<f64>>), DataError> {
    let rows: Vec<ProductShareRow> =
        decode_rows(Table::ProductShares, text, &["year", "product_class", "share"])?;

    let classes: Vec<String> = rows
        .iter()
        .map(|r| r.product_class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let shares: BTreeMap<(Year, &str), f64> = rows
        .iter()
        .map(|r| ((r.year, r.product_class.as_str()), r.share))
        .collect();

    let mut by_class = vec![Vec::with_capacity(horizon.len()); classes.len()];
    for (t, year) in horizon.iter().enumerate() {
        for (k, class) in classes.iter().enumerate() {
            let share = shares
                .get(&(year, class.as_str()))
                .copied()
                .ok_or_else(|| DataError::MissingValue {
                    table: Table::ProductShares.to_string(),
                    key: format!("{year}/{class}"),
                })?;
            if !(0.0..=1.0).contains(&share) {
                return Err(invalid(Table::ProductShares, format!("{year}/{class}"), "share must be within [0, 1]"));
            }
            by_class[k].push(total.values[t] * share);
        }
    }
    Ok((classes, by_class))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{options, tables};
    use super::*;

    #[test]
    fn test_resolve_aggregate() {
        let params = resolve(&tables(), &options()).unwrap();
        assert_eq!(params.horizon, YearRange::new(2025, 2027).unwrap());
        assert_eq!(params.routes.len(), 3);
        assert_eq!(params.carbon_price_at(2026), 60.0);
        assert_eq!(params.free_allocation_at(2027), 0.0);

        // forward-filled gap
        assert_eq!(params.demand.total(1), 18.0);
        assert_eq!(params.demand.fill(1), DemandFill::ForwardFilled);
        assert_eq!(params.demand.classes(), vec![AGGREGATE_CLASS.to_string()]);
    }

    #[test]
    fn test_effective_factor_resolved_once() {
        let params = resolve(&tables(), &options()).unwrap();
        let ccus = &params.routes[params.route_index("BF-BOF+CCUS").unwrap()];
        assert!(ccus.ccus);
        assert!((ccus.ef_effective - 2.1 * 0.2).abs() < 1e-12);
        let bof = &params.routes[params.route_index("BF-BOF").unwrap()];
        assert_eq!(bof.ef_effective, 2.0);
        assert_eq!(bof.capture_fraction, 0.0);
    }

    #[test]
    fn test_unit_costs_precomputed() {
        let params = resolve(&tables(), &options()).unwrap();
        let bof = params.route_index("BF-BOF").unwrap();
        // 25 + 1.5*100 + 0.7*200
        assert!((params.unit_cost(bof, 0) - 315.0).abs() < 1e-9);
        let eaf = params.route_index("Scrap EAF").unwrap();
        // 10 + 1.1*350 + 0.6*80
        assert!((params.unit_cost(eaf, 2) - 443.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_scenario() {
        let mut opts = options();
        opts.scenario = "NGFS_Below1C".into();
        let err = resolve(&tables(), &opts).unwrap_err();
        match err {
            PlannerError::Data(DataError::UnknownScenario { scenario, available }) => {
                assert_eq!(scenario, "NGFS_Below1C");
                assert_eq!(available, vec!["NGFS_CurrentPolicies", "NGFS_NetZero2050"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_table_checked_first() {
        let mut source = tables();
        source.remove(Table::FreeAllocation);
        // an unknown scenario would also fail, but the missing table wins
        let mut opts = options();
        opts.scenario = "nope".into();
        let err = resolve(&source, &opts).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Data(DataError::MissingTable { ref table }) if table == "free_allocation_linked"
        ));
    }

    #[test]
    fn test_product_class_tables_required_only_for_product_class() {
        let mut source = tables();
        source.remove(Table::ProductShares);
        assert!(resolve(&source, &options()).is_ok());

        let mut opts = options();
        opts.demand_structure = DemandStructure::ProductClass;
        let err = resolve(&source, &opts).unwrap_err();
        assert!(matches!(err, PlannerError::Data(DataError::MissingTable { .. })));
    }

    #[test]
    fn test_missing_price_is_fatal() {
        let source = tables().with(
            Table::FuelPrices,
            "commodity,2025,2026,2027\niron_ore,100,100,100\ncoking_coal,200,,200\nscrap,350,350,350\nelectricity,80,80,80\n",
        );
        let err = resolve(&source, &options()).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Data(DataError::MissingPrice { ref commodity, year: 2026 }) if commodity == "coking_coal"
        ));
    }

    #[test]
    fn test_intensity_for_unknown_route() {
        let source = tables().with(
            Table::ProcessIntensity,
            "route,commodity,quantity_per_t\nHyREX,hydrogen,55\n",
        );
        let err = resolve(&source, &options()).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Model(ModelError::UnknownRoute { ref route, .. }) if route == "HyREX"
        ));
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let source = tables().with(
            Table::ProcessIntensity,
            "route,commodity,quantity_per_t\nBF-BOF,coking_coal,0.7\nBF-BOF,coking_coal,-0.5\n",
        );
        let err = resolve(&source, &options()).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Data(DataError::InvalidValue { ref key, .. }) if key == "BF-BOF/coking_coal"
        ));

        let source = tables().with(Table::ProcessIntensity, "route,commodity,quantity_per_t\nBF-BOF,coking_coal,NaN\n");
        assert!(matches!(
            resolve(&source, &options()).unwrap_err(),
            PlannerError::Data(DataError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_route_without_emission_factor() {
        let source = tables().with(Table::EfScope1, "route,tCO2_per_t\nBF-BOF,2.0\nScrap EAF,0.1\n");
        let err = resolve(&source, &options()).unwrap_err();
        assert!(matches!(err, PlannerError::Data(DataError::MissingValue { ref key, .. }) if key == "BF-BOF+CCUS"));
    }

    #[test]
    fn test_non_contiguous_scenario_years() {
        let source = tables().with(
            Table::CarbonPrice,
            "scenario,year,price_USD_per_tCO2\nS,2025,10\nS,2027,30\n",
        );
        let mut opts = options();
        opts.scenario = "S".into();
        let err = resolve(&source, &opts).unwrap_err();
        assert!(matches!(err, PlannerError::Data(DataError::NonContiguousYears { ref missing }) if missing == &vec![2026]));
    }

    #[test]
    fn test_negative_carbon_price_rejected() {
        let source = tables().with(Table::CarbonPrice, "scenario,year,price_USD_per_tCO2\nS,2025,-5\n");
        let mut opts = options();
        opts.scenario = "S".into();
        assert!(matches!(
            resolve(&source, &opts).unwrap_err(),
            PlannerError::Data(DataError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_product_class_demand_split() {
        let mut opts = options();
        opts.demand_structure = DemandStructure::ProductClass;
        let params = resolve(&tables(), &opts).unwrap();
        let classes = params.demand.classes();
        assert_eq!(classes, vec!["flat_auto_exposed", "flat_other", "long"]);
        assert!((params.demand.class_demand(0, 0) - 4.5).abs() < 1e-12);
        assert!((params.demand.class_demand(0, 2) - 19.0 * 0.3).abs() < 1e-12);
        assert_eq!(params.feedstock_supply.get(2026), Some(2.0));
    }

    #[test]
    fn test_missing_share_is_fatal() {
        let source = tables().with(
            Table::ProductShares,
            "year,product_class,share\n2025,long,1.0\n2026,long,1.0\n",
        );
        let mut opts = options();
        opts.demand_structure = DemandStructure::ProductClass;
        assert!(matches!(
            resolve(&source, &opts).unwrap_err(),
            PlannerError::Data(DataError::MissingValue { ref key, .. }) if key == "2027/long"
        ));
    }
}
