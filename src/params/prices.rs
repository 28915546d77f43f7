use std::collections::BTreeMap;

use super::tables::PriceRow;
use crate::domain::{HydrogenCase, Route, Year, HYDROGEN_COMMODITY};
use crate::error::DataError;

/// Immutable `(commodity, year) -> price` lookup.
///
/// Blank cells are absent, never zero: asking for one is a
/// [`DataError::MissingPrice`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    prices: BTreeMap<String, BTreeMap<Year, f64>>,
}

impl PriceTable {
    pub fn from_rows(rows: Vec<PriceRow>) -> Self {
        let mut prices: BTreeMap<String, BTreeMap<Year, f64>> = BTreeMap::new();
        for row in rows {
            let series = prices.entry(row.commodity).or_default();
            for (year, value) in row.prices {
                if let Some(v) = value {
                    series.insert(year, v);
                }
            }
        }
        Self { prices }
    }

    pub fn price(&self, commodity: &str, year: Year) -> Result<f64, DataError> {
        self.prices
            .get(commodity)
            .and_then(|series| series.get(&year))
            .copied()
            .ok_or_else(|| DataError::MissingPrice {
                commodity: commodity.to_string(),
                year,
            })
    }

    pub fn commodities(&self) -> impl Iterator<Item = &str> {
        self.prices.keys().map(String::as_str)
    }
}

/// Price-table row for an intensity commodity under the hydrogen case.
pub fn price_row_for(commodity: &str, hydrogen: HydrogenCase) -> String {
    if commodity == HYDROGEN_COMMODITY {
        hydrogen.price_row()
    } else {
        commodity.to_string()
    }
}

/// Variable operating cost of one tonne from `route` in `year` (USD/t).
///
/// Sums intensity times resolved price over the route's commodities, plus its
/// unpriced per-tonne cost. Zero-quantity intensities need no price.
pub fn route_unit_cost(
    route: &Route,
    year: Year,
    prices: &PriceTable,
    hydrogen: HydrogenCase,
) -> Result<f64, DataError> {
    let mut cost = route.other_opex_usd_per_t;
    for (commodity, &quantity) in &route.intensities {
        if quantity == 0.0 {
            continue;
        }
        let price = prices.price(&price_row_for(commodity, hydrogen), year)?;
        cost += quantity * price;
    }
    Ok(cost)
}
