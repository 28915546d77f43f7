//! Raw tabular inputs.
//!
//! Every table is a CSV document. Where it comes from is behind
//! [`TableSource`] so runs can read a directory of files and tests can feed
//! inline text.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::Year;
use crate::error::DataError;

/// Named input tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum Table {
    #[strum(serialize = "tech_routes")]
    TechRoutes,
    #[strum(serialize = "process_intensity")]
    ProcessIntensity,
    #[strum(serialize = "ef_scope1")]
    EfScope1,
    #[strum(serialize = "fuel_prices")]
    FuelPrices,
    #[strum(serialize = "carbon_price")]
    CarbonPrice,
    #[strum(serialize = "free_allocation_linked")]
    FreeAllocation,
    #[strum(serialize = "demand_path")]
    DemandPath,
    #[strum(serialize = "product_shares")]
    ProductShares,
    #[strum(serialize = "feedstock_supply")]
    FeedstockSupply,
}

/// Tables every run needs.
pub const REQUIRED_TABLES: [Table; 7] = [
    Table::TechRoutes,
    Table::ProcessIntensity,
    Table::EfScope1,
    Table::FuelPrices,
    Table::CarbonPrice,
    Table::FreeAllocation,
    Table::DemandPath,
];

/// Extra tables needed by the product-class demand structure.
pub const PRODUCT_CLASS_TABLES: [Table; 2] = [Table::ProductShares, Table::FeedstockSupply];

pub trait TableSource {
    /// CSV text of `table`, or `None` when the source does not have it.
    fn read_table(&self, table: Table) -> Result<Option<String>, DataError>;
}

/// Reads `<dir>/<table>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, table: Table) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }
}

impl TableSource for CsvDirectory {
    fn read_table(&self, table: Table) -> Result<Option<String>, DataError> {
        let path = self.path_for(table);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| DataError::Io {
                table: table.to_string(),
                source,
            })
    }
}

/// Tables held in memory, keyed by table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTables {
    tables: HashMap<Table, String>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, table: Table, csv: impl Into<String>) -> Self {
        self.tables.insert(table, csv.into());
        self
    }

    pub fn insert(&mut self, table: Table, csv: impl Into<String>) {
        self.tables.insert(table, csv.into());
    }

    pub fn remove(&mut self, table: Table) {
        self.tables.remove(&table);
    }
}

impl TableSource for InMemoryTables {
    fn read_table(&self, table: Table) -> Result<Option<String>, DataError> {
        Ok(self.tables.get(&table).cloned())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TechRouteRow {
    pub route: String,
    #[serde(rename = "unit_capacity_Mtpy")]
    pub unit_capacity_mtpy: f64,
    #[serde(rename = "capex_USD_per_tpy")]
    pub capex_usd_per_tpy: f64,
    #[serde(rename = "fixed_opex_USD_per_tpy")]
    pub fixed_opex_usd_per_tpy: f64,
    #[serde(rename = "initial_capacity_Mtpy")]
    pub initial_capacity_mtpy: f64,
    #[serde(rename = "other_opex_USD_per_t", default)]
    pub other_opex_usd_per_t: Option<f64>,
    #[serde(default)]
    pub ccus: Option<bool>,
    #[serde(default)]
    pub feedstock_limited: Option<bool>,
    #[serde(default)]
    pub max_build_units_per_year: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntensityRow {
    pub route: String,
    pub commodity: String,
    pub quantity_per_t: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmissionFactorRow {
    pub route: String,
    #[serde(rename = "tCO2_per_t")]
    pub tco2_per_t: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarbonPriceRow {
    pub scenario: String,
    pub year: Year,
    #[serde(rename = "price_USD_per_tCO2")]
    pub price_usd_per_tco2: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeAllocationRow {
    pub year: Year,
    #[serde(rename = "free_alloc_MtCO2")]
    pub free_alloc_mtco2: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemandRow {
    pub year: Year,
    #[serde(rename = "demand_Mt")]
    pub demand_mt: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductShareRow {
    pub year: Year,
    pub product_class: String,
    pub share: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedstockRow {
    pub year: Year,
    #[serde(rename = "supply_Mt")]
    pub supply_mt: f64,
}

/// One row of the wide commodity price table; `None` marks a blank cell.
#[derive(Debug, Clone)]
pub struct PriceRow {
    pub commodity: String,
    pub prices: Vec<(Year, Option<f64>)>,
}

// ============================================================================
// Decoding
// ============================================================================

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

fn check_columns(table: Table, headers: &StringRecord, required: &[&str]) -> Result<(), DataError> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(DataError::MissingColumn {
                table: table.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

fn parse_error(table: Table, index: usize, err: impl ToString) -> DataError {
    DataError::Parse {
        table: table.to_string(),
        // header is line 1
        row: index + 2,
        message: err.to_string(),
    }
}

/// Decode typed rows after checking that `required` columns exist.
pub fn decode_rows<T: DeserializeOwned>(
    table: Table,
    text: &str,
    required: &[&str],
) -> Result<Vec<T>, DataError> {
    let mut rdr = reader(text);
    let headers = rdr.headers().map_err(|e| parse_error(table, 0, e))?.clone();
    check_columns(table, &headers, required)?;

    rdr.deserialize()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| parse_error(table, i, e)))
        .collect()
}

/// Decode a wide table keyed by `key_column` with one column per year.
pub fn decode_wide_prices(table: Table, text: &str, key_column: &str) -> Result<Vec<PriceRow>, DataError> {
    let mut rdr = reader(text);
    let headers = rdr.headers().map_err(|e| parse_error(table, 0, e))?.clone();
    check_columns(table, &headers, &[key_column])?;

    let mut key_idx = 0;
    let mut year_cols = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        if header == key_column {
            key_idx = idx;
        } else if let Ok(year) = header.parse::<Year>() {
            year_cols.push((idx, year));
        }
        // other descriptive columns (units, notes) are ignored
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| parse_error(table, i, e))?;
        let commodity = record.get(key_idx).unwrap_or_default().to_string();
        if commodity.is_empty() {
            continue;
        }
        let mut prices = Vec::with_capacity(year_cols.len());
        for &(idx, year) in &year_cols {
            let cell = record.get(idx).unwrap_or_default();
            let value = if cell.is_empty() {
                None
            } else {
                Some(cell.parse::<f64>().map_err(|e| {
                    parse_error(table, i, format!("{commodity}/{year}: {e}"))
                })?)
            };
            prices.push((year, value));
        }
        rows.push(PriceRow { commodity, prices });
    }
    Ok(rows)
}
