//! Persisted run artifacts: `series_<scenario>.csv` and
//! `summary_<scenario>.json`.
//!
//! Both files are written to a temporary sibling and renamed into place, so a
//! reader never sees a partial file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::accounting::{Ledger, RunSummary, YearRecord};
use crate::error::ExportError;

pub fn series_path(dir: &Path, scenario: &str) -> PathBuf {
    dir.join(format!("series_{scenario}.csv"))
}

pub fn summary_path(dir: &Path, scenario: &str) -> PathBuf {
    dir.join(format!("summary_{scenario}.json"))
}

fn io_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn commit(tmp: &Path, path: &Path) -> Result<(), ExportError> {
    fs::rename(tmp, path).map_err(|e| io_error(path, e))
}

/// Column headers; per-route columns follow the ledger's route order.
pub fn series_header(routes: &[String]) -> Vec<String> {
    let mut header: Vec<String> = ["year", "discount_factor", "demand_Mt", "demand_fill"]
        .into_iter()
        .map(String::from)
        .collect();
    for prefix in ["Q", "K", "Build"] {
        header.extend(routes.iter().map(|r| format!("{prefix}_{r}")));
    }
    header.extend(
        [
            "total_production_Mt",
            "emissions_MtCO2",
            "free_alloc_MtCO2",
            "carbon_price_USD_per_tCO2",
            "ets_position_MtCO2",
            "ets_cost_slack_MUSD",
            "ets_cost_audit_MUSD",
        ]
        .into_iter()
        .map(String::from),
    );
    for component in ["capex", "fixed_opex", "variable_opex"] {
        header.extend(routes.iter().map(|r| format!("{component}_{r}_MUSD")));
    }
    for prefix in ["", "discounted_"] {
        header.extend(
            ["capex", "fixed_opex", "variable_opex", "ets_cost", "total_cost"]
                .iter()
                .map(|c| format!("{prefix}{c}_MUSD")),
        );
    }
    header.extend(
        [
            "cumulative_emissions_MtCO2",
            "cumulative_production_Mt",
            "demand_satisfied",
        ]
        .into_iter()
        .map(String::from),
    );
    header
}

fn series_row(rec: &YearRecord) -> Vec<String> {
    let mut row = vec![
        rec.year.to_string(),
        rec.discount_factor.to_string(),
        rec.demand_mt.to_string(),
        rec.demand_fill.to_string(),
    ];
    row.extend(rec.routes.iter().map(|r| r.production_mt.to_string()));
    row.extend(rec.routes.iter().map(|r| r.capacity_mtpa.to_string()));
    row.extend(rec.routes.iter().map(|r| r.build_units.to_string()));
    row.extend(
        [
            rec.total_production_mt,
            rec.emissions_mtco2,
            rec.free_allocation_mtco2,
            rec.carbon_price,
            rec.ets_position_mtco2,
            rec.ets_cost_slack_musd,
            rec.ets_cost_audit_musd,
        ]
        .iter()
        .map(f64::to_string),
    );
    row.extend(rec.routes.iter().map(|r| r.capex_musd.to_string()));
    row.extend(rec.routes.iter().map(|r| r.fixed_opex_musd.to_string()));
    row.extend(rec.routes.iter().map(|r| r.variable_opex_musd.to_string()));
    for cost in [&rec.cost, &rec.discounted] {
        row.extend(
            [cost.capex, cost.fixed_opex, cost.variable_opex, cost.ets, cost.total()]
                .iter()
                .map(f64::to_string),
        );
    }
    row.push(rec.cumulative_emissions_mtco2.to_string());
    row.push(rec.cumulative_production_mt.to_string());
    row.push(rec.demand_satisfied.to_string());
    row
}

/// Write the per-year series for `scenario` into `dir`.
pub fn write_series(dir: &Path, scenario: &str, ledger: &Ledger) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let path = series_path(dir, scenario);
    let tmp = temp_path(&path);
    let csv_error = |source| ExportError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(&tmp).map_err(csv_error)?;
    writer.write_record(series_header(&ledger.routes)).map_err(csv_error)?;
    for rec in &ledger.records {
        writer.write_record(series_row(rec)).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| io_error(&tmp, e))?;
    drop(writer);

    commit(&tmp, &path)?;
    info!(path = %path.display(), rows = ledger.records.len(), "series written");
    Ok(path)
}

pub fn write_summary(dir: &Path, summary: &RunSummary) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    let path = summary_path(dir, &summary.scenario);
    let tmp = temp_path(&path);

    let body = serde_json::to_string_pretty(summary).map_err(|source| ExportError::Json {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(&tmp, body).map_err(|e| io_error(&tmp, e))?;
    commit(&tmp, &path)?;
    info!(path = %path.display(), status = %summary.status, "summary written");
    Ok(path)
}

/// Remove a series left by an earlier run of `scenario`.
pub fn remove_stale_series(dir: &Path, scenario: &str) -> Result<(), ExportError> {
    let path = series_path(dir, scenario);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "stale series removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(&path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{CostBreakdown, RouteYear};
    use crate::domain::DemandFill;

    fn ledger() -> Ledger {
        let route = RouteYear {
            route: "EAF".into(),
            production_mt: 9.0,
            capacity_mtpa: 10.0,
            build_units: 1.0,
            emissions_mtco2: 0.9,
            capex_musd: 1000.0,
            fixed_opex_musd: 50.0,
            variable_opex_musd: 360.0,
        };
        let cost = CostBreakdown {
            capex: 1000.0,
            fixed_opex: 50.0,
            variable_opex: 360.0,
            ets: 0.0,
        };
        Ledger {
            routes: vec!["EAF".into()],
            records: vec![YearRecord {
                year: 2025,
                discount_factor: 1.0,
                demand_mt: 9.0,
                demand_fill: DemandFill::Observed,
                routes: vec![route],
                total_production_mt: 9.0,
                emissions_mtco2: 0.9,
                free_allocation_mtco2: 0.0,
                carbon_price: 0.0,
                ets_position_mtco2: 0.9,
                ets_cost_slack_musd: 0.0,
                ets_cost_audit_musd: 0.0,
                cost,
                discounted: cost,
                cumulative_emissions_mtco2: 0.9,
                cumulative_production_mt: 9.0,
                demand_satisfied: true,
            }],
            solver_objective: 1410.0,
        }
    }

    #[test]
    fn test_header_matches_row_width() {
        let ledger = ledger();
        let header = series_header(&ledger.routes);
        assert_eq!(header.len(), series_row(&ledger.records[0]).len());
        assert!(header.contains(&"Q_EAF".to_string()));
        assert!(header.contains(&"Build_EAF".to_string()));
        assert!(header.contains(&"discounted_total_cost_MUSD".to_string()));
    }

    #[test]
    fn test_write_series_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_series(dir.path(), "S", &ledger()).unwrap();
        assert_eq!(path, series_path(dir.path(), "S"));
        assert!(!temp_path(&path).exists());

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "2025");
        assert_eq!(&rows[0][3], "observed");
    }

    #[test]
    fn test_remove_stale_series() {
        let dir = tempfile::tempdir().unwrap();
        remove_stale_series(dir.path(), "S").unwrap();
        write_series(dir.path(), "S", &ledger()).unwrap();
        remove_stale_series(dir.path(), "S").unwrap();
        assert!(!series_path(dir.path(), "S").exists());
    }
}
