//! Structural invariants of solved plans on the bundled `data/` tables.

#![cfg(feature = "solver-microlp")]

use std::path::{Path, PathBuf};

use decarb_planner::config::Config;
use decarb_planner::domain::{DemandFill, DemandStructure, HydrogenCase};
use decarb_planner::optimizer::{build_model, GoodLpSolver, SolverAdapter};
use decarb_planner::params::{resolve, CsvDirectory, ParameterSet};
use decarb_planner::run::execute;
use rstest::rstest;

const EPS: f64 = 1e-6;

fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn config(out: &Path, structure: DemandStructure, hydrogen: HydrogenCase) -> Config {
    let mut cfg = Config::default();
    cfg.data.dir = data_dir();
    cfg.output.dir = out.to_path_buf();
    cfg.model.demand_structure = structure;
    cfg.model.hydrogen_case = hydrogen;
    cfg
}

#[rstest]
#[case(DemandStructure::Aggregate, HydrogenCase::Baseline)]
#[case(DemandStructure::Aggregate, HydrogenCase::Optimistic)]
#[case(DemandStructure::ProductClass, HydrogenCase::Baseline)]
fn test_solved_plan_invariants(#[case] structure: DemandStructure, #[case] hydrogen: HydrogenCase) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), structure, hydrogen);
    let source = CsvDirectory::new(data_dir());
    let params: ParameterSet = resolve(&source, &cfg.resolve_options()).unwrap();
    let planning = cfg.planning_options();

    let model = build_model(&params, &planning).unwrap();
    let outcome = GoodLpSolver::default().solve(model);
    let a = outcome.assignment().expect("sample data should solve");

    for (r, route) in params.routes.iter().enumerate() {
        for t in 0..params.horizon.len() {
            let previous = if t == 0 {
                route.initial_capacity_mtpa
            } else {
                a.capacity[r][t - 1]
            };
            let added = route.unit_capacity_mtpa * a.build[r][t];
            assert!((a.capacity[r][t] - previous - added).abs() < EPS, "capacity balance {} {t}", route.id);
            assert!(a.route_production(r, t) <= planning.utilization_rate * a.capacity[r][t] + EPS);
        }
    }

    for t in 0..params.horizon.len() {
        for k in 0..params.demand.classes().len() {
            let produced = a.class_production(k, t);
            let demand = params.demand.class_demand(k, t);
            match structure {
                DemandStructure::Aggregate => assert!((produced - demand).abs() < EPS),
                DemandStructure::ProductClass => assert!(produced >= demand - EPS),
            }
        }
        let emissions: f64 = params
            .routes
            .iter()
            .enumerate()
            .map(|(r, route)| route.ef_effective * a.route_production(r, t))
            .sum();
        let year = params.horizon.start() + t as i32;
        let expected = (emissions - params.free_allocation_at(year)).max(0.0);
        // every sample carbon price is positive, so the slack is tight
        assert!((a.ets_position[t] - expected).abs() < 1e-3, "ETS slack in {year}");
    }

    if structure == DemandStructure::ProductClass {
        for builds in &a.build {
            assert!(builds.iter().all(|b| *b < 1.0 + EPS));
            assert!(builds.windows(2).all(|w| w[1] >= w[0] - EPS));
        }

        let classes = params.demand.classes();
        let k = classes.iter().position(|c| *c == planning.restricted_class).unwrap();
        for (t, year) in params.horizon.iter().enumerate() {
            let served: f64 = params
                .routes
                .iter()
                .enumerate()
                .filter(|(_, route)| route.feedstock_limited)
                .map(|(r, _)| a.production[r][k][t])
                .sum();
            let supply = params.feedstock_supply.get_or_zero(year);
            assert!(served <= supply + EPS, "feedstock cap in {year}: {served} > {supply}");
        }
    }
}

#[test]
fn test_full_run_writes_series_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), DemandStructure::Aggregate, HydrogenCase::Baseline);
    let report = execute(&cfg, &CsvDirectory::new(data_dir()), &GoodLpSolver::default()).unwrap();

    assert!(report.series_path.exists());
    assert!(report.summary_path.exists());
    assert_eq!(report.ledger.records.len(), 6);
    // 2027 is blank in demand_path.csv
    assert_eq!(report.ledger.records[2].demand_fill, DemandFill::ForwardFilled);
    assert!((report.ledger.records[2].demand_mt - 34.2).abs() < EPS);

    let mut rdr = csv::Reader::from_path(&report.series_path).unwrap();
    assert!(rdr.headers().unwrap().iter().any(|h| h == "Q_H2-DRI-EAF"));
    assert_eq!(rdr.records().count(), 6);

    let summary = report.summary;
    assert_eq!(summary.scenario, "NGFS_NetZero2050");
    assert!((summary.total_production_mt.unwrap() - report.ledger.total_production()).abs() < EPS);
}
