use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use decarb_planner::config::{Config, Overrides};
use decarb_planner::domain::{DemandStructure, HydrogenCase};
use decarb_planner::params::CsvDirectory;
use decarb_planner::telemetry::{init_tracing, DEFAULT_FILTER};
use decarb_planner::run;

/// Multi-period capacity expansion and dispatch planner for decarbonisation routes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of input tables
    #[arg(long, visible_alias = "data")]
    params: Option<PathBuf>,

    /// Carbon price scenario name
    #[arg(long)]
    carbon_scenario: Option<String>,

    /// Annual discount rate
    #[arg(long)]
    discount: Option<f64>,

    /// Capacity utilization rate
    #[arg(long)]
    util: Option<f64>,

    /// Hydrogen price case: baseline or optimistic
    #[arg(long)]
    hydrogen_case: Option<HydrogenCase>,

    /// Demand structure: aggregate or product_class
    #[arg(long)]
    demand_structure: Option<DemandStructure>,

    /// Solver backend: microlp, highs or cbc
    #[arg(long)]
    solver: Option<String>,

    /// Output directory
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Resolve parameters and build the model without solving or writing
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.params.clone(),
            carbon_scenario: self.carbon_scenario.clone(),
            discount_rate: self.discount,
            utilization_rate: self.util,
            hydrogen_case: self.hydrogen_case,
            demand_structure: self.demand_structure,
            solver: self.solver.clone(),
            output_dir: self.outdir.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(DEFAULT_FILTER);

    let cfg = Config::load(cli.config.as_deref())?
        .apply(cli.overrides())
        .validated()?;

    if cli.dry_run {
        let stats = run::dry_run(&cfg, &CsvDirectory::new(&cfg.data.dir))?;
        info!(
            variables = stats.variables,
            integer_variables = stats.integer_variables,
            constraints = stats.constraints,
            "dry run complete"
        );
        return Ok(());
    }

    let report = run::run(&cfg)?;
    info!(
        summary = %report.summary_path.display(),
        series = %report.series_path.display(),
        objective_musd = report.ledger.solver_objective,
        "outputs written"
    );
    Ok(())
}
