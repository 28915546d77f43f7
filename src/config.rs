use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::domain::{DemandStructure, HydrogenCase};
use crate::error::PlannerError;
use crate::optimizer::PlanningOptions;
use crate::params::ResolveOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "DECARB__";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub data: DataConfig,
    #[validate(nested)]
    pub scenario: ScenarioConfig,
    #[validate(nested)]
    pub model: ModelConfig,
    #[validate(nested)]
    pub solver: SolverConfig,
    #[validate(nested)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataConfig {
    /// Directory holding one `<table>.csv` per input table
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("data") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScenarioConfig {
    #[validate(length(min = 1))]
    pub carbon_price: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            carbon_price: "NGFS_NetZero2050".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub discount_rate: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub utilization_rate: f64,
    pub hydrogen_case: HydrogenCase,
    #[validate(range(min = 0.0, max = 1.0))]
    pub ccus_capture_fraction: f64,
    pub demand_structure: DemandStructure,
    #[validate(length(min = 1))]
    pub restricted_class: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let planning = PlanningOptions::default();
        Self {
            discount_rate: planning.discount_rate,
            utilization_rate: planning.utilization_rate,
            hydrogen_case: HydrogenCase::Baseline,
            ccus_capture_fraction: 0.80,
            demand_structure: DemandStructure::Aggregate,
            restricted_class: planning.restricted_class,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SolverConfig {
    /// good_lp backend: `microlp`, `highs` or `cbc`
    #[validate(length(min = 1))]
    pub name: String,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            name: "microlp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
        }
    }
}

/// Values given on the command line; each one replaces the file/env value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub carbon_scenario: Option<String>,
    pub discount_rate: Option<f64>,
    pub utilization_rate: Option<f64>,
    pub hydrogen_case: Option<HydrogenCase>,
    pub demand_structure: Option<DemandStructure>,
    pub solver: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Defaults, then the TOML file at `path`, then `DECARB__` environment
    /// variables (`DECARB__MODEL__DISCOUNT_RATE=0.07`).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, PlannerError> {
        let path = match path {
            Some(p) if !p.is_file() => {
                return Err(PlannerError::Config(format!("config file {} not found", p.display())));
            }
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };
        Self::figment(&path)
            .extract()
            .map_err(|e| PlannerError::Config(e.to_string()))
    }

    pub fn apply(mut self, o: Overrides) -> Self {
        if let Some(v) = o.data_dir {
            self.data.dir = v;
        }
        if let Some(v) = o.carbon_scenario {
            self.scenario.carbon_price = v;
        }
        if let Some(v) = o.discount_rate {
            self.model.discount_rate = v;
        }
        if let Some(v) = o.utilization_rate {
            self.model.utilization_rate = v;
        }
        if let Some(v) = o.hydrogen_case {
            self.model.hydrogen_case = v;
        }
        if let Some(v) = o.demand_structure {
            self.model.demand_structure = v;
        }
        if let Some(v) = o.solver {
            self.solver.name = v;
        }
        if let Some(v) = o.output_dir {
            self.output.dir = v;
        }
        self
    }

    pub fn validated(self) -> Result<Self, PlannerError> {
        self.validate()
            .map_err(|e| PlannerError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            scenario: self.scenario.carbon_price.clone(),
            ccus_capture_fraction: self.model.ccus_capture_fraction,
            hydrogen_case: self.model.hydrogen_case,
            demand_structure: self.model.demand_structure,
        }
    }

    pub fn planning_options(&self) -> PlanningOptions {
        PlanningOptions {
            discount_rate: self.model.discount_rate,
            utilization_rate: self.model.utilization_rate,
            restricted_class: self.model.restricted_class.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default().validated().unwrap();
        assert_eq!(cfg.solver.name, "microlp");
        assert_eq!(cfg.model.discount_rate, 0.05);
        assert_eq!(cfg.model.restricted_class, "flat_auto_exposed");
    }

    #[test]
    fn test_file_layer_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\ndiscount_rate = 0.07\nhydrogen_case = \"optimistic\"\n\n[scenario]\ncarbon_price = \"NGFS_NDCs\""
        )
        .unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.model.discount_rate, 0.07);
        assert_eq!(cfg.model.hydrogen_case, HydrogenCase::Optimistic);
        assert_eq!(cfg.scenario.carbon_price, "NGFS_NDCs");
        // untouched sections keep their defaults
        assert_eq!(cfg.model.utilization_rate, 0.90);
        assert_eq!(cfg.output.dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/planner.toml"))).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_overrides_then_validation() {
        let cfg = Config::default().apply(Overrides {
            discount_rate: Some(1.5),
            solver: Some("highs".into()),
            ..Overrides::default()
        });
        assert_eq!(cfg.solver.name, "highs");
        assert!(matches!(cfg.validated(), Err(PlannerError::Config(_))));
    }

    #[test]
    fn test_options_follow_config() {
        let cfg = Config::default().apply(Overrides {
            utilization_rate: Some(0.85),
            demand_structure: Some(DemandStructure::ProductClass),
            ..Overrides::default()
        });
        assert_eq!(cfg.planning_options().utilization_rate, 0.85);
        assert_eq!(cfg.resolve_options().demand_structure, DemandStructure::ProductClass);
        assert_eq!(cfg.resolve_options().ccus_capture_fraction, 0.80);
    }
}
