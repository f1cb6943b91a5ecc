//! Run Configuration
//!
//! Which constraint families are added to the model, the numeric policies the model
//! builder applies, and how the solver backend is driven. Configuration files are YAML.

use std::{fmt, fs, path::Path, time::Duration};

use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::solvers::Backend;

mod file;

pub use file::{ModelSection, RunConfigFile, SolveSection, time_budget_from_secs};

/// Default wall-clock budget for one solve
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(300);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a configuration file
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse configuration YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The utilization threshold lies outside `[0, 1]`
    #[error("minimum utilization threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(Decimal),

    /// The time budget is zero or not a finite positive number of seconds
    #[error("time budget must be a positive number of seconds, got {0}")]
    InvalidTimeBudget(f64),
}

/// A named, independently togglable family of linear constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ConstraintFamily {
    /// Every customer is assigned to at least one warehouse
    Coverage,

    /// Shipments to each customer add up to exactly its demand
    ExactDemand,

    /// A warehouse ships at most its capacity, and nothing when closed
    Capacity,

    /// No shipment without an assignment flag
    LinkServedAssign,

    /// No assignment to a closed warehouse
    LinkAssignOpen,

    /// An open warehouse ships at least the utilization floor
    MinUtilization,

    /// Two prohibited customers never share a warehouse
    ProhibitedPairs,

    /// Opening a dependent warehouse opens the warehouse it requires
    DependentOpen,

    /// Warehouses in a group share one open state
    GroupedOpen,

    /// An assignment ships at least one unit
    ServeFloor,
}

impl ConstraintFamily {
    /// Every family, in model-building order
    pub const ALL: [ConstraintFamily; 10] = [
        ConstraintFamily::Coverage,
        ConstraintFamily::ExactDemand,
        ConstraintFamily::Capacity,
        ConstraintFamily::LinkServedAssign,
        ConstraintFamily::LinkAssignOpen,
        ConstraintFamily::MinUtilization,
        ConstraintFamily::ProhibitedPairs,
        ConstraintFamily::DependentOpen,
        ConstraintFamily::GroupedOpen,
        ConstraintFamily::ServeFloor,
    ];

    /// Stable snake-case name, as used in configuration files
    pub fn name(self) -> &'static str {
        match self {
            ConstraintFamily::Coverage => "coverage",
            ConstraintFamily::ExactDemand => "exact_demand",
            ConstraintFamily::Capacity => "capacity",
            ConstraintFamily::LinkServedAssign => "link_served_assign",
            ConstraintFamily::LinkAssignOpen => "link_assign_open",
            ConstraintFamily::MinUtilization => "min_utilization",
            ConstraintFamily::ProhibitedPairs => "prohibited_pairs",
            ConstraintFamily::DependentOpen => "dependent_open",
            ConstraintFamily::GroupedOpen => "grouped_open",
            ConstraintFamily::ServeFloor => "serve_floor",
        }
    }

    /// True for the families driven by [`crate::constraints::SideConstraintSet`]
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ConstraintFamily::ProhibitedPairs
                | ConstraintFamily::DependentOpen
                | ConstraintFamily::GroupedOpen
        )
    }
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On/off switch for every constraint family.
///
/// The default enables the seven core families and leaves the three structural
/// families off, so callers opt into the side constraints they supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "One flag per constraint family is the intended shape"
)]
pub struct ConstraintToggleConfig {
    /// `Σ_i assign[i][j] ≥ 1` for every customer
    pub coverage: bool,

    /// `Σ_i served[i][j] = demand[j]` for every customer
    pub exact_demand: bool,

    /// `Σ_j served[i][j] ≤ capacity[i]·open[i]` for every warehouse
    pub capacity: bool,

    /// `served[i][j] ≤ demand[j]·assign[i][j]`
    pub link_served_assign: bool,

    /// `assign[i][j] ≤ open[i]`
    pub link_assign_open: bool,

    /// `Σ_j served[i][j] ≥ ⌈θ·capacity[i]⌉·open[i]`
    pub min_utilization: bool,

    /// `assign[i][a] + assign[i][b] ≤ 1` for every prohibited pair
    pub prohibited_pairs: bool,

    /// `open[i] ≤ open[j]` for every dependency
    pub dependent_open: bool,

    /// `open[i] = open[k]` within every group
    pub grouped_open: bool,

    /// `served[i][j] ≥ assign[i][j]`
    pub serve_floor: bool,
}

impl ConstraintToggleConfig {
    /// Every family enabled
    pub fn all_enabled() -> Self {
        Self::from_fn(|_| true)
    }

    /// Every family disabled
    pub fn none_enabled() -> Self {
        Self::from_fn(|_| false)
    }

    /// Core families only, no structural side constraints
    pub fn core_only() -> Self {
        Self::from_fn(|family| !family.is_structural())
    }

    fn from_fn(mut enabled: impl FnMut(ConstraintFamily) -> bool) -> Self {
        let mut config = Self {
            coverage: false,
            exact_demand: false,
            capacity: false,
            link_served_assign: false,
            link_assign_open: false,
            min_utilization: false,
            prohibited_pairs: false,
            dependent_open: false,
            grouped_open: false,
            serve_floor: false,
        };

        for family in ConstraintFamily::ALL {
            config.set(family, enabled(family));
        }

        config
    }

    /// Whether `family` is enabled
    pub fn is_enabled(&self, family: ConstraintFamily) -> bool {
        match family {
            ConstraintFamily::Coverage => self.coverage,
            ConstraintFamily::ExactDemand => self.exact_demand,
            ConstraintFamily::Capacity => self.capacity,
            ConstraintFamily::LinkServedAssign => self.link_served_assign,
            ConstraintFamily::LinkAssignOpen => self.link_assign_open,
            ConstraintFamily::MinUtilization => self.min_utilization,
            ConstraintFamily::ProhibitedPairs => self.prohibited_pairs,
            ConstraintFamily::DependentOpen => self.dependent_open,
            ConstraintFamily::GroupedOpen => self.grouped_open,
            ConstraintFamily::ServeFloor => self.serve_floor,
        }
    }

    /// Enable or disable `family` in place
    pub fn set(&mut self, family: ConstraintFamily, enabled: bool) {
        let flag = match family {
            ConstraintFamily::Coverage => &mut self.coverage,
            ConstraintFamily::ExactDemand => &mut self.exact_demand,
            ConstraintFamily::Capacity => &mut self.capacity,
            ConstraintFamily::LinkServedAssign => &mut self.link_served_assign,
            ConstraintFamily::LinkAssignOpen => &mut self.link_assign_open,
            ConstraintFamily::MinUtilization => &mut self.min_utilization,
            ConstraintFamily::ProhibitedPairs => &mut self.prohibited_pairs,
            ConstraintFamily::DependentOpen => &mut self.dependent_open,
            ConstraintFamily::GroupedOpen => &mut self.grouped_open,
            ConstraintFamily::ServeFloor => &mut self.serve_floor,
        };

        *flag = enabled;
    }

    /// Return a copy with `family` switched to `enabled`
    #[must_use]
    pub fn with(mut self, family: ConstraintFamily, enabled: bool) -> Self {
        self.set(family, enabled);
        self
    }

    /// Enabled families, in model-building order
    pub fn enabled_families(&self) -> impl Iterator<Item = ConstraintFamily> + '_ {
        ConstraintFamily::ALL
            .into_iter()
            .filter(|family| self.is_enabled(*family))
    }

    /// True if every family enabled here is also enabled in `other`
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.enabled_families().all(|family| other.is_enabled(family))
    }
}

impl Default for ConstraintToggleConfig {
    fn default() -> Self {
        Self::core_only()
    }
}

/// Numeric policies applied while building the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Utilization floor `θ` for open warehouses, in `[0, 1]`
    pub min_utilization: Decimal,

    /// Requested upper bound for each `served[i][j]` variable.
    ///
    /// `None` uses `max(max capacity, max demand)`. A requested bound below that value
    /// would cut feasible plans and is raised to it.
    pub served_bound: Option<u64>,
}

impl ModelSettings {
    /// Default utilization floor of 80%
    pub fn default_min_utilization() -> Decimal {
        Decimal::new(8, 1)
    }

    /// Create settings with the given utilization floor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] if `min_utilization` is outside `[0, 1]`.
    pub fn with_min_utilization(min_utilization: Decimal) -> Result<Self, ConfigError> {
        if min_utilization < Decimal::ZERO || min_utilization > Decimal::ONE {
            return Err(ConfigError::InvalidThreshold(min_utilization));
        }

        Ok(Self {
            min_utilization,
            served_bound: None,
        })
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            min_utilization: Self::default_min_utilization(),
            served_bound: None,
        }
    }
}

/// How a single solve is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveSettings {
    /// Wall-clock budget for the backend
    pub time_budget: Duration,

    /// Backend to use
    pub backend: Backend,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            backend: Backend::default(),
        }
    }
}

/// Complete configuration for one run of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Enabled constraint families
    pub toggles: ConstraintToggleConfig,

    /// Model-building policies
    pub model: ModelSettings,

    /// Solver settings
    pub solve: SolveSettings,
}

impl RunConfig {
    /// Load a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or holds invalid values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the text cannot be parsed or holds invalid values.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let file: RunConfigFile = serde_norway::from_str(contents)?;

        file.try_into()
    }

    /// Apply command-line style overrides on top of this configuration.
    ///
    /// Families in `enable` are switched on before those in `disable` are switched off,
    /// so a family named in both ends up disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTimeBudget`] if the time limit is not a positive
    /// number of seconds. The configuration is left unchanged in that case.
    pub fn apply_overrides(&mut self, overrides: &RunOverrides) -> Result<(), ConfigError> {
        if let Some(secs) = overrides.time_limit_secs {
            self.solve.time_budget = time_budget_from_secs(secs)?;
        }

        if let Some(backend) = overrides.backend {
            self.solve.backend = backend;
        }

        for &family in &overrides.enable {
            self.toggles.set(family, true);
        }

        for &family in &overrides.disable {
            self.toggles.set(family, false);
        }

        Ok(())
    }
}

/// Per-run overrides layered over a [`RunConfig`], as given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOverrides {
    /// Time budget in seconds
    pub time_limit_secs: Option<f64>,

    /// Backend to use instead of the configured one
    pub backend: Option<Backend>,

    /// Families to switch on
    pub enable: Vec<ConstraintFamily>,

    /// Families to switch off, applied after `enable`
    pub disable: Vec<ConstraintFamily>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn default_toggles_enable_core_families_only() {
        let toggles = ConstraintToggleConfig::default();

        for family in ConstraintFamily::ALL {
            assert_eq!(toggles.is_enabled(family), !family.is_structural(), "{family}");
        }
    }

    #[test]
    fn with_switches_a_single_family() {
        let toggles = ConstraintToggleConfig::all_enabled().with(ConstraintFamily::ServeFloor, false);

        assert!(!toggles.serve_floor);
        assert_eq!(toggles.enabled_families().count(), 9);
    }

    #[test]
    fn subset_relation_follows_enabled_families() {
        let all = ConstraintToggleConfig::all_enabled();
        let core = ConstraintToggleConfig::core_only();
        let none = ConstraintToggleConfig::none_enabled();

        assert!(core.is_subset_of(&all));
        assert!(none.is_subset_of(&core));
        assert!(!all.is_subset_of(&core));
    }

    #[test]
    fn family_names_round_trip_through_serde() -> TestResult {
        for family in ConstraintFamily::ALL {
            let parsed: ConstraintFamily = serde_norway::from_str(family.name())?;
            assert_eq!(parsed, family);
        }

        Ok(())
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        assert!(matches!(
            ModelSettings::with_min_utilization(Decimal::new(11, 1)),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(ModelSettings::with_min_utilization(Decimal::ONE).is_ok());
    }

    #[test]
    fn yaml_overrides_selected_fields() -> TestResult {
        let config = RunConfig::from_yaml(
            "toggles:\n  min_utilization: false\n  dependent_open: true\nmodel:\n  min_utilization: 0.75\nsolve:\n  time_limit_secs: 12\n",
        )?;

        assert!(!config.toggles.min_utilization);
        assert!(config.toggles.dependent_open);
        assert!(config.toggles.capacity);
        assert_eq!(config.model.min_utilization, Decimal::new(75, 2));
        assert_eq!(config.solve.time_budget, Duration::from_secs(12));

        Ok(())
    }

    #[test]
    fn unknown_toggle_is_a_yaml_error() {
        let result = RunConfig::from_yaml("toggles:\n  capacityy: true\n");

        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn from_file_reads_yaml() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "solve:\n  time_limit_secs: 2.5")?;

        let config = RunConfig::from_file(file.path())?;

        assert_eq!(config.solve.time_budget, Duration::from_millis(2500));
        assert_eq!(config.toggles, ConstraintToggleConfig::default());

        Ok(())
    }

    #[test]
    fn overrides_replace_budget_backend_and_toggles() -> TestResult {
        let mut config = RunConfig::default();

        config.apply_overrides(&RunOverrides {
            time_limit_secs: Some(1.5),
            backend: Some(Backend::Highs),
            enable: vec![ConstraintFamily::DependentOpen],
            disable: vec![ConstraintFamily::MinUtilization],
        })?;

        assert_eq!(config.solve.time_budget, Duration::from_millis(1500));
        assert_eq!(config.solve.backend, Backend::Highs);
        assert!(config.toggles.dependent_open);
        assert!(!config.toggles.min_utilization);
        assert!(config.toggles.capacity);

        Ok(())
    }

    #[test]
    fn disable_wins_over_enable_for_the_same_family() -> TestResult {
        let mut config = RunConfig::default();

        config.apply_overrides(&RunOverrides {
            enable: vec![ConstraintFamily::GroupedOpen],
            disable: vec![ConstraintFamily::GroupedOpen],
            ..RunOverrides::default()
        })?;

        assert!(!config.toggles.grouped_open);

        Ok(())
    }

    #[test]
    fn empty_overrides_keep_the_configuration() -> TestResult {
        let mut config = RunConfig::from_yaml("solve:\n  time_limit_secs: 12\n")?;
        let before = config.clone();

        config.apply_overrides(&RunOverrides::default())?;

        assert_eq!(config, before);

        Ok(())
    }

    #[test]
    fn invalid_time_limit_leaves_the_configuration_untouched() {
        let mut config = RunConfig::default();

        let result = config.apply_overrides(&RunOverrides {
            time_limit_secs: Some(0.0),
            backend: Some(Backend::Highs),
            ..RunOverrides::default()
        });

        assert!(matches!(result, Err(ConfigError::InvalidTimeBudget(_))));
        assert_eq!(config, RunConfig::default());
    }
}
