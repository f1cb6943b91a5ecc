//! YAML configuration file layout

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    config::{
        ConfigError, ConstraintToggleConfig, DEFAULT_TIME_BUDGET, ModelSettings, RunConfig,
        SolveSettings,
    },
    solvers::Backend,
};

/// Top-level configuration file.
///
/// Every section and field is optional; omitted values take their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfigFile {
    /// Constraint family switches
    pub toggles: ConstraintToggleConfig,

    /// Model-building policies
    pub model: ModelSection,

    /// Solver settings
    pub solve: SolveSection,
}

/// `model:` section
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSection {
    /// Utilization floor `θ`
    pub min_utilization: Option<Decimal>,

    /// Requested bound on each served quantity
    pub served_bound: Option<u64>,
}

/// `solve:` section
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolveSection {
    /// Wall-clock budget in seconds
    pub time_limit_secs: Option<f64>,

    /// Backend name
    pub backend: Option<Backend>,
}

impl TryFrom<RunConfigFile> for RunConfig {
    type Error = ConfigError;

    fn try_from(file: RunConfigFile) -> Result<Self, Self::Error> {
        let mut model = ModelSettings::with_min_utilization(
            file.model
                .min_utilization
                .unwrap_or_else(ModelSettings::default_min_utilization),
        )?;

        model.served_bound = file.model.served_bound;

        let time_budget = file
            .solve
            .time_limit_secs
            .map_or(Ok(DEFAULT_TIME_BUDGET), time_budget_from_secs)?;

        Ok(RunConfig {
            toggles: file.toggles,
            model,
            solve: SolveSettings {
                time_budget,
                backend: file.solve.backend.unwrap_or_default(),
            },
        })
    }
}

/// Convert a number of seconds into a non-zero [`Duration`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeBudget`] for zero, negative, or non-finite values.
pub fn time_budget_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::InvalidTimeBudget(secs));
    }

    Duration::try_from_secs_f64(secs).map_err(|_err| ConfigError::InvalidTimeBudget(secs))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> TestResult {
        let file: RunConfigFile = serde_norway::from_str("{}")?;
        let config = RunConfig::try_from(file)?;

        assert_eq!(config, RunConfig::default());

        Ok(())
    }

    #[test]
    fn zero_time_budget_is_rejected() {
        assert!(matches!(
            time_budget_from_secs(0.0),
            Err(ConfigError::InvalidTimeBudget(_))
        ));
        assert!(matches!(
            time_budget_from_secs(f64::INFINITY),
            Err(ConfigError::InvalidTimeBudget(_))
        ));
    }

    #[test]
    fn served_bound_is_carried_through() -> TestResult {
        let file: RunConfigFile = serde_norway::from_str("model:\n  served_bound: 5000\n")?;
        let config = RunConfig::try_from(file)?;

        assert_eq!(config.model.served_bound, Some(5000));

        Ok(())
    }
}
