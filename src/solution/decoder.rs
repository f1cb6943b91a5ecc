//! Solution Decoder

use std::collections::BTreeMap;

use num_traits::ToPrimitive;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    instance::ProblemInstance,
    model::{DecisionVariables, observer::VariableRole},
    solution::{Solution, within_relative_tolerance},
    solvers::{RawAssignment, VariableValues},
};

/// Binary threshold for determining truthiness
pub const BINARY_THRESHOLD: f64 = 0.5;

/// Largest distance from an integer a `served` value may have
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Decoding errors
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    /// The recomputed plan cost disagrees with the backend's objective.
    #[error("backend objective {reported} disagrees with recomputed plan cost {recomputed}")]
    ObjectiveMismatch {
        /// Objective reported for the raw assignment
        reported: f64,

        /// Cost recomputed from the decoded plan
        recomputed: f64,
    },

    /// The assignment carries no value for a decision variable.
    #[error("no value assigned to {role:?}")]
    MissingValue {
        /// Variable without a value
        role: VariableRole,
    },

    /// A served quantity is not within tolerance of a non-negative integer.
    #[error("served quantity {value} from warehouse {warehouse} to customer {customer} is not integral")]
    NonIntegral {
        /// Warehouse index
        warehouse: usize,

        /// Customer index
        customer: usize,

        /// Raw value
        value: f64,
    },
}

/// Turns raw backend values into a [`Solution`].
#[derive(Debug, Clone, Copy)]
pub struct SolutionDecoder<'a> {
    instance: &'a ProblemInstance,
    variables: &'a DecisionVariables,
}

impl<'a> SolutionDecoder<'a> {
    /// Create a decoder for the variables of one formulation.
    pub fn new(instance: &'a ProblemInstance, variables: &'a DecisionVariables) -> Self {
        Self {
            instance,
            variables,
        }
    }

    /// Decode a raw assignment.
    ///
    /// Outcomes without an assignment decode to a plan with every warehouse closed and no
    /// objective.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if a value is missing, a served quantity is not integral,
    /// or the recomputed cost disagrees with the backend objective.
    pub fn decode(&self, raw: &RawAssignment) -> Result<Solution, DecodeError> {
        let values = match &raw.values {
            Some(values) if raw.status.carries_assignment() => values,
            _ => {
                debug!(status = %raw.status, "outcome carries no assignment");

                return Ok(Solution::without_assignment(
                    raw.status,
                    self.instance.warehouse_count(),
                ));
            }
        };

        let open = self.decode_open(values)?;
        let served = self.decode_served(values)?;

        let recomputed = self.instance.plan_cost(&open, &served);

        if let Some(reported) = raw.objective
            && !within_relative_tolerance(reported, recomputed)
        {
            return Err(DecodeError::ObjectiveMismatch {
                reported,
                recomputed,
            });
        }

        for &(w, c) in served.keys() {
            if !open.get(w).copied().unwrap_or(false) {
                warn!(warehouse = w, customer = c, "closed warehouse ships goods");
            }
        }

        Ok(Solution {
            status: raw.status,
            open,
            served,
            objective_value: Some(recomputed),
        })
    }

    fn decode_open(&self, values: &VariableValues) -> Result<Vec<bool>, DecodeError> {
        self.variables
            .open_vars()
            .iter()
            .enumerate()
            .map(|(warehouse, &var)| {
                values
                    .get(var)
                    .map(|value| value > BINARY_THRESHOLD)
                    .ok_or(DecodeError::MissingValue {
                        role: VariableRole::Open { warehouse },
                    })
            })
            .collect()
    }

    fn decode_served(
        &self,
        values: &VariableValues,
    ) -> Result<BTreeMap<(usize, usize), u64>, DecodeError> {
        let mut served = BTreeMap::new();

        for ((warehouse, customer), var) in self.variables.served_vars() {
            let value = values.get(var).ok_or(DecodeError::MissingValue {
                role: VariableRole::Served {
                    warehouse,
                    customer,
                },
            })?;

            let rounded = value.round();

            let quantity = ((value - rounded).abs() <= INTEGRALITY_TOLERANCE)
                .then(|| rounded.to_u64())
                .flatten()
                .ok_or(DecodeError::NonIntegral {
                    warehouse,
                    customer,
                    value,
                })?;

            if quantity > 0 {
                served.insert((warehouse, customer), quantity);
            }
        }

        Ok(served)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use testresult::TestResult;

    use crate::{
        config::{ConstraintToggleConfig, ModelSettings},
        constraints::SideConstraintSet,
        model::{LinearModel, ModelBuilder},
        solvers::SolveStatus,
    };

    use super::*;

    fn toy() -> Result<(ProblemInstance, LinearModel), Box<dyn std::error::Error>> {
        let instance = ProblemInstance::new(
            vec![10.0, 10.0],
            vec![5, 5],
            vec![3, 4],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )?;

        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::default();
        let settings = ModelSettings::default();

        let (_, model, _) = ModelBuilder::new(&instance, &side, &toggles, &settings)
            .build()?
            .into_parts();

        Ok((instance, model))
    }

    fn raw_values(model: &LinearModel, open: [f64; 2], served: [[f64; 2]; 2]) -> VariableValues {
        let vars = &model.variables;
        let mut values = VariableValues::default();

        for (w, flag) in open.into_iter().enumerate() {
            if let Some(var) = vars.open(w) {
                values.set(var, flag);
            }
        }

        for ((w, c), var) in vars.served_vars() {
            let qty = served.get(w).and_then(|row| row.get(c)).copied().unwrap_or(0.0);
            values.set(var, qty);
        }

        values
    }

    fn raw(values: VariableValues, objective: Option<f64>) -> RawAssignment {
        RawAssignment {
            status: SolveStatus::Optimal,
            values: Some(values),
            objective,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn open_flags_are_thresholded_and_zero_shipments_dropped() -> TestResult {
        let (instance, model) = toy()?;
        let values = raw_values(&model, [0.999_999, 0.000_001], [[3.0, 4.0], [0.0, 0.0]]);

        let solution = SolutionDecoder::new(&instance, &model.variables).decode(&raw(values, None))?;

        assert_eq!(solution.open, vec![true, false]);
        assert_eq!(solution.served.len(), 2);
        assert_eq!(solution.total_served_by(0), 7);
        assert!(solution.objective_value.is_some_and(|o| (o - 17.0).abs() < 1e-9));

        Ok(())
    }

    #[test]
    fn near_integral_quantities_are_rounded() -> TestResult {
        let (instance, model) = toy()?;
        let values = raw_values(&model, [1.0, 1.0], [[2.999_999_9, 0.0], [0.0, 4.000_000_2]]);

        let solution = SolutionDecoder::new(&instance, &model.variables).decode(&raw(values, Some(27.0)))?;

        assert_eq!(solution.served.get(&(0, 0)), Some(&3));
        assert_eq!(solution.served.get(&(1, 1)), Some(&4));

        Ok(())
    }

    #[test]
    fn fractional_quantity_is_rejected() -> TestResult {
        let (instance, model) = toy()?;
        let values = raw_values(&model, [1.0, 1.0], [[2.5, 0.0], [0.5, 4.0]]);

        let result = SolutionDecoder::new(&instance, &model.variables).decode(&raw(values, None));

        assert!(matches!(result, Err(DecodeError::NonIntegral { warehouse: 0, customer: 0, .. })));

        Ok(())
    }

    #[test]
    fn objective_mismatch_is_an_error() -> TestResult {
        let (instance, model) = toy()?;
        let values = raw_values(&model, [1.0, 1.0], [[3.0, 0.0], [0.0, 4.0]]);

        let result = SolutionDecoder::new(&instance, &model.variables).decode(&raw(values, Some(30.0)));

        assert!(matches!(result, Err(DecodeError::ObjectiveMismatch { .. })));

        Ok(())
    }

    #[test]
    fn missing_value_names_the_variable() -> TestResult {
        let (instance, model) = toy()?;

        let result = SolutionDecoder::new(&instance, &model.variables)
            .decode(&raw(VariableValues::default(), None));

        assert_eq!(
            result,
            Err(DecodeError::MissingValue {
                role: VariableRole::Open { warehouse: 0 }
            })
        );

        Ok(())
    }

    #[test]
    fn infeasible_outcome_decodes_to_closed_plan() -> TestResult {
        let (instance, model) = toy()?;
        let raw = RawAssignment::without_values(SolveStatus::Infeasible, Duration::ZERO);

        let solution = SolutionDecoder::new(&instance, &model.variables).decode(&raw)?;

        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert_eq!(solution.open, vec![false, false]);
        assert!(solution.served.is_empty());
        assert!(solution.objective_value.is_none());

        Ok(())
    }
}
