//! Solutions
//!
//! The business view of a solve: which warehouses are open, who ships how much to whom,
//! and what that plan costs.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    config::{ConstraintFamily, ConstraintToggleConfig},
    instance::ProblemInstance,
    solvers::SolveStatus,
};

pub mod decoder;

pub use decoder::{DecodeError, SolutionDecoder};

/// Relative tolerance for objective consistency checks
pub const OBJECTIVE_TOLERANCE: f64 = 1e-4;

/// A decoded solve result.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Terminal status reported by the backend
    pub status: SolveStatus,

    /// Open flag per warehouse
    pub open: Vec<bool>,

    /// Positive shipments keyed by `(warehouse, customer)`
    pub served: BTreeMap<(usize, usize), u64>,

    /// Cost recomputed from `open` and `served`; `None` without an assignment
    pub objective_value: Option<f64>,
}

/// A property of a plan that a decoded solution does not satisfy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyViolation {
    /// A customer receives more or less than its demand.
    #[error("customer {customer} receives {received} units but demands {demand}")]
    Conservation {
        /// Customer index
        customer: usize,

        /// Demand of the customer
        demand: u64,

        /// Total quantity shipped to the customer
        received: u64,
    },

    /// A closed warehouse ships goods.
    #[error("closed warehouse {warehouse} ships {shipped} units")]
    ClosedWarehouseShips {
        /// Warehouse index
        warehouse: usize,

        /// Total quantity shipped
        shipped: u64,
    },

    /// An open warehouse ships more than its capacity.
    #[error("warehouse {warehouse} ships {shipped} units with capacity {capacity}")]
    CapacityExceeded {
        /// Warehouse index
        warehouse: usize,

        /// Capacity of the warehouse
        capacity: u64,

        /// Total quantity shipped
        shipped: u64,
    },

    /// The stored objective does not match the cost of the plan.
    #[error("objective {stored} does not match plan cost {recomputed}")]
    ObjectiveInconsistent {
        /// Objective stored on the solution
        stored: f64,

        /// Cost recomputed from the plan
        recomputed: f64,
    },
}

impl Solution {
    /// A solution without an assignment: every warehouse closed, nothing shipped.
    pub fn without_assignment(status: SolveStatus, warehouses: usize) -> Self {
        Self {
            status,
            open: vec![false; warehouses],
            served: BTreeMap::new(),
            objective_value: None,
        }
    }

    /// Whether the solution carries a plan
    pub fn has_assignment(&self) -> bool {
        self.objective_value.is_some()
    }

    /// Whether warehouse `w` is open
    pub fn is_open(&self, warehouse: usize) -> bool {
        self.open.get(warehouse).copied().unwrap_or(false)
    }

    /// Indices of open warehouses
    pub fn open_warehouses(&self) -> impl Iterator<Item = usize> + '_ {
        self.open
            .iter()
            .enumerate()
            .filter_map(|(w, &open)| open.then_some(w))
    }

    /// Total quantity shipped by warehouse `w`
    pub fn total_served_by(&self, warehouse: usize) -> u64 {
        self.served
            .range((warehouse, 0)..=(warehouse, usize::MAX))
            .map(|(_, &qty)| qty)
            .sum()
    }

    /// Total quantity received by customer `c`
    pub fn total_received_by(&self, customer: usize) -> u64 {
        self.suppliers_of(customer).iter().map(|&(_, qty)| qty).sum()
    }

    /// Warehouses shipping to customer `c`, with quantities, by warehouse index
    pub fn suppliers_of(&self, customer: usize) -> SmallVec<[(usize, u64); 4]> {
        self.served
            .iter()
            .filter(|((_, c), _)| *c == customer)
            .map(|(&(w, _), &qty)| (w, qty))
            .collect()
    }

    /// Check the plan against `instance` for the properties the enabled families guarantee.
    ///
    /// Conservation is checked when `exact_demand` is enabled; closed-warehouse and
    /// capacity limits when `capacity` is enabled. The stored objective is always
    /// compared against the plan cost.
    pub fn verify(
        &self,
        instance: &ProblemInstance,
        toggles: &ConstraintToggleConfig,
    ) -> Vec<PropertyViolation> {
        let mut violations = Vec::new();

        if !self.has_assignment() {
            return violations;
        }

        if toggles.is_enabled(ConstraintFamily::ExactDemand) {
            for (customer, &demand) in instance.demand().iter().enumerate() {
                let received = self.total_received_by(customer);

                if received != demand {
                    violations.push(PropertyViolation::Conservation {
                        customer,
                        demand,
                        received,
                    });
                }
            }
        }

        if toggles.is_enabled(ConstraintFamily::Capacity) {
            for (warehouse, &capacity) in instance.capacity().iter().enumerate() {
                let shipped = self.total_served_by(warehouse);

                if !self.is_open(warehouse) && shipped > 0 {
                    violations.push(PropertyViolation::ClosedWarehouseShips { warehouse, shipped });
                } else if shipped > capacity {
                    violations.push(PropertyViolation::CapacityExceeded {
                        warehouse,
                        capacity,
                        shipped,
                    });
                }
            }
        }

        if let Some(stored) = self.objective_value {
            let recomputed = instance.plan_cost(&self.open, &self.served);

            if !within_relative_tolerance(stored, recomputed) {
                violations.push(PropertyViolation::ObjectiveInconsistent { stored, recomputed });
            }
        }

        violations
    }
}

/// `|a - b| <= OBJECTIVE_TOLERANCE * max(1, |a|, |b|)`
pub(crate) fn within_relative_tolerance(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);

    (a - b).abs() <= OBJECTIVE_TOLERANCE * scale
}
