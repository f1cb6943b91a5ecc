//! Formulation Observer

use std::collections::BTreeMap;

use good_lp::Variable;
use tracing::debug;

use crate::{config::ConstraintFamily, model::LinearConstraint};

/// What a decision variable stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    /// `open[w]`
    Open {
        /// Warehouse index
        warehouse: usize,
    },

    /// `assign[w][c]`
    Assign {
        /// Warehouse index
        warehouse: usize,

        /// Customer index
        customer: usize,
    },

    /// `served[w][c]`
    Served {
        /// Warehouse index
        warehouse: usize,

        /// Customer index
        customer: usize,
    },
}

/// Observer for capturing a formulation as it is built.
///
/// The builder remains the only implementation of the formulation; observers
/// passively record what happens for reporting or analysis.
pub trait FormulationObserver {
    /// Called when a decision variable is created.
    fn on_variable(&mut self, role: VariableRole, var: Variable);

    /// Called when a term is added to the objective function.
    fn on_objective_term(&mut self, _var: Variable, _coefficient: f64) {}

    /// Called when a constraint is recorded.
    fn on_constraint(&mut self, constraint: &LinearConstraint);
}

/// No-op observer for unobserved builds.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl FormulationObserver for NoopObserver {
    fn on_variable(&mut self, _: VariableRole, _: Variable) {}

    fn on_constraint(&mut self, _: &LinearConstraint) {}
}

/// Counts variables, objective terms and constraints per family.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormulationTally {
    variables: usize,
    objective_terms: usize,
    constraints: BTreeMap<ConstraintFamily, usize>,
}

impl FormulationTally {
    /// Number of decision variables
    pub fn variables(&self) -> usize {
        self.variables
    }

    /// Number of objective terms
    pub fn objective_terms(&self) -> usize {
        self.objective_terms
    }

    /// Number of constraints recorded for `family`
    pub fn constraints_for(&self, family: ConstraintFamily) -> usize {
        self.constraints.get(&family).copied().unwrap_or(0)
    }

    /// Total number of constraints
    pub fn total_constraints(&self) -> usize {
        self.constraints.values().sum()
    }

    /// Constraint counts per family, for families with at least one constraint
    pub fn constraint_counts(&self) -> &BTreeMap<ConstraintFamily, usize> {
        &self.constraints
    }

    /// Emit the tally as a debug event.
    pub fn log(&self) {
        debug!(
            variables = self.variables,
            objective_terms = self.objective_terms,
            constraints = self.total_constraints(),
            per_family = ?self.constraints,
            "formulation built"
        );
    }
}

impl FormulationObserver for FormulationTally {
    fn on_variable(&mut self, _: VariableRole, _: Variable) {
        self.variables += 1;
    }

    fn on_objective_term(&mut self, _: Variable, _: f64) {
        self.objective_terms += 1;
    }

    fn on_constraint(&mut self, constraint: &LinearConstraint) {
        *self.constraints.entry(constraint.family).or_insert(0) += 1;
    }
}
