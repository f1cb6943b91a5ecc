//! Model Formulation
//!
//! Translates a [`ProblemInstance`](crate::instance::ProblemInstance) plus its side
//! constraints into decision variables, a minimisation objective, and the enabled
//! families of linear constraints. The result is backend-agnostic: constraints are
//! recorded as `lhs (=|<=|>=) rhs` and only handed to a solver by a
//! [`SolverAdapter`](crate::solvers::SolverAdapter).

use std::{collections::BTreeMap, fmt};

use good_lp::{Expression, ProblemVariables, Solution, Variable};
use num_traits::ToPrimitive;
use thiserror::Error;

use crate::{config::ConstraintFamily, constraints::InvalidIndex};

pub mod builder;
pub mod observer;
pub(crate) mod state;

pub use builder::ModelBuilder;
pub use observer::{FormulationObserver, FormulationTally, NoopObserver};

/// Absolute tolerance used when auditing an assignment against recorded constraints
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Model building errors
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// A quantity cannot be represented exactly as a solver coefficient.
    #[error("quantity {0} cannot be represented exactly as a solver coefficient")]
    CoefficientNotRepresentable(u64),

    /// The utilization floor of a warehouse does not fit in an integer.
    #[error("utilization floor for warehouse {warehouse} overflows")]
    FloorOverflow {
        /// Warehouse whose floor overflowed
        warehouse: usize,
    },
}

/// Relation operator for a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Equality (`lhs == rhs`)
    Eq,

    /// Less than or equal (`lhs <= rhs`)
    Leq,

    /// Greater than or equal (`lhs >= rhs`)
    Geq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "=",
            Relation::Leq => "<=",
            Relation::Geq => ">=",
        })
    }
}

/// A recorded linear constraint, tagged with the family that produced it.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// Family the constraint belongs to
    pub family: ConstraintFamily,

    /// Left-hand side expression
    pub lhs: Expression,

    /// Relation operator
    pub relation: Relation,

    /// Right-hand side scalar
    pub rhs: f64,
}

impl LinearConstraint {
    /// Whether `assignment` satisfies this constraint within `tolerance`.
    pub fn is_satisfied_by<S: Solution>(&self, assignment: &S, tolerance: f64) -> bool {
        let value = assignment.eval(&self.lhs);

        match self.relation {
            Relation::Eq => (value - self.rhs).abs() <= tolerance,
            Relation::Leq => value <= self.rhs + tolerance,
            Relation::Geq => value >= self.rhs - tolerance,
        }
    }
}

/// A constraint that an assignment failed to satisfy.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Family of the violated constraint
    pub family: ConstraintFamily,

    /// Position of the constraint in the model
    pub position: usize,

    /// Evaluated left-hand side
    pub lhs_value: f64,

    /// Relation operator
    pub relation: Relation,

    /// Right-hand side
    pub rhs: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constraint #{}: {} {} {} does not hold",
            self.family, self.position, self.lhs_value, self.relation, self.rhs
        )
    }
}

/// Decision variables of one formulation.
///
/// `assign` and `served` are warehouse-major, mirroring the transport cost matrix.
#[derive(Debug, Clone)]
pub struct DecisionVariables {
    pub(crate) open: Vec<Variable>,
    pub(crate) assign: Vec<Vec<Variable>>,
    pub(crate) served: Vec<Vec<Variable>>,
    pub(crate) served_bound: u64,
}

impl DecisionVariables {
    /// `open[w]`
    pub fn open(&self, warehouse: usize) -> Option<Variable> {
        self.open.get(warehouse).copied()
    }

    /// `assign[w][c]`
    pub fn assign(&self, warehouse: usize, customer: usize) -> Option<Variable> {
        self.assign
            .get(warehouse)
            .and_then(|row| row.get(customer))
            .copied()
    }

    /// `served[w][c]`
    pub fn served(&self, warehouse: usize, customer: usize) -> Option<Variable> {
        self.served
            .get(warehouse)
            .and_then(|row| row.get(customer))
            .copied()
    }

    /// All `open` variables, by warehouse
    pub fn open_vars(&self) -> &[Variable] {
        &self.open
    }

    /// All `served` variables as `((warehouse, customer), variable)`
    pub fn served_vars(&self) -> impl Iterator<Item = ((usize, usize), Variable)> + '_ {
        self.served.iter().enumerate().flat_map(|(w, row)| {
            row.iter()
                .copied()
                .enumerate()
                .map(move |(c, var)| ((w, c), var))
        })
    }

    /// All `assign` variables as `((warehouse, customer), variable)`
    pub fn assign_vars(&self) -> impl Iterator<Item = ((usize, usize), Variable)> + '_ {
        self.assign.iter().enumerate().flat_map(|(w, row)| {
            row.iter()
                .copied()
                .enumerate()
                .map(move |(c, var)| ((w, c), var))
        })
    }

    /// Upper bound applied to every `served` variable
    pub fn served_bound(&self) -> u64 {
        self.served_bound
    }

    /// Total number of decision variables
    pub fn len(&self) -> usize {
        self.open.len()
            + self.assign.iter().map(Vec::len).sum::<usize>()
            + self.served.iter().map(Vec::len).sum::<usize>()
    }

    /// True if no variables were created
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything about a formulation except the variable store.
///
/// Kept separate so an adapter can consume the [`ProblemVariables`] while the decoder
/// keeps using the variables, objective and constraints.
#[derive(Debug, Clone)]
pub struct LinearModel {
    /// Decision variables
    pub variables: DecisionVariables,

    /// Minimisation objective
    pub objective: Expression,

    /// Enabled constraints, in insertion order
    pub constraints: Vec<LinearConstraint>,
}

impl LinearModel {
    /// Evaluate the objective for `assignment`.
    pub fn objective_value<S: Solution>(&self, assignment: &S) -> f64 {
        assignment.eval(&self.objective)
    }

    /// Every recorded constraint that `assignment` violates.
    pub fn check<S: Solution>(&self, assignment: &S) -> Vec<Violation> {
        self.constraints
            .iter()
            .enumerate()
            .filter(|(_, constraint)| !constraint.is_satisfied_by(assignment, FEASIBILITY_TOLERANCE))
            .map(|(position, constraint)| Violation {
                family: constraint.family,
                position,
                lhs_value: assignment.eval(&constraint.lhs),
                relation: constraint.relation,
                rhs: constraint.rhs,
            })
            .collect()
    }

    /// Number of constraints per family
    pub fn constraint_counts(&self) -> BTreeMap<ConstraintFamily, usize> {
        let mut counts = BTreeMap::new();

        for constraint in &self.constraints {
            *counts.entry(constraint.family).or_insert(0) += 1;
        }

        counts
    }
}

/// A complete formulation, ready to hand to a solver adapter.
pub struct Formulation {
    pub(crate) problem: ProblemVariables,
    pub(crate) model: LinearModel,
    pub(crate) dropped: Vec<InvalidIndex>,
}

impl fmt::Debug for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formulation")
            .field("problem", &"<ProblemVariables>")
            .field(
                "variables",
                &format!("[{} variables]", self.model.variables.len()),
            )
            .field(
                "constraints",
                &format!("[{} constraints]", self.model.constraints.len()),
            )
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl Formulation {
    /// The backend-agnostic model
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Side-constraint entries skipped because of out-of-range indices
    pub fn dropped(&self) -> &[InvalidIndex] {
        &self.dropped
    }

    /// Split into the variable store (for the solver) and the model (for decoding).
    pub fn into_parts(self) -> (ProblemVariables, LinearModel, Vec<InvalidIndex>) {
        (self.problem, self.model, self.dropped)
    }
}

/// Convert a `u64` to an `f64` if it can be represented exactly.
///
/// `good_lp` stores coefficients as `f64`; only integers up to 2^53 survive the
/// conversion unchanged.
pub fn u64_to_f64_exact(v: u64) -> Option<f64> {
    let f = v.to_f64()?;

    (f.to_u64() == Some(v)).then_some(f)
}
