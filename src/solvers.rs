//! Solver Adapters
//!
//! A [`SolverAdapter`] takes a built formulation and a wall-clock budget and returns the
//! backend's raw variable values together with a termination status. The search itself
//! is entirely the backend's business; nothing downstream depends on how it got there.

use std::{fmt, time::Duration};

use clap::ValueEnum;
use good_lp::{ProblemVariables, ResolutionError, Solution, SolutionStatus, Variable};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::model::{LinearModel, Violation};

pub mod milp;

pub use milp::GoodLpAdapter;

/// Solver Errors
#[derive(Debug, Error)]
pub enum SolverError {
    /// The requested backend was not compiled into this build.
    #[error("solver backend `{backend}` is not available in this build")]
    SolverUnavailable {
        /// Requested backend
        backend: Backend,
    },

    /// The backend certified an assignment as optimal but it breaks a recorded constraint.
    #[error("backend reported an optimal assignment that violates {count} constraint(s), first: {first}")]
    ViolatedAssignment {
        /// Number of violated constraints
        count: usize,

        /// First violated constraint in model order
        first: Violation,
    },

    /// Wrapped solver resolution error
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// MILP backends reachable through `good_lp`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum Backend {
    /// Pure-Rust branch and bound, bundled with the crate
    #[default]
    Microlp,

    /// HiGHS, linked natively
    Highs,
}

impl Backend {
    /// Every backend the crate knows about
    pub const ALL: [Backend; 2] = [Backend::Microlp, Backend::Highs];

    /// Configuration name of the backend
    pub fn name(self) -> &'static str {
        match self {
            Backend::Microlp => "microlp",
            Backend::Highs => "highs",
        }
    }

    /// Whether the backend was compiled into this build
    pub fn is_available(self) -> bool {
        match self {
            Backend::Microlp => cfg!(feature = "solver-microlp"),
            Backend::Highs => cfg!(feature = "solver-highs"),
        }
    }

    /// Instantiate an adapter for this backend.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::SolverUnavailable`] if the backend was not compiled in.
    pub fn adapter(self) -> Result<GoodLpAdapter, SolverError> {
        GoodLpAdapter::new(self)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal status of one solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// The assignment satisfies every enabled constraint and is proven minimal.
    Optimal,

    /// The assignment satisfies every enabled constraint; optimality is unproven.
    Feasible,

    /// No assignment satisfies every enabled constraint.
    Infeasible,

    /// The model was rejected as malformed.
    Invalid,

    /// The budget ran out. An incumbent is returned if one was found.
    TimeLimitReached,
}

impl SolveStatus {
    /// Upper-case status label
    pub fn label(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Invalid => "INVALID",
            SolveStatus::TimeLimitReached => "TIME_LIMIT_REACHED",
        }
    }

    /// Whether a status of this kind can carry a constraint-satisfying assignment
    pub fn carries_assignment(self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal | SolveStatus::Feasible | SolveStatus::TimeLimitReached
        )
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values assigned to decision variables by a backend.
///
/// Variables without a recorded value read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableValues {
    values: FxHashMap<Variable, f64>,
}

impl VariableValues {
    /// Build from explicit `(variable, value)` pairs.
    pub fn with(values: &[(Variable, f64)]) -> Self {
        let mut map = FxHashMap::default();

        for (var, value) in values {
            map.insert(*var, *value);
        }

        Self { values: map }
    }

    /// Copy the value of every decision variable of `model` out of a backend solution.
    pub fn capture<S: Solution>(solution: &S, model: &LinearModel) -> Self {
        let vars = &model.variables;

        let values = vars
            .open_vars()
            .iter()
            .copied()
            .chain(vars.assign_vars().map(|(_, var)| var))
            .chain(vars.served_vars().map(|(_, var)| var))
            .map(|var| (var, solution.value(var)))
            .collect();

        Self { values }
    }

    /// Set the value of one variable.
    pub fn set(&mut self, var: Variable, value: f64) {
        self.values.insert(var, value);
    }

    /// The recorded value, if any
    pub fn get(&self, var: Variable) -> Option<f64> {
        self.values.get(&var).copied()
    }

    /// Number of recorded values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no values were recorded
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Solution for VariableValues {
    fn status(&self) -> SolutionStatus {
        SolutionStatus::Optimal
    }

    fn value(&self, variable: Variable) -> f64 {
        *self.values.get(&variable).unwrap_or(&0.0)
    }
}

/// What a backend handed back: a status and, when one exists, an assignment.
#[derive(Debug, Clone)]
pub struct RawAssignment {
    /// Terminal status
    pub status: SolveStatus,

    /// Variable values; `None` when the backend found no assignment
    pub values: Option<VariableValues>,

    /// Objective value of the assignment as evaluated on the raw values
    pub objective: Option<f64>,

    /// Wall-clock time spent in the backend
    pub elapsed: Duration,
}

impl RawAssignment {
    /// An outcome without an assignment.
    pub fn without_values(status: SolveStatus, elapsed: Duration) -> Self {
        Self {
            status,
            values: None,
            objective: None,
            elapsed,
        }
    }

    /// Check the assignment against every recorded constraint of `model`.
    ///
    /// A non-optimal assignment that breaks a constraint is an unfinished incumbent and is
    /// discarded, leaving a [`SolveStatus::TimeLimitReached`] outcome without values.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::ViolatedAssignment`] when an assignment reported as optimal
    /// breaks a constraint.
    pub fn audited(self, model: &LinearModel) -> Result<Self, SolverError> {
        let Some(values) = &self.values else {
            return Ok(self);
        };

        let violations = model.check(values);

        let Some(first) = violations.first() else {
            return Ok(self);
        };

        if self.status == SolveStatus::Optimal {
            return Err(SolverError::ViolatedAssignment {
                count: violations.len(),
                first: first.clone(),
            });
        }

        warn!(
            status = %self.status,
            count = violations.len(),
            %first,
            "discarding backend assignment that violates the model"
        );

        Ok(Self::without_values(
            SolveStatus::TimeLimitReached,
            self.elapsed,
        ))
    }
}

/// Solve a formulation under a wall-clock budget.
pub trait SolverAdapter {
    /// Backend this adapter drives
    fn backend(&self) -> Backend;

    /// Solve the formulation.
    ///
    /// Infeasibility and running out of time are ordinary [`SolveStatus`] values,
    /// not errors.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the backend fails for any other reason.
    fn solve(
        &self,
        problem: ProblemVariables,
        model: &LinearModel,
        budget: Duration,
    ) -> Result<RawAssignment, SolverError>;
}
