//! Solve Pipeline
//!
//! Runs one instance through build, solve, decode and audit under one configuration.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{ConstraintFamily, RunConfig},
    constraints::InvalidIndex,
    loader::LoadedInstance,
    model::{FormulationTally, ModelBuilder, ModelError},
    solution::{DecodeError, PropertyViolation, Solution, SolutionDecoder},
    solvers::{SolverAdapter, SolverError},
};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Wrapped model building error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Wrapped solver error
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Wrapped decoding error
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Size and timing of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Number of decision variables
    pub variables: usize,

    /// Number of constraints per enabled family
    pub constraints: BTreeMap<ConstraintFamily, usize>,

    /// Time spent building the formulation
    pub build_time: Duration,

    /// Time spent in the backend
    pub solve_time: Duration,
}

impl SolveStats {
    /// Total number of constraints
    pub fn total_constraints(&self) -> usize {
        self.constraints.values().sum()
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Decoded solution
    pub solution: Solution,

    /// Side-constraint entries dropped for out-of-range indices
    pub invalid_entries: Vec<InvalidIndex>,

    /// Properties of the plan that did not hold on re-checking
    pub violations: Vec<PropertyViolation>,

    /// Wall-clock time of the whole run
    pub elapsed: Duration,

    /// Model size and phase timings
    pub stats: SolveStats,
}

/// Solve `loaded` with the backend named in `config`.
///
/// Infeasibility and time limits are reported through the solution status. A
/// non-optimal backend assignment that breaks a recorded constraint is dropped and the
/// run reports [`SolveStatus::TimeLimitReached`](crate::solvers::SolveStatus) without a plan.
///
/// # Errors
///
/// Returns a [`PipelineError`] if the backend is unavailable, the model cannot be
/// built, the backend fails, an assignment reported as optimal breaks a recorded
/// constraint, or the result cannot be decoded.
pub fn solve(loaded: &LoadedInstance, config: &RunConfig) -> Result<Outcome, PipelineError> {
    let adapter = config.solve.backend.adapter()?;

    solve_with(loaded, config, &adapter)
}

/// Solve `loaded` with an explicit adapter.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_with(
    loaded: &LoadedInstance,
    config: &RunConfig,
    adapter: &dyn SolverAdapter,
) -> Result<Outcome, PipelineError> {
    let started = Instant::now();
    let instance = &loaded.instance;

    info!(
        warehouses = instance.warehouse_count(),
        customers = instance.customer_count(),
        backend = %adapter.backend(),
        "solving instance"
    );

    let mut tally = FormulationTally::default();

    let formulation = ModelBuilder::new(
        instance,
        &loaded.side_constraints,
        &config.toggles,
        &config.model,
    )
    .build_with_observer(&mut tally)?;

    tally.log();

    let build_time = started.elapsed();
    let (problem, model, invalid_entries) = formulation.into_parts();

    let raw = adapter
        .solve(problem, &model, config.solve.time_budget)?
        .audited(&model)?;

    let solution = SolutionDecoder::new(instance, &model.variables).decode(&raw)?;
    let violations = solution.verify(instance, &config.toggles);

    for violation in &violations {
        warn!(%violation, "decoded plan fails a post-solve check");
    }

    let elapsed = started.elapsed();

    debug!(?build_time, solve_time = ?raw.elapsed, ?elapsed, "run finished");

    Ok(Outcome {
        solution,
        invalid_entries,
        violations,
        elapsed,
        stats: SolveStats {
            variables: tally.variables(),
            constraints: tally.constraint_counts().clone(),
            build_time,
            solve_time: raw.elapsed,
        },
    })
}
