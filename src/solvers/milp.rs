//! MILP adapter over `good_lp`

use std::time::{Duration, Instant};

use good_lp::{
    ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel,
};
use tracing::{debug, info, warn};

#[cfg(any(feature = "solver-microlp", feature = "solver-highs"))]
use good_lp::solvers::WithTimeLimit;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
#[cfg(feature = "solver-microlp")]
use good_lp::solvers::microlp::microlp;

use crate::{
    model::{LinearConstraint, LinearModel, Relation},
    solvers::{Backend, RawAssignment, SolveStatus, SolverAdapter, SolverError, VariableValues},
};

/// Adapter handing a formulation to one of the `good_lp` backends.
#[derive(Debug, Clone, Copy)]
pub struct GoodLpAdapter {
    backend: Backend,
}

impl GoodLpAdapter {
    /// Create an adapter for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::SolverUnavailable`] if the backend was not compiled in.
    pub fn new(backend: Backend) -> Result<Self, SolverError> {
        if !backend.is_available() {
            return Err(SolverError::SolverUnavailable { backend });
        }

        Ok(Self { backend })
    }
}

impl SolverAdapter for GoodLpAdapter {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn solve(
        &self,
        problem: ProblemVariables,
        model: &LinearModel,
        budget: Duration,
    ) -> Result<RawAssignment, SolverError> {
        debug!(
            backend = %self.backend,
            variables = model.variables.len(),
            constraints = model.constraints.len(),
            ?budget,
            "handing formulation to backend"
        );

        let started = Instant::now();

        let result = match self.backend {
            Backend::Microlp => solve_microlp(problem, model, budget),
            Backend::Highs => solve_highs(problem, model, budget),
        }?;

        let elapsed = started.elapsed();

        let raw = match result {
            Ok((status, values)) => {
                let objective = model.objective_value(&values);

                RawAssignment {
                    status,
                    values: Some(values),
                    objective: Some(objective),
                    elapsed,
                }
            }
            Err(ResolutionError::Infeasible) => {
                RawAssignment::without_values(SolveStatus::Infeasible, elapsed)
            }
            Err(ResolutionError::Unbounded) => {
                warn!("backend reports the model as unbounded");

                RawAssignment::without_values(SolveStatus::Invalid, elapsed)
            }
            Err(ResolutionError::Other(reason)) if is_time_limit(reason) => {
                debug!(reason, "backend stopped at the time limit without an incumbent");

                RawAssignment::without_values(SolveStatus::TimeLimitReached, elapsed)
            }
            Err(err) if elapsed >= budget => {
                debug!(%err, "backend failed after the time budget ran out");

                RawAssignment::without_values(SolveStatus::TimeLimitReached, elapsed)
            }
            Err(err) => return Err(err.into()),
        }
        .audited(model)?;

        info!(backend = %self.backend, status = %raw.status, ?elapsed, "solve finished");

        Ok(raw)
    }
}

type BackendResult = Result<(SolveStatus, VariableValues), ResolutionError>;

/// microlp reports a run cut short before its first incumbent as a plain message.
fn is_time_limit(message: &str) -> bool {
    message.starts_with("Time limit")
}

#[cfg(feature = "solver-microlp")]
fn solve_microlp(
    problem: ProblemVariables,
    model: &LinearModel,
    budget: Duration,
) -> Result<BackendResult, SolverError> {
    let lp = problem
        .minimise(model.objective.clone())
        .using(microlp)
        .with_time_limit(budget.as_secs_f64());

    Ok(run(lp, model))
}

#[cfg(not(feature = "solver-microlp"))]
fn solve_microlp(
    _: ProblemVariables,
    _: &LinearModel,
    _: Duration,
) -> Result<BackendResult, SolverError> {
    Err(SolverError::SolverUnavailable {
        backend: Backend::Microlp,
    })
}

#[cfg(feature = "solver-highs")]
fn solve_highs(
    problem: ProblemVariables,
    model: &LinearModel,
    budget: Duration,
) -> Result<BackendResult, SolverError> {
    let lp = problem
        .minimise(model.objective.clone())
        .using(highs)
        .with_time_limit(budget.as_secs_f64());

    Ok(run(lp, model))
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(
    _: ProblemVariables,
    _: &LinearModel,
    _: Duration,
) -> Result<BackendResult, SolverError> {
    Err(SolverError::SolverUnavailable {
        backend: Backend::Highs,
    })
}

fn run<M>(lp: M, model: &LinearModel) -> BackendResult
where
    M: SolverModel<Error = ResolutionError>,
{
    let solution = apply_recorded_constraints(lp, &model.constraints).solve()?;

    let status = match solution.status() {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::TimeLimit => SolveStatus::TimeLimitReached,
        SolutionStatus::GapLimit => SolveStatus::Feasible,
    };

    Ok((status, VariableValues::capture(&solution, model)))
}

fn apply_recorded_constraints<M: SolverModel>(mut lp: M, constraints: &[LinearConstraint]) -> M {
    for constraint in constraints {
        let lhs = constraint.lhs.clone();

        lp = match constraint.relation {
            Relation::Eq => lp.with(lhs.eq(constraint.rhs)),
            Relation::Leq => lp.with(lhs.leq(constraint.rhs)),
            Relation::Geq => lp.with(lhs.geq(constraint.rhs)),
        };
    }

    lp
}

#[cfg(all(test, feature = "solver-microlp"))]
mod tests {
    use testresult::TestResult;

    use crate::{
        config::{ConstraintFamily, ConstraintToggleConfig, ModelSettings},
        constraints::SideConstraintSet,
        instance::ProblemInstance,
        model::ModelBuilder,
    };

    use super::*;

    fn toggles() -> ConstraintToggleConfig {
        ConstraintToggleConfig::all_enabled()
            .with(ConstraintFamily::MinUtilization, false)
            .with(ConstraintFamily::ProhibitedPairs, false)
            .with(ConstraintFamily::DependentOpen, false)
    }

    /// A deterministic instance large enough that microlp cannot prove optimality quickly.
    fn generated(warehouses: u32, customers: u32) -> Result<ProblemInstance, Box<dyn std::error::Error>> {
        let fixed_cost = (0..warehouses)
            .map(|w| f64::from(100 + (w * 37) % 200))
            .collect();

        let capacity = (0..warehouses).map(|w| u64::from(60 + (w * 13) % 60)).collect();

        let demand = (0..customers).map(|c| u64::from(1 + (c * 7) % 20)).collect();

        let transport_cost = (0..warehouses)
            .map(|w| {
                (0..customers)
                    .map(|c| f64::from(1 + (w * 17 + c * 29 + w * c) % 47))
                    .collect()
            })
            .collect();

        Ok(ProblemInstance::new(
            fixed_cost,
            capacity,
            demand,
            transport_cost,
        )?)
    }

    fn solve(instance: &ProblemInstance) -> Result<RawAssignment, Box<dyn std::error::Error>> {
        let side = SideConstraintSet::new();
        let toggles = toggles();
        let settings = ModelSettings::default();

        let formulation = ModelBuilder::new(instance, &side, &toggles, &settings).build()?;
        let (problem, model, _) = formulation.into_parts();

        let adapter = GoodLpAdapter::new(Backend::Microlp)?;

        Ok(adapter.solve(problem, &model, Duration::from_secs(30))?)
    }

    #[test]
    fn toy_instance_opens_both_warehouses() -> TestResult {
        let instance = ProblemInstance::new(
            vec![10.0, 10.0],
            vec![5, 5],
            vec![3, 4],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )?;

        let raw = solve(&instance)?;

        assert_eq!(raw.status, SolveStatus::Optimal);
        assert!(raw.values.is_some());
        assert!(raw.objective.is_some_and(|o| (o - 27.0).abs() < 1e-6));

        Ok(())
    }

    #[test]
    fn undersized_warehouses_are_infeasible() -> TestResult {
        let instance = ProblemInstance::new(
            vec![10.0, 10.0],
            vec![2, 2],
            vec![3, 4],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )?;

        let raw = solve(&instance)?;

        assert_eq!(raw.status, SolveStatus::Infeasible);
        assert!(raw.values.is_none());
        assert!(raw.objective.is_none());

        Ok(())
    }

    #[test]
    fn short_budget_stops_microlp_early() -> TestResult {
        let instance = generated(30, 90)?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::all_enabled();
        let settings = ModelSettings::default();

        let formulation = ModelBuilder::new(&instance, &side, &toggles, &settings).build()?;
        let (problem, model, _) = formulation.into_parts();

        let adapter = GoodLpAdapter::new(Backend::Microlp)?;

        let started = Instant::now();
        let raw = adapter.solve(problem, &model, Duration::from_millis(200))?;
        let wall = started.elapsed();

        assert!(wall < Duration::from_secs(3), "solve ran for {wall:?}");
        assert!(
            matches!(
                raw.status,
                SolveStatus::TimeLimitReached | SolveStatus::Optimal | SolveStatus::Feasible
            ),
            "unexpected status {}",
            raw.status
        );

        if let Some(values) = &raw.values {
            assert!(model.check(values).is_empty(), "returned assignment breaks the model");
        }

        Ok(())
    }

    #[test]
    fn time_limit_messages_are_recognised() {
        assert!(is_time_limit(
            "Time limit reached before finding a feasible solution"
        ));
        assert!(!is_time_limit("Numerical error"));
    }
}
