//! End-to-end solves of the small fixture instances

#![cfg(feature = "solver-microlp")]

use std::path::PathBuf;

use testresult::TestResult;

use cflp::{
    config::{ConstraintFamily, ConstraintToggleConfig, RunConfig},
    loader::{LoadedInstance, load_file},
    pipeline::{Outcome, solve},
    solvers::SolveStatus,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> Result<LoadedInstance, cflp::loader::ParseError> {
    load_file(fixture(name))
}

fn toy_toggles() -> ConstraintToggleConfig {
    ConstraintToggleConfig::all_enabled()
        .with(ConstraintFamily::MinUtilization, false)
        .with(ConstraintFamily::ProhibitedPairs, false)
        .with(ConstraintFamily::DependentOpen, false)
}

fn run(loaded: &LoadedInstance, toggles: ConstraintToggleConfig) -> Result<Outcome, cflp::pipeline::PipelineError> {
    let config = RunConfig {
        toggles,
        ..RunConfig::default()
    };

    solve(loaded, &config)
}

#[test]
fn toy_instance_opens_both_warehouses() -> TestResult {
    let loaded = load("toy.dat")?;

    let outcome = run(&loaded, toy_toggles())?;
    let solution = &outcome.solution;

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_eq!(solution.open, vec![true, true]);

    let cost = solution.objective_value.ok_or("no objective")?;
    assert!((cost - 27.0).abs() < 1e-6, "cost {cost}");

    assert_eq!(solution.total_received_by(0), 3);
    assert_eq!(solution.total_received_by(1), 4);
    assert!(outcome.violations.is_empty(), "{:?}", outcome.violations);

    Ok(())
}

#[test]
fn toy_instance_from_yaml_configuration() -> TestResult {
    let loaded = load("toy.dat")?;
    let config = RunConfig::from_file(fixture("config/scenario_a.yaml"))?;

    assert_eq!(config.toggles, toy_toggles());

    let outcome = solve(&loaded, &config)?;

    assert_eq!(outcome.solution.status, SolveStatus::Optimal);
    assert_eq!(outcome.solution.open_warehouses().count(), 2);

    Ok(())
}

#[test]
fn undersized_warehouses_are_infeasible() -> TestResult {
    let loaded = load("infeasible.dat")?;

    let outcome = run(&loaded, toy_toggles())?;

    assert_eq!(outcome.solution.status, SolveStatus::Infeasible);
    assert!(!outcome.solution.has_assignment());
    assert_eq!(outcome.solution.open_warehouses().count(), 0);

    Ok(())
}

#[test]
fn infeasibility_disappears_without_capacity_limits() -> TestResult {
    let loaded = load("infeasible.dat")?;

    let outcome = run(&loaded, toy_toggles().with(ConstraintFamily::Capacity, false))?;

    assert_eq!(outcome.solution.status, SolveStatus::Optimal);

    Ok(())
}

#[test]
fn dependency_opens_the_required_warehouse() -> TestResult {
    let loaded = load("dependency.dat")?;
    let toggles = ConstraintToggleConfig::core_only()
        .with(ConstraintFamily::MinUtilization, false)
        .with(ConstraintFamily::DependentOpen, true);

    let outcome = run(&loaded, toggles)?;
    let solution = &outcome.solution;

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert!(solution.is_open(0));
    assert!(solution.is_open(1));

    let cost = solution.objective_value.ok_or("no objective")?;
    assert!((cost - 105.0).abs() < 1e-6, "cost {cost}");

    Ok(())
}

#[test]
fn without_the_dependency_only_the_cheap_warehouse_opens() -> TestResult {
    let loaded = load("dependency.dat")?;
    let toggles = ConstraintToggleConfig::core_only().with(ConstraintFamily::MinUtilization, false);

    let outcome = run(&loaded, toggles)?;

    assert_eq!(outcome.solution.open, vec![true, false]);

    Ok(())
}

#[test]
fn out_of_range_pair_is_dropped_and_the_model_still_solves() -> TestResult {
    let loaded = load("index_safety.dat")?;
    let toggles = toy_toggles().with(ConstraintFamily::ProhibitedPairs, true);

    let outcome = run(&loaded, toggles)?;

    assert_eq!(outcome.invalid_entries.len(), 1);
    assert_eq!(outcome.solution.status, SolveStatus::Optimal);

    let suppliers_0 = outcome.solution.suppliers_of(0);
    let suppliers_1 = outcome.solution.suppliers_of(1);

    for (w, _) in &suppliers_0 {
        assert!(
            suppliers_1.iter().all(|(v, _)| v != w),
            "prohibited customers share warehouse {w}"
        );
    }

    Ok(())
}

#[test]
fn grouped_warehouses_open_together() -> TestResult {
    let loaded = load("groups.dat")?;
    let config = RunConfig::from_file(fixture("config/structural.yaml"))?;

    let outcome = solve(&loaded, &config)?;
    let solution = &outcome.solution;

    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_eq!(solution.is_open(0), solution.is_open(2));
    assert!(solution.is_open(0));
    assert!(!solution.is_open(1));

    let cost = solution.objective_value.ok_or("no objective")?;
    assert!((cost - 19.0).abs() < 1e-6, "cost {cost}");

    Ok(())
}

#[test]
fn feasible_plans_conserve_demand_and_respect_capacity() -> TestResult {
    for name in ["toy.dat", "dependency.dat", "groups.dat"] {
        let loaded = load(name)?;
        let toggles = ConstraintToggleConfig::all_enabled()
            .with(ConstraintFamily::MinUtilization, false);

        let outcome = run(&loaded, toggles)?;
        let solution = &outcome.solution;
        let instance = &loaded.instance;

        assert!(solution.status.carries_assignment(), "{name}: {}", solution.status);

        for (customer, &demand) in instance.demand().iter().enumerate() {
            assert_eq!(solution.total_received_by(customer), demand, "{name}");
        }

        for (warehouse, &capacity) in instance.capacity().iter().enumerate() {
            let shipped = solution.total_served_by(warehouse);

            assert!(shipped <= capacity, "{name}: warehouse {warehouse}");
            assert!(solution.is_open(warehouse) || shipped == 0, "{name}: warehouse {warehouse}");
        }

        let cost = solution.objective_value.ok_or("no objective")?;
        let recomputed = instance.plan_cost(&solution.open, &solution.served);

        assert!((cost - recomputed).abs() <= 1e-4 * cost.abs().max(1.0), "{name}");
    }

    Ok(())
}
