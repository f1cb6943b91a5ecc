//! Model Builder

use good_lp::{Expression, Variable};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{
    config::{ConstraintFamily, ConstraintToggleConfig, ModelSettings},
    constraints::SideConstraintSet,
    instance::ProblemInstance,
    model::{
        DecisionVariables, Formulation, ModelError, Relation,
        observer::{FormulationObserver, NoopObserver, VariableRole},
        state::FormulationState,
        u64_to_f64_exact,
    },
};

/// Builds the formulation of one instance under one toggle configuration.
///
/// The builder borrows its inputs for the duration of a build and keeps no state
/// between builds; every call creates fresh variables.
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder<'a> {
    instance: &'a ProblemInstance,
    side: &'a SideConstraintSet,
    toggles: &'a ConstraintToggleConfig,
    settings: &'a ModelSettings,
}

/// Instance quantities converted to exact solver coefficients.
struct Coefficients {
    capacity: Vec<f64>,
    demand: Vec<f64>,
    floor: Vec<f64>,
}

impl<'a> ModelBuilder<'a> {
    /// Create a builder over the given inputs.
    pub fn new(
        instance: &'a ProblemInstance,
        side: &'a SideConstraintSet,
        toggles: &'a ConstraintToggleConfig,
        settings: &'a ModelSettings,
    ) -> Self {
        Self {
            instance,
            side,
            toggles,
            settings,
        }
    }

    /// Upper bound for every `served[w][c]` variable.
    ///
    /// The bound is never below `max(max capacity, max demand)`: anything smaller
    /// could cut off plans that the enabled constraints allow.
    pub fn served_bound(&self) -> u64 {
        let safe = self.instance.max_capacity().max(self.instance.max_demand());

        match self.settings.served_bound {
            Some(requested) if requested >= safe => requested,
            Some(requested) => {
                warn!(
                    requested,
                    used = safe,
                    "requested served bound is below the largest capacity or demand; raising it"
                );
                safe
            }
            None => safe,
        }
    }

    /// Smallest quantity an open warehouse of the given capacity must ship,
    /// `⌈θ · capacity⌉`, computed exactly in decimal arithmetic.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FloorOverflow`] if the product does not fit.
    pub fn utilization_floor(&self, warehouse: usize, capacity: u64) -> Result<u64, ModelError> {
        self.settings
            .min_utilization
            .checked_mul(Decimal::from(capacity))
            .map(|product| product.ceil())
            .and_then(|floor| floor.to_u64())
            .ok_or(ModelError::FloorOverflow { warehouse })
    }

    /// Build the formulation.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if a quantity cannot be used as an exact coefficient.
    pub fn build(&self) -> Result<Formulation, ModelError> {
        let mut observer = NoopObserver;

        self.build_with_observer(&mut observer)
    }

    /// Build the formulation, reporting every variable and constraint to `observer`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if a quantity cannot be used as an exact coefficient.
    pub fn build_with_observer(
        &self,
        observer: &mut dyn FormulationObserver,
    ) -> Result<Formulation, ModelError> {
        let (side, dropped) = self.side.sanitized(self.instance);
        let coefficients = self.coefficients()?;

        let mut state = FormulationState::new(observer);

        let variables = self.declare_variables(&mut state)?;

        self.add_objective(&mut state, &variables);

        for family in ConstraintFamily::ALL {
            if !self.toggles.is_enabled(family) {
                if family.is_structural() && !side.is_empty() {
                    debug!(%family, "structural constraint family disabled; its entries are ignored");
                }

                continue;
            }

            match family {
                ConstraintFamily::Coverage => add_coverage(&mut state, &variables),
                ConstraintFamily::ExactDemand => {
                    add_exact_demand(&mut state, &variables, &coefficients.demand);
                }
                ConstraintFamily::Capacity => {
                    add_capacity(&mut state, &variables, &coefficients.capacity);
                }
                ConstraintFamily::LinkServedAssign => {
                    add_link_served_assign(&mut state, &variables, &coefficients.demand);
                }
                ConstraintFamily::LinkAssignOpen => add_link_assign_open(&mut state, &variables),
                ConstraintFamily::MinUtilization => {
                    add_min_utilization(&mut state, &variables, &coefficients.floor);
                }
                ConstraintFamily::ProhibitedPairs => {
                    add_prohibited_pairs(&mut state, &variables, &side);
                }
                ConstraintFamily::DependentOpen => {
                    for cycle in side.dependency_cycles(self.instance.warehouse_count()) {
                        debug!(?cycle, "dependency cycle forces its warehouses to open together");
                    }

                    add_dependent_open(&mut state, &variables, &side);
                }
                ConstraintFamily::GroupedOpen => add_grouped_open(&mut state, &variables, &side),
                ConstraintFamily::ServeFloor => add_serve_floor(&mut state, &variables),
            }
        }

        Ok(state.into_formulation(variables, dropped))
    }

    fn coefficients(&self) -> Result<Coefficients, ModelError> {
        let exact = |v: u64| u64_to_f64_exact(v).ok_or(ModelError::CoefficientNotRepresentable(v));

        let capacity = self
            .instance
            .capacity()
            .iter()
            .map(|&c| exact(c))
            .collect::<Result<Vec<_>, _>>()?;

        let demand = self
            .instance
            .demand()
            .iter()
            .map(|&d| exact(d))
            .collect::<Result<Vec<_>, _>>()?;

        let floor = self
            .instance
            .capacity()
            .iter()
            .enumerate()
            .map(|(w, &c)| self.utilization_floor(w, c).and_then(exact))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Coefficients {
            capacity,
            demand,
            floor,
        })
    }

    fn declare_variables(
        &self,
        state: &mut FormulationState<'_>,
    ) -> Result<DecisionVariables, ModelError> {
        let served_bound = self.served_bound();

        let open = self
            .instance
            .warehouses()
            .map(|warehouse| state.add_binary(VariableRole::Open { warehouse }))
            .collect::<Vec<_>>();

        let assign = self
            .instance
            .warehouses()
            .map(|warehouse| {
                self.instance
                    .customers()
                    .map(|customer| {
                        state.add_binary(VariableRole::Assign {
                            warehouse,
                            customer,
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut served = Vec::with_capacity(self.instance.warehouse_count());

        for warehouse in self.instance.warehouses() {
            let row = self
                .instance
                .customers()
                .map(|customer| {
                    state.add_bounded_integer(
                        VariableRole::Served {
                            warehouse,
                            customer,
                        },
                        served_bound,
                    )
                })
                .collect::<Result<Vec<Variable>, _>>()?;

            served.push(row);
        }

        Ok(DecisionVariables {
            open,
            assign,
            served,
            served_bound,
        })
    }

    fn add_objective(&self, state: &mut FormulationState<'_>, variables: &DecisionVariables) {
        for (&var, &cost) in variables.open.iter().zip(self.instance.fixed_cost()) {
            state.add_objective_term(var, cost);
        }

        for (row, costs) in variables.served.iter().zip(self.instance.transport_cost()) {
            for (&var, &cost) in row.iter().zip(costs) {
                state.add_objective_term(var, cost);
            }
        }
    }
}

/// Sum of `served[w][c]` over all warehouses for a customer, or over all customers for a
/// warehouse, depending on the iterator given.
fn sum_of(vars: impl IntoIterator<Item = Variable>) -> Expression {
    let mut sum = Expression::default();

    for var in vars {
        sum += Expression::from(var);
    }

    sum
}

/// Column `customer` of a warehouse-major variable matrix.
fn column(matrix: &[Vec<Variable>], customer: usize) -> impl Iterator<Item = Variable> + '_ {
    matrix.iter().filter_map(move |row| row.get(customer).copied())
}

fn add_coverage(state: &mut FormulationState<'_>, variables: &DecisionVariables) {
    let customers = variables.assign.first().map_or(0, Vec::len);

    for customer in 0..customers {
        let lhs = sum_of(column(&variables.assign, customer));

        state.add_constraint(ConstraintFamily::Coverage, lhs, Relation::Geq, 1.0);
    }
}

fn add_exact_demand(state: &mut FormulationState<'_>, variables: &DecisionVariables, demand: &[f64]) {
    for (customer, &d) in demand.iter().enumerate() {
        let lhs = sum_of(column(&variables.served, customer));

        state.add_constraint(ConstraintFamily::ExactDemand, lhs, Relation::Eq, d);
    }
}

fn add_capacity(state: &mut FormulationState<'_>, variables: &DecisionVariables, capacity: &[f64]) {
    // Σ_c served[w][c] - capacity[w]·open[w] <= 0
    for ((row, &open), &cap) in variables.served.iter().zip(&variables.open).zip(capacity) {
        let mut lhs = sum_of(row.iter().copied());
        lhs += open * -cap;

        state.add_constraint(ConstraintFamily::Capacity, lhs, Relation::Leq, 0.0);
    }
}

fn add_link_served_assign(
    state: &mut FormulationState<'_>,
    variables: &DecisionVariables,
    demand: &[f64],
) {
    // served[w][c] - demand[c]·assign[w][c] <= 0
    for (served_row, assign_row) in variables.served.iter().zip(&variables.assign) {
        for ((&served, &assign), &d) in served_row.iter().zip(assign_row).zip(demand) {
            let mut lhs = Expression::from(served);
            lhs += assign * -d;

            state.add_constraint(ConstraintFamily::LinkServedAssign, lhs, Relation::Leq, 0.0);
        }
    }
}

fn add_link_assign_open(state: &mut FormulationState<'_>, variables: &DecisionVariables) {
    // assign[w][c] - open[w] <= 0
    for (assign_row, &open) in variables.assign.iter().zip(&variables.open) {
        for &assign in assign_row {
            let mut lhs = Expression::from(assign);
            lhs += open * -1.0;

            state.add_constraint(ConstraintFamily::LinkAssignOpen, lhs, Relation::Leq, 0.0);
        }
    }
}

fn add_min_utilization(
    state: &mut FormulationState<'_>,
    variables: &DecisionVariables,
    floor: &[f64],
) {
    // Σ_c served[w][c] - ⌈θ·capacity[w]⌉·open[w] >= 0
    for ((row, &open), &min) in variables.served.iter().zip(&variables.open).zip(floor) {
        let mut lhs = sum_of(row.iter().copied());
        lhs += open * -min;

        state.add_constraint(ConstraintFamily::MinUtilization, lhs, Relation::Geq, 0.0);
    }
}

fn add_prohibited_pairs(
    state: &mut FormulationState<'_>,
    variables: &DecisionVariables,
    side: &SideConstraintSet,
) {
    for (a, b) in side.prohibited_pairs() {
        for warehouse in 0..variables.open.len() {
            let (Some(assign_a), Some(assign_b)) =
                (variables.assign(warehouse, a), variables.assign(warehouse, b))
            else {
                warn!(a, b, "skipping prohibited pair with out-of-range customer");
                break;
            };

            let mut lhs = Expression::from(assign_a);
            lhs += Expression::from(assign_b);

            state.add_constraint(ConstraintFamily::ProhibitedPairs, lhs, Relation::Leq, 1.0);
        }
    }
}

fn add_dependent_open(
    state: &mut FormulationState<'_>,
    variables: &DecisionVariables,
    side: &SideConstraintSet,
) {
    // open[i] - open[j] <= 0
    for (i, j) in side.dependent_warehouses() {
        let (Some(open_i), Some(open_j)) = (variables.open(i), variables.open(j)) else {
            warn!(i, j, "skipping warehouse dependency with out-of-range index");
            continue;
        };

        let mut lhs = Expression::from(open_i);
        lhs += open_j * -1.0;

        state.add_constraint(ConstraintFamily::DependentOpen, lhs, Relation::Leq, 0.0);
    }
}

fn add_grouped_open(
    state: &mut FormulationState<'_>,
    variables: &DecisionVariables,
    side: &SideConstraintSet,
) {
    // open[k] - open[first] = 0 for every other member k
    for group in side.warehouse_groups() {
        let mut members = group.iter().filter_map(|&w| {
            let var = variables.open(w);

            if var.is_none() {
                warn!(warehouse = w, "skipping out-of-range warehouse group member");
            }

            var
        });

        let Some(anchor) = members.next() else {
            continue;
        };

        for member in members {
            let mut lhs = Expression::from(member);
            lhs += anchor * -1.0;

            state.add_constraint(ConstraintFamily::GroupedOpen, lhs, Relation::Eq, 0.0);
        }
    }
}

fn add_serve_floor(state: &mut FormulationState<'_>, variables: &DecisionVariables) {
    // served[w][c] - assign[w][c] >= 0
    for (served_row, assign_row) in variables.served.iter().zip(&variables.assign) {
        for (&served, &assign) in served_row.iter().zip(assign_row) {
            let mut lhs = Expression::from(served);
            lhs += assign * -1.0;

            state.add_constraint(ConstraintFamily::ServeFloor, lhs, Relation::Geq, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use good_lp::Solution;
    use testresult::TestResult;

    use crate::{model::observer::FormulationTally, solvers::VariableValues};

    use super::*;

    fn toy() -> Result<ProblemInstance, crate::instance::InstanceError> {
        ProblemInstance::new(
            vec![10.0, 10.0],
            vec![5, 5],
            vec![3, 4],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )
    }

    #[test]
    fn served_bound_defaults_to_largest_capacity_or_demand() -> TestResult {
        let instance = ProblemInstance::new(vec![1.0], vec![5], vec![3, 9], vec![vec![1.0, 1.0]])?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::default();
        let settings = ModelSettings::default();

        let builder = ModelBuilder::new(&instance, &side, &toggles, &settings);

        assert_eq!(builder.served_bound(), 9);

        Ok(())
    }

    #[test]
    fn too_small_served_bound_is_raised() -> TestResult {
        let instance = toy()?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::default();
        let settings = ModelSettings {
            served_bound: Some(2),
            ..ModelSettings::default()
        };

        let builder = ModelBuilder::new(&instance, &side, &toggles, &settings);

        assert_eq!(builder.served_bound(), 5);

        Ok(())
    }

    #[test]
    fn utilization_floor_rounds_up_exactly() -> TestResult {
        let instance = toy()?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::default();
        let settings = ModelSettings::default();

        let builder = ModelBuilder::new(&instance, &side, &toggles, &settings);

        assert_eq!(builder.utilization_floor(0, 5)?, 4);
        assert_eq!(builder.utilization_floor(0, 15)?, 12);
        assert_eq!(builder.utilization_floor(0, 7)?, 6);
        assert_eq!(builder.utilization_floor(0, 0)?, 0);

        Ok(())
    }

    #[test]
    fn variable_and_constraint_counts_follow_toggles() -> TestResult {
        let instance = toy()?;
        let mut side = SideConstraintSet::new();
        side.prohibit_pair(0, 1).add_dependency(0, 1).add_group([0, 1]);

        let toggles = ConstraintToggleConfig::all_enabled();
        let settings = ModelSettings::default();

        let mut tally = FormulationTally::default();
        let formulation = ModelBuilder::new(&instance, &side, &toggles, &settings)
            .build_with_observer(&mut tally)?;

        // 2 open + 4 assign + 4 served
        assert_eq!(tally.variables(), 10);
        assert_eq!(formulation.model().variables.len(), 10);

        assert_eq!(tally.constraints_for(ConstraintFamily::Coverage), 2);
        assert_eq!(tally.constraints_for(ConstraintFamily::ExactDemand), 2);
        assert_eq!(tally.constraints_for(ConstraintFamily::Capacity), 2);
        assert_eq!(tally.constraints_for(ConstraintFamily::LinkServedAssign), 4);
        assert_eq!(tally.constraints_for(ConstraintFamily::LinkAssignOpen), 4);
        assert_eq!(tally.constraints_for(ConstraintFamily::MinUtilization), 2);
        assert_eq!(tally.constraints_for(ConstraintFamily::ProhibitedPairs), 2);
        assert_eq!(tally.constraints_for(ConstraintFamily::DependentOpen), 1);
        assert_eq!(tally.constraints_for(ConstraintFamily::GroupedOpen), 1);
        assert_eq!(tally.constraints_for(ConstraintFamily::ServeFloor), 4);
        assert_eq!(
            formulation.model().constraint_counts(),
            tally.constraint_counts().clone()
        );

        Ok(())
    }

    #[test]
    fn disabled_families_add_no_constraints() -> TestResult {
        let instance = toy()?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::none_enabled();
        let settings = ModelSettings::default();

        let formulation = ModelBuilder::new(&instance, &side, &toggles, &settings).build()?;

        assert!(formulation.model().constraints.is_empty());

        Ok(())
    }

    #[test]
    fn out_of_range_side_entries_are_dropped_but_model_builds() -> TestResult {
        let instance = toy()?;
        let mut side = SideConstraintSet::new();
        side.prohibit_pair(0, 5).prohibit_pair(0, 1);

        let toggles = ConstraintToggleConfig::core_only().with(ConstraintFamily::ProhibitedPairs, true);
        let settings = ModelSettings::default();

        let formulation = ModelBuilder::new(&instance, &side, &toggles, &settings).build()?;

        assert_eq!(formulation.dropped().len(), 1);
        assert_eq!(
            formulation.model().constraint_counts().get(&ConstraintFamily::ProhibitedPairs),
            Some(&2)
        );

        Ok(())
    }

    #[test]
    fn objective_prices_open_flags_and_shipments() -> TestResult {
        let instance = ProblemInstance::new(
            vec![10.0, 20.0],
            vec![5, 5],
            vec![3, 4],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )?;
        let side = SideConstraintSet::new();
        let toggles = ConstraintToggleConfig::default();
        let settings = ModelSettings::default();

        let formulation = ModelBuilder::new(&instance, &side, &toggles, &settings).build()?;
        let vars = &formulation.model().variables;

        let mut assignment = VariableValues::default();

        if let (Some(open0), Some(s00), Some(s01)) = (vars.open(0), vars.served(0, 0), vars.served(0, 1)) {
            assignment.set(open0, 1.0);
            assignment.set(s00, 3.0);
            assignment.set(s01, 4.0);
        }

        let value = assignment.eval(&formulation.model().objective);

        assert!((value - (10.0 + 3.0 + 8.0)).abs() < 1e-9);

        Ok(())
    }
}
