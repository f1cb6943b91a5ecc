//! Formulation State

use std::fmt;

use good_lp::{Expression, ProblemVariables, Variable, variable};

use crate::{
    config::ConstraintFamily,
    constraints::InvalidIndex,
    model::{
        DecisionVariables, Formulation, LinearConstraint, LinearModel, ModelError, Relation,
        observer::{FormulationObserver, VariableRole},
        u64_to_f64_exact,
    },
};

/// Builder state: the variable store, the objective and the recorded constraints.
pub(crate) struct FormulationState<'o> {
    problem: ProblemVariables,
    objective: Expression,
    constraints: Vec<LinearConstraint>,
    observer: &'o mut dyn FormulationObserver,
}

impl fmt::Debug for FormulationState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulationState")
            .field("problem", &"<ProblemVariables>")
            .field("objective", &"<Expression>")
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish_non_exhaustive()
    }
}

impl<'o> FormulationState<'o> {
    pub(crate) fn new(observer: &'o mut dyn FormulationObserver) -> Self {
        Self {
            problem: ProblemVariables::new(),
            objective: Expression::default(),
            constraints: Vec::new(),
            observer,
        }
    }

    /// Declare a boolean decision variable.
    pub(crate) fn add_binary(&mut self, role: VariableRole) -> Variable {
        let var = self.problem.add(variable().binary());

        self.observer.on_variable(role, var);

        var
    }

    /// Declare an integer decision variable bounded to `[0, upper]`.
    pub(crate) fn add_bounded_integer(
        &mut self,
        role: VariableRole,
        upper: u64,
    ) -> Result<Variable, ModelError> {
        let upper_f = u64_to_f64_exact(upper).ok_or(ModelError::CoefficientNotRepresentable(upper))?;

        let var = self
            .problem
            .add(variable().integer().min(0.0).max(upper_f));

        self.observer.on_variable(role, var);

        Ok(var)
    }

    /// Add `coefficient * var` to the minimisation objective.
    pub(crate) fn add_objective_term(&mut self, var: Variable, coefficient: f64) {
        self.objective += var * coefficient;

        self.observer.on_objective_term(var, coefficient);
    }

    /// Record a constraint for the given family.
    pub(crate) fn add_constraint(
        &mut self,
        family: ConstraintFamily,
        lhs: Expression,
        relation: Relation,
        rhs: f64,
    ) {
        let constraint = LinearConstraint {
            family,
            lhs,
            relation,
            rhs,
        };

        self.observer.on_constraint(&constraint);

        self.constraints.push(constraint);
    }

    /// Finish building.
    pub(crate) fn into_formulation(
        self,
        variables: DecisionVariables,
        dropped: Vec<InvalidIndex>,
    ) -> Formulation {
        Formulation {
            problem: self.problem,
            model: LinearModel {
                variables,
                objective: self.objective,
                constraints: self.constraints,
            },
            dropped,
        }
    }
}
