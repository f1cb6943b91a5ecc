//! CFLP prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    config::{
        ConfigError, ConstraintFamily, ConstraintToggleConfig, ModelSettings, RunConfig,
        RunOverrides, SolveSettings,
    },
    constraints::{IndexBase, InvalidIndex, SideConstraintSet},
    instance::{InstanceError, ProblemInstance},
    loader::{LoadOptions, LoadedInstance, ParseError, load_file, load_str, write_instance},
    model::{
        Formulation, FormulationObserver, FormulationTally, LinearModel, ModelBuilder, ModelError,
        NoopObserver,
    },
    pipeline::{Outcome, PipelineError, solve, solve_with},
    report::{Report, ReportError},
    solution::{DecodeError, PropertyViolation, Solution, SolutionDecoder},
    solvers::{
        Backend, GoodLpAdapter, RawAssignment, SolveStatus, SolverAdapter, SolverError,
        VariableValues,
    },
};
