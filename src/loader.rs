//! Instance Loader
//!
//! Reads the `name = value;` text format into a validated [`ProblemInstance`] and its
//! [`SideConstraintSet`]. The text is tokenized and parsed into typed values; nothing in
//! it is ever evaluated.
//!
//! ```text
//! nWarehouses = 2;
//! nCustomers = 2;
//! fixedCost = [10, 10];
//! capacity = [5, 5];
//! demand = [3, 4];
//! transportCost = [
//!   [1, 1],
//!   [1, 1],
//! ];
//! prohibited_pairs = [(0, 1)];
//! ```

use std::{fs, io, path::Path};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    constraints::{IndexBase, SideConstraintSet},
    instance::{InstanceError, ProblemInstance},
};

mod lexer;
mod parser;
pub mod writer;

pub use writer::write_instance;

/// Statement names understood by the loader
pub mod fields {
    /// Declared warehouse count
    pub const N_WAREHOUSES: &str = "nWarehouses";

    /// Declared customer count
    pub const N_CUSTOMERS: &str = "nCustomers";

    /// Fixed opening cost per warehouse
    pub const FIXED_COST: &str = "fixedCost";

    /// Capacity per warehouse
    pub const CAPACITY: &str = "capacity";

    /// Demand per customer
    pub const DEMAND: &str = "demand";

    /// Unit transport cost, one row per warehouse
    pub const TRANSPORT_COST: &str = "transportCost";

    /// Optional customer pairs that never share a warehouse
    pub const PROHIBITED_PAIRS: &str = "prohibited_pairs";

    /// Optional `(i, j)` pairs: opening `i` requires `j`
    pub const DEPENDENT_WAREHOUSES: &str = "dependent_warehouses";

    /// Optional groups of warehouses sharing one open state
    pub const WAREHOUSE_GROUPS: &str = "warehouse_groups";
}

/// Instance file errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// IO error reading an instance file
    #[error("failed to read instance file: {0}")]
    Io(#[from] io::Error),

    /// A required statement is absent.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Name of the missing statement
        field: &'static str,
    },

    /// A numeric literal could not be read.
    #[error("malformed number `{fragment}` in `{field}`")]
    InvalidNumber {
        /// Statement containing the literal
        field: String,

        /// The offending text
        fragment: String,
    },

    /// A value has the wrong shape for its field.
    #[error("`{field}` must be {expected}")]
    InvalidValue {
        /// Statement name
        field: &'static str,

        /// Shape the field requires
        expected: &'static str,
    },

    /// The token stream does not follow the grammar.
    #[error("expected {expected} at byte {offset}, found {found}")]
    UnexpectedToken {
        /// What the parser was looking for
        expected: &'static str,

        /// What it found
        found: String,

        /// Byte offset of the token
        offset: usize,
    },

    /// The input ended inside a statement.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for
        expected: &'static str,
    },

    /// A count, quantity or index is not a non-negative integer.
    #[error("`{field}` requires non-negative integers, found {value}")]
    NotAnInteger {
        /// Statement name
        field: &'static str,

        /// The offending value
        value: f64,
    },

    /// The same statement appears twice.
    #[error("field `{field}` is defined more than once")]
    DuplicateField {
        /// Statement name
        field: String,
    },

    /// The values parse but do not form a valid instance.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// How side-constraint indices in a file are numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Index base of `prohibited_pairs`, `dependent_warehouses` and `warehouse_groups`
    pub index_base: IndexBase,
}

/// An instance file's content.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedInstance {
    /// Validated instance data
    pub instance: ProblemInstance,

    /// Side constraints, zero-based and not yet checked against the instance
    pub side_constraints: SideConstraintSet,
}

/// Load an instance file with zero-based side-constraint indices.
///
/// # Errors
///
/// Returns a [`ParseError`] if the file cannot be read or is malformed.
pub fn load_file(path: impl AsRef<Path>) -> Result<LoadedInstance, ParseError> {
    load_file_with(path, LoadOptions::default())
}

/// Load an instance file.
///
/// # Errors
///
/// Returns a [`ParseError`] if the file cannot be read or is malformed.
pub fn load_file_with(
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<LoadedInstance, ParseError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    debug!(path = %path.display(), bytes = contents.len(), "read instance file");

    load_str_with(&contents, options)
}

/// Load an instance from text with zero-based side-constraint indices.
///
/// # Errors
///
/// Returns a [`ParseError`] if the text is malformed.
pub fn load_str(src: &str) -> Result<LoadedInstance, ParseError> {
    load_str_with(src, LoadOptions::default())
}

/// Load an instance from text.
///
/// # Errors
///
/// Returns a [`ParseError`] if the text is malformed.
pub fn load_str_with(src: &str, options: LoadOptions) -> Result<LoadedInstance, ParseError> {
    let mut doc = parser::parse(src)?;

    let warehouses = doc.take(fields::N_WAREHOUSES)?.into_index(fields::N_WAREHOUSES)?;
    let customers = doc.take(fields::N_CUSTOMERS)?.into_index(fields::N_CUSTOMERS)?;
    let fixed_cost = doc.take(fields::FIXED_COST)?.into_numbers(fields::FIXED_COST)?;
    let capacity = doc.take(fields::CAPACITY)?.into_integers(fields::CAPACITY)?;
    let demand = doc.take(fields::DEMAND)?.into_integers(fields::DEMAND)?;
    let transport_cost = doc
        .take(fields::TRANSPORT_COST)?
        .into_matrix(fields::TRANSPORT_COST)?;

    let mut side = SideConstraintSet::new();

    if let Some(value) = doc.take_optional(fields::PROHIBITED_PAIRS) {
        for pair in value.into_index_tuples(fields::PROHIBITED_PAIRS, Some(2))? {
            if let [a, b] = pair.as_slice() {
                side.prohibit_pair(*a, *b);
            }
        }
    }

    if let Some(value) = doc.take_optional(fields::DEPENDENT_WAREHOUSES) {
        for pair in value.into_index_tuples(fields::DEPENDENT_WAREHOUSES, Some(2))? {
            if let [i, j] = pair.as_slice() {
                side.add_dependency(*i, *j);
            }
        }
    }

    if let Some(value) = doc.take_optional(fields::WAREHOUSE_GROUPS) {
        for group in value.into_index_tuples(fields::WAREHOUSE_GROUPS, None)? {
            side.add_group(group);
        }
    }

    doc.finish();

    let instance = ProblemInstance::from_declared(
        warehouses,
        customers,
        fixed_cost,
        capacity,
        demand,
        transport_cost,
    )?;

    let (side_constraints, unconvertible) = side.rebased(options.index_base);

    for entry in &unconvertible {
        warn!(%entry, "dropping side constraint that cannot be rebased");
    }

    debug!(
        warehouses,
        customers,
        side_constraints_empty = side_constraints.is_empty(),
        "loaded instance"
    );

    Ok(LoadedInstance {
        instance,
        side_constraints,
    })
}
