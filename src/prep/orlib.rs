//! OR-Library `cap*.txt` conversion
//!
//! Layout, whitespace separated and freely wrapped across lines:
//!
//! ```text
//! W C
//! capacity fixed_cost      (W times)
//! demand                   (C times, each followed by ...)
//! cost_1 ... cost_W        (... the cost of serving the whole demand from each warehouse)
//! ```
//!
//! Allocation costs are for the customer's entire demand; they are divided by the demand
//! to give a unit transport cost and transposed to warehouse-major order.

use std::io::{self, BufRead};

use num_traits::ToPrimitive;
use thiserror::Error;
use tracing::{debug, warn};

use crate::instance::{InstanceError, ProblemInstance};

/// OR-Library conversion errors
#[derive(Debug, Error)]
pub enum OrLibError {
    /// IO error reading the source
    #[error("failed to read OR-Library file: {0}")]
    Io(#[from] io::Error),

    /// The file ended early.
    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEnd {
        /// What was expected next
        expected: &'static str,
    },

    /// A token is not a number.
    #[error("malformed number `{fragment}` while reading {what}")]
    InvalidNumber {
        /// What was being read
        what: &'static str,

        /// The offending text
        fragment: String,
    },

    /// A count, capacity or demand is not a non-negative integer.
    #[error("{what} must be a non-negative integer, found {value}")]
    NotAnInteger {
        /// What was being read
        what: &'static str,

        /// The offending value
        value: f64,
    },

    /// The converted data does not form a valid instance.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

struct Numbers {
    tokens: std::vec::IntoIter<String>,
}

impl Numbers {
    fn read(reader: impl BufRead) -> Result<Self, OrLibError> {
        let mut tokens = Vec::new();

        for line in reader.lines() {
            tokens.extend(line?.split_whitespace().map(str::to_string));
        }

        Ok(Self {
            tokens: tokens.into_iter(),
        })
    }

    fn real(&mut self, what: &'static str) -> Result<f64, OrLibError> {
        let token = self
            .tokens
            .next()
            .ok_or(OrLibError::UnexpectedEnd { expected: what })?;

        // Some copies of the data use a decimal comma.
        token
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or(OrLibError::InvalidNumber {
                what,
                fragment: token,
            })
    }

    fn integer(&mut self, what: &'static str) -> Result<u64, OrLibError> {
        let value = self.real(what)?;

        if value.fract() != 0.0 || value < 0.0 {
            return Err(OrLibError::NotAnInteger { what, value });
        }

        value.to_u64().ok_or(OrLibError::NotAnInteger { what, value })
    }

    fn count(&mut self, what: &'static str) -> Result<usize, OrLibError> {
        let value = self.integer(what)?;

        value.to_usize().ok_or(OrLibError::NotAnInteger {
            what,
            value: value.to_f64().unwrap_or(f64::INFINITY),
        })
    }
}

/// Convert an OR-Library capacitated warehouse location file.
///
/// Customers with zero demand get a unit transport cost of zero.
///
/// # Errors
///
/// Returns an [`OrLibError`] if the input cannot be read or does not follow the layout.
pub fn convert(reader: impl BufRead) -> Result<ProblemInstance, OrLibError> {
    let mut numbers = Numbers::read(reader)?;

    let warehouses = numbers.count("the warehouse count")?;
    let customers = numbers.count("the customer count")?;

    let mut capacity = Vec::with_capacity(warehouses);
    let mut fixed_cost = Vec::with_capacity(warehouses);

    for _ in 0..warehouses {
        capacity.push(numbers.integer("a warehouse capacity")?);
        fixed_cost.push(numbers.real("a warehouse fixed cost")?);
    }

    let mut demand = Vec::with_capacity(customers);
    let mut transport_cost = vec![Vec::with_capacity(customers); warehouses];

    for customer in 0..customers {
        let d = numbers.integer("a customer demand")?;
        let divisor = d.to_f64().unwrap_or(f64::INFINITY);

        if d == 0 {
            warn!(customer, "customer has zero demand; using zero unit transport cost");
        }

        for row in &mut transport_cost {
            let allocation = numbers.real("an allocation cost")?;

            row.push(if d == 0 { 0.0 } else { allocation / divisor });
        }

        demand.push(d);
    }

    debug!(warehouses, customers, "converted OR-Library instance");

    Ok(ProblemInstance::from_declared(
        warehouses,
        customers,
        fixed_cost,
        capacity,
        demand,
        transport_cost,
    )?)
}
