//! Problem Instance

use std::ops::Range;

use thiserror::Error;

/// Errors raised while validating a problem instance.
#[derive(Debug, Error, PartialEq)]
pub enum InstanceError {
    /// A sequence or matrix dimension disagrees with the declared count.
    #[error("dimension mismatch for `{field}`: expected {expected}, found {actual}")]
    DimensionMismatch {
        /// Field whose length is wrong
        field: &'static str,

        /// Length implied by the declared counts
        expected: usize,

        /// Actual length found
        actual: usize,
    },

    /// An instance must have at least one warehouse and one customer.
    #[error("`{field}` must be positive")]
    Empty {
        /// Count that was zero
        field: &'static str,
    },

    /// A cost entry is negative.
    #[error("`{field}` entry {index} is negative")]
    NegativeValue {
        /// Field containing the entry
        field: &'static str,

        /// Flat index of the entry
        index: usize,
    },

    /// A cost entry is NaN or infinite.
    #[error("`{field}` entry {index} is not a finite number")]
    NonFinite {
        /// Field containing the entry
        field: &'static str,

        /// Flat index of the entry
        index: usize,
    },
}

/// A validated capacitated facility location instance.
///
/// Costs are per unit shipped (`transport_cost`) or per opening (`fixed_cost`).
/// The transport matrix is stored warehouse-major: `transport_cost[w][c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemInstance {
    fixed_cost: Vec<f64>,
    capacity: Vec<u64>,
    demand: Vec<u64>,
    transport_cost: Vec<Vec<f64>>,
}

impl ProblemInstance {
    /// Create an instance, inferring the counts from `fixed_cost` and `demand`.
    ///
    /// # Errors
    ///
    /// Returns an [`InstanceError`] if the dimensions are inconsistent, either count is
    /// zero, or any cost is negative or non-finite.
    pub fn new(
        fixed_cost: Vec<f64>,
        capacity: Vec<u64>,
        demand: Vec<u64>,
        transport_cost: Vec<Vec<f64>>,
    ) -> Result<Self, InstanceError> {
        let warehouses = fixed_cost.len();
        let customers = demand.len();

        Self::from_declared(
            warehouses,
            customers,
            fixed_cost,
            capacity,
            demand,
            transport_cost,
        )
    }

    /// Create an instance, checking every sequence against the declared counts.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::DimensionMismatch`] when any length disagrees with
    /// `warehouses`/`customers`, and the other [`InstanceError`] variants for
    /// empty or malformed costs.
    pub fn from_declared(
        warehouses: usize,
        customers: usize,
        fixed_cost: Vec<f64>,
        capacity: Vec<u64>,
        demand: Vec<u64>,
        transport_cost: Vec<Vec<f64>>,
    ) -> Result<Self, InstanceError> {
        if warehouses == 0 {
            return Err(InstanceError::Empty {
                field: "nWarehouses",
            });
        }

        if customers == 0 {
            return Err(InstanceError::Empty {
                field: "nCustomers",
            });
        }

        ensure_len("fixedCost", warehouses, fixed_cost.len())?;
        ensure_len("capacity", warehouses, capacity.len())?;
        ensure_len("demand", customers, demand.len())?;
        ensure_len("transportCost", warehouses, transport_cost.len())?;

        for row in &transport_cost {
            ensure_len("transportCost row", customers, row.len())?;
        }

        ensure_costs("fixedCost", fixed_cost.iter().copied())?;
        ensure_costs("transportCost", transport_cost.iter().flatten().copied())?;

        Ok(Self {
            fixed_cost,
            capacity,
            demand,
            transport_cost,
        })
    }

    /// Number of candidate warehouses
    pub fn warehouse_count(&self) -> usize {
        self.fixed_cost.len()
    }

    /// Number of customers
    pub fn customer_count(&self) -> usize {
        self.demand.len()
    }

    /// Warehouse index range
    pub fn warehouses(&self) -> Range<usize> {
        0..self.warehouse_count()
    }

    /// Customer index range
    pub fn customers(&self) -> Range<usize> {
        0..self.customer_count()
    }

    /// Fixed opening cost per warehouse
    pub fn fixed_cost(&self) -> &[f64] {
        &self.fixed_cost
    }

    /// Capacity per warehouse
    pub fn capacity(&self) -> &[u64] {
        &self.capacity
    }

    /// Demand per customer
    pub fn demand(&self) -> &[u64] {
        &self.demand
    }

    /// Unit transport cost matrix, warehouse-major
    pub fn transport_cost(&self) -> &[Vec<f64>] {
        &self.transport_cost
    }

    /// Unit transport cost from `warehouse` to `customer`, if both are in range.
    pub fn unit_cost(&self, warehouse: usize, customer: usize) -> Option<f64> {
        self.transport_cost
            .get(warehouse)
            .and_then(|row| row.get(customer))
            .copied()
    }

    /// Sum of all customer demand
    pub fn total_demand(&self) -> u64 {
        self.demand.iter().sum()
    }

    /// Sum of all warehouse capacity
    pub fn total_capacity(&self) -> u64 {
        self.capacity.iter().sum()
    }

    /// Largest single customer demand
    pub fn max_demand(&self) -> u64 {
        self.demand.iter().copied().max().unwrap_or(0)
    }

    /// Largest single warehouse capacity
    pub fn max_capacity(&self) -> u64 {
        self.capacity.iter().copied().max().unwrap_or(0)
    }

    /// Cost of a plan given per-warehouse open flags and positive shipments.
    ///
    /// Shipments referencing indices outside the instance contribute nothing.
    /// An empty plan costs `+0.0`.
    pub fn plan_cost<'s>(
        &self,
        open: &[bool],
        served: impl IntoIterator<Item = (&'s (usize, usize), &'s u64)>,
    ) -> f64 {
        let fixed: f64 = self
            .fixed_cost
            .iter()
            .zip(open)
            .filter(|(_, is_open)| **is_open)
            .fold(0.0, |acc, (cost, _)| acc + cost);

        let transport: f64 = served
            .into_iter()
            .filter_map(|(&(w, c), &qty)| {
                self.unit_cost(w, c).map(|unit| unit * u64_to_f64(qty))
            })
            .fold(0.0, |acc, term| acc + term);

        fixed + transport
    }
}

fn ensure_len(field: &'static str, expected: usize, actual: usize) -> Result<(), InstanceError> {
    if expected == actual {
        Ok(())
    } else {
        Err(InstanceError::DimensionMismatch {
            field,
            expected,
            actual,
        })
    }
}

fn ensure_costs(
    field: &'static str,
    values: impl Iterator<Item = f64>,
) -> Result<(), InstanceError> {
    for (index, value) in values.enumerate() {
        if !value.is_finite() {
            return Err(InstanceError::NonFinite { field, index });
        }

        if value < 0.0 {
            return Err(InstanceError::NegativeValue { field, index });
        }
    }

    Ok(())
}

/// Widen a quantity to `f64`.
///
/// Quantities in real instances stay far below 2^53, where the conversion is exact.
#[expect(
    clippy::cast_precision_loss,
    reason = "Quantities are bounded well below 2^53"
)]
pub(crate) fn u64_to_f64(v: u64) -> f64 {
    v as f64
}
