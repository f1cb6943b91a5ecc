//! Report

use std::{io, ops::Range, time::Duration};

use humanize_duration::{Truncate, prelude::DurationExt};
use rust_decimal::Decimal;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{instance::ProblemInstance, solution::Solution, solvers::SolveStatus};

/// Errors that can occur when writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error
    #[error("failed to write report")]
    IO,
}

/// Human-readable rendering of a [`Solution`].
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    instance: &'a ProblemInstance,
    solution: &'a Solution,
    elapsed: Option<Duration>,
}

impl<'a> Report<'a> {
    /// Create a report for `solution`.
    pub fn new(instance: &'a ProblemInstance, solution: &'a Solution) -> Self {
        Self {
            instance,
            solution,
            elapsed: None,
        }
    }

    /// Include the solve time in the summary line.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// One line describing the terminal status.
    pub fn summary_line(&self) -> String {
        let timing = self
            .elapsed
            .map(|d| format!(" in {}", d.human(Truncate::Nano)))
            .unwrap_or_default();

        let opened = self.solution.open_warehouses().count();
        let total = self.instance.warehouse_count();
        let status = self.solution.status;

        match (status, self.solution.objective_value) {
            (SolveStatus::Optimal, Some(cost)) => format!(
                "{status}: optimal cost {cost:.2} with {opened} of {total} warehouses open{timing}"
            ),
            (SolveStatus::Feasible | SolveStatus::TimeLimitReached, Some(cost)) => format!(
                "{status}: best cost found {cost:.2} with {opened} of {total} warehouses open, optimality not proven{timing}"
            ),
            (SolveStatus::TimeLimitReached, None) => {
                format!("{status}: no feasible plan found within the time budget{timing}")
            }
            (SolveStatus::Infeasible, _) => {
                format!("{status}: no plan satisfies every enabled constraint{timing}")
            }
            (SolveStatus::Invalid, _) => {
                format!("{status}: the backend rejected the model{timing}")
            }
            (SolveStatus::Optimal | SolveStatus::Feasible, None) => {
                format!("{status}: the backend returned no assignment{timing}")
            }
        }
    }

    /// Write the summary line and, when a plan exists, the warehouse and customer tables.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::IO`] if writing to `out` fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        writeln!(out, "{}", self.summary_line()).map_err(|_err| ReportError::IO)?;

        let Some(cost) = self.solution.objective_value else {
            return Ok(());
        };

        write_table(&mut out, self.warehouse_table(), 2..5)?;
        write_table(&mut out, self.customer_table(), 1..2)?;

        writeln!(out, "\n Total cost: \x1b[1m{cost:.2}\x1b[0m\n").map_err(|_err| ReportError::IO)
    }

    fn warehouse_table(&self) -> Builder {
        let mut builder = Builder::default();

        builder.push_record(["Warehouse", "Status", "Shipped", "Capacity", "Utilization"]);

        for (warehouse, &capacity) in self.instance.capacity().iter().enumerate() {
            if self.solution.is_open(warehouse) {
                let shipped = self.solution.total_served_by(warehouse);

                builder.push_record([
                    warehouse.to_string(),
                    "open".to_string(),
                    shipped.to_string(),
                    capacity.to_string(),
                    utilization(shipped, capacity),
                ]);
            } else {
                builder.push_record([
                    warehouse.to_string(),
                    "closed".to_string(),
                    String::new(),
                    capacity.to_string(),
                    String::new(),
                ]);
            }
        }

        builder
    }

    fn customer_table(&self) -> Builder {
        let mut builder = Builder::default();

        builder.push_record(["Customer", "Demand", "Served by"]);

        for (customer, &demand) in self.instance.demand().iter().enumerate() {
            let suppliers = self
                .solution
                .suppliers_of(customer)
                .iter()
                .map(|(w, qty)| format!("{w} ({qty})"))
                .collect::<Vec<_>>()
                .join(", ");

            builder.push_record([customer.to_string(), demand.to_string(), suppliers]);
        }

        builder
    }
}

/// `shipped / capacity` as a percentage with one decimal place.
fn utilization(shipped: u64, capacity: u64) -> String {
    Decimal::from(shipped)
        .checked_div(Decimal::from(capacity))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| format!("{:.1}%", pct.round_dp(1)))
        .unwrap_or_default()
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric: Range<usize>,
) -> Result<(), ReportError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(
        1,
        HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
    );

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric), Alignment::right());

    writeln!(out, "\n{table}").map_err(|_err| ReportError::IO)
}
