//! Instance file writer

use std::{
    fmt::Display,
    io::{self, Write},
};

use crate::{
    constraints::SideConstraintSet,
    instance::ProblemInstance,
    loader::fields,
};

/// Write an instance and its side constraints in the loader's text format.
///
/// Optional statements are only written when non-empty. Indices are written zero-based.
///
/// # Errors
///
/// Returns any error raised by `out`.
pub fn write_instance<W: Write>(
    instance: &ProblemInstance,
    side: &SideConstraintSet,
    mut out: W,
) -> io::Result<()> {
    writeln!(out, "{} = {};", fields::N_WAREHOUSES, instance.warehouse_count())?;
    writeln!(out, "{} = {};", fields::N_CUSTOMERS, instance.customer_count())?;
    writeln!(out, "{} = {};", fields::FIXED_COST, list(instance.fixed_cost()))?;
    writeln!(out, "{} = {};", fields::CAPACITY, list(instance.capacity()))?;
    writeln!(out, "{} = {};", fields::DEMAND, list(instance.demand()))?;

    writeln!(out, "{} = [", fields::TRANSPORT_COST)?;
    for row in instance.transport_cost() {
        writeln!(out, "  {},", list(row))?;
    }
    writeln!(out, "];")?;

    let pairs: Vec<String> = side
        .prohibited_pairs()
        .map(|(a, b)| tuple(&[a, b]))
        .collect();

    if !pairs.is_empty() {
        writeln!(out, "{} = [{}];", fields::PROHIBITED_PAIRS, pairs.join(", "))?;
    }

    let dependencies: Vec<String> = side
        .dependent_warehouses()
        .map(|(i, j)| tuple(&[i, j]))
        .collect();

    if !dependencies.is_empty() {
        writeln!(
            out,
            "{} = [{}];",
            fields::DEPENDENT_WAREHOUSES,
            dependencies.join(", ")
        )?;
    }

    let groups: Vec<String> = side.warehouse_groups().iter().map(|g| tuple(g)).collect();

    if !groups.is_empty() {
        writeln!(out, "{} = [{}];", fields::WAREHOUSE_GROUPS, groups.join(", "))?;
    }

    out.flush()
}

fn join<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn list<T: Display>(values: &[T]) -> String {
    format!("[{}]", join(values))
}

fn tuple(values: &[usize]) -> String {
    format!("({})", join(values))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::loader::load_str;

    use super::*;

    #[test]
    fn written_instance_loads_back_unchanged() -> TestResult {
        let instance = ProblemInstance::new(
            vec![10.5, 20.0],
            vec![5, 7],
            vec![3, 4, 1],
            vec![vec![0.25, 1.0, 2.0], vec![3.0, 0.1, 4.0]],
        )?;

        let mut side = SideConstraintSet::new();
        side.prohibit_pair(0, 2).add_dependency(1, 0).add_group([0, 1]);

        let mut buf = Vec::new();
        write_instance(&instance, &side, &mut buf)?;

        let loaded = load_str(std::str::from_utf8(&buf)?)?;

        assert_eq!(loaded.instance, instance);
        assert_eq!(loaded.side_constraints, side);

        Ok(())
    }

    #[test]
    fn empty_side_constraints_are_omitted() -> TestResult {
        let instance = ProblemInstance::new(vec![1.0], vec![2], vec![2], vec![vec![1.0]])?;

        let mut buf = Vec::new();
        write_instance(&instance, &SideConstraintSet::new(), &mut buf)?;

        let text = String::from_utf8(buf)?;

        assert!(text.starts_with("nWarehouses = 1;\nnCustomers = 1;\n"));
        assert!(!text.contains(fields::PROHIBITED_PAIRS));

        Ok(())
    }
}
