//! Side-constraint generators
//!
//! Index-arithmetic rules for producing side-constraint data. Every generator returns
//! zero-based indices and only pairs that fit within the given count.

use crate::constraints::SideConstraintSet;

/// Neighbouring customers `(1, 2), (3, 4), ...` that must not share a warehouse.
///
/// Each pair ends on an even index, so customer `0` is never paired and a pair whose
/// even index would reach `customers` is left out.
pub fn sequential_pairs(customers: usize) -> Vec<(usize, usize)> {
    (2..customers).step_by(2).map(|i| (i - 1, i)).collect()
}

/// Every pair among the customers `step, 2 * step, ...` below `customers`.
///
/// Customer `0` is not a member. A `step` of zero yields no pairs.
pub fn multiples_pairs(step: usize, customers: usize) -> Vec<(usize, usize)> {
    if step == 0 {
        return Vec::new();
    }

    let members: Vec<usize> = (step..customers).step_by(step).collect();

    members
        .iter()
        .enumerate()
        .flat_map(|(k, &a)| members.iter().skip(k + 1).map(move |&b| (a, b)))
        .collect()
}

/// Dependencies `(i, i + offset)` for the first `count` warehouses.
///
/// Pairs whose target would be outside `warehouses` are not generated.
pub fn offset_dependencies(count: usize, offset: usize, warehouses: usize) -> Vec<(usize, usize)> {
    (0..count)
        .filter_map(|i| {
            let j = i.checked_add(offset)?;

            (offset > 0 && j < warehouses).then_some((i, j))
        })
        .collect()
}

/// Add generated pairs and dependencies to `side`.
pub fn extend(
    side: &mut SideConstraintSet,
    pairs: impl IntoIterator<Item = (usize, usize)>,
    dependencies: impl IntoIterator<Item = (usize, usize)>,
) {
    for (a, b) in pairs {
        side.prohibit_pair(a, b);
    }

    for (i, j) in dependencies {
        side.add_dependency(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_pairs_cover_neighbours() {
        assert_eq!(sequential_pairs(5), vec![(1, 2), (3, 4)]);
        assert_eq!(sequential_pairs(4), vec![(1, 2)]);
        assert_eq!(sequential_pairs(50).len(), 24);
        assert_eq!(sequential_pairs(50).last(), Some(&(47, 48)));
        assert!(sequential_pairs(2).is_empty());
    }

    #[test]
    fn multiples_pairs_link_every_multiple() {
        assert_eq!(multiples_pairs(5, 15), vec![(5, 10)]);
        assert_eq!(
            multiples_pairs(5, 16),
            vec![(5, 10), (5, 15), (10, 15)]
        );
        assert_eq!(multiples_pairs(5, 50).len(), 36);
        assert_eq!(multiples_pairs(5, 50).last(), Some(&(40, 45)));
        assert!(multiples_pairs(5, 6).is_empty());
        assert!(multiples_pairs(0, 10).is_empty());
    }

    #[test]
    fn offset_dependencies_stay_in_range() {
        assert_eq!(
            offset_dependencies(5, 5, 10),
            vec![(0, 5), (1, 6), (2, 7), (3, 8), (4, 9)]
        );
        assert_eq!(offset_dependencies(5, 5, 7), vec![(0, 5), (1, 6)]);
        assert!(offset_dependencies(3, 0, 10).is_empty());
    }

    #[test]
    fn extend_adds_generated_entries() {
        let mut side = SideConstraintSet::new();

        extend(&mut side, sequential_pairs(4), offset_dependencies(1, 1, 2));

        assert_eq!(side.prohibited_pairs().count(), 1);
        assert_eq!(side.dependent_warehouses().collect::<Vec<_>>(), vec![(0, 1)]);
    }
}
