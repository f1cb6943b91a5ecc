//! Side Constraints
//!
//! Structural business rules layered on top of the basic capacity/demand model:
//! customers that must not share a warehouse, warehouses whose opening depends on
//! another warehouse, and groups of warehouses that open or close together.

use std::{collections::BTreeSet, fmt};

use petgraph::{algo::tarjan_scc, graph::DiGraph, graph::NodeIndex};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::instance::ProblemInstance;

/// Numbering convention of indices in source data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexBase {
    /// Indices start at zero
    #[default]
    Zero,

    /// Indices start at one
    One,
}

impl IndexBase {
    /// Convert an index written in this base to a zero-based index.
    ///
    /// Returns `None` for `0` in a one-based source, which has no zero-based counterpart.
    pub fn to_zero_based(self, raw: usize) -> Option<usize> {
        match self {
            IndexBase::Zero => Some(raw),
            IndexBase::One => raw.checked_sub(1),
        }
    }
}

/// Which side-constraint family an index problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideConstraintKind {
    /// Prohibited customer pair
    ProhibitedPair,

    /// Warehouse dependency
    DependentWarehouse,

    /// Warehouse group member
    WarehouseGroup,
}

impl fmt::Display for SideConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SideConstraintKind::ProhibitedPair => "prohibited pair",
            SideConstraintKind::DependentWarehouse => "warehouse dependency",
            SideConstraintKind::WarehouseGroup => "warehouse group",
        };

        f.write_str(name)
    }
}

/// A side-constraint entry that was dropped because it referenced an unusable index.
///
/// Dropping is a local recovery: the remainder of the model still builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIndex {
    /// Family the entry belonged to
    pub kind: SideConstraintKind,

    /// The indices of the offending entry, as written
    pub entry: SmallVec<[usize; 4]>,

    /// Exclusive upper bound the indices were checked against; `0` when a one-based
    /// source used index `0`
    pub bound: usize,
}

impl fmt::Display for InvalidIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bound == 0 {
            return write!(
                f,
                "{} {:?} uses index 0 in one-based data",
                self.kind,
                self.entry.as_slice()
            );
        }

        write!(
            f,
            "{} {:?} references an index outside 0..{}",
            self.kind,
            self.entry.as_slice(),
            self.bound
        )
    }
}

/// Structural side constraints of an instance.
///
/// Prohibited pairs are stored unordered (smaller index first); dependencies are
/// ordered `(i, j)` meaning "opening `i` requires `j`".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideConstraintSet {
    prohibited_pairs: BTreeSet<(usize, usize)>,
    dependent_warehouses: BTreeSet<(usize, usize)>,
    warehouse_groups: Vec<Vec<usize>>,
}

impl SideConstraintSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair of customers that must never share a warehouse.
    ///
    /// A customer paired with itself is ignored: the rule would make that customer
    /// unservable.
    pub fn prohibit_pair(&mut self, a: usize, b: usize) -> &mut Self {
        if a == b {
            warn!(customer = a, "ignoring prohibited pair of a customer with itself");
        } else {
            self.prohibited_pairs.insert((a.min(b), a.max(b)));
        }

        self
    }

    /// Require warehouse `requires` to be open whenever `warehouse` is open.
    pub fn add_dependency(&mut self, warehouse: usize, requires: usize) -> &mut Self {
        if warehouse != requires {
            self.dependent_warehouses.insert((warehouse, requires));
        }

        self
    }

    /// Add a group of warehouses that must share the same open state.
    ///
    /// Repeated members are collapsed; groups with fewer than two distinct members
    /// carry no constraint and are skipped.
    pub fn add_group(&mut self, members: impl IntoIterator<Item = usize>) -> &mut Self {
        let mut seen = BTreeSet::new();
        let group: Vec<usize> = members.into_iter().filter(|m| seen.insert(*m)).collect();

        if group.len() > 1 {
            self.warehouse_groups.push(group);
        }

        self
    }

    /// Prohibited customer pairs
    pub fn prohibited_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.prohibited_pairs.iter().copied()
    }

    /// Warehouse dependencies `(i, j)`: opening `i` requires `j`
    pub fn dependent_warehouses(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.dependent_warehouses.iter().copied()
    }

    /// Warehouse equivalence groups
    pub fn warehouse_groups(&self) -> &[Vec<usize>] {
        &self.warehouse_groups
    }

    /// True if no side constraints are present
    pub fn is_empty(&self) -> bool {
        self.prohibited_pairs.is_empty()
            && self.dependent_warehouses.is_empty()
            && self.warehouse_groups.is_empty()
    }

    /// Return a copy containing only entries whose indices are valid for `instance`.
    ///
    /// Every dropped entry is logged and returned so the caller can report it.
    pub fn sanitized(&self, instance: &ProblemInstance) -> (Self, Vec<InvalidIndex>) {
        let customers = instance.customer_count();
        let warehouses = instance.warehouse_count();

        let mut clean = Self::new();
        let mut dropped = Vec::new();

        for (a, b) in self.prohibited_pairs() {
            if a < customers && b < customers {
                clean.prohibited_pairs.insert((a, b));
            } else {
                dropped.push(InvalidIndex {
                    kind: SideConstraintKind::ProhibitedPair,
                    entry: SmallVec::from_slice(&[a, b]),
                    bound: customers,
                });
            }
        }

        for (i, j) in self.dependent_warehouses() {
            if i < warehouses && j < warehouses {
                clean.dependent_warehouses.insert((i, j));
            } else {
                dropped.push(InvalidIndex {
                    kind: SideConstraintKind::DependentWarehouse,
                    entry: SmallVec::from_slice(&[i, j]),
                    bound: warehouses,
                });
            }
        }

        for group in &self.warehouse_groups {
            let (valid, invalid): (Vec<usize>, Vec<usize>) =
                group.iter().partition(|&&w| w < warehouses);

            if !invalid.is_empty() {
                dropped.push(InvalidIndex {
                    kind: SideConstraintKind::WarehouseGroup,
                    entry: invalid.into_iter().collect(),
                    bound: warehouses,
                });
            }

            clean.add_group(valid);
        }

        for entry in &dropped {
            warn!(
                kind = %entry.kind,
                entry = ?entry.entry.as_slice(),
                bound = entry.bound,
                "dropping side constraint with out-of-range index"
            );
        }

        (clean, dropped)
    }

    /// Warehouses whose dependencies form a cycle.
    ///
    /// Every warehouse in a returned component is forced to share one open state,
    /// exactly as if they were listed as a group.
    pub fn dependency_cycles(&self, warehouse_count: usize) -> Vec<Vec<usize>> {
        let mut graph = DiGraph::<(), ()>::with_capacity(warehouse_count, self.dependent_warehouses.len());

        for _ in 0..warehouse_count {
            graph.add_node(());
        }

        for (i, j) in self.dependent_warehouses() {
            if i < warehouse_count && j < warehouse_count {
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), ());
            }
        }

        let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut members: Vec<usize> = component.iter().map(|n| n.index()).collect();
                members.sort_unstable();
                members
            })
            .collect();

        cycles.sort();

        if !cycles.is_empty() {
            debug!(?cycles, "warehouse dependencies contain cycles");
        }

        cycles
    }

    /// Re-number all indices from `base` to zero-based.
    ///
    /// Entries that cannot be converted (index `0` in a one-based source) are dropped
    /// and returned.
    pub fn rebased(&self, base: IndexBase) -> (Self, Vec<InvalidIndex>) {
        if base == IndexBase::Zero {
            return (self.clone(), Vec::new());
        }

        let mut out = Self::new();
        let mut dropped = Vec::new();

        for (a, b) in self.prohibited_pairs() {
            match (base.to_zero_based(a), base.to_zero_based(b)) {
                (Some(a0), Some(b0)) => {
                    out.prohibit_pair(a0, b0);
                }
                _ => dropped.push(InvalidIndex {
                    kind: SideConstraintKind::ProhibitedPair,
                    entry: SmallVec::from_slice(&[a, b]),
                    bound: 0,
                }),
            }
        }

        for (i, j) in self.dependent_warehouses() {
            match (base.to_zero_based(i), base.to_zero_based(j)) {
                (Some(i0), Some(j0)) => {
                    out.add_dependency(i0, j0);
                }
                _ => dropped.push(InvalidIndex {
                    kind: SideConstraintKind::DependentWarehouse,
                    entry: SmallVec::from_slice(&[i, j]),
                    bound: 0,
                }),
            }
        }

        for group in &self.warehouse_groups {
            let (valid, invalid): (Vec<usize>, Vec<usize>) = group
                .iter()
                .partition(|&&w| base.to_zero_based(w).is_some());

            if !invalid.is_empty() {
                dropped.push(InvalidIndex {
                    kind: SideConstraintKind::WarehouseGroup,
                    entry: invalid.into_iter().collect(),
                    bound: 0,
                });
            }

            out.add_group(valid.into_iter().filter_map(|w| base.to_zero_based(w)));
        }

        (out, dropped)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn instance(warehouses: usize, customers: usize) -> Result<ProblemInstance, crate::instance::InstanceError> {
        ProblemInstance::new(
            vec![1.0; warehouses],
            vec![10; warehouses],
            vec![1; customers],
            vec![vec![1.0; customers]; warehouses],
        )
    }

    #[test]
    fn prohibited_pairs_are_unordered_and_deduplicated() {
        let mut side = SideConstraintSet::new();
        side.prohibit_pair(3, 1).prohibit_pair(1, 3).prohibit_pair(2, 2);

        assert_eq!(side.prohibited_pairs().collect::<Vec<_>>(), vec![(1, 3)]);
    }

    #[test]
    fn groups_collapse_duplicates_and_skip_singletons() {
        let mut side = SideConstraintSet::new();
        side.add_group([2, 2, 4]).add_group([5, 5]);

        assert_eq!(side.warehouse_groups(), &[vec![2, 4]]);
    }

    #[test]
    fn sanitized_drops_out_of_range_entries_and_keeps_the_rest() -> TestResult {
        let instance = instance(2, 3)?;

        let mut side = SideConstraintSet::new();
        side.prohibit_pair(0, 1)
            .prohibit_pair(0, 3)
            .add_dependency(0, 1)
            .add_dependency(1, 7)
            .add_group([0, 1, 9]);

        let (clean, dropped) = side.sanitized(&instance);

        assert_eq!(clean.prohibited_pairs().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(clean.dependent_warehouses().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(clean.warehouse_groups(), &[vec![0, 1]]);
        assert_eq!(dropped.len(), 3);

        let kinds: Vec<SideConstraintKind> = dropped.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SideConstraintKind::ProhibitedPair,
                SideConstraintKind::DependentWarehouse,
                SideConstraintKind::WarehouseGroup,
            ]
        );

        Ok(())
    }

    #[test]
    fn dependency_cycles_are_detected() {
        let mut side = SideConstraintSet::new();
        side.add_dependency(0, 1)
            .add_dependency(1, 2)
            .add_dependency(2, 0)
            .add_dependency(3, 4);

        assert_eq!(side.dependency_cycles(5), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn one_based_entries_are_rebased() {
        let mut side = SideConstraintSet::new();
        side.prohibit_pair(1, 2).prohibit_pair(0, 2).add_dependency(1, 6);

        let (rebased, dropped) = side.rebased(IndexBase::One);

        assert_eq!(rebased.prohibited_pairs().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(rebased.dependent_warehouses().collect::<Vec<_>>(), vec![(0, 5)]);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn invalid_index_display_names_the_family() {
        let entry = InvalidIndex {
            kind: SideConstraintKind::ProhibitedPair,
            entry: SmallVec::from_slice(&[0, 9]),
            bound: 3,
        };

        assert_eq!(
            entry.to_string(),
            "prohibited pair [0, 9] references an index outside 0..3"
        );
    }
}
