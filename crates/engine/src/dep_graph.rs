//! Dependency graph between cells.
//!
//! Tracks, per cell, the cells its formula reads (references, outgoing) and
//! the cells that read it (dependents, incoming).
//!
//! # Edge direction
//!
//! ```text
//! A → B  means  "A references B"  (B's change invalidates A)
//! ```
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** if B ∈ refs[A] then A ∈ deps[B], and
//!    vice versa.
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **No duplicate edges:** set semantics enforced by `FxHashSet`.
//! 4. **Acyclicity:** candidates are vetted with [`DepGraph::would_create_cycle`]
//!    before [`DepGraph::replace_edges`] runs, so the stored graph is a DAG
//!    after every completed mutation.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

/// Reference/dependent edge sets, keyed by cell position.
///
/// Cells never own each other; the sheet owns the cells and this graph owns
/// the edges, so the bidirectional relation creates no ownership cycle.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// References: for each formula cell, the cells it reads.
    refs: FxHashMap<Position, FxHashSet<Position>>,

    /// Dependents: for each referenced cell, the formula cells reading it.
    deps: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells that `cell`'s body currently reads (outgoing edges).
    pub fn references(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.refs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells whose bodies read `cell` (incoming edges).
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.deps
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True while at least one other cell reads `cell`. Placeholders stay in
    /// the sheet exactly as long as this holds.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.deps.get(&cell).is_some_and(|s| !s.is_empty())
    }

    /// Replace all outgoing edges of `cell` atomically.
    ///
    /// The only mutator that touches both maps. It:
    /// 1. removes `cell` from all its old referees' dependent sets,
    /// 2. clears `cell`'s reference set,
    /// 3. installs the new reference set and the mirror dependent edges.
    ///
    /// Pass an empty set to detach the cell (body became Empty or Text).
    pub fn replace_edges(&mut self, cell: Position, new_refs: FxHashSet<Position>) {
        if let Some(old_refs) = self.refs.remove(&cell) {
            for referee in old_refs {
                if let Some(deps) = self.deps.get_mut(&referee) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.deps.remove(&referee);
                    }
                }
            }
        }

        if new_refs.is_empty() {
            return;
        }

        for referee in &new_refs {
            self.deps.entry(*referee).or_default().insert(cell);
        }
        self.refs.insert(cell, new_refs);
    }

    /// Would installing a body with reference set `new_refs` at `cell` close
    /// a cycle?
    ///
    /// Walks **dependent** edges from `cell`: every node reached transitively
    /// depends on `cell` today. If any of them (or `cell` itself) is among
    /// the prospective references, the new body would complete a loop. The
    /// check is read-only.
    pub fn would_create_cycle(&self, cell: Position, new_refs: &[Position]) -> bool {
        if new_refs.is_empty() {
            return false;
        }
        if new_refs.contains(&cell) {
            return true;
        }

        let new_refs_set: FxHashSet<Position> = new_refs.iter().copied().collect();
        let mut visited = FxHashSet::default();
        let mut stack = vec![cell];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = self.deps.get(&current) {
                for &dep in deps {
                    if new_refs_set.contains(&dep) {
                        return true;
                    }
                    stack.push(dep);
                }
            }
        }

        false
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, refs) in &self.refs {
            assert!(!refs.is_empty(), "empty ref set stored for {}", cell);
            for referee in refs {
                assert!(
                    self.deps.get(referee).is_some_and(|s| s.contains(cell)),
                    "missing dependent edge: {} should list {}",
                    referee,
                    cell
                );
            }
        }

        for (cell, deps) in &self.deps {
            assert!(!deps.is_empty(), "empty dependent set stored for {}", cell);
            for dep in deps {
                assert!(
                    self.refs.get(dep).is_some_and(|s| s.contains(cell)),
                    "missing reference edge: {} should list {}",
                    dep,
                    cell
                );
            }
        }

        // Acyclicity: DFS from every formula cell along reference edges.
        for &start in self.refs.keys() {
            let mut visited = FxHashSet::default();
            let mut stack: Vec<Position> = self.references(start).collect();
            while let Some(current) = stack.pop() {
                assert!(current != start, "cycle through {}", start);
                if visited.insert(current) {
                    stack.extend(self.references(current));
                }
            }
        }
    }
}
