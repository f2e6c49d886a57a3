//! Zero-commit sentinel graph.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::{FullCommitGraph, SortOrder, VisibleGraph};

/// A stateless zero-commit graph implementing both the full and the visible
/// graph interfaces. Used before first load, whenever filtering provably
/// matches nothing, and as the safe fallback for a foreign graph
/// representation in the snapshot builder.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyGraph;

impl EmptyGraph {
    /// Cheap shared instance; the type is zero-sized, so reuse is purely
    /// cosmetic and nothing depends on reference equality.
    pub fn arc() -> Arc<EmptyGraph> {
        Arc::new(EmptyGraph)
    }
}

impl VisibleGraph for EmptyGraph {
    fn commit_count(&self) -> usize {
        0
    }

    fn commit_at(&self, _row: usize) -> Option<u32> {
        None
    }

    fn row_of(&self, _commit: u32) -> Option<usize> {
        None
    }

    fn commits(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(std::iter::empty())
    }
}

impl FullCommitGraph for EmptyGraph {
    fn commit_count(&self) -> usize {
        0
    }

    fn all_commits(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(std::iter::empty())
    }

    fn containing_branches(&self, _commit: u32) -> FxHashSet<u32> {
        FxHashSet::default()
    }

    fn create_visible_graph(
        &self,
        _sort: SortOrder,
        _heads: Option<&FxHashSet<u32>>,
        _commits: Option<&FxHashSet<u32>>,
    ) -> Arc<dyn VisibleGraph> {
        EmptyGraph::arc()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_row_lookup_succeeds() {
        let g = EmptyGraph;
        assert_eq!(VisibleGraph::commit_count(&g), 0);
        assert_eq!(g.commit_at(0), None);
        assert_eq!(g.row_of(0), None);
        assert_eq!(g.commits().count(), 0);
    }

    #[test]
    fn test_visible_projection_is_empty() {
        let g = EmptyGraph;
        let visible = g.create_visible_graph(SortOrder::Date, None, None);
        assert_eq!(visible.commit_count(), 0);
    }
}
