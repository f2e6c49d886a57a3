//! In-memory full commit graph.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{FullCommitGraph, SortOrder, VisibleGraph};

/// One node of the permanent graph, by interned commit index.
#[derive(Debug, Clone)]
pub struct GraphCommit {
    pub commit: u32,
    pub parents: Vec<u32>,
    pub timestamp: i64,
}

/// Immutable in-memory DAG. Nodes are stored in graph order (children
/// before parents, newest first), the order a revwalk produces them in.
pub struct PermanentGraph {
    nodes: Vec<GraphCommit>,
    position: FxHashMap<u32, usize>,
    /// Branch heads paired with their full reachable sets, precomputed so
    /// containment queries are set lookups.
    head_reachability: Vec<(u32, FxHashSet<u32>)>,
}

impl PermanentGraph {
    pub fn new(nodes: Vec<GraphCommit>, branch_heads: &FxHashSet<u32>) -> Self {
        let position: FxHashMap<u32, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.commit, i)).collect();
        let mut graph = Self { nodes, position, head_reachability: Vec::new() };
        graph.head_reachability = branch_heads
            .iter()
            .map(|&head| (head, graph.reachable_from([head].into_iter())))
            .collect();
        graph
    }

    pub fn nodes(&self) -> &[GraphCommit] {
        &self.nodes
    }

    pub fn contains(&self, commit: u32) -> bool {
        self.position.contains_key(&commit)
    }

    pub fn node(&self, commit: u32) -> Option<&GraphCommit> {
        self.position.get(&commit).map(|&i| &self.nodes[i])
    }

    /// Every commit reachable from `starts` through parent edges.
    /// Unknown starting points are skipped.
    pub fn reachable_from(&self, starts: impl Iterator<Item = u32>) -> FxHashSet<u32> {
        let mut visited = FxHashSet::default();
        let mut stack: Vec<u32> = starts.filter(|c| self.contains(*c)).collect();
        while let Some(commit) = stack.pop() {
            if !visited.insert(commit) {
                continue;
            }
            if let Some(node) = self.node(commit) {
                for &parent in &node.parents {
                    if !visited.contains(&parent) {
                        stack.push(parent);
                    }
                }
            }
        }
        visited
    }
}

impl FullCommitGraph for PermanentGraph {
    fn commit_count(&self) -> usize {
        self.nodes.len()
    }

    fn all_commits(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(self.nodes.iter().map(|n| n.commit))
    }

    fn containing_branches(&self, commit: u32) -> FxHashSet<u32> {
        self.head_reachability
            .iter()
            .filter(|(_, reachable)| reachable.contains(&commit))
            .map(|(head, _)| *head)
            .collect()
    }

    fn create_visible_graph(
        &self,
        sort: SortOrder,
        heads: Option<&FxHashSet<u32>>,
        commits: Option<&FxHashSet<u32>>,
    ) -> Arc<dyn VisibleGraph> {
        let reachable = heads.map(|h| self.reachable_from(h.iter().copied()));

        let mut rows: Vec<&GraphCommit> = self
            .nodes
            .iter()
            .filter(|n| reachable.as_ref().is_none_or(|r| r.contains(&n.commit)))
            .filter(|n| commits.is_none_or(|c| c.contains(&n.commit)))
            .collect();

        match sort {
            SortOrder::Date => rows.sort_by_key(|n| std::cmp::Reverse(n.timestamp)),
            SortOrder::Topological => {}
        }

        let rows: Vec<u32> = rows.into_iter().map(|n| n.commit).collect();
        Arc::new(VisibleRows::new(rows))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Rendered row list over a permanent graph.
pub struct VisibleRows {
    rows: Vec<u32>,
    row_index: FxHashMap<u32, usize>,
}

impl VisibleRows {
    fn new(rows: Vec<u32>) -> Self {
        let row_index = rows.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { rows, row_index }
    }
}

impl VisibleGraph for VisibleRows {
    fn commit_count(&self) -> usize {
        self.rows.len()
    }

    fn commit_at(&self, row: usize) -> Option<u32> {
        self.rows.get(row).copied()
    }

    fn row_of(&self, commit: u32) -> Option<usize> {
        self.row_index.get(&commit).copied()
    }

    fn commits(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(self.rows.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 <- 1 <- 2 (main), 0 <- 3 (dev); newest first.
    fn diamond() -> PermanentGraph {
        let nodes = vec![
            GraphCommit { commit: 2, parents: vec![1], timestamp: 40 },
            GraphCommit { commit: 3, parents: vec![0], timestamp: 30 },
            GraphCommit { commit: 1, parents: vec![0], timestamp: 20 },
            GraphCommit { commit: 0, parents: vec![], timestamp: 10 },
        ];
        PermanentGraph::new(nodes, &[2, 3].into_iter().collect())
    }

    #[test]
    fn test_reachability() {
        let g = diamond();
        assert_eq!(g.reachable_from([2].into_iter()), [2, 1, 0].into_iter().collect());
        assert_eq!(g.reachable_from([3].into_iter()), [3, 0].into_iter().collect());
    }

    #[test]
    fn test_containing_branches() {
        let g = diamond();
        assert_eq!(g.containing_branches(0), [2, 3].into_iter().collect());
        assert_eq!(g.containing_branches(1), [2].into_iter().collect());
        assert!(g.containing_branches(99).is_empty());
    }

    #[test]
    fn test_unrestricted_visible_graph() {
        let g = diamond();
        let visible = g.create_visible_graph(SortOrder::Date, None, None);
        assert_eq!(visible.commit_count(), 4);
        assert_eq!(visible.commit_at(0), Some(2));
    }

    #[test]
    fn test_head_restriction() {
        let g = diamond();
        let heads = [3].into_iter().collect();
        let visible = g.create_visible_graph(SortOrder::Date, Some(&heads), None);
        assert_eq!(visible.commits().collect::<Vec<_>>(), vec![3, 0]);
    }

    #[test]
    fn test_commit_set_restriction() {
        let g = diamond();
        let commits = [1, 3].into_iter().collect();
        let visible = g.create_visible_graph(SortOrder::Date, None, Some(&commits));
        assert_eq!(visible.commits().collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(visible.row_of(3), Some(0));
        assert_eq!(visible.row_of(0), None);
    }

    #[test]
    fn test_empty_head_set_matches_nothing() {
        let g = diamond();
        let heads = FxHashSet::default();
        let visible = g.create_visible_graph(SortOrder::Date, Some(&heads), None);
        assert_eq!(visible.commit_count(), 0);
    }

    #[test]
    fn test_both_restrictions_intersect() {
        let g = diamond();
        let heads: FxHashSet<u32> = [2].into_iter().collect();
        let commits: FxHashSet<u32> = [0, 3].into_iter().collect();
        let visible = g.create_visible_graph(SortOrder::Date, Some(&heads), Some(&commits));
        // 3 is not reachable from head 2.
        assert_eq!(visible.commits().collect::<Vec<_>>(), vec![0]);
    }
}
