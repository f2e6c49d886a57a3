//! Memory-bounded visible pack snapshots.
//!
//! While a session is inactive its live pack is replaced with a reduced
//! one bounded to the tail window of the existing rendering. Revalidation
//! always rebuilds from the authoritative data pack, never from the
//! trimmed one.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::graph::{FullCommitGraph, GraphCommit, PermanentGraph, SortOrder};
use crate::model::RefsModel;

use super::pack::{DataPack, VisiblePack};

/// Rows of the existing rendering kept in a snapshot.
pub const SNAPSHOT_WINDOW: usize = 1_000;

/// Compress a live visible pack into a small, memory-bounded pack.
///
/// Falls back to the empty sentinel when the source pack is already empty
/// or its full graph has a foreign representation.
pub fn build_snapshot(pack: &Arc<VisiblePack>, sort: SortOrder) -> Arc<VisiblePack> {
    let visible = pack.visible_graph();
    if visible.commit_count() == 0 {
        return VisiblePack::sentinel(pack.data_pack().clone(), pack.filters().clone());
    }

    let data_pack = pack.data_pack();
    let Some(full) = data_pack.graph().as_any().downcast_ref::<PermanentGraph>() else {
        debug!("foreign full graph representation, snapshotting as empty");
        return VisiblePack::sentinel(DataPack::empty(), pack.filters().clone());
    };

    // The window covers the most recent rows of the rendering, where the
    // branch tips live.
    let rows: Vec<u32> = visible.commits().collect();
    let end = rows.len().min(SNAPSHOT_WINDOW);
    let window: FxHashSet<u32> = rows[..end].iter().copied().collect();

    // Rebuild a minimal graph over the window; parent edges leaving the
    // window are cut.
    let nodes: Vec<GraphCommit> = full
        .nodes()
        .iter()
        .filter(|n| window.contains(&n.commit))
        .map(|n| GraphCommit {
            commit: n.commit,
            parents: n.parents.iter().copied().filter(|p| window.contains(p)).collect(),
            timestamp: n.timestamp,
        })
        .collect();

    // Refs surviving the cut, plus the window's own heads (commits no
    // other window commit points at) so reachability still covers
    // everything kept.
    let kept_refs: Vec<_> = data_pack
        .refs()
        .refs()
        .iter()
        .filter(|r| window.contains(&r.commit))
        .cloned()
        .collect();

    let mut has_child: FxHashSet<u32> = FxHashSet::default();
    for node in &nodes {
        has_child.extend(node.parents.iter().copied());
    }
    let mut heads: FxHashSet<u32> =
        nodes.iter().map(|n| n.commit).filter(|c| !has_child.contains(c)).collect();
    heads.extend(kept_refs.iter().filter(|r| r.is_branch).map(|r| r.commit));

    let reduced_graph = Arc::new(PermanentGraph::new(nodes, &heads));
    let reduced_visible = reduced_graph.create_visible_graph(sort, None, None);
    let reduced_pack = DataPack::from_parts(
        reduced_graph,
        RefsModel::new(kept_refs),
        data_pack.storage_shared(),
        data_pack.roots().to_vec(),
        data_pack.providers_shared(),
        false,
    );

    VisiblePack::new(reduced_pack, reduced_visible, false, pack.filters().clone())
}
