//! Commit graph abstraction.
//!
//! The engine consumes the full commit DAG and its rendered projection
//! through these two traits only. `PermanentGraph` is the in-memory
//! reference implementation; `EmptyGraph` is the zero-commit sentinel used
//! before first load and whenever filtering provably matches nothing.

mod empty;
mod permanent;

pub use empty::EmptyGraph;
pub use permanent::{GraphCommit, PermanentGraph};

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashSet;

/// Order in which visible rows are produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest commit first by commit date.
    #[default]
    Date,
    /// The graph's own topological order.
    Topological,
}

/// The rendered, filtered/sorted projection of the full DAG.
pub trait VisibleGraph: Send + Sync {
    fn commit_count(&self) -> usize;

    /// Commit index shown at `row`, if the row exists.
    fn commit_at(&self, row: usize) -> Option<u32>;

    /// Row showing `commit`, if it is visible.
    fn row_of(&self, commit: u32) -> Option<usize>;

    /// Visible commits in row order.
    fn commits(&self) -> Box<dyn Iterator<Item = u32> + '_>;
}

/// The immutable DAG over all known commits for all roots.
pub trait FullCommitGraph: Send + Sync {
    fn commit_count(&self) -> usize;

    /// All commits in graph order (children before parents).
    fn all_commits(&self) -> Box<dyn Iterator<Item = u32> + '_>;

    /// Branch heads (by commit index) that can reach `commit`.
    fn containing_branches(&self, commit: u32) -> FxHashSet<u32>;

    /// Render a visible graph. A `None` restriction means "unrestricted";
    /// an empty set means "match nothing" and is the caller's job to
    /// special-case before getting here.
    fn create_visible_graph(
        &self,
        sort: SortOrder,
        heads: Option<&FxHashSet<u32>>,
        commits: Option<&FxHashSet<u32>>,
    ) -> Arc<dyn VisibleGraph>;

    /// Downcasting hook for the snapshot builder.
    fn as_any(&self) -> &dyn Any;
}
