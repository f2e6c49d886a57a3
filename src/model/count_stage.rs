//! Commit-count staging for bounded slow scans.

/// Monotonically increasing bound on how many matching commits a slow
/// per-root scan may return before deferring further work to a later
/// "load more" request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommitCountStage(u32);

impl CommitCountStage {
    pub const INITIAL: CommitCountStage = CommitCountStage(2_000);
    /// The saturated stage: no bound, scan everything.
    pub const ALL: CommitCountStage = CommitCountStage(u32::MAX);

    pub fn count(self) -> u32 {
        self.0
    }

    pub fn is_initial(self) -> bool {
        self == Self::INITIAL
    }

    pub fn is_all(self) -> bool {
        self == Self::ALL
    }

    /// The next, strictly larger stage (saturating at [`Self::ALL`]).
    pub fn next(self) -> CommitCountStage {
        CommitCountStage(self.0.saturating_mul(5))
    }
}

impl Default for CommitCountStage {
    fn default() -> Self {
        Self::INITIAL
    }
}
