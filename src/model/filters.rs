//! Typed log filters.
//!
//! Filters are partitioned into *head filters* (branch, revision, root,
//! structure) which resolve to a set of head commits without reading commit
//! bodies, and *detail filters* (text, user, date) which need commit
//! metadata. The hash filter is a distinct fast-path filter.

use std::path::PathBuf;

use time::OffsetDateTime;

use super::commit::{CommitId, CommitMetadata, RootId};

/// Matches branch heads by exact ref name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFilter {
    pub names: Vec<String>,
}

/// Matches explicitly named revisions, already resolved to commit ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFilter {
    pub revisions: Vec<CommitId>,
}

/// Restricts the log to a subset of repository roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFilter {
    pub roots: Vec<RootId>,
}

/// Restricts the log to roots containing any of the given paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureFilter {
    pub paths: Vec<PathBuf>,
}

/// Commit message substring match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub text: String,
    pub match_case: bool,
}

impl TextFilter {
    pub fn matches(&self, message: &str) -> bool {
        if self.match_case {
            message.contains(&self.text)
        } else {
            message.to_lowercase().contains(&self.text.to_lowercase())
        }
    }
}

/// Author name match, case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub names: Vec<String>,
}

impl UserFilter {
    pub fn matches(&self, author: &str) -> bool {
        let author = author.to_lowercase();
        self.names.iter().any(|n| author.contains(&n.to_lowercase()))
    }
}

/// Inclusive commit-date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFilter {
    pub after: Option<OffsetDateTime>,
    pub before: Option<OffsetDateTime>,
}

impl DateFilter {
    pub fn matches(&self, timestamp: i64) -> bool {
        if let Some(after) = self.after
            && timestamp < after.unix_timestamp()
        {
            return false;
        }
        if let Some(before) = self.before
            && timestamp > before.unix_timestamp()
        {
            return false;
        }
        true
    }
}

/// Full or partial hash tokens. Hashes are shown regardless of other filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFilter {
    pub hashes: Vec<String>,
}

/// An immutable set of typed filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCollection {
    pub branch: Option<BranchFilter>,
    pub revision: Option<RevisionFilter>,
    pub root: Option<RootFilter>,
    pub structure: Option<StructureFilter>,
    pub text: Option<TextFilter>,
    pub user: Option<UserFilter>,
    pub date: Option<DateFilter>,
    pub hash: Option<HashFilter>,
}

impl FilterCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, names: Vec<String>) -> Self {
        self.branch = Some(BranchFilter { names });
        self
    }

    pub fn with_revisions(mut self, revisions: Vec<CommitId>) -> Self {
        self.revision = Some(RevisionFilter { revisions });
        self
    }

    pub fn with_roots(mut self, roots: Vec<RootId>) -> Self {
        self.root = Some(RootFilter { roots });
        self
    }

    pub fn with_structure(mut self, paths: Vec<PathBuf>) -> Self {
        self.structure = Some(StructureFilter { paths });
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(TextFilter { text: text.into(), match_case: false });
        self
    }

    pub fn with_users(mut self, names: Vec<String>) -> Self {
        self.user = Some(UserFilter { names });
        self
    }

    pub fn with_date(mut self, after: Option<OffsetDateTime>, before: Option<OffsetDateTime>) -> Self {
        self.date = Some(DateFilter { after, before });
        self
    }

    pub fn with_hashes(mut self, hashes: Vec<String>) -> Self {
        self.hash = Some(HashFilter { hashes });
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.has_head_filters() && !self.has_detail_filters() && self.hash_tokens().is_empty()
    }

    /// Any filter resolvable to heads without reading commit bodies.
    /// A revision filter alone restricts heads, same as a branch filter.
    pub fn has_head_filters(&self) -> bool {
        self.branch.is_some()
            || self.revision.is_some()
            || self.root.is_some()
            || self.structure.is_some()
    }

    pub fn has_detail_filters(&self) -> bool {
        self.text.is_some() || self.user.is_some() || self.date.is_some()
    }

    pub fn hash_tokens(&self) -> &[String] {
        self.hash.as_ref().map(|h| h.hashes.as_slice()).unwrap_or(&[])
    }

    /// Evaluate the detail filters against one commit's metadata.
    pub fn matches_details(&self, meta: &CommitMetadata) -> bool {
        if let Some(text) = &self.text
            && !text.matches(&meta.message)
        {
            return false;
        }
        if let Some(user) = &self.user
            && !user.matches(&meta.author)
        {
            return false;
        }
        if let Some(date) = &self.date
            && !date.matches(meta.timestamp)
        {
            return false;
        }
        true
    }

    /// A collection carrying only this one's text filter. Used by the hash
    /// fast path, where an accompanying text filter is still honored.
    pub fn text_only(&self) -> Self {
        Self { text: self.text.clone(), ..Self::default() }
    }
}
