//! Git history access through git2.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, Sort};

use crate::index::IndexRecord;
use crate::model::{CommitHash, CommitId, CommitMetadata, FilterCollection, RootId};

use super::VcsProvider;

/// Bounded filtered history scans over one git repository.
pub struct GitProvider {
    root: RootId,
    repo_path: PathBuf,
}

impl GitProvider {
    pub fn new(root: RootId, repo_path: impl Into<PathBuf>) -> Self {
        Self { root, repo_path: repo_path.into() }
    }
}

impl VcsProvider for GitProvider {
    fn commits_matching(
        &self,
        filters: &FilterCollection,
        max_count: u32,
    ) -> Result<Vec<(CommitHash, i64)>> {
        let repo = Repository::open(&self.repo_path).context("Failed to open git repository")?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push_glob("refs/heads/*")?;
        if revwalk.push_head().is_err() {
            // Unborn HEAD is fine as long as some branch was pushed.
        }
        // Topological first: TIME alone breaks children-before-parents
        // order when timestamps tie.
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut matches = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = match repo.find_commit(oid) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let meta = CommitMetadata {
                id: CommitId::new(CommitHash::from_bytes(raw_oid(oid)), self.root),
                author: commit.author().name().unwrap_or("unknown").to_string(),
                timestamp: commit.time().seconds(),
                message: commit.message().unwrap_or("").to_string(),
            };

            if filters.matches_details(&meta) {
                matches.push((meta.id.hash, meta.timestamp));
                if matches.len() as u32 >= max_count {
                    break;
                }
            }
        }

        Ok(matches)
    }
}

/// A commit read from the repository: hash, parent hashes, commit time.
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub hash: CommitHash,
    pub parents: Vec<CommitHash>,
    pub timestamp: i64,
}

/// A ref read from the repository.
#[derive(Debug, Clone)]
pub struct RawRef {
    pub name: String,
    pub hash: CommitHash,
    pub is_branch: bool,
}

/// Full bulk read of one repository: topology, refs, and metadata rows.
#[derive(Debug)]
pub struct RepoData {
    pub head_hex: String,
    pub commits: Vec<RawCommit>,
    pub refs: Vec<RawRef>,
    pub metadata: Vec<IndexRecord>,
}

/// Read the whole commit graph of a git repository, newest first, from all
/// local branches.
pub fn read_repository(repo_path: &Path) -> Result<RepoData> {
    let repo = Repository::open(repo_path).context("Failed to open git repository")?;

    let head = repo.head()?.peel_to_commit()?;
    let head_hex = head.id().to_string();

    let mut refs = Vec::new();
    for branch in repo.branches(Some(git2::BranchType::Local))? {
        let (branch, _) = branch?;
        let name = branch.name()?.unwrap_or("").to_string();
        if let Some(target) = branch.get().target() {
            refs.push(RawRef { name, hash: CommitHash::from_bytes(raw_oid(target)), is_branch: true });
        }
    }
    for tag_ref in repo.references_glob("refs/tags/*")? {
        let tag_ref = tag_ref?;
        let name = tag_ref.shorthand().unwrap_or("").to_string();
        if let Ok(commit) = tag_ref.peel_to_commit() {
            refs.push(RawRef {
                name,
                hash: CommitHash::from_bytes(raw_oid(commit.id())),
                is_branch: false,
            });
        }
    }

    let mut revwalk = repo.revwalk()?;
    revwalk.push_glob("refs/heads/*")?;
    revwalk.push(head.id())?;
    // Children before parents even when commit times tie, which is what
    // the graph builder requires.
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

    let mut commits = Vec::new();
    let mut metadata = Vec::new();
    for oid in revwalk {
        let oid = oid?;
        let commit = match repo.find_commit(oid) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let parents = commit.parent_ids().map(|p| CommitHash::from_bytes(raw_oid(p))).collect();
        commits.push(RawCommit {
            hash: CommitHash::from_bytes(raw_oid(oid)),
            parents,
            timestamp: commit.time().seconds(),
        });
        metadata.push(IndexRecord {
            oid: raw_oid(oid),
            author: commit.author().name().unwrap_or("unknown").to_string(),
            timestamp: commit.time().seconds(),
            message: commit.message().unwrap_or("").to_string(),
        });
    }

    Ok(RepoData { head_hex, commits, refs, metadata })
}

fn raw_oid(oid: git2::Oid) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(oid.as_bytes());
    bytes
}
