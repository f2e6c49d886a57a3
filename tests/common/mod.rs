// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use git2::{Repository, Signature};
use tempfile::TempDir;

use logsieve::index::{IndexedCommit, MemoryDetailIndex};
use logsieve::model::{CommitHash, CommitMetadata, FilterCollection, RootId};
use logsieve::provider::VcsProvider;
use logsieve::visible::{DataPack, DataPackBuilder};

/// Deterministic hash with `n` encoded in the leading bytes, so prefixes
/// stay distinguishable in tests.
pub fn hash(n: u32) -> CommitHash {
    let mut bytes = [0u8; 20];
    bytes[..4].copy_from_slice(&n.to_be_bytes());
    CommitHash::from_bytes(bytes)
}

/// A three-repository pack with known topology:
///
/// root 0: c0 <- c1 <- c3 (main)
///         c0 <- c2      (feature)
/// root 1: d0 <- d1      (main)
/// root 2: e0            (trunk)
pub struct ThreeRoots {
    pub pack: Arc<DataPack>,
    pub r0: RootId,
    pub r1: RootId,
    pub r2: RootId,
    pub c0: u32,
    pub c1: u32,
    pub c2: u32,
    pub c3: u32,
    pub d0: u32,
    pub d1: u32,
    pub e0: u32,
}

impl ThreeRoots {
    pub fn commit_hash(&self, commit: u32) -> CommitHash {
        self.pack.storage().commit_id(commit).hash
    }
}

pub fn three_roots() -> ThreeRoots {
    three_roots_with(|_| {})
}

/// Build the three-root fixture, letting the caller attach providers or
/// otherwise tweak the builder before the pack is sealed.
pub fn three_roots_with(configure: impl FnOnce(&mut DataPackBuilder)) -> ThreeRoots {
    let mut builder = DataPackBuilder::new();
    let r0 = builder.add_root("/repos/alpha");
    let r1 = builder.add_root("/repos/beta");
    let r2 = builder.add_root("/repos/gamma");

    let c3 = builder.add_commit(r0, hash(3), &[hash(1)], 40);
    let c2 = builder.add_commit(r0, hash(2), &[hash(0)], 30);
    let c1 = builder.add_commit(r0, hash(1), &[hash(0)], 20);
    let c0 = builder.add_commit(r0, hash(0), &[], 10);
    let d1 = builder.add_commit(r1, hash(11), &[hash(10)], 25);
    let d0 = builder.add_commit(r1, hash(10), &[], 15);
    let e0 = builder.add_commit(r2, hash(20), &[], 5);

    builder.add_ref(r0, "main", hash(3), true);
    builder.add_ref(r0, "feature", hash(2), true);
    builder.add_ref(r1, "main", hash(11), true);
    builder.add_ref(r2, "trunk", hash(20), true);

    configure(&mut builder);
    let pack = builder.build();

    ThreeRoots { pack, r0, r1, r2, c0, c1, c2, c3, d0, d1, e0 }
}

/// Per-commit metadata used by the fixture's detail index and cache.
pub fn fixture_metadata(fx: &ThreeRoots) -> Vec<(u32, RootId, &'static str, i64, &'static str)> {
    vec![
        (fx.c0, fx.r0, "bob", 10, "initial import"),
        (fx.c1, fx.r0, "alice", 20, "fix parser bug"),
        (fx.c2, fx.r0, "bob", 30, "start feature work"),
        (fx.c3, fx.r0, "bob", 40, "merge parser fix"),
        (fx.d0, fx.r1, "carol", 15, "initial import"),
        (fx.d1, fx.r1, "alice", 25, "fix docs typo"),
        (fx.e0, fx.r2, "dave", 5, "trunk seed"),
    ]
}

/// A detail index covering all three fixture roots.
pub fn indexed(fx: &ThreeRoots) -> Arc<MemoryDetailIndex> {
    let index = Arc::new(MemoryDetailIndex::new());
    for (commit, root, author, timestamp, message) in fixture_metadata(fx) {
        index.add_commit(
            commit,
            IndexedCommit {
                root,
                author: author.to_string(),
                timestamp,
                message: message.to_string(),
            },
        );
    }
    index.mark_indexed(fx.r0);
    index.mark_indexed(fx.r1);
    index.mark_indexed(fx.r2);
    index
}

pub fn metadata_for(fx: &ThreeRoots, commit: u32) -> CommitMetadata {
    let (_, _, author, timestamp, message) = fixture_metadata(fx)
        .into_iter()
        .find(|&(c, ..)| c == commit)
        .unwrap();
    CommitMetadata {
        id: fx.pack.storage().commit_id(commit),
        author: author.to_string(),
        timestamp,
        message: message.to_string(),
    }
}

/// Provider stub backed by a canned match list. Records the scan bound of
/// every call.
pub struct StubProvider {
    matches: Vec<(CommitHash, i64)>,
    fail: bool,
    calls: AtomicUsize,
    bounds: std::sync::Mutex<Vec<u32>>,
}

impl StubProvider {
    pub fn with_matches(matches: Vec<(CommitHash, i64)>) -> Arc<Self> {
        Arc::new(Self {
            matches,
            fail: false,
            calls: AtomicUsize::new(0),
            bounds: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            matches: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            bounds: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `max_count` of each scan, in call order.
    pub fn bound_history(&self) -> Vec<u32> {
        self.bounds.lock().unwrap().clone()
    }
}

impl VcsProvider for StubProvider {
    fn commits_matching(
        &self,
        _filters: &FilterCollection,
        max_count: u32,
    ) -> anyhow::Result<Vec<(CommitHash, i64)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bounds.lock().unwrap().push(max_count);
        if self.fail {
            anyhow::bail!("stub provider failure");
        }
        Ok(self.matches.iter().take(max_count as usize).cloned().collect())
    }
}

/// Gate shared by [`GatedProvider`]s: signals when a scan enters and
/// parks it until the test sends a release.
pub struct ScanGate {
    entered: tokio::sync::mpsc::UnboundedSender<()>,
    release: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
}

pub fn scan_gate() -> (
    Arc<ScanGate>,
    tokio::sync::mpsc::UnboundedReceiver<()>,
    std::sync::mpsc::Sender<()>,
) {
    let (entered_tx, entered_rx) = tokio::sync::mpsc::unbounded_channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel();
    let gate = Arc::new(ScanGate {
        entered: entered_tx,
        release: std::sync::Mutex::new(release_rx),
    });
    (gate, entered_rx, release_tx)
}

/// Provider that blocks inside the scan until released through its gate.
/// Needs a multi-threaded runtime: the scan parks a worker thread.
pub struct GatedProvider {
    matches: Vec<(CommitHash, i64)>,
    gate: Arc<ScanGate>,
}

impl GatedProvider {
    pub fn new(matches: Vec<(CommitHash, i64)>, gate: Arc<ScanGate>) -> Arc<Self> {
        Arc::new(Self { matches, gate })
    }
}

impl VcsProvider for GatedProvider {
    fn commits_matching(
        &self,
        _filters: &FilterCollection,
        max_count: u32,
    ) -> anyhow::Result<Vec<(CommitHash, i64)>> {
        let _ = self.gate.entered.send(());
        self.gate.release.lock().unwrap().recv().expect("scan gate closed");
        Ok(self.matches.iter().take(max_count as usize).cloned().collect())
    }
}

/// Create a temporary git repository with user config set up.
pub fn create_test_repo() -> (TempDir, std::path::PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Write a file and commit it on HEAD.
pub fn add_commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let sig = Signature::now("Test User", "test@example.com").unwrap();

    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();
        index.add_path(std::path::Path::new(path)).unwrap();
    }
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    match parent {
        Some(parent) => {
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent]).unwrap()
        }
        None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap(),
    }
}
