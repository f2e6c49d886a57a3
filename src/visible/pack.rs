//! Data pack and visible pack value types.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::graph::{EmptyGraph, FullCommitGraph, GraphCommit, PermanentGraph, VisibleGraph};
use crate::model::{CommitHash, CommitId, FilterCollection, RefsModel, RootId, VcsRef};
use crate::provider::VcsProvider;
use crate::storage::CommitStorage;

/// One repository root participating in the session.
#[derive(Debug, Clone)]
pub struct RootInfo {
    pub id: RootId,
    pub path: PathBuf,
}

/// Immutable bundle of everything a filter pass reads: the full commit
/// graph, the refs model, the identity storage, and per-root providers.
/// Created once per successful bulk load and replaced wholesale.
pub struct DataPack {
    graph: Arc<dyn FullCommitGraph>,
    refs: RefsModel,
    storage: Arc<CommitStorage>,
    roots: Vec<RootInfo>,
    providers: FxHashMap<RootId, Arc<dyn VcsProvider>>,
    full_log: bool,
}

impl DataPack {
    /// The zero-commit pack used before the first load completes.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            graph: EmptyGraph::arc(),
            refs: RefsModel::default(),
            storage: Arc::new(CommitStorage::new()),
            roots: Vec::new(),
            providers: FxHashMap::default(),
            full_log: false,
        })
    }

    pub(crate) fn from_parts(
        graph: Arc<dyn FullCommitGraph>,
        refs: RefsModel,
        storage: Arc<CommitStorage>,
        roots: Vec<RootInfo>,
        providers: FxHashMap<RootId, Arc<dyn VcsProvider>>,
        full_log: bool,
    ) -> Arc<Self> {
        Arc::new(Self { graph, refs, storage, roots, providers, full_log })
    }

    pub fn graph(&self) -> &Arc<dyn FullCommitGraph> {
        &self.graph
    }

    pub fn refs(&self) -> &RefsModel {
        &self.refs
    }

    pub fn storage(&self) -> &CommitStorage {
        &self.storage
    }

    pub(crate) fn storage_shared(&self) -> Arc<CommitStorage> {
        self.storage.clone()
    }

    pub(crate) fn providers_shared(&self) -> FxHashMap<RootId, Arc<dyn VcsProvider>> {
        self.providers.clone()
    }

    pub fn roots(&self) -> &[RootInfo] {
        &self.roots
    }

    pub fn provider(&self, root: RootId) -> Option<&Arc<dyn VcsProvider>> {
        self.providers.get(&root)
    }

    /// Whether this pack holds the complete history (vs a partial load).
    pub fn is_full_log(&self) -> bool {
        self.full_log
    }

    pub fn has_root(&self, root: RootId) -> bool {
        self.roots.iter().any(|r| r.id == root)
    }

    /// Root containing the given path, if any.
    pub fn root_containing(&self, path: &Path) -> Option<RootId> {
        self.roots.iter().find(|r| path.starts_with(&r.path)).map(|r| r.id)
    }
}

/// Assembles a [`DataPack`] from per-root bulk reads.
pub struct DataPackBuilder {
    storage: CommitStorage,
    nodes: Vec<GraphCommit>,
    refs: Vec<VcsRef>,
    roots: Vec<RootInfo>,
    providers: FxHashMap<RootId, Arc<dyn VcsProvider>>,
    full_log: bool,
}

impl DataPackBuilder {
    pub fn new() -> Self {
        Self {
            storage: CommitStorage::new(),
            nodes: Vec::new(),
            refs: Vec::new(),
            roots: Vec::new(),
            providers: FxHashMap::default(),
            full_log: true,
        }
    }

    pub fn add_root(&mut self, path: impl Into<PathBuf>) -> RootId {
        let id = RootId(self.roots.len() as u32);
        self.roots.push(RootInfo { id, path: path.into() });
        id
    }

    /// Add a commit in graph order (children before parents).
    pub fn add_commit(
        &mut self,
        root: RootId,
        hash: CommitHash,
        parents: &[CommitHash],
        timestamp: i64,
    ) -> u32 {
        let commit = self.storage.intern(CommitId::new(hash, root));
        let parents = parents
            .iter()
            .map(|&p| self.storage.intern(CommitId::new(p, root)))
            .collect();
        self.nodes.push(GraphCommit { commit, parents, timestamp });
        commit
    }

    pub fn add_ref(&mut self, root: RootId, name: impl Into<String>, hash: CommitHash, is_branch: bool) {
        let commit = self.storage.intern(CommitId::new(hash, root));
        self.refs.push(VcsRef { name: name.into(), commit, root, is_branch });
    }

    pub fn set_provider(&mut self, root: RootId, provider: Arc<dyn VcsProvider>) {
        self.providers.insert(root, provider);
    }

    pub fn set_full_log(&mut self, full_log: bool) {
        self.full_log = full_log;
    }

    /// Intern a commit id without adding a graph node, for filters that
    /// reference commits by hash before the pack is built.
    pub fn intern(&mut self, root: RootId, hash: CommitHash) -> u32 {
        self.storage.intern(CommitId::new(hash, root))
    }

    pub fn build(self) -> Arc<DataPack> {
        let refs = RefsModel::new(self.refs);
        let heads = refs.branch_heads(None);
        let graph = Arc::new(PermanentGraph::new(self.nodes, &heads));
        Arc::new(DataPack {
            graph,
            refs,
            storage: Arc::new(self.storage),
            roots: self.roots,
            providers: self.providers,
            full_log: self.full_log,
        })
    }
}

impl Default for DataPackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

type UserData = FxHashMap<&'static str, Arc<dyn Any + Send + Sync>>;

/// The published result of one filter pass: the pack it was computed from,
/// the rendered visible graph, and whether a larger scan could match more.
/// Compared by identity; a new one is built on every recomputation.
pub struct VisiblePack {
    data_pack: Arc<DataPack>,
    visible_graph: Arc<dyn VisibleGraph>,
    can_request_more: bool,
    filters: FilterCollection,
    error: Option<Arc<anyhow::Error>>,
    user_data: Mutex<UserData>,
}

impl VisiblePack {
    pub fn new(
        data_pack: Arc<DataPack>,
        visible_graph: Arc<dyn VisibleGraph>,
        can_request_more: bool,
        filters: FilterCollection,
    ) -> Arc<Self> {
        Arc::new(Self {
            data_pack,
            visible_graph,
            can_request_more,
            filters,
            error: None,
            user_data: Mutex::new(UserData::default()),
        })
    }

    /// The pack used before any data has loaded.
    pub fn empty() -> Arc<Self> {
        Self::sentinel(DataPack::empty(), FilterCollection::empty())
    }

    /// A pack rendering the empty sentinel graph over an existing data
    /// pack, used when filtering provably matches nothing.
    pub fn sentinel(data_pack: Arc<DataPack>, filters: FilterCollection) -> Arc<Self> {
        Self::new(data_pack, EmptyGraph::arc(), false, filters)
    }

    /// An error-tagged pack: the UI renders "filtering failed" while the
    /// controller keeps serving requests.
    pub fn error(
        data_pack: Arc<DataPack>,
        filters: FilterCollection,
        error: anyhow::Error,
    ) -> Arc<Self> {
        Arc::new(Self {
            data_pack,
            visible_graph: EmptyGraph::arc(),
            can_request_more: false,
            filters,
            error: Some(Arc::new(error)),
            user_data: Mutex::new(UserData::default()),
        })
    }

    pub fn data_pack(&self) -> &Arc<DataPack> {
        &self.data_pack
    }

    pub fn visible_graph(&self) -> &Arc<dyn VisibleGraph> {
        &self.visible_graph
    }

    pub fn can_request_more(&self) -> bool {
        self.can_request_more
    }

    pub fn filters(&self) -> &FilterCollection {
        &self.filters
    }

    pub fn filter_error(&self) -> Option<&Arc<anyhow::Error>> {
        self.error.as_ref()
    }

    /// Caller-attached data, keyed by static strings. The side channel is
    /// open: the engine never reads it.
    pub fn put_user_data(&self, key: &'static str, value: Arc<dyn Any + Send + Sync>) {
        let mut data = self.user_data.lock().expect("user data lock poisoned");
        data.insert(key, value);
    }

    pub fn user_data(&self, key: &'static str) -> Option<Arc<dyn Any + Send + Sync>> {
        let data = self.user_data.lock().expect("user data lock poisoned");
        data.get(key).cloned()
    }
}
