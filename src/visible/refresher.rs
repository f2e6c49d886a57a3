//! The refresh controller: a single-writer state machine over the session.
//!
//! Public mutation methods are non-blocking producers into a request
//! channel. One worker task owns the session state, drains requests in
//! batches (coalescing filter/sort changes to the last one, accumulating
//! "more commits" callbacks), runs at most one recomputation at a time,
//! and publishes immutable visible packs. A computation superseded by a
//! fresher batch is cancelled cooperatively and simply restarted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::graph::SortOrder;
use crate::model::{CommitCountStage, FilterCollection, RootId};

use super::filterer::{CancelToken, Cancelled, Filterer};
use super::pack::{DataPack, VisiblePack};
use super::snapshot::build_snapshot;

/// A queued session request. Transient, consumed in batches.
enum Request {
    Refresh(Arc<DataPack>),
    Validate { valid: bool, refresh: bool },
    SetFilters(FilterCollection),
    SetSort(SortOrder),
    MoreCommits(MoreCommitsCallback),
    IndexingFinished(RootId),
}

type MoreCommitsCallback = Box<dyn FnOnce() + Send>;
type Listener = Arc<dyn Fn(&Arc<VisiblePack>) + Send + Sync>;

/// Handle returned by [`VisiblePackRefresher::add_visible_pack_change_listener`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListenerId(u64);

type ListenerRegistry = Arc<Mutex<Vec<(ListenerId, Listener)>>>;

/// Owns the session: current filters, sort order, count stage, and the
/// published visible pack.
pub struct VisiblePackRefresher {
    tx: mpsc::UnboundedSender<Request>,
    generation: Arc<AtomicU64>,
    valid: Arc<AtomicBool>,
    listeners: ListenerRegistry,
    next_listener_id: AtomicU64,
    current: Arc<Mutex<Arc<VisiblePack>>>,
    worker: Option<JoinHandle<()>>,
    notifier: Option<JoinHandle<()>>,
}

impl VisiblePackRefresher {
    pub fn new(filterer: Filterer, sort: SortOrder) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));
        let valid = Arc::new(AtomicBool::new(false));
        let listeners: ListenerRegistry = Arc::new(Mutex::new(Vec::new()));
        let current = Arc::new(Mutex::new(VisiblePack::empty()));

        // One notifier task fires callbacks and listeners in publish
        // order, off the worker, so listeners never observe packs out of
        // sequence.
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Notification>();
        let notifier = tokio::spawn(async move {
            while let Some(notification) = notify_rx.recv().await {
                for callback in notification.callbacks {
                    callback();
                }
                for listener in &notification.listeners {
                    listener(&notification.pack);
                }
            }
        });

        let worker = Worker {
            rx,
            filterer,
            generation: generation.clone(),
            valid_flag: valid.clone(),
            listeners: listeners.clone(),
            current: current.clone(),
            notify_tx,
            state: State {
                filters: FilterCollection::empty(),
                sort,
                stage: CommitCountStage::INITIAL,
                pack: VisiblePack::empty(),
                data_pack: None,
                valid: false,
                pending_more: Vec::new(),
                pending_recompute: false,
            },
        };
        let handle = tokio::spawn(worker.run());

        Self {
            tx,
            generation,
            valid,
            listeners,
            next_listener_id: AtomicU64::new(0),
            current,
            worker: Some(handle),
            notifier: Some(notifier),
        }
    }

    /// A new full commit graph snapshot is available.
    pub fn on_refresh(&self, data_pack: Arc<DataPack>) {
        self.send(Request::Refresh(data_pack));
    }

    pub fn on_filters_change(&self, filters: FilterCollection) {
        self.send(Request::SetFilters(filters));
    }

    pub fn on_sort_type_change(&self, sort: SortOrder) {
        self.send(Request::SetSort(sort));
    }

    /// Toggle session validity. `refresh` forces a recomputation even when
    /// the validity did not change.
    pub fn set_valid(&self, valid: bool, refresh: bool) {
        self.send(Request::Validate { valid, refresh });
    }

    /// Request a deeper scan. `on_loaded` fires once, after the pack next
    /// updates; callbacks accumulate and are never dropped.
    pub fn more_commits_needed(&self, on_loaded: impl FnOnce() + Send + 'static) {
        self.send(Request::MoreCommits(Box::new(on_loaded)));
    }

    pub fn on_indexing_finished(&self, root: RootId) {
        self.send(Request::IndexingFinished(root));
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// The latest published pack.
    pub fn visible_pack(&self) -> Arc<VisiblePack> {
        self.current.lock().expect("pack slot poisoned").clone()
    }

    pub fn add_visible_pack_change_listener(
        &self,
        listener: impl Fn(&Arc<VisiblePack>) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_visible_pack_change_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        listeners.retain(|(other, _)| *other != id);
    }

    /// Close the request channel and wait for the worker and the
    /// notifier to drain.
    pub async fn shutdown(mut self) {
        let worker = self.worker.take();
        let notifier = self.notifier.take();
        drop(self);
        if let Some(handle) = worker {
            let _ = handle.await;
        }
        if let Some(handle) = notifier {
            let _ = handle.await;
        }
    }

    fn send(&self, request: Request) {
        // Bumping the generation first lets an in-flight computation
        // observe that it is stale before the request is even queued.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(request).is_err() {
            warn!("refresher worker is gone, request dropped");
        }
    }
}

/// Session state. Replaced on every completed recomputation.
struct State {
    filters: FilterCollection,
    sort: SortOrder,
    stage: CommitCountStage,
    pack: Arc<VisiblePack>,
    /// The authoritative full-graph snapshot; snapshots built on
    /// invalidation never replace it.
    data_pack: Option<Arc<DataPack>>,
    valid: bool,
    pending_more: Vec<MoreCommitsCallback>,
    /// A recomputation was cancelled mid-flight; the result is still owed
    /// even if the superseding batch folds to a no-op.
    pending_recompute: bool,
}

/// One publish handed to the notifier task.
struct Notification {
    pack: Arc<VisiblePack>,
    callbacks: Vec<MoreCommitsCallback>,
    listeners: Vec<Listener>,
}

/// One drained batch of requests, coalesced.
#[derive(Default)]
struct Batch {
    filters: Option<FilterCollection>,
    sort: Option<SortOrder>,
    refresh: Option<Arc<DataPack>>,
    validate: Option<(bool, bool)>,
    more: Vec<MoreCommitsCallback>,
    indexing_finished: Vec<RootId>,
    non_validate: bool,
}

impl Batch {
    fn add(&mut self, request: Request) {
        match request {
            Request::Refresh(pack) => {
                self.refresh = Some(pack);
                self.non_validate = true;
            }
            Request::Validate { valid, refresh } => {
                self.validate = Some((valid, refresh));
            }
            Request::SetFilters(filters) => {
                self.filters = Some(filters);
                self.non_validate = true;
            }
            Request::SetSort(sort) => {
                self.sort = Some(sort);
                self.non_validate = true;
            }
            Request::MoreCommits(callback) => {
                self.more.push(callback);
                self.non_validate = true;
            }
            Request::IndexingFinished(root) => {
                self.indexing_finished.push(root);
            }
        }
    }
}

struct Worker {
    rx: mpsc::UnboundedReceiver<Request>,
    filterer: Filterer,
    generation: Arc<AtomicU64>,
    valid_flag: Arc<AtomicBool>,
    listeners: ListenerRegistry,
    current: Arc<Mutex<Arc<VisiblePack>>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    state: State,
}

impl Worker {
    async fn run(mut self) {
        while let Some(first) = self.rx.recv().await {
            let mut batch = Batch::default();
            batch.add(first);
            while let Ok(request) = self.rx.try_recv() {
                batch.add(request);
            }
            let cancel = CancelToken::new(self.generation.clone());
            self.process(batch, &cancel);
        }
        debug!("refresher worker stopped");
    }

    fn process(&mut self, batch: Batch, cancel: &CancelToken) {
        let filters_changed = batch.filters.is_some();
        let sort_changed = batch.sort.is_some();

        if let Some(filters) = batch.filters {
            self.state.filters = filters;
        }
        if let Some(sort) = batch.sort {
            self.state.sort = sort;
        }
        if let Some(pack) = batch.refresh {
            self.state.data_pack = Some(pack);
        }
        self.state.pending_more.extend(batch.more);

        let indexing_relevant = !batch.indexing_finished.is_empty()
            && self.state.filters.has_detail_filters()
            && self
                .state
                .data_pack
                .as_ref()
                .is_some_and(|dp| batch.indexing_finished.iter().any(|&r| dp.has_root(r)));

        let mut necessary =
            batch.non_validate || indexing_relevant || self.state.pending_recompute;

        if let Some((valid, _refresh)) = batch.validate
            && valid != self.state.valid
        {
            if valid {
                // Becoming valid always rebuilds the full pack from the
                // authoritative snapshot, starting the staging over.
                self.state.valid = true;
                self.state.stage = CommitCountStage::INITIAL;
                self.valid_flag.store(true, Ordering::SeqCst);
                self.recompute(cancel);
                return;
            }
            self.invalidate(filters_changed || sort_changed, cancel);
            return;
        }

        if let Some((_, refresh)) = batch.validate
            && refresh
        {
            necessary = true;
        }

        if !self.state.valid {
            // Filter/sort changes are remembered; recomputation waits for
            // the session to become valid again.
            return;
        }
        if !necessary {
            return;
        }

        if filters_changed || sort_changed {
            self.state.stage = CommitCountStage::INITIAL;
        } else if !self.state.pending_more.is_empty() {
            self.state.stage = self.state.stage.next();
        }
        self.recompute(cancel);
    }

    /// Leaving validity: one bounded recomputation if filters just
    /// changed, then shed memory by snapshotting the live pack.
    fn invalidate(&mut self, filters_changed: bool, cancel: &CancelToken) {
        if filters_changed {
            self.state.stage = CommitCountStage::INITIAL;
            self.recompute(cancel);
        }
        let snapshot = build_snapshot(&self.state.pack, self.state.sort);
        self.state.valid = false;
        self.valid_flag.store(false, Ordering::SeqCst);
        self.publish(snapshot, false);
    }

    fn recompute(&mut self, cancel: &CancelToken) {
        let Some(data_pack) = self.state.data_pack.clone() else {
            // No snapshot has loaded yet; nothing to compute against.
            return;
        };

        let filters = self.state.filters.clone();
        let result =
            self.filterer.filter(&data_pack, self.state.sort, &filters, self.state.stage, cancel);
        match result {
            Ok((pack, stage)) => {
                self.state.pending_recompute = false;
                self.state.stage = stage;
                self.publish(pack, true);
            }
            Err(e) if e.is::<Cancelled>() => {
                // A fresher batch superseded this computation. It may fold
                // to a no-op, so remember that a result is still owed and
                // re-drive on the next batch.
                debug!("recomputation cancelled");
                self.state.pending_recompute = true;
            }
            Err(e) => {
                self.state.pending_recompute = false;
                warn!(error = %e, "filtering failed");
                self.publish(VisiblePack::error(data_pack, filters, e), true);
            }
        }
    }

    /// Replace the published pack on identity change and hand the
    /// notification to the notifier task. Accumulated "more commits"
    /// callbacks are drained only for recomputation results, not for
    /// invalidation snapshots.
    fn publish(&mut self, pack: Arc<VisiblePack>, drain_callbacks: bool) {
        if Arc::ptr_eq(&pack, &self.state.pack) {
            return;
        }
        self.state.pack = pack.clone();
        *self.current.lock().expect("pack slot poisoned") = pack.clone();

        let callbacks: Vec<MoreCommitsCallback> =
            if drain_callbacks { self.state.pending_more.drain(..).collect() } else { Vec::new() };
        // Snapshot the registry so listeners may add/remove listeners
        // without deadlocking on the registry lock.
        let listeners: Vec<Listener> = {
            let registry = self.listeners.lock().expect("listener lock poisoned");
            registry.iter().map(|(_, l)| l.clone()).collect()
        };
        let _ = self.notify_tx.send(Notification { pack, callbacks, listeners });
    }
}
