// ── Sync orchestrator ──
//
// Owns the published `SyncState` and runs at most one sync cycle at a time.
//
// All triggers (start, retry, reconnection) flow through a single worker
// task. The worker cancels and joins the running cycle before starting the
// next one, so two cycles never publish concurrently. Every transition is a
// whole-value replacement on a `watch` channel and is mirrored, in the same
// critical section, onto a `broadcast` channel for consumers that need the
// full ordered sequence.

use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use vigia_api::OperationalDataset;

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityChange, ConnectivityMonitor, TcpProbe};
use crate::error::CoreError;
use crate::retry::{RetryBudget, RetryDecision, RetryPolicy};
use crate::snapshot::LocalSnapshotStore;
use crate::source::{ClassifiedFailure, FetchOutcome, HttpDataSource, RemoteDataSource};
use crate::state::{ErrorKind, Phase, SyncState, status};
use crate::stream::StateStream;

const TRANSITION_CHANNEL_SIZE: usize = 256;

/// Heartbeat progress starts here and approaches `FETCH_PROGRESS_CEILING`.
const FETCH_PROGRESS_FLOOR: f32 = 0.3;
const FETCH_PROGRESS_CEILING: f32 = 0.7;
const FETCH_PROGRESS_STEP: f32 = 0.2;

// ── Construction inputs ──────────────────────────────────────────────

/// The collaborators a cycle talks to.
#[derive(Clone)]
pub struct SyncDeps {
    pub source: Arc<dyn RemoteDataSource>,
    pub store: LocalSnapshotStore,
    pub connectivity: ConnectivityMonitor,
}

/// Tunables for a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub policy: RetryPolicy,
    /// Deadline for one fetch.
    pub request_timeout: Duration,
    /// Progress tick while a fetch is in flight.
    pub heartbeat_interval: Duration,
    /// Backoff jitter seed. `None` seeds from OS entropy.
    pub jitter_seed: Option<u64>,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            request_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_millis(250),
            jitter_seed: None,
        }
    }
}

impl CycleSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config.retry.clone()),
            request_timeout: config.feed.request_timeout,
            heartbeat_interval: config.heartbeat_interval,
            jitter_seed: config.jitter_seed,
        }
    }
}

// ── Shared state ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum Trigger {
    Start,
    Retry,
    Reconnected,
}

struct Shared {
    state: watch::Sender<SyncState>,
    transitions: broadcast::Sender<SyncState>,
    source: Arc<dyn RemoteDataSource>,
    store: LocalSnapshotStore,
    connectivity: ConnectivityMonitor,
    policy: RetryPolicy,
    rng: std::sync::Mutex<StdRng>,
    request_timeout: Duration,
    heartbeat_interval: Duration,
}

impl Shared {
    /// Publish the opening state of a new cycle. Only the worker calls this.
    fn publish_cycle_start(&self, next: SyncState) {
        self.state.send_modify(|current| {
            *current = next.clone();
            let _ = self.transitions.send(next);
        });
    }

    /// Publish a transition produced by cycle `next.cycle`.
    ///
    /// Dropped if that cycle has been cancelled or superseded, so a cycle
    /// that lost a race with `retry()` can never overwrite its successor.
    fn publish(&self, next: &SyncState, cancel: &CancellationToken) -> bool {
        self.state.send_if_modified(|current| {
            if cancel.is_cancelled() || current.cycle != next.cycle {
                return false;
            }
            *current = next.clone();
            let _ = self.transitions.send(next.clone());
            true
        })
    }

    fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.policy.decide(attempt, kind, &mut *rng)
    }
}

struct OrchestratorInner {
    shared: Arc<Shared>,
    triggers: mpsc::UnboundedSender<Trigger>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for OrchestratorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── SyncOrchestrator ─────────────────────────────────────────────────

/// Runs sync cycles and publishes [`SyncState`].
///
/// Cheaply cloneable via `Arc<Inner>`. The worker stops when the last clone
/// is dropped or [`shutdown()`](Self::shutdown) is called.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl SyncOrchestrator {
    /// Create an orchestrator and spawn its worker. Publishes `Idle` until
    /// the first trigger. Must be called inside a Tokio runtime.
    pub fn new(deps: SyncDeps, settings: CycleSettings) -> Self {
        let (state, _) = watch::channel(SyncState::idle());
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_SIZE);
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let rng = match settings.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let shared = Arc::new(Shared {
            state,
            transitions,
            source: deps.source,
            store: deps.store,
            connectivity: deps.connectivity,
            policy: settings.policy,
            rng: std::sync::Mutex::new(rng),
            request_timeout: settings.request_timeout,
            heartbeat_interval: settings.heartbeat_interval,
        });

        let changes = shared.connectivity.subscribe();
        let worker = tokio::spawn(worker_task(
            Arc::clone(&shared),
            trigger_rx,
            changes,
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(OrchestratorInner {
                shared,
                triggers: trigger_tx,
                cancel,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Build the production wiring: HTTP source, file-backed snapshot,
    /// and a TCP reachability probe when one is configured.
    pub fn from_config(config: &SyncConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let source = Arc::new(HttpDataSource::new(&config.feed)?);
        let store = LocalSnapshotStore::file(&config.cache_dir);
        let connectivity = ConnectivityMonitor::new(true, config.connectivity.debounce);

        if let Some(target) = config.connectivity.probe_target {
            let probe = TcpProbe::new(target, config.connectivity.probe_timeout);
            connectivity.spawn_probe(Arc::new(probe), config.connectivity.probe_interval);
        }

        Ok(Self::new(
            SyncDeps {
                source,
                store,
                connectivity,
            },
            CycleSettings::from_config(config),
        ))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a cycle unless one is already running.
    pub fn start(&self) -> Result<(), CoreError> {
        self.send(Trigger::Start)
    }

    /// Cancel any running cycle and begin a fresh one.
    pub fn retry(&self) -> Result<(), CoreError> {
        self.send(Trigger::Retry)
    }

    fn send(&self, trigger: Trigger) -> Result<(), CoreError> {
        self.inner
            .triggers
            .send(trigger)
            .map_err(|_| CoreError::ShutDown)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn current_state(&self) -> SyncState {
        self.inner.shared.state.borrow().clone()
    }

    /// Latest-value subscription. May skip intermediate states.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.shared.state.subscribe()
    }

    pub fn state_stream(&self) -> StateStream {
        StateStream::new(self.subscribe())
    }

    /// Every transition, in publication order, from now on.
    pub fn transitions(&self) -> broadcast::Receiver<SyncState> {
        self.inner.shared.transitions.subscribe()
    }

    /// Resolve with the next terminal state: the one ending the cycle in
    /// flight, or, if the last cycle already ended, the one ending the cycle
    /// after it. Fails with [`CoreError::ShutDown`] once the orchestrator
    /// stops.
    pub async fn wait_terminal(&self) -> Result<SyncState, CoreError> {
        let mut rx = self.subscribe();
        let floor = {
            let now = rx.borrow_and_update();
            if now.is_terminal() {
                now.cycle + 1
            } else {
                now.cycle
            }
        };

        tokio::select! {
            biased;
            state = rx.wait_for(|s| s.is_terminal() && s.cycle >= floor) => {
                Ok(state.map_err(|_| CoreError::ShutDown)?.clone())
            }
            () = self.inner.cancel.cancelled() => Err(CoreError::ShutDown),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.shared.connectivity
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Cancel the running cycle and stop the worker.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let worker = self.inner.worker.lock().await.take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!(error = %e, "sync worker panicked");
            }
        }
        debug!("sync orchestrator shut down");
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct ActiveCycle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveCycle {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!(error = %e, "sync cycle panicked");
            }
        }
    }
}

/// Next reconnection edge. Offline edges are not triggers.
async fn next_reconnect(
    changes: &mut Option<broadcast::Receiver<ConnectivityChange>>,
    connectivity: &ConnectivityMonitor,
) -> bool {
    loop {
        let Some(rx) = changes.as_mut() else {
            return std::future::pending().await;
        };
        match rx.recv().await {
            Ok(change) if change.online => return true,
            Ok(_) => {}
            // Missed edges; fall back to the current reading.
            Err(RecvError::Lagged(_)) => {
                if connectivity.is_settled_online() {
                    return true;
                }
            }
            Err(RecvError::Closed) => *changes = None,
        }
    }
}

async fn worker_task(
    shared: Arc<Shared>,
    mut triggers: mpsc::UnboundedReceiver<Trigger>,
    changes: broadcast::Receiver<ConnectivityChange>,
    cancel: CancellationToken,
) {
    let mut changes = Some(changes);
    let mut published = shared.state.subscribe();
    let mut active: Option<ActiveCycle> = None;
    let mut cycle_id = shared.state.borrow().cycle;
    // A reconnection seen mid-cycle, replayed once that cycle ends.
    let mut reconnect_pending = false;

    loop {
        let trigger = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            trigger = triggers.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
            _ = next_reconnect(&mut changes, &shared.connectivity) => Trigger::Reconnected,
            changed = published.changed(), if reconnect_pending => {
                if changed.is_err() {
                    break;
                }
                if !published.borrow_and_update().is_terminal() {
                    continue;
                }
                reconnect_pending = false;
                Trigger::Reconnected
            }
        };

        // The cycle is over once it has published its terminal state, even
        // if its task has not returned yet.
        let running = active.as_ref().is_some_and(ActiveCycle::is_running)
            && !shared.state.borrow().is_terminal();
        match trigger {
            Trigger::Start if running => {
                debug!("start ignored; cycle already running");
                continue;
            }
            Trigger::Reconnected if running => {
                debug!("reconnected while a cycle is running; deferred");
                reconnect_pending = true;
                continue;
            }
            Trigger::Reconnected => {
                let state = shared.state.borrow();
                if !(state.is_terminal() && state.error_kind == Some(ErrorKind::NoConnectivity)) {
                    continue;
                }
            }
            Trigger::Start | Trigger::Retry => {}
        }

        if let Some(previous) = active.take() {
            previous.stop().await;
        }

        reconnect_pending = false;
        cycle_id += 1;
        let opening = {
            let prev = shared.state.borrow();
            SyncState {
                phase: Phase::Loading,
                payload: prev.payload.clone(),
                error_kind: None,
                attempt: 0,
                progress: 0.0,
                status_message: status::CHECKING_CONNECTIVITY.into(),
                cycle: cycle_id,
                data_as_of: prev.data_as_of,
            }
        };
        shared.publish_cycle_start(opening.clone());
        info!(cycle = cycle_id, %trigger, "sync cycle started");

        let cycle = Cycle {
            shared: Arc::clone(&shared),
            cancel: cancel.child_token(),
            current: opening,
        };
        let cycle_cancel = cycle.cancel.clone();
        let span = info_span!("cycle", id = cycle_id, %trigger);
        let handle = tokio::spawn(cycle.run().instrument(span));
        active = Some(ActiveCycle {
            cancel: cycle_cancel,
            handle,
        });
    }

    if let Some(previous) = active.take() {
        previous.stop().await;
    }
    debug!("sync worker stopped");
}

// ── Cycle ────────────────────────────────────────────────────────────

struct Cancelled;

type Step<T> = Result<T, Cancelled>;

struct Cycle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    /// Last state this cycle produced.
    current: SyncState,
}

impl Cycle {
    async fn run(mut self) {
        if self.drive().await.is_err() {
            debug!("cycle cancelled");
        }
    }

    async fn drive(&mut self) -> Step<()> {
        let mut budget = RetryBudget::default();
        self.emit(|s| {
            s.progress = 0.1;
        });

        loop {
            if !self.shared.connectivity.is_settled_online() {
                info!("offline; skipping fetch");
                return self.fall_back(ErrorKind::NoConnectivity).await;
            }

            if self.current.attempt == 0 {
                self.emit(|s| {
                    s.progress = FETCH_PROGRESS_FLOOR;
                    s.status_message = status::FETCHING.into();
                });
            }

            let failure = match self.fetch_with_heartbeat().await? {
                Ok(dataset) => return self.succeed(dataset).await,
                Err(failure) => failure,
            };

            let kind = self
                .shared
                .policy
                .effective_kind(failure.kind, budget.no_data_used());
            match self.shared.decide(budget.used(kind), kind) {
                RetryDecision::Stop => {
                    warn!(kind = %failure.kind, error = %failure.message, "giving up on live data");
                    return self.fall_back(failure.kind).await;
                }
                RetryDecision::WaitThen(delay) => {
                    budget.charge(kind);
                    let attempt = self.current.attempt + 1;
                    warn!(
                        kind = %failure.kind,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %failure.message,
                        "fetch failed; retrying"
                    );
                    self.emit(|s| {
                        s.phase = Phase::Retrying;
                        s.error_kind = Some(failure.kind);
                        s.attempt = attempt;
                        s.status_message = status::retrying(attempt);
                    });
                    self.guard(tokio::time::sleep(delay)).await?;
                }
            }
        }
    }

    /// Fetch under the request deadline, advancing progress on every
    /// heartbeat while the call is outstanding.
    async fn fetch_with_heartbeat(&mut self) -> Step<FetchOutcome> {
        let timeout = self.shared.request_timeout;
        let source = Arc::clone(&self.shared.source);
        let fetch = tokio::time::timeout(timeout, async move { source.fetch(timeout).await });
        tokio::pin!(fetch);

        let period = self.shared.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let cancel = self.cancel.clone();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Cancelled),
                result = &mut fetch => {
                    return Ok(result.unwrap_or_else(|_| {
                        Err(ClassifiedFailure::new(
                            ErrorKind::Timeout,
                            format!("no response within {}ms", timeout.as_millis()),
                        ))
                    }));
                }
                _ = heartbeat.tick() => {
                    let p = self.current.progress.max(FETCH_PROGRESS_FLOOR);
                    let next = p + (FETCH_PROGRESS_CEILING - p) * FETCH_PROGRESS_STEP;
                    self.emit(|s| s.progress = next);
                }
            }
        }
    }

    async fn succeed(&mut self, dataset: OperationalDataset) -> Step<()> {
        let summary = dataset.summary();
        // Persisting is not cancellable: a fetched dataset is always kept.
        let fetched_at = match self.shared.store.save(&dataset).await {
            Ok(at) => at,
            Err(e) => {
                warn!(error = %e, "snapshot save failed");
                Utc::now()
            }
        };

        info!(?summary, "sync succeeded");
        self.emit(|s| {
            s.phase = Phase::Succeeded;
            s.payload = Some(Arc::new(dataset));
            s.error_kind = None;
            s.attempt = 0;
            s.progress = 1.0;
            s.status_message = status::UP_TO_DATE.into();
            s.data_as_of = Some(fetched_at);
        });
        Ok(())
    }

    async fn fall_back(&mut self, kind: ErrorKind) -> Step<()> {
        let cached = self.guard(self.shared.store.load()).await?;
        match cached {
            Some(snapshot) => {
                info!(kind = %kind, fetched_at = %snapshot.fetched_at, "serving cached snapshot");
                self.emit(|s| {
                    s.phase = Phase::OfflineCached;
                    s.payload = Some(snapshot.payload);
                    s.error_kind = Some(kind);
                    s.progress = 1.0;
                    s.status_message = status::USING_SAVED_DATA.into();
                    s.data_as_of = Some(snapshot.fetched_at);
                });
            }
            None => {
                warn!(kind = %kind, "no cached snapshot; sync failed");
                self.emit(|s| {
                    s.phase = Phase::Failed;
                    s.payload = None;
                    s.error_kind = Some(kind);
                    s.progress = 1.0;
                    s.status_message = status::FAILED.into();
                    s.data_as_of = None;
                });
            }
        }
        Ok(())
    }

    /// Await `fut` unless the cycle is cancelled first.
    async fn guard<T>(&self, fut: impl Future<Output = T>) -> Step<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Cancelled),
            value = fut => Ok(value),
        }
    }

    /// Derive the next state from the last one and publish it.
    fn emit(&mut self, update: impl FnOnce(&mut SyncState)) {
        let mut next = self.current.clone();
        update(&mut next);
        next.progress = next.progress.clamp(0.0, 1.0).max(self.current.progress);
        debug_assert!(next.is_well_formed(), "malformed transition: {next:?}");

        if self.shared.publish(&next, &self.cancel) {
            self.current = next;
        }
    }
}
