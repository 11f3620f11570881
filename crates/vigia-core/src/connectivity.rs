// ── Connectivity monitor ──
//
// Tracks network reachability. Raw reports are visible immediately through
// `is_online()`; change events go out only after the value has held steady
// for the debounce window, so a flapping link produces at most one event
// per settle. `is_settled_online()` is the value those events describe.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::MIN_DEBOUNCE;

const CHANGE_CHANNEL_SIZE: usize = 16;

/// A debounced reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityChange {
    pub online: bool,
    pub at: DateTime<Utc>,
}

/// Anything that can answer "is the network usable right now?".
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Probe by opening a TCP connection to a well-known host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                trace!(target = %self.target, error = %e, "reachability probe failed");
                false
            }
            Err(_) => {
                trace!(target = %self.target, "reachability probe timed out");
                false
            }
        }
    }
}

/// Handle for pushing raw reachability signals into a monitor.
///
/// Platform integrations (OS network callbacks, probes) hold one of these.
#[derive(Debug, Clone)]
pub struct ReachabilityReporter {
    raw: Arc<watch::Sender<bool>>,
}

impl ReachabilityReporter {
    /// Record the current reachability. Repeating the same value is a no-op.
    pub fn report(&self, online: bool) {
        self.raw.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

struct MonitorInner {
    raw: Arc<watch::Sender<bool>>,
    settled: Arc<watch::Sender<bool>>,
    changes: broadcast::Sender<ConnectivityChange>,
    cancel: CancellationToken,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Shared reachability state plus debounced change notifications.
///
/// Cheaply cloneable. Background tasks stop when the last clone is dropped
/// or [`shutdown()`](Self::shutdown) is called.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded with `initial` and start its debounce task.
    ///
    /// Windows shorter than [`MIN_DEBOUNCE`] are raised to it. Must be
    /// called inside a Tokio runtime.
    pub fn new(initial: bool, debounce: Duration) -> Self {
        let (raw, raw_rx) = watch::channel(initial);
        let settled = Arc::new(watch::Sender::new(initial));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        tokio::spawn(debounce_task(
            raw_rx,
            Arc::clone(&settled),
            debounce.max(MIN_DEBOUNCE),
            changes.clone(),
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(MonitorInner {
                raw: Arc::new(raw),
                settled,
                changes,
                cancel,
            }),
        }
    }

    /// Latest raw reading, not debounced.
    pub fn is_online(&self) -> bool {
        *self.inner.raw.borrow()
    }

    /// Debounced reading: the state named by the last emitted change (or
    /// the initial value). A dip shorter than the window never shows here.
    pub fn is_settled_online(&self) -> bool {
        *self.inner.settled.borrow()
    }

    pub fn reporter(&self) -> ReachabilityReporter {
        ReachabilityReporter {
            raw: Arc::clone(&self.inner.raw),
        }
    }

    /// Subscribe to debounced transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityChange> {
        self.inner.changes.subscribe()
    }

    /// Poll `probe` every `interval` and feed the results to this monitor.
    pub fn spawn_probe(&self, probe: Arc<dyn ReachabilityProbe>, interval: Duration) {
        let reporter = self.reporter();
        let cancel = self.inner.cancel.child_token();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let online = probe.probe().await;
                        reporter.report(online);
                    }
                }
            }
            debug!("reachability probe stopped");
        });
    }

    /// Stop the debounce and probe tasks.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

/// Trailing-edge debounce: wait until the raw value stops changing for
/// `window`, then emit if it differs from the last settled value.
async fn debounce_task(
    mut raw: watch::Receiver<bool>,
    settled: Arc<watch::Sender<bool>>,
    window: Duration,
    changes: broadcast::Sender<ConnectivityChange>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = raw.changed() => {
                if result.is_err() {
                    break;
                }
            }
        }

        // Restart the window on every further change.
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(window) => break,
                result = raw.changed() => {
                    if result.is_err() {
                        return;
                    }
                }
            }
        }

        let online = *raw.borrow_and_update();
        if online == *settled.borrow() {
            trace!(online, "reachability flapped back; no change emitted");
            continue;
        }
        // Settled value first, so a subscriber reacting to the event reads it.
        settled.send_replace(online);
        info!(online, "connectivity changed");
        // No subscribers is fine.
        let _ = changes.send(ConnectivityChange {
            online,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn flapping_emits_a_single_change() {
        let monitor = ConnectivityMonitor::new(true, WINDOW);
        let mut changes = monitor.subscribe();
        let reporter = monitor.reporter();

        for online in [false, true, false, true, false] {
            reporter.report(online);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!monitor.is_online());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let change = changes.recv().await.unwrap();
        assert!(!change.online);
        assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn flapping_back_to_start_emits_nothing() {
        let monitor = ConnectivityMonitor::new(true, WINDOW);
        let mut changes = monitor.subscribe();
        let reporter = monitor.reporter();

        reporter.report(false);
        tokio::time::sleep(Duration::from_millis(200)).await;
        reporter.report(true);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
        assert!(monitor.is_settled_online());
    }

    #[tokio::test(start_paused = true)]
    async fn settled_reading_lags_raw_by_the_window() {
        let monitor = ConnectivityMonitor::new(true, WINDOW);
        let reporter = monitor.reporter();

        reporter.report(false);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!monitor.is_online());
        assert!(monitor.is_settled_online());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!monitor.is_settled_online());
    }

    #[tokio::test(start_paused = true)]
    async fn stable_transitions_each_emit() {
        let monitor = ConnectivityMonitor::new(false, WINDOW);
        let mut changes = monitor.subscribe();
        let reporter = monitor.reporter();

        reporter.report(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        reporter.report(true);
        reporter.report(false);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(changes.recv().await.unwrap().online);
        assert!(!changes.recv().await.unwrap().online);
        assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn short_window_is_clamped() {
        let monitor = ConnectivityMonitor::new(true, Duration::from_millis(10));
        let mut changes = monitor.subscribe();

        monitor.reporter().report(false);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!changes.recv().await.unwrap().online);
    }

    struct Toggle(AtomicBool);

    #[async_trait]
    impl ReachabilityProbe for Toggle {
        async fn probe(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_feeds_the_monitor() {
        let monitor = ConnectivityMonitor::new(true, WINDOW);
        let mut changes = monitor.subscribe();
        let probe = Arc::new(Toggle(AtomicBool::new(false)));

        monitor.spawn_probe(probe.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!monitor.is_online());
        assert!(!changes.recv().await.unwrap().online);

        monitor.shutdown();
        probe.0.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn tcp_probe_detects_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let open = TcpProbe::new(addr, Duration::from_secs(1));
        assert!(open.probe().await);

        drop(listener);
        let closed = TcpProbe::new(addr, Duration::from_secs(1));
        assert!(!closed.probe().await);
    }
}
