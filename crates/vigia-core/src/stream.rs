// ── Reactive state stream ──
//
// Subscription type for consuming `SyncState` transitions.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::SyncState;

/// A subscription to the orchestrator's published state.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`. Backed by a
/// `watch` channel: a slow consumer skips intermediate states but never sees
/// them out of order.
pub struct StateStream {
    current: SyncState,
    receiver: watch::Receiver<SyncState>,
}

impl StateStream {
    pub(crate) fn new(mut receiver: watch::Receiver<SyncState>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The state captured at creation or at the last `changed()`.
    pub fn current(&self) -> &SyncState {
        &self.current
    }

    /// The latest published state (may be newer than `current()`).
    pub fn latest(&self) -> SyncState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition. Returns `None` once the orchestrator
    /// has been dropped.
    pub async fn changed(&mut self) -> Option<SyncState> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current state first, then every observed
    /// transition.
    pub fn into_stream(self) -> SyncStateStream {
        SyncStateStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SyncStateStream {
    inner: WatchStream<SyncState>,
}

impl Stream for SyncStateStream {
    type Item = SyncState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::Phase;

    #[tokio::test]
    async fn changed_tracks_latest_value() {
        let (tx, rx) = watch::channel(SyncState::idle());
        let mut stream = StateStream::new(rx);
        assert_eq!(stream.current().phase, Phase::Idle);

        tx.send_modify(|s| s.phase = Phase::Loading);
        let next = stream.changed().await.unwrap();
        assert_eq!(next.phase, Phase::Loading);
        assert_eq!(stream.current().phase, Phase::Loading);
    }

    #[tokio::test]
    async fn changed_returns_none_after_drop() {
        let (tx, rx) = watch::channel(SyncState::idle());
        let mut stream = StateStream::new(rx);
        drop(tx);
        assert!(stream.changed().await.is_none());
    }
}
