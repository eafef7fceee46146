//! Process-wide progress of the in-flight run
//!
//! Writers merge partial updates; readers get a cloned snapshot and never
//! observe a half-applied update. Every applied update is also broadcast so
//! observers can follow a run without polling.
//!
//! After a run ends the final state stays visible for a retention window,
//! then a deferred task resets it to idle. Starting a new run cancels a
//! pending reset.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::progress::{ProgressState, ProgressUpdate};

const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<ProgressState>>,
    events: broadcast::Sender<ProgressState>,
    pending_reset: Arc<Mutex<Option<CancellationToken>>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(ProgressState::default())),
            events,
            pending_reset: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn snapshot(&self) -> ProgressState {
        self.state.read().await.clone()
    }

    /// Receives a copy of the state after every update
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressState> {
        self.events.subscribe()
    }

    pub async fn update(&self, update: ProgressUpdate) -> ProgressState {
        let snapshot = {
            let mut state = self.state.write().await;
            state.apply(update);
            state.clone()
        };
        // No subscribers is fine.
        let _ = self.events.send(snapshot.clone());
        snapshot
    }

    /// Replaces the whole state; used at run start
    pub async fn begin(&self, initial: ProgressState) {
        self.cancel_pending_reset().await;
        {
            let mut state = self.state.write().await;
            state.clone_from(&initial);
        }
        let _ = self.events.send(initial);
    }

    pub async fn reset(&self) {
        {
            let mut state = self.state.write().await;
            *state = ProgressState::default();
        }
        let _ = self.events.send(ProgressState::default());
    }

    /// Resets to idle after `retention`, unless a new run begins first
    pub async fn schedule_reset(&self, retention: Duration) {
        let token = CancellationToken::new();
        {
            let mut pending = self.pending_reset.lock().await;
            if let Some(previous) = pending.replace(token.clone()) {
                previous.cancel();
            }
        }

        let tracker = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!("Progress reset cancelled by a newer run");
                }
                () = tokio::time::sleep(retention) => {
                    // Held across the reset so `begin` cannot interleave.
                    let mut pending = tracker.pending_reset.lock().await;
                    if token.is_cancelled() {
                        return;
                    }
                    *pending = None;
                    tracker.reset().await;
                    debug!("Progress reset to idle after retention window");
                }
            }
        });
    }

    async fn cancel_pending_reset(&self) {
        if let Some(token) = self.pending_reset.lock().await.take() {
            token.cancel();
        }
    }
}
