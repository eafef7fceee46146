//! Single-flight run lock (the fourth scheduler gate)
//!
//! The lock is local to one process. A holder older than the maximum run
//! duration is treated as abandoned and cleared by the next acquirer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::run_result::SkipReason;

#[derive(Debug, Clone, Copy)]
struct Holder {
    token: Uuid,
    acquired_at: Instant,
}

/// Snapshot of the lock for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLockState {
    pub held: bool,
    pub held_for: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RunLock {
    holder: Arc<Mutex<Option<Holder>>>,
    max_run_duration: Duration,
}

impl RunLock {
    #[must_use]
    pub fn new(max_run_duration: Duration) -> Self {
        Self {
            holder: Arc::new(Mutex::new(None)),
            max_run_duration,
        }
    }

    /// Acquires the lock or reports the run already holding it.
    ///
    /// The staleness check and the acquisition happen under one critical
    /// section, so two concurrent callers can never both succeed.
    pub async fn try_acquire(&self) -> Result<RunLockGuard, SkipReason> {
        let mut holder = self.holder.lock().await;
        let now = Instant::now();

        if let Some(current) = *holder {
            let held_for = now.saturating_duration_since(current.acquired_at);
            if held_for < self.max_run_duration {
                return Err(SkipReason::RunInProgress {
                    running_for: held_for,
                });
            }
            warn!(
                "Clearing stale resync lock held for {}s (max run duration {}s)",
                held_for.as_secs(),
                self.max_run_duration.as_secs()
            );
        }

        let token = Uuid::new_v4();
        *holder = Some(Holder {
            token,
            acquired_at: now,
        });
        debug!("Resync lock acquired ({token})");

        Ok(RunLockGuard {
            holder: Arc::clone(&self.holder),
            token,
            released: false,
        })
    }

    pub async fn state(&self) -> RunLockState {
        let holder = self.holder.lock().await;
        RunLockState {
            held: holder.is_some(),
            held_for: holder.map(|h| Instant::now().saturating_duration_since(h.acquired_at)),
        }
    }
}

/// Releases the lock when dropped, unless it was already force-cleared
/// and handed to a newer run.
#[derive(Debug)]
pub struct RunLockGuard {
    holder: Arc<Mutex<Option<Holder>>>,
    token: Uuid,
    released: bool,
}

impl RunLockGuard {
    #[must_use]
    pub const fn token(&self) -> Uuid {
        self.token
    }

    /// Releases explicitly; prefer this over drop inside async code.
    pub async fn release(mut self) {
        let mut holder = self.holder.lock().await;
        Self::clear_if_owned(&mut holder, self.token);
        self.released = true;
    }

    fn clear_if_owned(holder: &mut Option<Holder>, token: Uuid) {
        match *holder {
            Some(current) if current.token == token => {
                *holder = None;
                debug!("Resync lock released ({token})");
            }
            Some(_) => warn!("Resync lock {token} was taken over by a newer run; leaving it in place"),
            None => {}
        }
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Drop cannot await; fall back to a non-blocking attempt and
        // finish asynchronously if the mutex is busy.
        if let Ok(mut holder) = self.holder.try_lock() {
            Self::clear_if_owned(&mut holder, self.token);
            return;
        }
        let holder = Arc::clone(&self.holder);
        let token = self.token;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut holder = holder.lock().await;
                Self::clear_if_owned(&mut holder, token);
            });
        }
    }
}
