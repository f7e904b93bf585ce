// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Deferred flush timer.
//!
//! At most one timer is armed at a time. Each armed timer is a detached task
//! racing a sleep against its cancellation token. Timers carry a generation
//! id so that a timer which wakes up after being cancelled (or replaced)
//! never clears the slot of its successor and never fires.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug)]
struct ArmedTimer {
    id: u64,
    token: CancellationToken,
}

type TimerSlot = Arc<Mutex<Option<ArmedTimer>>>;

fn lock(slot: &TimerSlot) -> MutexGuard<'_, Option<ArmedTimer>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug)]
pub struct FlushScheduler {
    interval: Duration,
    runtime: Handle,
    slot: TimerSlot,
    next_id: AtomicU64,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(interval: Duration, runtime: Handle) -> Self {
        FlushScheduler {
            interval,
            runtime,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms a timer that runs `on_fire` after the interval, unless one is
    /// already armed. Returns whether a new timer was armed.
    pub fn ensure_scheduled<F, Fut>(&self, on_fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *slot = Some(ArmedTimer {
            id,
            token: token.clone(),
        });
        drop(slot);

        let shared_slot = Arc::clone(&self.slot);
        let interval = self.interval;
        self.runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    trace!("Flush timer {} cancelled", id);
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }

            {
                let mut slot = lock(&shared_slot);
                // cancelled between wake-up and lock
                if !slot.as_ref().is_some_and(|armed| armed.id == id) {
                    return;
                }
                *slot = None;
            }

            debug!("Flush timer {} fired", id);
            on_fire().await;
        });
        true
    }

    /// Cancels the armed timer, if any. Returns whether one was armed.
    pub fn cancel_if_armed(&self) -> bool {
        let taken = lock(&self.slot).take();
        match taken {
            Some(armed) => {
                armed.token.cancel();
                trace!("Cancelled flush timer {}", armed.id);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.cancel_if_armed();
    }
}
