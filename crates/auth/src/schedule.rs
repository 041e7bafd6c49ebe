//! Single-slot refresh timer.
//!
//! A [`RefreshSchedule`] holds at most one spawned timer task. Arming replaces
//! (and aborts) whatever was armed before; dropping the schedule aborts it.
use std::{
    future::Future,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};

struct Armed {
    handle: JoinHandle<()>,
    fires_at: Instant,
}

#[derive(Default)]
pub struct RefreshSchedule {
    slot: Mutex<Option<Armed>>,
}

impl RefreshSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, cancelling the previously armed timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let fires_at = Instant::now() + delay;
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(fires_at).await;
            task.await;
        });
        *slot = Some(Armed { handle, fires_at });
    }

    /// Abort the armed timer. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        let armed = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match armed {
            Some(armed) => {
                let pending = !armed.handle.is_finished();
                armed.handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Time left until the armed timer fires.
    ///
    /// `Some(ZERO)` while a fired task is still running, `None` when idle.
    pub fn next_fire_in(&self) -> Option<Duration> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|armed| !armed.handle.is_finished())
            .map(|armed| armed.fires_at.saturating_duration_since(Instant::now()))
    }
}

impl Drop for RefreshSchedule {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(armed) = slot.take() {
            armed.handle.abort();
        }
    }
}
