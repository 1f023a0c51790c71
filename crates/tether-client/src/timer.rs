use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One-shot cancelable timer, keyed per purpose (heartbeat/idle/reconnect).
///
/// Arming spawns a task that races the delay against a cancellation token;
/// re-arming or disarming cancels the previous instance, so at most one
/// timer per slot is ever live. The slot still reads as armed after the
/// timer fires; a fire handler that wants the slot observable as idle must
/// disarm it first.
#[derive(Default)]
pub(crate) struct TimerSlot {
    cancel: Option<CancellationToken>,
}

impl TimerSlot {
    /// Start (or restart) the timer. `on_fire` runs on the runtime after
    /// `delay`, unless the slot is disarmed or re-armed first.
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disarm();
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        // Capture the deadline here rather than in the task, so the delay is
        // measured from arming even if the task is first polled later.
        let deadline = tokio::time::Instant::now() + delay;
        drop(tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => on_fire(),
            }
        }));
    }

    /// Cancel any pending instance and mark the slot idle.
    pub fn disarm(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = Arc::clone(&fired);
        let mut slot = TimerSlot::default();
        slot.arm(Duration::from_secs(5), move || {
            let _ = fired2.fetch_add(1, Ordering::Relaxed);
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::Relaxed), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_suppresses_fire() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired2 = Arc::clone(&fired);
        let mut slot = TimerSlot::default();
        slot.arm(Duration::from_secs(5), move || {
            let _ = fired2.fetch_add(1, Ordering::Relaxed);
        });
        slot.disarm();
        assert!(!slot.is_armed());

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_pushes_deadline() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut slot = TimerSlot::default();

        let f = Arc::clone(&fired);
        slot.arm(Duration::from_secs(5), move || {
            let _ = f.fetch_add(1, Ordering::Relaxed);
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;

        // Re-arm just before the first deadline; only the second may fire.
        let f = Arc::clone(&fired);
        slot.arm(Duration::from_secs(5), move || {
            let _ = f.fetch_add(1, Ordering::Relaxed);
        });

        tokio::time::advance(Duration::from_secs(4)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::Relaxed), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slot_reads_armed_until_disarmed() {
        let mut slot = TimerSlot::default();
        slot.arm(Duration::from_millis(1), || {});
        tokio::time::advance(Duration::from_millis(5)).await;
        settle().await;
        // Fired, but nobody disarmed the slot.
        assert!(slot.is_armed());
        slot.disarm();
        assert!(!slot.is_armed());
    }
}
