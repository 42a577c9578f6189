//! Reconciliation scheduler
//!
//! Comparing against a producer that is still changing yields findings that
//! are pure timing races. The scheduler therefore only opens the gate after
//! the notification stream has been quiet for strictly longer than the
//! quiescence window, and only if something happened since the last pass.

use std::time::Duration;
use tokio::time::Instant;

/// Event traffic bookkeeping shared by the listener and the scheduler
#[derive(Debug, Clone, Copy)]
pub struct Activity {
    last: Instant,
    dirty: bool,
}

impl Activity {
    /// Start clean with `now` as the last activity
    #[inline]
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self { last: now, dirty: false }
    }

    /// Record an event
    #[inline]
    pub fn touch(&mut self, now: Instant) {
        self.last = now;
        self.dirty = true;
    }

    /// Clear the dirty flag and restart the idle clock
    ///
    /// Called when a pass is started, so the very next tick does not
    /// trigger again while the comparison settles.
    #[inline]
    pub fn settle(&mut self, now: Instant) {
        self.last = now;
        self.dirty = false;
    }

    /// Whether events arrived since the last pass
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Time of the last recorded event (or settle)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Instant {
        self.last
    }

    /// Time elapsed since the last event
    #[inline]
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last)
    }
}

/// Decides on each tick whether a comparison should run
#[derive(Debug, Clone, Copy)]
pub struct QuiescenceGate {
    window: Duration,
}

impl QuiescenceGate {
    /// Create a gate with the given quiescence window
    #[inline]
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Quiescence window
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Pure check: live, dirty, and idle strictly longer than the window
    #[inline]
    #[must_use]
    pub fn should_compare(&self, now: Instant, live: bool, activity: &Activity) -> bool {
        live && activity.is_dirty() && activity.idle_for(now) > self.window
    }

    /// Evaluate one tick
    ///
    /// When the gate opens the activity is settled and `true` is returned;
    /// otherwise the tick is a no-op.
    pub fn poll(&self, now: Instant, live: bool, activity: &mut Activity) -> bool {
        if self.should_compare(now, live, activity) {
            activity.settle(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(3);

    #[tokio::test(start_paused = true)]
    async fn gate_stays_closed_until_store_is_live() {
        let gate = QuiescenceGate::new(WINDOW);
        let mut activity = Activity::new(Instant::now());
        activity.touch(Instant::now());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!gate.poll(Instant::now(), false, &mut activity));
        assert!(activity.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn gate_requires_strictly_more_than_window() {
        let gate = QuiescenceGate::new(WINDOW);
        let start = Instant::now();
        let mut activity = Activity::new(start);
        activity.touch(start);

        assert!(!gate.should_compare(start + WINDOW, true, &activity));
        assert!(gate.should_compare(start + WINDOW + Duration::from_millis(1), true, &activity));
    }

    #[tokio::test(start_paused = true)]
    async fn gate_ignores_clean_store() {
        let gate = QuiescenceGate::new(WINDOW);
        let mut activity = Activity::new(Instant::now());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!gate.poll(Instant::now(), true, &mut activity));
    }

    #[tokio::test(start_paused = true)]
    async fn steady_traffic_keeps_gate_closed() {
        let gate = QuiescenceGate::new(WINDOW);
        let mut activity = Activity::new(Instant::now());

        for _ in 0..20 {
            activity.touch(Instant::now());
            tokio::time::advance(Duration::from_millis(500)).await;
            assert!(!gate.poll(Instant::now(), true, &mut activity));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opening_settles_activity() {
        let gate = QuiescenceGate::new(WINDOW);
        let mut activity = Activity::new(Instant::now());
        activity.touch(Instant::now());

        tokio::time::advance(Duration::from_millis(3_500)).await;
        let now = Instant::now();
        assert!(gate.poll(now, true, &mut activity));
        assert!(!activity.is_dirty());
        assert_eq!(activity.last(), now);

        // Next tick is a no-op
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!gate.poll(Instant::now(), true, &mut activity));
    }
}
