//! Last-wins debouncing of slide navigation bursts.
//!
//! Holding a next-page key makes the host fire slide-change notifications
//! faster than a write-through-then-load cycle should run. The debouncer
//! coalesces such a burst into its final destination: only the slide shown
//! before the burst and the slide the burst lands on are ever persisted or
//! rendered, never the intermediates.
//!
//! The machine is pure: it decides, while the session actor owns the actual
//! timer. [`NavigationDebouncer::observe`] answers "apply now" or "wake me
//! at this deadline"; [`NavigationDebouncer::fire`] resolves the deadline.

use crate::models::NavigationEvent;
use std::time::{Duration, Instant};
use tracing::trace;

/// Quiet window after which navigation applies immediately.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(150);

/// Outcome of observing one navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Apply this transition immediately.
    ApplyNow(NavigationEvent),
    /// Hold the transition; wake at the deadline and call
    /// [`NavigationDebouncer::fire`].
    Deferred(Instant),
}

/// Two-state (idle/pending) navigation coalescer.
#[derive(Debug)]
pub struct NavigationDebouncer {
    window: Duration,
    last_applied_at: Option<Instant>,
    pending: Option<NavigationEvent>,
    deadline: Option<Instant>,
}

impl NavigationDebouncer {
    /// Creates a debouncer with the given quiet window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_applied_at: None,
            pending: None,
            deadline: None,
        }
    }

    /// Observes one navigation event and decides what to do with it.
    ///
    /// Idle with a quiet window elapsed since the last applied transition:
    /// the event applies immediately. Otherwise the event becomes (or
    /// replaces) the pending target and the single deadline restarts; only
    /// the latest target survives a burst.
    pub fn observe(&mut self, event: NavigationEvent) -> DebounceDecision {
        let now = event.received_at;
        let quiet_elapsed = self
            .last_applied_at
            .is_none_or(|applied| now.duration_since(applied) > self.window);

        if quiet_elapsed && self.pending.is_none() {
            self.last_applied_at = Some(now);
            trace!(slide = event.slide_index, "navigation applied immediately");
            return DebounceDecision::ApplyNow(event);
        }

        let deadline = now + self.window;
        if let Some(previous) = self.pending.replace(event) {
            trace!(
                superseded = previous.slide_index,
                slide = event.slide_index,
                "pending navigation superseded"
            );
        }
        self.deadline = Some(deadline);
        DebounceDecision::Deferred(deadline)
    }

    /// Resolves the deadline, handing back the pending target to apply.
    ///
    /// Returns `None` for a spurious wake-up (deadline moved or already
    /// resolved).
    pub fn fire(&mut self, now: Instant) -> Option<NavigationEvent> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.last_applied_at = Some(now);
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Discards any pending target without applying it.
    ///
    /// Used at slide-show end, which bypasses coalescing entirely.
    pub fn take_pending(&mut self) -> Option<NavigationEvent> {
        self.deadline = None;
        self.pending.take()
    }

    /// Forgets all timing state, e.g. when a new document opens.
    pub fn reset(&mut self) {
        self.last_applied_at = None;
        self.pending = None;
        self.deadline = None;
    }

    /// The live deadline, while a target is pending.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True while a target is waiting for its deadline.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for NavigationDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    fn event(slide: i32, at: Instant) -> NavigationEvent {
        NavigationEvent::new(slide, 40, at)
    }

    #[test]
    fn test_first_event_applies_immediately() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let now = Instant::now();
        let decision = debouncer.observe(event(3, now));
        assert_eq!(decision, DebounceDecision::ApplyNow(event(3, now)));
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_burst_keeps_only_latest() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(3, t0));

        // Burst within the quiet window: every event defers, restarting the
        // single deadline.
        let d1 = debouncer.observe(event(4, t0 + Duration::from_millis(30)));
        let d2 = debouncer.observe(event(5, t0 + Duration::from_millis(60)));
        assert!(matches!(d1, DebounceDecision::Deferred(_)));
        let DebounceDecision::Deferred(deadline) = d2 else {
            unreachable!("burst event must defer");
        };

        // Only the final destination is ever applied.
        let applied = debouncer.fire(deadline).unwrap();
        assert_eq!(applied.slide_index, 5);
        assert!(debouncer.fire(deadline).is_none());
    }

    #[test]
    fn test_deadline_restarts_per_event() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(1, t0));

        let DebounceDecision::Deferred(first) =
            debouncer.observe(event(2, t0 + Duration::from_millis(50)))
        else {
            unreachable!("must defer");
        };
        let DebounceDecision::Deferred(second) =
            debouncer.observe(event(3, t0 + Duration::from_millis(100)))
        else {
            unreachable!("must defer");
        };
        assert!(second > first);

        // The superseded deadline no longer fires.
        assert!(debouncer.fire(first).is_none());
        assert_eq!(debouncer.fire(second).unwrap().slide_index, 3);
    }

    #[test]
    fn test_applies_immediately_after_quiet_period() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(1, t0));

        let later = t0 + WINDOW + Duration::from_millis(10);
        let decision = debouncer.observe(event(2, later));
        assert!(matches!(decision, DebounceDecision::ApplyNow(_)));
    }

    #[test]
    fn test_take_pending_discards_deadline() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(1, t0));
        debouncer.observe(event(2, t0 + Duration::from_millis(10)));

        let pending = debouncer.take_pending().unwrap();
        assert_eq!(pending.slide_index, 2);
        assert!(debouncer.deadline().is_none());
        assert!(debouncer.fire(t0 + WINDOW * 2).is_none());
    }

    #[test]
    fn test_spurious_fire_before_deadline() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(1, t0));
        let DebounceDecision::Deferred(deadline) =
            debouncer.observe(event(2, t0 + Duration::from_millis(10)))
        else {
            unreachable!("must defer");
        };

        assert!(debouncer.fire(deadline - Duration::from_millis(5)).is_none());
        assert!(debouncer.has_pending());
        assert_eq!(debouncer.fire(deadline).unwrap().slide_index, 2);
    }

    #[test]
    fn test_reset_returns_to_cold_state() {
        let mut debouncer = NavigationDebouncer::new(WINDOW);
        let t0 = Instant::now();
        debouncer.observe(event(1, t0));
        debouncer.observe(event(2, t0 + Duration::from_millis(10)));

        debouncer.reset();
        assert!(!debouncer.has_pending());

        // Cold again: next event applies immediately.
        let decision = debouncer.observe(event(7, t0 + Duration::from_millis(20)));
        assert!(matches!(decision, DebounceDecision::ApplyNow(_)));
    }
}
