//! Deadline-driven timers: trailing-edge debounce, re-armable interval, and a
//! keyed one-shot queue.
//!
//! None of these own a thread. The engine asks for the earliest deadline,
//! sleeps until then, and feeds the current `Instant` back in. Disarming is
//! just forgetting the deadline, so teardown and re-arm are idempotent.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

/// Trailing-edge debouncer: a burst of triggers fires once, `window` after
/// the last trigger. The payload of the last trigger wins.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Register a trigger at `now`, pushing the deadline out.
    pub fn trigger(&mut self, now: Instant, payload: T) {
        self.pending = Some((now + self.window, payload));
    }

    /// Take the payload if the quiet window has elapsed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, p)| p),
            _ => None,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Fixed-period repeating timer. Arming while armed restarts the period, so
/// at most one schedule exists.
#[derive(Debug)]
pub struct IntervalTimer {
    period: Duration,
    next: Option<Instant>,
}

impl IntervalTimer {
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Clear any schedule and start a fresh one from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.next
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Returns `true` once per elapsed period. Missed ticks collapse into one;
    /// the next deadline is scheduled from `now`.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.next {
            Some(deadline) if deadline <= now => {
                self.next = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}

/// One-shot deadlines carrying a payload (highlight expiries, notification
/// auto-dismissal).
#[derive(Debug)]
pub struct DeadlineQueue<T> {
    entries: Vec<(Instant, T)>,
}

impl<T> Default for DeadlineQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> DeadlineQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, payload: T) {
        self.entries.push((at, payload));
    }

    /// Remove and return every payload due at `now`, in deadline order.
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.entries = pending;
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, payload)| payload).collect()
    }

    /// Drop entries matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) {
        self.entries.retain(|(_, payload)| !pred(payload));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|(at, _)| *at).min()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Earliest of several optional deadlines.
#[must_use]
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn burst_of_triggers_fires_once_after_last() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(300 * MS);
        d.trigger(t0, 1);
        d.trigger(t0 + 50 * MS, 2);
        d.trigger(t0 + 100 * MS, 3);

        assert_eq!(d.fire_if_due(t0 + 350 * MS), None);
        assert_eq!(d.deadline(), Some(t0 + 400 * MS));
        assert_eq!(d.fire_if_due(t0 + 400 * MS), Some(3));
        assert_eq!(d.fire_if_due(t0 + 800 * MS), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn cancelled_debounce_never_fires() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(300 * MS);
        d.trigger(t0, ());
        d.cancel();
        assert_eq!(d.fire_if_due(t0 + 1000 * MS), None);
    }

    #[test]
    fn interval_rearm_restarts_period() {
        let t0 = Instant::now();
        let mut timer = IntervalTimer::new(60_000 * MS);
        timer.arm(t0);
        timer.arm(t0 + 30_000 * MS);
        assert!(!timer.fire_if_due(t0 + 60_000 * MS));
        assert!(timer.fire_if_due(t0 + 90_000 * MS));
        assert_eq!(timer.deadline(), Some(t0 + 150_000 * MS));
    }

    #[test]
    fn disarmed_interval_is_silent() {
        let t0 = Instant::now();
        let mut timer = IntervalTimer::new(10 * MS);
        timer.arm(t0);
        timer.disarm();
        timer.disarm();
        assert!(!timer.fire_if_due(t0 + 100 * MS));
        assert!(!timer.is_armed());
    }

    #[test]
    fn missed_interval_ticks_collapse() {
        let t0 = Instant::now();
        let mut timer = IntervalTimer::new(10 * MS);
        timer.arm(t0);
        assert!(timer.fire_if_due(t0 + 55 * MS));
        assert!(!timer.fire_if_due(t0 + 60 * MS));
        assert!(timer.fire_if_due(t0 + 65 * MS));
    }

    #[test]
    fn deadline_queue_drains_in_order() {
        let t0 = Instant::now();
        let mut q = DeadlineQueue::new();
        q.schedule(t0 + 30 * MS, "c");
        q.schedule(t0 + 10 * MS, "a");
        q.schedule(t0 + 20 * MS, "b");
        q.schedule(t0 + 90 * MS, "z");
        assert_eq!(q.deadline(), Some(t0 + 10 * MS));
        assert_eq!(q.drain_due(t0 + 30 * MS), vec!["a", "b", "c"]);
        assert_eq!(q.len(), 1);
        q.cancel_where(|p| *p == "z");
        assert!(q.is_empty());
    }

    #[test]
    fn earliest_skips_unarmed() {
        let t0 = Instant::now();
        assert_eq!(earliest([None, Some(t0 + MS), Some(t0)]), Some(t0));
        assert_eq!(earliest([None, None]), None);
    }
}
