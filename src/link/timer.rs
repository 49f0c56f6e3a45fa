use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// One-shot timers driven by caller-supplied instants. Nothing here reads
/// the clock, so tests move time forward by plain addition.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: Vec<(TimerId, Instant)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push((id, now + delay));
        id
    }

    /// Returns whether the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(pending, _)| *pending != id);
        self.pending.len() != before
    }

    /// Removes and returns every timer whose deadline is at or before `now`,
    /// earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<(TimerId, Instant)> = Vec::new();
        self.pending.retain(|&(id, deadline)| {
            if deadline <= now {
                due.push((id, deadline));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, deadline)| deadline);
        due.into_iter().map(|(id, _)| id).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|&(_, deadline)| deadline).min()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut timers = TimerQueue::new();
        let late = timers.schedule(t0, ms(300));
        let early = timers.schedule(t0, ms(100));
        assert_eq!(timers.next_deadline(), Some(t0 + ms(100)));
        assert!(timers.pop_due(t0 + ms(50)).is_empty());
        assert_eq!(timers.pop_due(t0 + ms(400)), vec![early, late]);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let t0 = Instant::now();
        let mut timers = TimerQueue::new();
        let id = timers.schedule(t0, Duration::from_millis(10));
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.pop_due(t0 + Duration::from_secs(1)).is_empty());
        assert_eq!(timers.next_deadline(), None);
    }
}
