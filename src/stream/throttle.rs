use std::time::{Duration, Instant};

/// Lossy admission filter. A sample is admitted only when `interval` has
/// passed since the previously admitted one; everything in between is
/// discarded, not queued.
#[derive(Clone, Debug)]
pub struct Throttle {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl Throttle {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(150);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        let open = match self.last_admitted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if open {
            self.last_admitted = Some(now);
        }
        open
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_samples_inside_the_window() {
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut throttle = Throttle::new(ms(150));
        assert!(throttle.admit(t0));
        assert!(!throttle.admit(t0 + ms(50)));
        assert!(!throttle.admit(t0 + ms(149)));
        assert!(throttle.admit(t0 + ms(150)));
        // The window restarts from the last admitted sample, not the last seen.
        assert!(!throttle.admit(t0 + ms(200)));
        assert!(throttle.admit(t0 + ms(300)));
    }

    #[test]
    fn zero_interval_admits_bursts() {
        let t0 = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        assert!((0..10).all(|_| throttle.admit(t0)));
    }
}
