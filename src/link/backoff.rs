use std::time::Duration;

/// Capped exponential reconnect delay: `min(base * 2^attempts, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_millis(5000),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay(&self, attempts: u32) -> Duration {
        // 2^31 already overflows any sane base; saturate instead of wrapping.
        let factor = 1u32.checked_shl(attempts.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_saturates() {
        let backoff = Backoff::default();
        let delays: Vec<u128> = (0..5).map(|a| backoff.delay(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
        assert_eq!(backoff.delay(6).as_millis(), 5000);
        assert_eq!(backoff.delay(40).as_millis(), 5000);
        assert_eq!(backoff.delay(u32::MAX).as_millis(), 5000);
    }
}
