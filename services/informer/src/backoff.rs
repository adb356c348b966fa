//! Capped exponential backoff with jitter for the list-retry loop, in the
//! same shape as the `forwarder`/`receiver` uplink sessions' reconnect
//! backoff and `kube-rs`'s reconciler `default_backoff()`.

use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_millis(250);
const CAP: Duration = Duration::from_secs(30);
const JITTER_FRACTION: f64 = 0.2;

pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// The delay for the current attempt, then advance to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let exp = BASE.as_millis().saturating_mul(1u128 << self.attempt.min(20));
        let capped = exp.min(CAP.as_millis());
        self.attempt += 1;

        let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let jittered = (capped as f64) * (1.0 + jitter);
        Duration::from_millis(jittered.max(0.0) as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_close_to_base() {
        let mut backoff = Backoff::new();
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(200) && delay <= Duration::from_millis(300));
    }

    #[test]
    fn delay_grows_then_caps() {
        let mut backoff = Backoff::new();
        for _ in 0..10 {
            backoff.next_delay();
        }
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis((CAP.as_millis() as f64 * 1.2) as u64));
    }

    #[test]
    fn reset_returns_to_base_delay() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(300));
    }
}
