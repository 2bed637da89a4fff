use std::thread;
use std::time::Duration;

use log::info;
use rand::Rng;

/// Sleeps for the configured spacing plus up to half of it again as jitter.
pub fn pause_between_requests(base_secs: u64) {
    if base_secs == 0 {
        return;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=base_secs * 500);
    let delay = spacing(base_secs, 1, jitter_ms);
    info!("Waiting for {:.1} seconds (Request Delay)...", delay.as_secs_f64());
    thread::sleep(delay);
}

/// Linear backoff before retry number `attempt` (1-based).
pub fn retry_backoff(base_secs: u64, attempt: u32) {
    if base_secs == 0 {
        return;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=base_secs * 500);
    let delay = spacing(base_secs, attempt, jitter_ms);
    info!("Retry {} in {:.1} seconds...", attempt, delay.as_secs_f64());
    thread::sleep(delay);
}

fn spacing(base_secs: u64, attempt: u32, jitter_ms: u64) -> Duration {
    Duration::from_secs(base_secs * u64::from(attempt.max(1))) + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_grows_linearly_with_attempts() {
        assert_eq!(spacing(2, 1, 0), Duration::from_secs(2));
        assert_eq!(spacing(2, 3, 250), Duration::from_millis(6250));
        assert_eq!(spacing(1, 0, 0), Duration::from_secs(1));
    }

    #[test]
    fn zero_delay_returns_immediately() {
        pause_between_requests(0);
        retry_backoff(0, 5);
    }
}
