//! Reconnection backoff policy shared by the bot connection and every
//! shadow connection (§4.8). Grounded on the reference implementation's
//! `run_with_reconnect`: exponential backoff starting at one second,
//! doubling on each failure, capped at five minutes.

use std::time::Duration;

pub const INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Flood protection: minimum spacing between outgoing IRC lines.
pub const DEFAULT_FLOOD_DELAY: Duration = Duration::from_millis(500);

pub fn next_delay(current: Duration) -> Duration {
    (current * 2).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let mut delay = INITIAL_DELAY;
        for _ in 0..20 {
            delay = next_delay(delay);
        }
        assert_eq!(delay, MAX_DELAY);
    }

    #[test]
    fn first_doubling() {
        assert_eq!(next_delay(INITIAL_DELAY), Duration::from_secs(2));
    }
}
