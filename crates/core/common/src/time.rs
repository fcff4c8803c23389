//! Nanosecond timestamps

use crate::types::Nanos;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock nanoseconds since the UNIX epoch.
///
/// Also used to stamp socket receive times: stamps taken on one host by one
/// clock are mutually comparable, which is all the FIFO sequencer needs.
#[must_use]
pub fn nanos_now() -> Nanos {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as Nanos)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotone_enough_to_order_batches() {
        let a = nanos_now();
        let b = nanos_now();
        assert!(b >= a);
        assert!(a > 0);
    }
}
