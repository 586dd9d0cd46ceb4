//! Show-time arithmetic and clock-offset estimation
//!
//! Show-time is the controller's monotonic clock in milliseconds, carried on
//! the wire as a wrapping u32. All comparisons use half-range signed
//! arithmetic so they survive the ~49.7-day wrap.

use std::time::Instant;

/// Signed (wrap-around-safe) difference `a - b` of two u32 timestamps
pub fn diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// Signed (wrap-around-safe) duration from `start` to `end`
pub fn duration(start: u32, end: u32) -> i32 {
    end.wrapping_sub(start) as i32
}

/// Whether `execute_at` is due at `now` (due = now is at or past the
/// deadline within the half-range window)
pub fn is_due(now: u32, execute_at: u32) -> bool {
    diff(now, execute_at) >= 0
}

/// Apply a signed offset to a local timestamp, wrapping
pub fn apply_offset(local_ms: u32, offset_ms: i32) -> u32 {
    local_ms.wrapping_add(offset_ms as u32)
}

/// Two-timestamp one-way offset estimator
///
/// `req_send_local` and `resp_recv_local` are the node's local clock at
/// TIME_REQ send and TIME_RESP receive; `master_rx`/`master_tx` are the
/// controller's show-time stamps from the response. The result is the
/// estimated show-time minus local-time offset in milliseconds, assuming
/// symmetric network delay.
pub fn estimate_offset(
    req_send_local: u32,
    master_rx: u32,
    master_tx: u32,
    resp_recv_local: u32,
) -> f64 {
    let forward = diff(master_rx, req_send_local) as f64;
    let backward = diff(master_tx, resp_recv_local) as f64;
    (forward + backward) / 2.0
}

/// Round-trip latency of a TIME_REQ exchange, with the controller's
/// processing time removed
pub fn round_trip(
    req_send_local: u32,
    master_rx: u32,
    master_tx: u32,
    resp_recv_local: u32,
) -> i32 {
    duration(req_send_local, resp_recv_local) - duration(master_rx, master_tx)
}

/// Monotonic show clock, wrapping at 2^32 milliseconds
///
/// A controller reads it directly; a node pairs it with an offset learned
/// from BEACON or TIME_REQ/TIME_RESP.
#[derive(Debug, Clone)]
pub struct ShowClock {
    start: Instant,
}

impl Default for ShowClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ShowClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since clock creation, wrapping at 2^32
    pub fn now_ms(&self) -> u32 {
        (self.start.elapsed().as_millis() & 0xFFFF_FFFF) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_wraps() {
        assert_eq!(diff(10, 5), 5);
        assert_eq!(diff(5, 10), -5);
        // Straddling the wrap point.
        assert_eq!(diff(5, u32::MAX - 4), 10);
        assert_eq!(diff(u32::MAX - 4, 5), -10);
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(100, 100));
        assert!(is_due(101, 100));
        assert!(!is_due(99, 100));
        // A deadline just past the wrap is not yet due.
        assert!(!is_due(u32::MAX, 3));
        assert!(is_due(3, u32::MAX));
    }

    #[test]
    fn test_estimate_offset_reference_vector() {
        let offset = estimate_offset(1000, 5100, 5105, 1010);
        assert_eq!(offset, 4097.5);
    }

    #[test]
    fn test_round_trip_excludes_processing() {
        assert_eq!(round_trip(1000, 5100, 5105, 1010), 5);
    }

    #[test]
    fn test_show_clock_monotonic() {
        let clock = ShowClock::new();
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_ms();
        assert!(duration(a, b) >= 5);
    }
}
