//! Per-run counters and event throttling.
//!
//! One `RunContext` exists per engine run and is shared by every call of that
//! run. Nothing here is global, so concurrent runs never share counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Minimum spacing between heartbeats derived from streamed output.
pub const STREAM_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Interval of the summary-mode heartbeat sampler.
pub const SUMMARY_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallCounters {
    pub launched: usize,
    pub completed: usize,
    pub in_flight: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    total_calls: usize,
    started: Instant,
    launched: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    last_heartbeat: Mutex<Option<Instant>>,
    heartbeat_interval: Duration,
}

impl RunContext {
    pub fn new(total_calls: usize) -> Self {
        Self::with_heartbeat_interval(total_calls, STREAM_HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat_interval(total_calls: usize, heartbeat_interval: Duration) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            total_calls,
            started: Instant::now(),
            launched: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            last_heartbeat: Mutex::new(None),
            heartbeat_interval,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Record a launch; returns the launched count including this call.
    pub fn call_launched(&self) -> usize {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.launched.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a settled call; returns the completed count including this call.
    pub fn call_settled(&self) -> usize {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a call that ended without producing a result (error or abort).
    pub fn call_dropped(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn counters(&self) -> CallCounters {
        CallCounters {
            launched: self.launched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            total: self.total_calls,
        }
    }

    /// True at most once per heartbeat interval.
    pub fn try_heartbeat(&self) -> bool {
        let mut last = self
            .last_heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.heartbeat_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Whether `completed` is the final call or the first call into a new tenth of `total`.
pub fn crosses_decile(completed: usize, total: usize) -> bool {
    if total == 0 || completed == 0 {
        return false;
    }
    completed >= total || completed * 10 / total > (completed - 1) * 10 / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let ctx = RunContext::new(4);
        assert_eq!(ctx.call_launched(), 1);
        assert_eq!(ctx.call_launched(), 2);
        assert_eq!(ctx.call_settled(), 1);
        ctx.call_dropped();

        assert_eq!(
            ctx.counters(),
            CallCounters {
                launched: 2,
                completed: 1,
                in_flight: 0,
                total: 4,
            }
        );
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        assert_ne!(RunContext::new(1).run_id(), RunContext::new(1).run_id());
    }

    #[test]
    fn test_heartbeat_rate_limit() {
        let ctx = RunContext::with_heartbeat_interval(1, Duration::from_secs(3600));
        assert!(ctx.try_heartbeat());
        assert!(!ctx.try_heartbeat());

        let ctx = RunContext::with_heartbeat_interval(1, Duration::ZERO);
        assert!(ctx.try_heartbeat());
        assert!(ctx.try_heartbeat());
    }

    #[test]
    fn test_crosses_decile() {
        let fired: Vec<usize> = (1..=20).filter(|&c| crosses_decile(c, 20)).collect();
        assert_eq!(fired, vec![2, 4, 6, 8, 10, 12, 14, 16, 18, 20]);

        let fired: Vec<usize> = (1..=4).filter(|&c| crosses_decile(c, 4)).collect();
        assert_eq!(fired, vec![1, 2, 3, 4]);

        assert!(!crosses_decile(0, 10));
        assert!(!crosses_decile(3, 0));
    }
}
