//! Monotonic millisecond tick counter.
//!
//! Ticks are a `u32` that wraps roughly every 49.7 days.  All elapsed-time
//! checks go through [`ticks_diff`], which stays correct across the wrap as
//! long as the two instants are less than 2^31 ms apart.

/// Milliseconds since an arbitrary origin, wrapping at 2^32.
pub type Ticks = u32;

/// Signed distance `now - then`, safe across counter wraparound.
pub fn ticks_diff(now: Ticks, then: Ticks) -> i32 {
    now.wrapping_sub(then) as i32
}

/// `true` once at least `ms` milliseconds separate `then` and `now`.
pub fn elapsed_at_least(now: Ticks, then: Ticks, ms: u32) -> bool {
    i64::from(ticks_diff(now, then)) >= i64::from(ms)
}

/// `true` once strictly more than `ms` milliseconds separate `then` and `now`.
pub fn elapsed_exceeds(now: Ticks, then: Ticks, ms: u32) -> bool {
    i64::from(ticks_diff(now, then)) > i64::from(ms)
}

// ---------------------------------------------------------------------------
// Clock sources
// ---------------------------------------------------------------------------

pub trait Clock {
    fn now_ms(&self) -> Ticks;
}

/// Tick source backed by the tokio timer, so paused-time tests drive it.
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Ticks {
        // Truncation to u32 is the wrap.
        self.origin.elapsed().as_millis() as Ticks
    }
}

// ===========================================================================
// Tests
// ===========================================================================
