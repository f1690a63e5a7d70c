use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Virtual time consumed by one manager scheduling tick (10 ms).
pub const DISPATCH_QUANTUM: u64 = 10_000_000;

/// Virtual cost charged for an access that hits a resident frame.
pub const HIT_ACCESS_COST: u64 = 100;

/// Virtual cost charged when a worker is launched.
pub const LAUNCH_COST: u64 = 1_000;

/// A point in simulated time.
///
/// Invariant: `nanoseconds` is always renormalized below one second; any
/// overflow carries into `seconds`. Addition is by value — callers get a new
/// reading, never a mutated alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualClock {
    pub seconds: u64,
    pub nanoseconds: u32,
}

impl VirtualClock {
    pub fn new(seconds: u64, nanoseconds: u64) -> Self {
        let mut clock = Self {
            seconds,
            nanoseconds: 0,
        };
        clock.advance(nanoseconds);
        clock
    }

    /// Adds `delta_nanos`, carrying overflow into the seconds field.
    pub fn advance(&mut self, delta_nanos: u64) {
        let total = self.nanoseconds as u64 + delta_nanos;
        self.seconds += total / NANOS_PER_SEC;
        self.nanoseconds = (total % NANOS_PER_SEC) as u32;
    }

    pub fn as_nanos(&self) -> u64 {
        self.seconds * NANOS_PER_SEC + self.nanoseconds as u64
    }

    /// Virtual nanoseconds elapsed since `earlier`. Saturates at zero if
    /// `earlier` is in the future.
    pub fn nanos_since(&self, earlier: VirtualClock) -> u64 {
        self.as_nanos().saturating_sub(earlier.as_nanos())
    }
}

impl fmt::Display for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanoseconds)
    }
}

/// The shared virtual clock: written by the manager once per tick, read by
/// every worker.
///
/// The two fields are separate atomics, so a reader racing the writer can
/// observe a reading one store stale. That is acceptable by design: nothing
/// in the system needs a reading fresher than whole-tick granularity, and
/// there is exactly one writer.
#[derive(Debug, Default)]
pub struct SharedClock {
    seconds: AtomicU64,
    nanoseconds: AtomicU64,
}

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> VirtualClock {
        VirtualClock {
            seconds: self.seconds.load(Ordering::Relaxed),
            nanoseconds: self.nanoseconds.load(Ordering::Relaxed) as u32,
        }
    }

    /// Advances the clock by `delta_nanos`. Manager only — the single-writer
    /// discipline is what makes the load/modify/store below safe.
    pub fn advance(&self, delta_nanos: u64) {
        let mut next = self.now();
        next.advance(delta_nanos);
        self.nanoseconds
            .store(next.nanoseconds as u64, Ordering::Relaxed);
        self.seconds.store(next.seconds, Ordering::Relaxed);
    }
}
