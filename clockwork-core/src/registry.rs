use crate::clock::VirtualClock;
use clockwork_proto::Pid;
use log::debug;
use thiserror::Error;

/// Hard ceiling on registry capacity; the CLI enforces 1..=20.
pub const MAX_SLOTS: usize = 20;

/// Number of vestigial per-process resource counters. Carried for display
/// only — nothing ever reads them for a decision.
pub const RESOURCE_KINDS: usize = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("process table is full ({0} slots occupied)")]
    Full(usize),
}

/// One entry in the bounded process table.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSlot {
    pub occupied: bool,
    pub pid: Pid,
    pub start_time: VirtualClock,
    pub blocked: bool,
    /// Display-only resource vector; excluded from every invariant.
    pub resources_held: [u32; RESOURCE_KINDS],
}

impl Default for ProcessSlot {
    fn default() -> Self {
        Self {
            occupied: false,
            pid: 0,
            start_time: VirtualClock::default(),
            blocked: false,
            resources_held: [0; RESOURCE_KINDS],
        }
    }
}

/// Fixed-capacity table of active worker slots.
///
/// Invariants: at most `capacity` slots are occupied at any time, and a pid
/// appears in at most one occupied slot.
pub struct ProcessRegistry {
    slots: Vec<ProcessSlot>,
}

impl ProcessRegistry {
    pub fn new(capacity: usize) -> Self {
        debug_assert!((1..=MAX_SLOTS).contains(&capacity));
        Self {
            slots: vec![ProcessSlot::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims a free slot for `pid`. Fails when every slot is occupied;
    /// the manager treats that as "not launch-eligible this tick".
    pub fn allocate(&mut self, pid: Pid, start_time: VirtualClock) -> Result<usize, RegistryError> {
        debug_assert!(self.index_of(pid).is_none(), "pid {} already registered", pid);
        match self.slots.iter().position(|slot| !slot.occupied) {
            Some(index) => {
                self.slots[index] = ProcessSlot {
                    occupied: true,
                    pid,
                    start_time,
                    blocked: false,
                    resources_held: [0; RESOURCE_KINDS],
                };
                Ok(index)
            }
            None => Err(RegistryError::Full(self.slots.len())),
        }
    }

    /// Clears the slot matching `pid`. A no-op on unknown pids so a stale
    /// reap can never index out of bounds.
    pub fn release(&mut self, pid: Pid) {
        match self.index_of(pid) {
            Some(index) => self.slots[index] = ProcessSlot::default(),
            None => debug!("Release of unregistered pid {} ignored", pid),
        }
    }

    /// Flags `pid` as blocked. Nothing in the core ever clears the flag
    /// again; see DESIGN.md on this write-only behavior.
    pub fn mark_blocked(&mut self, pid: Pid) {
        if let Some(index) = self.index_of(pid) {
            self.slots[index].blocked = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.slots.iter().any(|slot| slot.occupied)
    }

    pub fn all_blocked(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|slot| slot.occupied && !slot.blocked)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupied).count()
    }

    /// Full table view, unoccupied slots included, for the reporter.
    pub fn snapshot(&self) -> &[ProcessSlot] {
        &self.slots
    }

    fn index_of(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.occupied && slot.pid == pid)
    }
}

/// Rate limiter for worker launches, keyed to the virtual clock.
///
/// Re-armed only by `arm` after a successful launch; a failed eligibility
/// check leaves the gate untouched.
pub struct LaunchGate {
    interval_nanos: u64,
    last_launch: Option<VirtualClock>,
}

impl LaunchGate {
    pub fn new(interval_nanos: u64) -> Self {
        Self {
            interval_nanos,
            last_launch: None,
        }
    }

    pub fn ready(&self, now: VirtualClock) -> bool {
        match self.last_launch {
            Some(last) => now.nanos_since(last) >= self.interval_nanos,
            None => true,
        }
    }

    pub fn arm(&mut self, now: VirtualClock) {
        self.last_launch = Some(now);
    }
}
