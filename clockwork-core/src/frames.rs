use clockwork_proto::Pid;

/// Address units per page; `page = address / PAGE_SIZE`.
pub const PAGE_SIZE: u32 = 1024;

/// Size of the global physical frame pool.
pub const FRAME_COUNT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// One physical frame: a single (owner, page) mapping plus the two
/// second-chance metadata bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame {
    pub owner: Option<Pid>,
    pub page_number: u32,
    pub second_chance: bool,
    pub dirty: bool,
}

/// What loading a page into the table displaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    /// The victim held modified data; the manager logs a simulated
    /// write-back before the frame is overwritten.
    pub dirty_writeback: bool,
    /// The mapping that was displaced, if the victim frame was in use.
    pub evicted: Option<(Pid, u32)>,
}

/// Fixed pool of physical frames with second-chance (clock) eviction.
///
/// The hand is persistent across calls and resets only at construction.
/// Clearing a set bit always advances the hand, so under sustained pressure
/// every frame is reconsidered within two full passes — recently touched
/// pages are protected without exact recency tracking.
pub struct FrameTable {
    frames: Vec<Frame>,
    hand: usize,
}

impl FrameTable {
    /// A table of `frame_count` empty frames, hand at frame 0.
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![Frame::default(); frame_count],
            hand: 0,
        }
    }

    pub fn page_of(address: u32) -> u32 {
        address / PAGE_SIZE
    }

    /// Linear scan for an exact (owner, page) match.
    pub fn lookup(&self, pid: Pid, page_number: u32) -> Option<usize> {
        self.frames
            .iter()
            .position(|frame| frame.owner == Some(pid) && frame.page_number == page_number)
    }

    /// Hit path: mark the frame recently used, and dirty on a write.
    pub fn record_hit(&mut self, index: usize, kind: AccessKind) {
        let frame = &mut self.frames[index];
        if kind == AccessKind::Write {
            frame.dirty = true;
        }
        frame.second_chance = true;
    }

    /// Miss path: second-chance scan from the hand for a victim, then load
    /// the new mapping into it.
    ///
    /// Callers only invoke this after `lookup` misses, which is what keeps a
    /// (pid, page) pair mapped by at most one frame.
    pub fn load(&mut self, pid: Pid, page_number: u32, kind: AccessKind) -> Eviction {
        loop {
            let frame = &mut self.frames[self.hand];
            if frame.second_chance {
                // Spare it this pass; the cleared bit makes it eligible on
                // the next one.
                frame.second_chance = false;
                self.hand = (self.hand + 1) % self.frames.len();
                continue;
            }

            let eviction = Eviction {
                dirty_writeback: frame.dirty,
                evicted: frame.owner.map(|owner| (owner, frame.page_number)),
            };
            *frame = Frame {
                owner: Some(pid),
                page_number,
                second_chance: true,
                dirty: kind == AccessKind::Write,
            };
            self.hand = (self.hand + 1) % self.frames.len();
            return eviction;
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Full table view for the reporter.
    pub fn snapshot(&self) -> &[Frame] {
        &self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn access(table: &mut FrameTable, pid: Pid, page: u32, kind: AccessKind) -> Option<Eviction> {
        match table.lookup(pid, page) {
            Some(index) => {
                table.record_hit(index, kind);
                None
            }
            None => Some(table.load(pid, page, kind)),
        }
    }

    #[test]
    fn addresses_map_to_pages_by_division() {
        assert_eq!(FrameTable::page_of(0), 0);
        assert_eq!(FrameTable::page_of(1023), 0);
        // 1024 and 1535 share a page.
        assert_eq!(FrameTable::page_of(1024), 1);
        assert_eq!(FrameTable::page_of(1535), 1);
        assert_eq!(FrameTable::page_of(64 * 1024 - 1), 63);
    }

    #[test]
    fn read_hits_never_touch_the_dirty_bit() {
        let mut table = FrameTable::new(4);
        table.load(1, 0, AccessKind::Read);
        let index = table.lookup(1, 0).unwrap();
        assert!(!table.snapshot()[index].dirty);

        table.record_hit(index, AccessKind::Read);
        table.record_hit(index, AccessKind::Read);
        assert!(!table.snapshot()[index].dirty);

        table.record_hit(index, AccessKind::Write);
        assert!(table.snapshot()[index].dirty);
        // Dirty stays set across later reads until the frame is reloaded.
        table.record_hit(index, AccessKind::Read);
        assert!(table.snapshot()[index].dirty);
    }

    #[test]
    fn untouched_pages_are_evicted_in_load_order() {
        let mut table = FrameTable::new(2);
        assert_eq!(access(&mut table, 1, 0, AccessKind::Read), Some(Eviction { dirty_writeback: false, evicted: None }));
        assert_eq!(access(&mut table, 1, 1, AccessKind::Read), Some(Eviction { dirty_writeback: false, evicted: None }));

        // Neither resident page was hit again, so the scan clears both bits
        // and the third access evicts the frame holding page 0.
        let eviction = access(&mut table, 1, 2, AccessKind::Read).unwrap();
        assert_eq!(eviction.evicted, Some((1, 0)));
    }

    #[test]
    fn a_hit_buys_one_extra_eviction_pass() {
        let mut table = FrameTable::new(2);
        access(&mut table, 1, 0, AccessKind::Read);
        // Re-reference page 0: its bit is set, so it survives one pass.
        assert_eq!(access(&mut table, 1, 0, AccessKind::Read), None);

        let first = access(&mut table, 1, 10, AccessKind::Read).unwrap();
        assert_eq!(first.evicted, None, "page 0 must survive the first miss");
        assert!(table.lookup(1, 0).is_some());

        let second = access(&mut table, 1, 11, AccessKind::Read).unwrap();
        assert_eq!(second.evicted, Some((1, 0)));
    }

    #[test]
    fn dirty_victim_requires_a_writeback() {
        let mut table = FrameTable::new(1);
        table.load(1, 0, AccessKind::Write);
        let eviction = table.load(1, 1, AccessKind::Read);
        assert!(eviction.dirty_writeback);
        assert_eq!(eviction.evicted, Some((1, 0)));

        // The reloaded frame took a read, so the next victim is clean.
        let eviction = table.load(1, 2, AccessKind::Read);
        assert!(!eviction.dirty_writeback);
    }

    #[test]
    fn the_hand_starves_no_frame() {
        const F: usize = 8;
        let mut table = FrameTable::new(F);
        for page in 0..F as u32 {
            table.load(1, page, AccessKind::Read);
        }

        // Under continuous distinct-page pressure, every frame must be
        // reconsidered as a victim within 2*F further accesses.
        let mut victimized = [false; F];
        for page in 0..(2 * F) as u32 {
            let before: Vec<Option<Pid>> =
                table.snapshot().iter().map(|frame| frame.owner).collect();
            let fresh = 1_000 + page;
            table.load(1, fresh, AccessKind::Read);
            let index = table.lookup(1, fresh).unwrap();
            assert!(before[index].is_some());
            victimized[index] = true;
        }
        assert!(victimized.iter().all(|&hit| hit));
    }

    #[test]
    fn no_mapping_is_ever_duplicated() {
        let mut table = FrameTable::new(16);
        let mut rng = rand::thread_rng();
        for _ in 0..2_000 {
            let pid: Pid = rng.gen_range(1..=4);
            let page: u32 = rng.gen_range(0..32);
            let kind = if rng.gen_range(1..=100) <= 85 {
                AccessKind::Read
            } else {
                AccessKind::Write
            };
            access(&mut table, pid, page, kind);

            let mut seen = std::collections::HashSet::new();
            for frame in table.snapshot() {
                if let Some(owner) = frame.owner {
                    assert!(
                        seen.insert((owner, frame.page_number)),
                        "duplicate mapping for ({}, {})",
                        owner,
                        frame.page_number
                    );
                }
            }
        }
    }
}
