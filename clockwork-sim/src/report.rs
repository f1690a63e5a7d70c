use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use log::info;

use clockwork_core::clock::VirtualClock;
use clockwork_core::frames::Frame;
use clockwork_core::registry::ProcessSlot;

use crate::manager::Counters;

/// Virtual time between successive table snapshots (0.5 s).
const SNAPSHOT_INTERVAL: u64 = 500_000_000;

/// The reporting collaborator: renders periodic process/frame table
/// snapshots and the final counters to the configured log file, mirroring a
/// summary line to the console log.
pub struct Reporter {
    out: BufWriter<File>,
    next_snapshot: VirtualClock,
}

impl Reporter {
    pub fn new(path: &Path) -> io::Result<Self> {
        let out = BufWriter::new(File::create(path)?);
        Ok(Self {
            out,
            next_snapshot: VirtualClock::new(0, SNAPSHOT_INTERVAL),
        })
    }

    /// Free-form notice line (simulated write-backs and the like).
    pub fn note(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)
    }

    /// Emits both table snapshots if the reporting interval has elapsed.
    /// Returns whether a snapshot was written.
    pub fn snapshot_if_due(
        &mut self,
        now: VirtualClock,
        slots: &[ProcessSlot],
        frames: &[Frame],
    ) -> io::Result<bool> {
        if now < self.next_snapshot {
            return Ok(false);
        }
        self.next_snapshot.advance(SNAPSHOT_INTERVAL);

        let active = slots.iter().filter(|slot| slot.occupied).count();
        info!("Snapshot at {}: {} active workers", now, active);

        writeln!(self.out, "SysClockS: {}  SysClockNano: {}", now.seconds, now.nanoseconds)?;
        writeln!(self.out, "Process Table:")?;
        writeln!(self.out, "Entry\tOccupied\tPID\tStartS\tStartN\tBlocked\tResources")?;
        for (entry, slot) in slots.iter().enumerate() {
            let mut resources = String::new();
            for (kind, held) in slot.resources_held.iter().enumerate() {
                resources.push((b'A' + kind as u8) as char);
                resources.push(':');
                resources.push_str(&held.to_string());
                resources.push(' ');
            }
            writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                entry + 1,
                slot.occupied as u8,
                slot.pid,
                slot.start_time.seconds,
                slot.start_time.nanoseconds,
                slot.blocked as u8,
                resources
            )?;
        }

        writeln!(self.out, "Frame Table:")?;
        writeln!(self.out, "\tOwner PID\tPage Number\t2nd Chance Bit\tDirty Bit")?;
        for (index, frame) in frames.iter().enumerate() {
            writeln!(
                self.out,
                "Frame {}:\t{}\t{}\t{}\t{}",
                index + 1,
                frame.owner.unwrap_or(0),
                frame.page_number,
                frame.second_chance as u8,
                frame.dirty as u8
            )?;
        }
        self.out.flush()?;
        Ok(true)
    }

    /// The end-of-run statistics block.
    pub fn final_report(&mut self, counters: Counters, real_elapsed: Duration) -> io::Result<()> {
        let accesses = counters.memory_accesses;
        let per_second = accesses as f64 / real_elapsed.as_secs_f64().max(f64::EPSILON);
        // Guard the ratio against a run that never completed an access.
        let faults_per_access = counters.page_faults as f64 / accesses.max(1) as f64;

        info!(
            "Final report: {} faults over {} accesses ({:.1}/sec, {:.1} faults/access)",
            counters.page_faults, accesses, per_second, faults_per_access
        );

        writeln!(self.out, "\nRUN RESULT REPORT")?;
        writeln!(self.out, "Number of Page Faults: {}", counters.page_faults)?;
        writeln!(self.out, "Number of Memory Accesses: {}", accesses)?;
        writeln!(self.out, "Number of Memory Accesses per second: {:.1}", per_second)?;
        writeln!(
            self.out,
            "Average Number of Page Faults per Memory Access: {:.1}",
            faults_per_access
        )?;
        self.out.flush()
    }
}
