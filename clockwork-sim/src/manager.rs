use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use clockwork_core::clock::{SharedClock, DISPATCH_QUANTUM, HIT_ACCESS_COST, LAUNCH_COST};
use clockwork_core::frames::{AccessKind, FrameTable, FRAME_COUNT};
use clockwork_core::mailbox::Mailbox;
use clockwork_core::registry::{LaunchGate, ProcessRegistry};
use clockwork_proto::{Message, MessageCode, Pid, MANAGER_PID};

use crate::config::Args;
use crate::report::Reporter;
use crate::worker::{self, WorkerContext, WorkerExit};

/// Run-wide counters, owned and mutated by the manager alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub memory_accesses: u64,
    pub page_faults: u64,
}

/// The coordinating process: owns the clock, the registry, the frame table,
/// and its end of the mailbox, and drives the whole simulation from a
/// single-threaded tick loop.
pub struct Manager {
    clock: Arc<SharedClock>,
    mailbox: Mailbox,
    registry: ProcessRegistry,
    gate: LaunchGate,
    frames: FrameTable,
    counters: Counters,
    workers: HashMap<Pid, JoinHandle<WorkerExit>>,
    pending_launches: u32,
    next_pid: Pid,
    kill_switch: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
    reporter: Reporter,
    started: Instant,
    deadline: Duration,
}

impl Manager {
    pub fn new(args: &Args, interrupted: Arc<AtomicBool>) -> Result<Self> {
        let reporter = Reporter::new(&args.logfile)
            .with_context(|| format!("failed to open log destination {:?}", args.logfile))?;
        Ok(Self {
            clock: Arc::new(SharedClock::new()),
            mailbox: Mailbox::new(),
            registry: ProcessRegistry::new(args.simultaneous as usize),
            gate: LaunchGate::new(args.launch_interval_nanos),
            frames: FrameTable::new(FRAME_COUNT),
            counters: Counters::default(),
            workers: HashMap::new(),
            pending_launches: args.workers,
            next_pid: MANAGER_PID + 1,
            kill_switch: Arc::new(AtomicBool::new(false)),
            interrupted,
            reporter,
            started: Instant::now(),
            deadline: Duration::from_secs(args.time_limit),
        })
    }

    /// Drives the simulation to completion. The shutdown funnel runs on
    /// every path out of the loop, fatal errors included, so no worker or
    /// shared resource outlives the run.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Manager running: {} workers total, {} slots, {} frames",
            self.pending_launches,
            self.registry.capacity(),
            self.frames.frame_count()
        );
        let outcome = self.run_loop();
        self.shutdown();
        outcome
    }

    fn run_loop(&mut self) -> Result<()> {
        while self.pending_launches > 0 || !self.registry.is_empty() {
            if self.started.elapsed() >= self.deadline {
                info!("Wall-clock ceiling reached, shutting down");
                return Ok(());
            }
            if self.interrupted.load(Ordering::SeqCst) {
                info!("Interrupt received, shutting down");
                return Ok(());
            }

            self.try_launch();
            self.reap_exited();

            // Exactly one non-blocking poll per tick; a quiet tick just
            // advances the clock.
            if let Some(msg) = self.mailbox.poll() {
                self.dispatch(msg)?;
            }

            self.clock.advance(DISPATCH_QUANTUM);

            let now = self.clock.now();
            if let Err(e) =
                self.reporter
                    .snapshot_if_due(now, self.registry.snapshot(), self.frames.snapshot())
            {
                warn!("Snapshot write failed: {}", e);
            }
        }
        info!("All workers launched and reaped, run complete");
        Ok(())
    }

    /// Spawns one worker if the launch gate is open and a slot is free.
    /// A full registry is not an error; the launch is retried next tick
    /// without re-arming the gate.
    fn try_launch(&mut self) {
        if self.pending_launches == 0 {
            return;
        }
        let now = self.clock.now();
        if !self.gate.ready(now) {
            return;
        }
        let pid = self.next_pid;
        let slot = match self.registry.allocate(pid, now) {
            Ok(slot) => slot,
            Err(e) => {
                debug!("Launch deferred: {}", e);
                return;
            }
        };

        let ctx = WorkerContext {
            pid,
            port: self.mailbox.open_port(pid),
            clock: Arc::clone(&self.clock),
            kill_switch: Arc::clone(&self.kill_switch),
        };
        self.workers.insert(pid, thread::spawn(move || worker::run(ctx)));
        self.next_pid += 1;
        self.pending_launches -= 1;
        self.gate.arm(now);
        self.clock.advance(LAUNCH_COST);
        info!("Launched worker {} into slot {} at {}", pid, slot, now);
    }

    /// Non-blocking reap of exited workers, via their join handles rather
    /// than the mailbox.
    fn reap_exited(&mut self) {
        let finished: Vec<Pid> = self
            .workers
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(pid, _)| *pid)
            .collect();
        for pid in finished {
            if let Some(handle) = self.workers.remove(&pid) {
                match handle.join() {
                    Ok(exit) => info!("Worker {} exited: {:?}", pid, exit),
                    Err(_) => error!("Worker {} panicked", pid),
                }
                self.registry.release(pid);
                self.mailbox.close_port(pid);
            }
        }
    }

    /// Resolves one memory-access request against the frame table.
    fn dispatch(&mut self, msg: Message) -> Result<()> {
        let kind = match msg.code {
            MessageCode::RequestRead => AccessKind::Read,
            MessageCode::RequestWrite => AccessKind::Write,
            other => {
                warn!("Ignoring unexpected {:?} from pid {}", other, msg.sender);
                return Ok(());
            }
        };
        debug!(
            "Worker {} requesting {:?} of address {} at {}",
            msg.sender,
            kind,
            msg.address,
            self.clock.now()
        );

        let page = FrameTable::page_of(msg.address);
        if let Some(index) = self.frames.lookup(msg.sender, page) {
            self.frames.record_hit(index, kind);
            self.clock.advance(HIT_ACCESS_COST);
            self.counters.memory_accesses += 1;
            self.reply(msg.sender, MessageCode::Granted, msg.address)?;
            return Ok(());
        }

        // Miss: the interim notice always goes out before resolution.
        self.reply(msg.sender, MessageCode::Blocked, msg.address)?;
        self.registry.mark_blocked(msg.sender);
        self.counters.page_faults += 1;

        let eviction = self.frames.load(msg.sender, page, kind);
        if eviction.dirty_writeback {
            info!("Swapping out dirty frame, saving to secondary storage...");
            if let Err(e) = self
                .reporter
                .note("Swapping out dirty frame, saving to secondary storage...")
            {
                warn!("Write-back notice lost: {}", e);
            }
        }
        if let Some((owner, evicted_page)) = eviction.evicted {
            debug!("Evicted page {} of worker {}", evicted_page, owner);
        }
        self.counters.memory_accesses += 1;
        self.reply(msg.sender, MessageCode::Granted, msg.address)
    }

    fn reply(&self, to: Pid, code: MessageCode, address: u32) -> Result<()> {
        self.mailbox
            .send(Message::reply(to, code, address))
            .with_context(|| format!("reply {:?} to worker {} failed", code, to))
    }

    /// The single recovery funnel: force-terminate every registered worker
    /// and emit the final report, whatever brought the loop down.
    fn shutdown(&mut self) {
        info!(
            "Shutting down: terminating {} registered workers",
            self.registry.occupied_count()
        );
        self.kill_switch.store(true, Ordering::SeqCst);
        // Dropping the reply lanes unblocks any worker stuck in a receive.
        self.mailbox.close_all_ports();
        for (pid, handle) in self.workers.drain() {
            match handle.join() {
                Ok(exit) => debug!("Worker {} terminated: {:?}", pid, exit),
                Err(_) => error!("Worker {} panicked during shutdown", pid),
            }
            self.registry.release(pid);
        }

        if let Err(e) = self.reporter.final_report(self.counters, self.started.elapsed()) {
            error!("Failed to write final report: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_args(name: &str, workers: u32) -> Args {
        Args {
            workers,
            simultaneous: 2,
            launch_interval_nanos: 1_000,
            logfile: std::env::temp_dir().join(format!("clockwork-{}.log", name)),
            time_limit: 30,
        }
    }

    fn request(code: MessageCode, address: u32, sender: Pid) -> Message {
        Message::request(code, address, sender)
    }

    #[test]
    fn a_miss_replies_blocked_then_granted() {
        let args = test_args("miss", 0);
        let mut manager = Manager::new(&args, Arc::new(AtomicBool::new(false))).unwrap();
        let port = manager.mailbox.open_port(7);
        manager.registry.allocate(7, manager.clock.now()).unwrap();

        manager
            .dispatch(request(MessageCode::RequestRead, 100, 7))
            .unwrap();
        assert_eq!(port.try_recv().unwrap().code, MessageCode::Blocked);
        assert_eq!(port.try_recv().unwrap().code, MessageCode::Granted);
        assert!(port.try_recv().is_none());
        assert_eq!(manager.counters.page_faults, 1);
        assert_eq!(manager.counters.memory_accesses, 1);
    }

    #[test]
    fn a_hit_replies_granted_exactly_once() {
        let args = test_args("hit", 0);
        let mut manager = Manager::new(&args, Arc::new(AtomicBool::new(false))).unwrap();
        let port = manager.mailbox.open_port(7);
        manager.registry.allocate(7, manager.clock.now()).unwrap();

        // Load the page, then hit it: addresses 1024 and 1535 share page 1.
        manager
            .dispatch(request(MessageCode::RequestWrite, 1024, 7))
            .unwrap();
        let _ = port.try_recv();
        let _ = port.try_recv();

        let before = manager.clock.now();
        manager
            .dispatch(request(MessageCode::RequestRead, 1535, 7))
            .unwrap();
        assert_eq!(port.try_recv().unwrap().code, MessageCode::Granted);
        assert!(port.try_recv().is_none());
        assert_eq!(manager.counters.page_faults, 1);
        assert_eq!(manager.counters.memory_accesses, 2);
        assert_eq!(manager.clock.now().nanos_since(before), HIT_ACCESS_COST);
    }

    #[test]
    fn a_full_run_reaps_every_worker() {
        let args = test_args("run", 3);
        let mut manager = Manager::new(&args, Arc::new(AtomicBool::new(false))).unwrap();
        manager.run().unwrap();

        assert!(manager.registry.is_empty());
        assert_eq!(manager.pending_launches, 0);
        assert!(manager.workers.is_empty());
        assert!(manager.counters.memory_accesses >= manager.counters.page_faults);
    }

    #[test]
    fn an_interrupt_funnels_into_shutdown() {
        let args = test_args("interrupt", 5);
        let interrupted = Arc::new(AtomicBool::new(true));
        let mut manager = Manager::new(&args, interrupted).unwrap();
        manager.run().unwrap();
        assert!(manager.registry.is_empty());
        assert!(manager.workers.is_empty());
    }
}
