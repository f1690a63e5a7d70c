use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use rand::Rng;

use clockwork_core::clock::SharedClock;
use clockwork_core::frames::PAGE_SIZE;
use clockwork_core::mailbox::WorkerPort;
use clockwork_proto::{Message, MessageCode, Pid};

/// Per-iteration chance of self-termination, in permille (0.1 %).
const TERMINATION_CHANCE: u32 = 1;

/// Chance a generated access is a read rather than a write, in percent.
const READ_CHANCE: u32 = 85;

/// Highest page number a worker will touch.
const MAX_PAGE: u32 = 63;

/// How a worker left its loop. The in-process analog of an exit status:
/// only `Normal` counts as a clean self-termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Normal,
    /// The manager raised the kill switch during shutdown.
    Killed,
    /// A second reply after `Blocked` was not `Granted`, or a reply carried
    /// an unknown code.
    ProtocolViolation,
    /// A mailbox send or receive failed outright.
    MailboxDown,
}

/// The shared resources a worker attaches to at startup.
pub struct WorkerContext {
    pub pid: Pid,
    pub port: WorkerPort,
    pub clock: Arc<SharedClock>,
    pub kill_switch: Arc<AtomicBool>,
}

/// Worker entry point: generate randomized accesses against the manager
/// until a termination draw, a kill order, or a fatal protocol error.
pub fn run(ctx: WorkerContext) -> WorkerExit {
    let mut rng = rand::thread_rng();
    info!("Worker {} starting at {}", ctx.pid, ctx.clock.now());

    loop {
        if ctx.kill_switch.load(Ordering::SeqCst) {
            debug!("Worker {} observed the kill switch", ctx.pid);
            return WorkerExit::Killed;
        }
        if rng.gen_range(0..1000) < TERMINATION_CHANCE {
            info!("Worker {} randomly terminating at {}", ctx.pid, ctx.clock.now());
            return WorkerExit::Normal;
        }

        let page = rng.gen_range(0..=MAX_PAGE);
        let offset = rng.gen_range(0..PAGE_SIZE);
        let address = page * PAGE_SIZE + offset;
        let code = if rng.gen_range(1..=100) <= READ_CHANCE {
            MessageCode::RequestRead
        } else {
            MessageCode::RequestWrite
        };

        if ctx.port.send(Message::request(code, address, ctx.pid)).is_err() {
            error!("Worker {} lost the mailbox while sending", ctx.pid);
            return WorkerExit::MailboxDown;
        }

        let reply = match ctx.port.recv() {
            Ok(msg) => msg,
            Err(_) => return WorkerExit::MailboxDown,
        };
        match reply.code {
            MessageCode::Granted => {}
            MessageCode::Blocked => {
                // Interim notice: stay blocked until the page is resident.
                let followup = match ctx.port.recv() {
                    Ok(msg) => msg,
                    Err(_) => return WorkerExit::MailboxDown,
                };
                if followup.code != MessageCode::Granted {
                    error!(
                        "Worker {} unblocked with {:?} instead of Granted",
                        ctx.pid, followup.code
                    );
                    return WorkerExit::ProtocolViolation;
                }
            }
            other => {
                error!("Worker {} received unexpected reply {:?}", ctx.pid, other);
                return WorkerExit::ProtocolViolation;
            }
        }
    }
}
