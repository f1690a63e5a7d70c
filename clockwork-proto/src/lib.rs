//! The CLOCKWORK message protocol.
//!
//! Defined once and imported by both roles (manager and workers) so the two
//! sides can never drift apart on message layout or codes.

/// Identifier of a simulated process. The manager reserves [`MANAGER_PID`];
/// workers are numbered from 1 in launch order.
pub type Pid = u32;

/// Well-known destination tag for the manager's end of the mailbox.
pub const MANAGER_PID: Pid = 0;

/// Message codes carried over the mailbox.
///
/// `RequestRead`/`RequestWrite` flow worker -> manager; `Granted`/`Blocked`
/// flow back. A miss always produces `Blocked` first (interim notice) and
/// `Granted` once the page is resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    RequestRead,
    RequestWrite,
    Granted,
    Blocked,
}

/// A single mailbox message. Ephemeral: exists only in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Destination tag: [`MANAGER_PID`] or a worker pid.
    pub destination: Pid,
    pub code: MessageCode,
    /// Virtual memory address the request concerns (echoed back in replies).
    pub address: u32,
    pub sender: Pid,
}

impl Message {
    /// A memory-access request addressed to the manager.
    pub fn request(code: MessageCode, address: u32, sender: Pid) -> Self {
        Self {
            destination: MANAGER_PID,
            code,
            address,
            sender,
        }
    }

    /// A manager reply addressed to a worker.
    pub fn reply(to: Pid, code: MessageCode, address: u32) -> Self {
        Self {
            destination: to,
            code,
            address,
            sender: MANAGER_PID,
        }
    }
}
