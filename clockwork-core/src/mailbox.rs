use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use clockwork_proto::{Message, Pid, MANAGER_PID};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("no route to destination pid {0}")]
    UnknownDestination(Pid),
    #[error("mailbox channel disconnected")]
    Disconnected,
}

/// The manager's end of the shared, destination-tagged message channel.
///
/// Every worker gets its own reply lane, opened when the worker is
/// registered. Delivery is FIFO per destination tag; `send` routes on the
/// message's destination and never blocks the sender.
pub struct Mailbox {
    inbox: Receiver<Message>,
    inbox_tx: Sender<Message>,
    routes: HashMap<Pid, Sender<Message>>,
}

/// A worker's end of the mailbox: fire-and-forget send toward the manager,
/// blocking receive on the worker's own tag.
pub struct WorkerPort {
    to_manager: Sender<Message>,
    from_manager: Receiver<Message>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (inbox_tx, inbox) = mpsc::channel();
        Self {
            inbox,
            inbox_tx,
            routes: HashMap::new(),
        }
    }

    /// Registers a reply lane for `pid` and hands back the worker's end.
    pub fn open_port(&mut self, pid: Pid) -> WorkerPort {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.routes.insert(pid, reply_tx);
        WorkerPort {
            to_manager: self.inbox_tx.clone(),
            from_manager: reply_rx,
        }
    }

    /// Drops the reply lane for `pid`. A worker still blocked on its receive
    /// observes the disconnect and exits.
    pub fn close_port(&mut self, pid: Pid) {
        self.routes.remove(&pid);
    }

    /// Drops every reply lane. Part of the shutdown funnel.
    pub fn close_all_ports(&mut self) {
        self.routes.clear();
    }

    /// Non-blocking poll of the manager's own tag. An empty inbox is not an
    /// error — the tick simply proceeds without a message.
    pub fn poll(&self) -> Option<Message> {
        match self.inbox.try_recv() {
            Ok(msg) => Some(msg),
            // We hold a sender ourselves, so Disconnected is unreachable
            // while the mailbox is alive; treat it like an empty inbox.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Routes `msg` by its destination tag.
    pub fn send(&self, msg: Message) -> Result<(), MailboxError> {
        if msg.destination == MANAGER_PID {
            return self.inbox_tx.send(msg).map_err(|_| MailboxError::Disconnected);
        }
        self.routes
            .get(&msg.destination)
            .ok_or(MailboxError::UnknownDestination(msg.destination))?
            .send(msg)
            .map_err(|_| MailboxError::Disconnected)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPort {
    pub fn send(&self, msg: Message) -> Result<(), MailboxError> {
        self.to_manager
            .send(msg)
            .map_err(|_| MailboxError::Disconnected)
    }

    /// Blocks until a message tagged to this worker arrives.
    pub fn recv(&self) -> Result<Message, MailboxError> {
        self.from_manager
            .recv()
            .map_err(|_| MailboxError::Disconnected)
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&self) -> Option<Message> {
        self.from_manager.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clockwork_proto::MessageCode;
    use std::thread;

    #[test]
    fn poll_on_empty_inbox_is_not_an_error() {
        let mut mailbox = Mailbox::new();
        let _port = mailbox.open_port(1);
        assert!(mailbox.poll().is_none());
    }

    #[test]
    fn delivery_is_fifo_per_destination() {
        let mut mailbox = Mailbox::new();
        let port = mailbox.open_port(1);

        port.send(Message::request(MessageCode::RequestRead, 10, 1))
            .unwrap();
        port.send(Message::request(MessageCode::RequestWrite, 20, 1))
            .unwrap();
        assert_eq!(mailbox.poll().unwrap().address, 10);
        assert_eq!(mailbox.poll().unwrap().address, 20);
        assert!(mailbox.poll().is_none());

        mailbox
            .send(Message::reply(1, MessageCode::Blocked, 30))
            .unwrap();
        mailbox
            .send(Message::reply(1, MessageCode::Granted, 30))
            .unwrap();
        assert_eq!(port.recv().unwrap().code, MessageCode::Blocked);
        assert_eq!(port.recv().unwrap().code, MessageCode::Granted);
    }

    #[test]
    fn send_to_unknown_destination_fails() {
        let mailbox = Mailbox::new();
        let err = mailbox
            .send(Message::reply(7, MessageCode::Granted, 0))
            .unwrap_err();
        assert!(matches!(err, MailboxError::UnknownDestination(7)));
    }

    #[test]
    fn blocking_receive_wakes_on_send() {
        let mut mailbox = Mailbox::new();
        let port = mailbox.open_port(3);

        let receiver = thread::spawn(move || port.recv().unwrap());
        mailbox
            .send(Message::reply(3, MessageCode::Granted, 42))
            .unwrap();
        let msg = receiver.join().unwrap();
        assert_eq!(msg.address, 42);
    }

    #[test]
    fn closed_port_disconnects_a_blocked_worker() {
        let mut mailbox = Mailbox::new();
        let port = mailbox.open_port(5);

        let receiver = thread::spawn(move || port.recv());
        mailbox.close_port(5);
        assert!(matches!(
            receiver.join().unwrap(),
            Err(MailboxError::Disconnected)
        ));
    }
}
