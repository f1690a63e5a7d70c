//! Core library for the CLOCKWORK virtual-memory simulator.
//!
//! Everything with real state and invariants lives here: the virtual clock,
//! the destination-tagged mailbox, the bounded process registry with its
//! launch gate, and the second-chance frame table. The `clockwork-sim`
//! binary wires these together into the manager tick loop and the worker
//! loops.

pub mod clock;
pub mod frames;
pub mod mailbox;
pub mod registry;
