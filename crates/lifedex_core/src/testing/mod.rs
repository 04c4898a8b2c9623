//! Deterministic doubles for tests and offline simulations.
//!
//! # Responsibility
//! - `ManualClock`: time that moves only when advanced, shared across clones.
//! - `MemoryStore`: in-process `KeyValueStore` with a byte quota and write
//!   counters for asserting what persistence actually wrote.
//!
//! Nothing in the production session or CLI path depends on this module.

mod manual_clock;
mod memory_store;

pub use manual_clock::ManualClock;
pub use memory_store::MemoryStore;
