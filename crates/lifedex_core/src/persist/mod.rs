//! Debounced, degrading persistence of the full document.
//!
//! # Responsibility
//! - Encode/decode the persisted envelope.
//! - Coalesce bursts of scheduled writes into one store write.
//! - Degrade oversized or rejected payloads by stripping embedded
//!   attachment payloads, retrying once.
//!
//! # Invariants
//! - Every write is a full-document replace under one key.
//! - Persistence failures are reported as `WriteOutcome::Failed`, never as
//!   errors to the caller.

pub mod codec;
pub mod guard;
pub mod scheduler;

pub use codec::{decode, encode, encode_pretty, load_state, strip_embedded_payloads};
pub use guard::ReentrancyGuard;
pub use scheduler::{PersistenceScheduler, WriteOutcome};
