//! The admission engine.
//!
//! For every request key the engine answers one question: has this key been
//! seen too often inside the trailing window? It is built from four parts:
//!
//! 1. **Hash provider** (`hash.rs`): maps a key to a fixed-width
//!    [`Fingerprint`]; encoding failures degrade to a sentinel value.
//!
//! 2. **Key counter** (`counter.rs`): concurrent fingerprint → count map with
//!    atomic increments.
//!
//! 3. **Expiry queue** (`queue.rs`): FIFO of `(fingerprint, first seen)`
//!    records with a conditional pop on the head, split into head and tail locks.
//!
//! 4. **Sweep pool** (`sweeper.rs`): workers sharing one timer that pop expired
//!    records and reset the matching counter entries.
//!
//! [`AdmissionService`] wires them together. Counting is exact per
//! fingerprint; expiry is a fixed window starting at a key's first occurrence.

mod counter;
mod hash;
mod queue;
mod record;
mod service;
mod sweeper;

pub use counter::{ConcurrentHashCounter, Counter};
pub use hash::{AHashProvider, HashProvider, KeyEncoder, RawBytes, Utf8Bytes};
pub use queue::{ConditionalQueue, TwoLockQueue};
pub use record::{ExpiryRecord, Fingerprint, SENTINEL_FINGERPRINT};
pub use service::{AdmissionConfig, AdmissionService};
pub use sweeper::{SweepPool, Sweeper};
