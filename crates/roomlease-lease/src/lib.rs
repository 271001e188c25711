//! Active lease bookkeeping for roomlease.
//!
//! This crate owns the authoritative map of active leases:
//!
//! 1. **Admission**: validate a booking and claim the owner's single slot
//!    before anything external happens ([`LeaseStore::reserve`])
//! 2. **Tracking**: know which room belongs to which owner, and for how
//!    long ([`LeaseInfo`])
//! 3. **Removal**: hand each lease out of the store exactly once
//!    ([`LeaseStore::remove`]), which is what makes release single-shot
//!
//! # How it fits in the stack
//!
//! ```text
//! Release Coordinator (above)  ← serializes access behind one mutex
//!     ↕
//! Lease Store (this crate)  ← owner slots, resource → lease map
//!     ↕
//! Protocol + Timer (below)  ← ids, topics, timer handles
//! ```

mod config;
mod error;
mod lease;
mod store;

pub use config::LeaseConfig;
pub use error::LeaseError;
pub use lease::{Lease, LeaseInfo, Reservation, RoomGrant};
pub use store::{LeaseStore, OwnerState};
