//! Shared vocabulary for roomlease.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Identities** ([`UserId`], [`ResourceId`], [`RoleId`]): opaque
//!   handles for participants and the externally provisioned room/role.
//! - **Requests** ([`BookingRequest`], [`Topic`]): what a caller asks
//!   for, and the sanitized label used in external names.
//! - **Records** ([`SessionRecord`], [`ReleaseReason`]): what a finished
//!   lease leaves behind in the ledger, and why it ended.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how ledger rows are
//!   turned into bytes and back.
//!
//! # Architecture
//!
//! ```text
//! Lease Store / Ledger / Release Coordinator
//!         ↕
//! Protocol (this crate)  ← ids, records, codecs; no I/O, no locking
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BookingRequest, ReleaseReason, ResourceId, RoleId, SessionRecord, Topic,
    UserId,
};
