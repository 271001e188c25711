//! Durable, append-only record of completed sessions.
//!
//! Every released lease leaves exactly one [`SessionRecord`] behind. The
//! ledger stores those records and answers the two questions the command
//! surface asks of them: "how long has this user studied in total?" and
//! "what happened in the last week?".
//!
//! # Key types
//!
//! - [`SessionLedger`]: the storage trait the release coordinator writes to
//! - [`FileLedger`]: JSON Lines file, one row per session, synced per append
//! - [`MemoryLedger`]: in-process ledger for tests and demos
//! - [`StudyTotals`], [`WeeklyReport`]: aggregates for stats and charts
//!
//! [`SessionRecord`]: roomlease_protocol::SessionRecord

#![allow(async_fn_in_trait)]

mod error;
mod file;
mod ledger;
mod memory;
mod report;

pub use error::LedgerError;
pub use file::FileLedger;
pub use ledger::{LedgerRow, SessionLedger};
pub use memory::MemoryLedger;
pub use report::{DayUsage, StudyTotals, WeeklyReport};
