//! # roomlease
//!
//! Timed, cancelable room leases with race-safe single-shot release.
//!
//! A booking creates a private room for two people. The room goes away
//! when its time runs out, when it empties, when the owner cancels, or
//! when the service stops, whichever happens first, and exactly one
//! session record is logged for it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomlease::prelude::*;
//!
//! // Implement RoomProvisioner for your platform, then:
//! // let service = RoomLeaseService::builder()
//! //     .build(my_provisioner, MemoryLedger::new());
//! // service.book(&request).await?;
//! ```

mod config;
mod error;
mod logging;
mod service;

pub use config::ServiceConfig;
pub use error::RoomLeaseError;
pub use logging::{init_tracing, init_tracing_with};
pub use service::{RoomLeaseService, RoomLeaseServiceBuilder};

pub mod prelude {
    pub use crate::{RoomLeaseError, RoomLeaseService, RoomLeaseServiceBuilder, ServiceConfig};

    pub use roomlease_lease::{LeaseConfig, LeaseError, LeaseInfo};
    pub use roomlease_ledger::{
        FileLedger, LedgerError, MemoryLedger, SessionLedger, StudyTotals, WeeklyReport,
    };
    pub use roomlease_protocol::{
        BookingRequest, ReleaseReason, ResourceId, RoleId, SessionRecord, Topic, UserId,
    };
    pub use roomlease_room::{
        AccessPolicy, ProvisionError, ReleaseOutcome, ReleaseTrigger, RoomError, RoomProvisioner,
        TeardownError, VacancyEvent,
    };
}
