//! Unified error type for roomlease.

use roomlease_lease::LeaseError;
use roomlease_ledger::LedgerError;
use roomlease_protocol::ProtocolError;
use roomlease_room::{ProvisionError, RoomError};

/// The one error type service callers handle.
///
/// Every layer's error converts into it with `?`. Coordinator errors are
/// unwrapped so callers match `Lease(AlreadyLeased { .. })` directly.
#[derive(Debug, thiserror::Error)]
pub enum RoomLeaseError {
    /// Booking rejected or no lease to act on.
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// Room or role creation failed (already rolled back).
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The session ledger could not be read or written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A record or value could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for [`ServiceConfig`](crate::ServiceConfig).
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<RoomError> for RoomLeaseError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::Lease(e) => Self::Lease(e),
            RoomError::Provision(e) => Self::Provision(e),
        }
    }
}
