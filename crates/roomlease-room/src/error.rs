//! Error types for the room layer.

use roomlease_lease::LeaseError;
use roomlease_protocol::{ResourceId, RoleId, UserId};

/// A room or role could not be created during admission.
///
/// Raised after the owner's slot was reserved, so the coordinator rolls
/// back whatever was already created before returning it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The access role could not be created.
    #[error("failed to create role {name}: {reason}")]
    Role { name: String, reason: String },

    /// The room could not be created.
    #[error("failed to create room {name}: {reason}")]
    Room { name: String, reason: String },

    /// The platform handed back a room id that is already leased.
    #[error("provisioned room {0} is already leased")]
    Conflict(ResourceId),

    /// The admission task was cancelled, which only happens while the
    /// runtime shuts down.
    #[error("admission for {0} was interrupted")]
    Interrupted(UserId),
}

/// A room or role could not be removed during release.
///
/// Never fatal: the release still completes, and the resource is
/// recorded as orphaned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeardownError {
    #[error("failed to destroy room {id}: {reason}")]
    Room { id: ResourceId, reason: String },

    #[error("failed to destroy role {id}: {reason}")]
    Role { id: RoleId, reason: String },
}

/// Errors returned by coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Admission was rejected, or there was no lease to act on.
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// Provisioning failed and was rolled back.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}
