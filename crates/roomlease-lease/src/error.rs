//! Error types for the lease layer.

use roomlease_protocol::{ResourceId, UserId};

/// Errors that can occur while admitting or looking up leases.
///
/// Every admission error is raised before any external resource is
/// created, so none of them needs a rollback.
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// The owner already holds a lease, or has one being provisioned or
    /// released. `resource` is `None` while the other booking is still
    /// being provisioned.
    #[error("user {owner} already has an active room{}", room_suffix(.resource))]
    AlreadyLeased {
        owner: UserId,
        resource: Option<ResourceId>,
    },

    /// The requested duration is outside the configured range.
    #[error("duration of {minutes} minutes is outside {min}..={max}")]
    InvalidDuration { minutes: u32, min: u32, max: u32 },

    /// The topic is empty or too long.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// The provisioner handed back a room that is already leased.
    #[error("resource {0} is already leased")]
    DuplicateResource(ResourceId),

    /// The owner has no active lease to act on.
    #[error("user {0} has no active room")]
    NoActiveLease(UserId),
}

fn room_suffix(resource: &Option<ResourceId>) -> String {
    match resource {
        Some(r) => format!(" ({r})"),
        None => String::new(),
    }
}
