//! The platform port: creating and destroying rooms and access roles.
//!
//! roomlease never talks to a chat platform directly. Instead it defines
//! the [`RoomProvisioner`] trait, and the bot wiring implements it with
//! real API calls (a Discord guild, a Matrix homeserver, a test double).
//!
//! Every method is independently failable. The coordinator decides what
//! a failure means: during admission it triggers a rollback, during
//! release it is logged and the resource is recorded as orphaned.

use roomlease_protocol::{ResourceId, RoleId, Topic, UserId};

use crate::{ProvisionError, TeardownError};

/// Prefix shared by every room and role name.
const NAME_PREFIX: &str = "study";

/// Who may see and join a newly created room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// The role whose members may view and connect.
    pub role: RoleId,
    /// When `true`, everyone without `role` is denied view and connect.
    pub private: bool,
}

impl AccessPolicy {
    /// Visible to members of `role` only.
    pub fn role_only(role: RoleId) -> Self {
        Self {
            role,
            private: true,
        }
    }
}

/// Creates and destroys the external resources behind a lease.
///
/// # Trait bounds
///
/// - `Send + Sync`: the coordinator calls the provisioner from whichever
///   task wins a release, possibly several at once.
/// - `'static`: it lives as long as the service.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use roomlease_protocol::{ResourceId, RoleId, UserId};
/// use roomlease_room::{AccessPolicy, ProvisionError, RoomProvisioner, TeardownError};
///
/// /// Hands out sequential ids and never fails.
/// struct Counting(AtomicU64);
///
/// impl RoomProvisioner for Counting {
///     async fn create_role(&self, _name: &str, _members: &[UserId]) -> Result<RoleId, ProvisionError> {
///         Ok(RoleId(self.0.fetch_add(1, Ordering::Relaxed)))
///     }
///
///     async fn create_room(&self, _name: &str, _policy: &AccessPolicy) -> Result<ResourceId, ProvisionError> {
///         Ok(ResourceId(self.0.fetch_add(1, Ordering::Relaxed)))
///     }
///
///     async fn destroy_room(&self, _id: ResourceId, _reason: &str) -> Result<(), TeardownError> {
///         Ok(())
///     }
///
///     async fn destroy_role(&self, _id: RoleId, _reason: &str) -> Result<(), TeardownError> {
///         Ok(())
///     }
/// }
/// ```
pub trait RoomProvisioner: Send + Sync + 'static {
    /// Creates an access role named `name` and grants it to `members`.
    fn create_role(
        &self,
        name: &str,
        members: &[UserId],
    ) -> impl std::future::Future<Output = Result<RoleId, ProvisionError>> + Send;

    /// Creates a room named `name`, restricted by `policy`.
    fn create_room(
        &self,
        name: &str,
        policy: &AccessPolicy,
    ) -> impl std::future::Future<Output = Result<ResourceId, ProvisionError>> + Send;

    /// Deletes a room. `reason` is a human-readable audit note.
    fn destroy_room(
        &self,
        id: ResourceId,
        reason: &str,
    ) -> impl std::future::Future<Output = Result<(), TeardownError>> + Send;

    /// Deletes an access role. `reason` is a human-readable audit note.
    fn destroy_role(
        &self,
        id: RoleId,
        reason: &str,
    ) -> impl std::future::Future<Output = Result<(), TeardownError>> + Send;
}

/// Channel name for a booking, e.g. `study-calculus-review`.
pub fn room_name(topic: &Topic) -> String {
    format!("{NAME_PREFIX}-{}", topic.slug())
}

/// Access role name for an owner, e.g. `study-42-access`.
pub fn role_name(owner: UserId) -> String {
    format!("{NAME_PREFIX}-{}-access", owner.0)
}
