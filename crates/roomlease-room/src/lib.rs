//! Room lifecycle for roomlease: provisioning, release and vacancy.
//!
//! Every booked room goes through the [`ReleaseCoordinator`]:
//!
//! - **Admission** reserves the owner's slot, creates the access role and
//!   the room through a [`RoomProvisioner`], arms the expiry timer and
//!   commits the lease. A failure part-way rolls back what was created.
//! - **Release** is single-shot. Expiry, vacancy, owner cancel and
//!   shutdown all call into the coordinator; whichever takes the lease out
//!   of the store first logs the session and tears the room down, the rest
//!   do nothing.
//!
//! The [`OccupancyWatcher`] turns "room became empty" events from the
//! platform into vacancy releases.
//!
//! # Key types
//!
//! - [`RoomProvisioner`]: the platform port (create/destroy room and role)
//! - [`ReleaseCoordinator`]: admission and exactly-once release
//! - [`OccupancyWatcher`]: vacancy event consumer
//! - [`ReleaseOutcome`]: what a winning release did

#![allow(async_fn_in_trait)]

mod coordinator;
mod error;
mod provisioner;
mod watcher;

pub use coordinator::{ReleaseCoordinator, ReleaseOutcome, ReleaseTrigger};
pub use error::{ProvisionError, RoomError, TeardownError};
pub use provisioner::{AccessPolicy, RoomProvisioner, role_name, room_name};
pub use watcher::{OccupancyWatcher, VacancyEvent};
