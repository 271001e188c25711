//! Lease types: what the store holds for each active room.

use std::time::Duration;

use chrono::{DateTime, Utc};
use roomlease_protocol::{ResourceId, RoleId, SessionRecord, Topic, UserId};
use roomlease_timer::TimerHandle;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// RoomGrant
// ---------------------------------------------------------------------------

/// The external handles produced by provisioning one booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomGrant {
    /// The room (voice channel). Becomes the lease's key.
    pub resource_id: ResourceId,
    /// The access role granted to owner and partner.
    pub role_id: RoleId,
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// An owner slot claimed by [`LeaseStore::reserve`](crate::LeaseStore::reserve).
///
/// Holds the validated booking while external resources are created.
/// It must end in exactly one of `commit` or `abandon`; until then the
/// owner cannot book again.
#[derive(Debug)]
pub struct Reservation {
    pub(crate) owner: UserId,
    pub(crate) partner: UserId,
    pub(crate) topic: Topic,
    pub(crate) planned: Duration,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) started_at: Instant,
}

impl Reservation {
    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn partner(&self) -> UserId {
        self.partner
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The validated planned duration.
    pub fn planned(&self) -> Duration {
        self.planned
    }
}

// ---------------------------------------------------------------------------
// LeaseInfo
// ---------------------------------------------------------------------------

/// A snapshot of one active lease.
///
/// This is what lookups return. The [`Lease`] itself stays in the store
/// because it owns the expiry timer.
#[derive(Debug, Clone)]
pub struct LeaseInfo {
    pub resource_id: ResourceId,
    pub role_id: RoleId,
    pub owner: UserId,
    pub partner: UserId,
    pub topic: Topic,
    /// Wall-clock admission time, recorded in the ledger.
    pub start_time: DateTime<Utc>,
    /// Monotonic admission instant, used for elapsed time.
    pub started_at: Instant,
    /// Requested lifetime.
    pub planned: Duration,
}

impl LeaseInfo {
    /// Time since admission.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// When the lease expires if nothing releases it first.
    pub fn ends_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.planned)
            .map_or(self.start_time, |planned| self.start_time + planned)
    }

    /// Builds the ledger record for a lease that lasted `duration`.
    ///
    /// Sub-second remainders are dropped.
    pub fn to_record(&self, duration: Duration) -> SessionRecord {
        SessionRecord::new(
            self.owner,
            self.partner,
            self.start_time,
            duration.as_secs(),
            self.topic.as_str(),
        )
    }
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// One active lease, owning its expiry timer.
///
/// Not `Clone`: a lease leaves the store exactly once, through
/// [`LeaseStore::remove`](crate::LeaseStore::remove), and whoever receives
/// it is the only party allowed to release it.
#[derive(Debug)]
pub struct Lease {
    info: LeaseInfo,
    timer: TimerHandle,
}

impl Lease {
    pub(crate) fn new(info: LeaseInfo, timer: TimerHandle) -> Self {
        Self { info, timer }
    }

    pub fn info(&self) -> &LeaseInfo {
        &self.info
    }

    /// Cancels the expiry timer. Returns `false` if it already fired or
    /// was already cancelled.
    pub fn cancel_timer(&mut self) -> bool {
        self.timer.cancel()
    }

    /// The expiry timer, for inspection.
    pub fn timer(&self) -> &TimerHandle {
        &self.timer
    }

    /// Consumes the lease, returning its snapshot. The timer is cancelled
    /// when the handle drops.
    pub fn into_info(self) -> LeaseInfo {
        self.info
    }
}
