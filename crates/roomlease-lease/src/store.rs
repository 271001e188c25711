//! The lease store: tracks every active lease and its owner.
//!
//! # Concurrency note
//!
//! `LeaseStore` is NOT thread-safe by itself; it uses plain `HashMap`s.
//! The release coordinator owns it behind a single mutex, and every
//! mutating call below is short and never awaits. That one lock is what
//! makes "one lease per owner" and "removed exactly once" hold under any
//! interleaving of bookings, expiries and vacancy events.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use roomlease_protocol::{BookingRequest, ResourceId, UserId};
use roomlease_timer::{TimerHandle, TimerState};
use tokio::time::Instant;

use crate::{Lease, LeaseConfig, LeaseError, LeaseInfo, Reservation, RoomGrant};

/// Where an owner stands.
///
/// ```text
/// reserve() ──→ Pending ──commit()──→ Active ──remove()──→ Releasing
///                  │                                          │
///               abandon()                              finish_release()
///                  ▼                                          ▼
///               (free)                                     (free)
/// ```
///
/// Any of the three states blocks a new booking for the same owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    /// Reserved; room and role are being created.
    Pending,
    /// Holds the given room.
    Active(ResourceId),
    /// Lost the given room to a release that is still tearing it down.
    Releasing(ResourceId),
}

impl OwnerState {
    fn resource(self) -> Option<ResourceId> {
        match self {
            Self::Pending => None,
            Self::Active(r) | Self::Releasing(r) => Some(r),
        }
    }
}

impl fmt::Display for OwnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Active(r) => write!(f, "Active({r})"),
            Self::Releasing(r) => write!(f, "Releasing({r})"),
        }
    }
}

/// Authoritative registry of active leases.
pub struct LeaseStore {
    /// Active leases, keyed by the room they hold.
    leases: HashMap<ResourceId, Lease>,

    /// Each owner's single slot. Kept in sync with `leases`: an owner is
    /// `Active(r)` exactly when `leases` holds `r` for them.
    owners: HashMap<UserId, OwnerState>,

    config: LeaseConfig,
}

impl LeaseStore {
    /// Creates an empty store with the given admission limits.
    pub fn new(config: LeaseConfig) -> Self {
        Self {
            leases: HashMap::new(),
            owners: HashMap::new(),
            config,
        }
    }

    /// The admission limits in force.
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Validates `request` and claims the owner's slot.
    ///
    /// This is the side-effect-free half of admission: nothing external
    /// has happened yet, so a rejection needs no cleanup.
    ///
    /// # Errors
    /// - [`LeaseError::InvalidDuration`] / [`LeaseError::InvalidTopic`]
    /// - [`LeaseError::AlreadyLeased`] if the owner's slot is taken
    pub fn reserve(&mut self, request: &BookingRequest) -> Result<Reservation, LeaseError> {
        let (topic, planned) = self.config.validate(request)?;

        if let Some(state) = self.owners.get(&request.owner) {
            return Err(LeaseError::AlreadyLeased {
                owner: request.owner,
                resource: state.resource(),
            });
        }
        self.owners.insert(request.owner, OwnerState::Pending);

        tracing::debug!(owner = %request.owner, "owner slot reserved");

        Ok(Reservation {
            owner: request.owner,
            partner: request.partner,
            topic,
            planned,
            start_time: Utc::now(),
            started_at: Instant::now(),
        })
    }

    /// Installs a lease for a reservation whose room now exists.
    ///
    /// # Errors
    /// [`LeaseError::DuplicateResource`] if `grant.resource_id` is already
    /// leased. The reservation is abandoned and `timer` is cancelled; the
    /// caller still owns the external resources and must remove them.
    pub fn commit(
        &mut self,
        reservation: Reservation,
        grant: RoomGrant,
        timer: TimerHandle,
    ) -> Result<LeaseInfo, LeaseError> {
        if self.leases.contains_key(&grant.resource_id) {
            self.abandon(reservation);
            return Err(LeaseError::DuplicateResource(grant.resource_id));
        }

        let info = LeaseInfo {
            resource_id: grant.resource_id,
            role_id: grant.role_id,
            owner: reservation.owner,
            partner: reservation.partner,
            topic: reservation.topic,
            start_time: reservation.start_time,
            started_at: reservation.started_at,
            planned: reservation.planned,
        };

        self.owners
            .insert(info.owner, OwnerState::Active(info.resource_id));
        self.leases
            .insert(info.resource_id, Lease::new(info.clone(), timer));

        tracing::info!(
            resource_id = %info.resource_id,
            owner = %info.owner,
            partner = %info.partner,
            minutes = info.planned.as_secs() / 60,
            "lease admitted"
        );
        Ok(info)
    }

    /// Frees the slot of a reservation that will never be committed.
    pub fn abandon(&mut self, reservation: Reservation) {
        if self.owners.get(&reservation.owner) == Some(&OwnerState::Pending) {
            self.owners.remove(&reservation.owner);
        }
        tracing::debug!(owner = %reservation.owner, "reservation abandoned");
    }

    /// Single-step admission for callers whose room already exists:
    /// `reserve` followed by `commit`.
    pub fn admit(
        &mut self,
        request: &BookingRequest,
        grant: RoomGrant,
        timer: TimerHandle,
    ) -> Result<LeaseInfo, LeaseError> {
        let reservation = self.reserve(request)?;
        self.commit(reservation, grant, timer)
    }

    /// Snapshot of the lease holding `resource_id`, if any.
    pub fn lookup_by_resource(&self, resource_id: ResourceId) -> Option<LeaseInfo> {
        self.leases.get(&resource_id).map(|lease| lease.info().clone())
    }

    /// Takes the lease for `resource_id` out of the store.
    ///
    /// Idempotent and exclusive: the first call returns `Some`, every
    /// later call for the same key returns `None`. The owner moves to
    /// [`OwnerState::Releasing`] until [`finish_release`](Self::finish_release).
    pub fn remove(&mut self, resource_id: ResourceId) -> Option<Lease> {
        let lease = self.leases.remove(&resource_id)?;
        let owner = lease.info().owner;
        if self.owners.get(&owner) == Some(&OwnerState::Active(resource_id)) {
            self.owners
                .insert(owner, OwnerState::Releasing(resource_id));
        }
        Some(lease)
    }

    /// Like [`remove`](Self::remove), but only if the lease's own timer has
    /// fired.
    ///
    /// An expiry can sit in the channel after another trigger already
    /// released its lease and the room id was handed out again. The new
    /// lease's timer is still armed, so the stale expiry is refused here.
    pub fn remove_expired(&mut self, resource_id: ResourceId) -> Option<Lease> {
        let fired = self
            .leases
            .get(&resource_id)
            .is_some_and(|lease| lease.timer().state() == TimerState::Fired);
        if fired { self.remove(resource_id) } else { None }
    }

    /// Drops the owner → room mapping once a release has finished.
    ///
    /// Returns `false` if the owner was not releasing that room.
    pub fn finish_release(&mut self, owner: UserId, resource_id: ResourceId) -> bool {
        if self.owners.get(&owner) == Some(&OwnerState::Releasing(resource_id)) {
            self.owners.remove(&owner);
            true
        } else {
            false
        }
    }

    /// Where `owner` stands, or `None` if they are free to book.
    pub fn owner_state(&self, owner: UserId) -> Option<OwnerState> {
        self.owners.get(&owner).copied()
    }

    /// The room `owner` currently holds, if it is active.
    pub fn lease_for_owner(&self, owner: UserId) -> Option<ResourceId> {
        match self.owners.get(&owner) {
            Some(OwnerState::Active(r)) => Some(*r),
            _ => None,
        }
    }

    /// Every actively leased room.
    pub fn active_resources(&self) -> Vec<ResourceId> {
        self.leases.keys().copied().collect()
    }

    /// Number of active leases.
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    /// Returns `true` if no lease is active.
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `LeaseStore`, named `test_{function}_{scenario}_{expected}`.
    //!
    //! Timers come from a real `ExpiryScheduler` on a paused clock, so
    //! nothing fires unless a test advances time on purpose.

    use std::time::Duration;

    use roomlease_protocol::RoleId;
    use roomlease_timer::ExpiryScheduler;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn uid(id: u64) -> UserId {
        UserId(id)
    }

    fn rid(id: u64) -> ResourceId {
        ResourceId(id)
    }

    fn request(owner: u64, partner: u64, minutes: u32) -> BookingRequest {
        BookingRequest {
            owner: uid(owner),
            partner: uid(partner),
            topic: "Calc".into(),
            duration_minutes: minutes,
        }
    }

    fn grant(id: u64) -> RoomGrant {
        RoomGrant {
            resource_id: rid(id),
            role_id: RoleId(id + 1000),
        }
    }

    fn store() -> LeaseStore {
        LeaseStore::new(LeaseConfig::default())
    }

    fn timer(scheduler: &ExpiryScheduler<ResourceId>, id: u64) -> TimerHandle {
        scheduler.arm(rid(id), Duration::from_secs(3600))
    }

    // =====================================================================
    // reserve()
    // =====================================================================

    #[test]
    fn test_reserve_free_owner_marks_pending() {
        let mut store = store();

        let reservation = store.reserve(&request(1, 2, 5)).unwrap();

        assert_eq!(reservation.owner(), uid(1));
        assert_eq!(reservation.planned(), Duration::from_secs(300));
        assert_eq!(store.owner_state(uid(1)), Some(OwnerState::Pending));
        assert!(store.is_empty(), "no lease until commit");
    }

    #[test]
    fn test_reserve_pending_owner_returns_already_leased() {
        let mut store = store();
        let _first = store.reserve(&request(1, 2, 5)).unwrap();

        let result = store.reserve(&request(1, 3, 5));

        assert!(matches!(
            result,
            Err(LeaseError::AlreadyLeased { owner, resource: None }) if owner == uid(1)
        ));
    }

    #[test]
    fn test_reserve_invalid_duration_leaves_slot_free() {
        let mut store = store();

        let result = store.reserve(&request(1, 2, 361));

        assert!(matches!(result, Err(LeaseError::InvalidDuration { .. })));
        assert_eq!(store.owner_state(uid(1)), None);
    }

    #[test]
    fn test_abandon_frees_pending_slot() {
        let mut store = store();
        let reservation = store.reserve(&request(1, 2, 5)).unwrap();

        store.abandon(reservation);

        assert_eq!(store.owner_state(uid(1)), None);
        assert!(store.reserve(&request(1, 2, 5)).is_ok());
    }

    // =====================================================================
    // commit() / admit()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_commit_installs_active_lease() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        let reservation = store.reserve(&request(1, 2, 5)).unwrap();

        let info = store.commit(reservation, grant(10), timer(&scheduler, 10)).unwrap();

        assert_eq!(info.resource_id, rid(10));
        assert_eq!(info.partner, uid(2));
        assert_eq!(store.lease_for_owner(uid(1)), Some(rid(10)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_active_owner_returns_already_leased_with_room() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        let result = store.admit(&request(1, 3, 5), grant(11), timer(&scheduler, 11));

        assert!(matches!(
            result,
            Err(LeaseError::AlreadyLeased { resource: Some(r), .. }) if r == rid(10)
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_duplicate_resource_abandons_and_cancels_timer() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();
        let reservation = store.reserve(&request(3, 4, 5)).unwrap();

        let result = store.commit(reservation, grant(10), timer(&scheduler, 10));

        assert!(matches!(result, Err(LeaseError::DuplicateResource(r)) if r == rid(10)));
        assert_eq!(store.owner_state(uid(3)), None, "slot must be freed");
        assert_eq!(scheduler.metrics().total_cancelled, 1);
    }

    // =====================================================================
    // lookup_by_resource()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_lookup_by_resource_returns_snapshot() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        let info = store.lookup_by_resource(rid(10)).unwrap();

        assert_eq!(info.owner, uid(1));
        assert_eq!(info.topic.as_str(), "Calc");
        assert!(store.lookup_by_resource(rid(99)).is_none());
    }

    // =====================================================================
    // remove() / finish_release()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_remove_returns_lease_exactly_once() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        let first = store.remove(rid(10));
        let second = store.remove(rid(10));

        assert!(first.is_some());
        assert!(second.is_none(), "second remove must be a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_moves_owner_to_releasing() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        let _lease = store.remove(rid(10)).unwrap();

        assert_eq!(store.owner_state(uid(1)), Some(OwnerState::Releasing(rid(10))));
        assert_eq!(store.lease_for_owner(uid(1)), None);
        assert!(
            store.reserve(&request(1, 2, 5)).is_err(),
            "owner stays blocked until release finishes"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_release_frees_owner_for_new_booking() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();
        let _lease = store.remove(rid(10)).unwrap();

        assert!(store.finish_release(uid(1), rid(10)));
        assert!(!store.finish_release(uid(1), rid(10)), "second call is a no-op");

        let info = store.admit(&request(1, 3, 5), grant(10), timer(&scheduler, 10)).unwrap();
        assert_eq!(info.partner, uid(3), "resource key is reusable after release");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired_armed_timer_returns_none() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        assert!(store.remove_expired(rid(10)).is_none());
        assert_eq!(store.len(), 1, "lease with an armed timer stays");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired_fired_timer_returns_lease() {
        let (scheduler, mut rx) = ExpiryScheduler::new();
        let mut store = store();
        let handle = scheduler.arm(rid(10), Duration::from_secs(60));
        store.admit(&request(1, 2, 1), grant(10), handle).unwrap();

        let expiry = rx.recv().await.unwrap();

        assert_eq!(expiry.key, rid(10));
        assert!(store.remove_expired(rid(10)).is_some());
        assert!(store.remove_expired(rid(10)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_lease_owns_its_timer() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();

        let mut lease = store.remove(rid(10)).unwrap();

        assert_eq!(lease.timer().state(), TimerState::Armed);
        assert!(lease.cancel_timer());
        assert!(!lease.cancel_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_resources_lists_every_room() {
        let (scheduler, _rx) = ExpiryScheduler::new();
        let mut store = store();
        store.admit(&request(1, 2, 5), grant(10), timer(&scheduler, 10)).unwrap();
        store.admit(&request(3, 4, 5), grant(11), timer(&scheduler, 11)).unwrap();

        let mut rooms = store.active_resources();
        rooms.sort_by_key(|r| r.0);

        assert_eq!(rooms, vec![rid(10), rid(11)]);
    }
}
