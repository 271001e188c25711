//! Release coordinator: admission with rollback, and exactly-once release.
//!
//! # Release gate
//!
//! Expiry, vacancy, owner cancel and shutdown can all try to release the
//! same lease at once. Each of them starts with
//! [`LeaseStore::remove`](roomlease_lease::LeaseStore::remove) under the
//! store lock; only the caller that gets the lease back continues. Every
//! other caller logs at debug level and returns `None`.
//!
//! The winner then, outside the lock:
//!
//! 1. cancels the lease's timer (no-op if it already fired)
//! 2. works out the realized duration
//! 3. appends the session record to the ledger, queueing it on failure
//! 4. destroys the role and then the room, attempting both
//! 5. frees the owner for a new booking
//!
//! # Lock discipline
//!
//! The store mutex is held only for in-memory bookkeeping. Provisioning,
//! teardown and ledger writes all happen with it released.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use roomlease_lease::{Lease, LeaseConfig, LeaseError, LeaseInfo, LeaseStore, RoomGrant};
use roomlease_ledger::SessionLedger;
use roomlease_protocol::{BookingRequest, ReleaseReason, ResourceId, RoleId, SessionRecord, UserId};
use roomlease_timer::{Expiry, ExpiryScheduler};
use tokio::sync::Mutex;

use crate::{
    AccessPolicy, ProvisionError, RoomError, RoomProvisioner, TeardownError, role_name, room_name,
};

const ROLLBACK_REASON: &str = "error during room creation, rolling back";

// ---------------------------------------------------------------------------
// ReleaseTrigger
// ---------------------------------------------------------------------------

/// What asked for a release, and how long the session lasted if the
/// trigger knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseTrigger {
    pub reason: ReleaseReason,
    /// Realized duration. `None` means "measure elapsed time".
    pub actual_duration: Option<Duration>,
}

impl ReleaseTrigger {
    /// The timer fired: the session lasted exactly as planned.
    pub fn expired(planned: Duration) -> Self {
        Self {
            reason: ReleaseReason::Expired,
            actual_duration: Some(planned),
        }
    }

    /// The room emptied.
    pub fn vacant(last_member: Option<UserId>) -> Self {
        Self {
            reason: ReleaseReason::Vacant { last_member },
            actual_duration: None,
        }
    }

    /// The owner ended the session.
    pub fn cancelled() -> Self {
        Self {
            reason: ReleaseReason::Cancelled,
            actual_duration: None,
        }
    }

    /// The service is stopping.
    pub fn shutdown() -> Self {
        Self {
            reason: ReleaseReason::Shutdown,
            actual_duration: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ReleaseOutcome
// ---------------------------------------------------------------------------

/// What the winning release did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub resource_id: ResourceId,
    pub role_id: RoleId,
    pub reason: ReleaseReason,
    /// The record written (or queued) for this session.
    pub record: SessionRecord,
    /// Ledger row id, or `None` if the append failed and the record is
    /// waiting in the retry queue.
    pub ledger_row: Option<u64>,
    /// Teardown steps that failed. The resources they name are orphaned.
    pub teardown_errors: Vec<TeardownError>,
}

impl ReleaseOutcome {
    /// `true` if the record was stored and both resources were removed.
    pub fn is_clean(&self) -> bool {
        self.ledger_row.is_some() && self.teardown_errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ReleaseCoordinator
// ---------------------------------------------------------------------------

/// Owns the lease store and runs every admission and release.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct ReleaseCoordinator<P, L> {
    store: Mutex<LeaseStore>,
    scheduler: ExpiryScheduler<ResourceId>,
    provisioner: P,
    ledger: L,

    /// Records whose append failed, oldest first.
    pending_records: Mutex<VecDeque<SessionRecord>>,

    /// Resources whose teardown failed. Left for out-of-band cleanup.
    orphans: Mutex<Vec<TeardownError>>,
}

impl<P: RoomProvisioner, L: SessionLedger> ReleaseCoordinator<P, L> {
    /// Creates a coordinator. Expiries for the timers it arms arrive on
    /// the receiver paired with `scheduler`; route them to
    /// [`on_expiry`](Self::on_expiry).
    pub fn new(
        config: LeaseConfig,
        scheduler: ExpiryScheduler<ResourceId>,
        provisioner: P,
        ledger: L,
    ) -> Self {
        Self {
            store: Mutex::new(LeaseStore::new(config)),
            scheduler,
            provisioner,
            ledger,
            pending_records: Mutex::new(VecDeque::new()),
            orphans: Mutex::new(Vec::new()),
        }
    }

    // -- Admission ----------------------------------------------------------

    /// Books a room for `request`.
    ///
    /// Validation and the one-room-per-owner check happen before any
    /// external call. If creating the role or the room fails, everything
    /// created so far is destroyed and the owner's slot is freed.
    ///
    /// The admission runs on its own task. If the caller stops waiting
    /// (a dropped future, a timeout), it still ends in either a committed
    /// lease or a full rollback, so the owner's slot is never left
    /// reserved and no role or room is left untracked.
    ///
    /// # Errors
    /// - [`RoomError::Lease`]: invalid request or owner already booked
    /// - [`RoomError::Provision`]: provisioning failed (rolled back)
    pub async fn admit(self: &Arc<Self>, request: &BookingRequest) -> Result<LeaseInfo, RoomError> {
        let coordinator = Arc::clone(self);
        let owner = request.owner;
        let request = request.clone();
        let task = tokio::spawn(async move { coordinator.admit_to_completion(&request).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(%owner, error = %e, "admission task cancelled");
                Err(ProvisionError::Interrupted(owner).into())
            }
        }
    }

    async fn admit_to_completion(&self, request: &BookingRequest) -> Result<LeaseInfo, RoomError> {
        let reservation = self.store.lock().await.reserve(request)?;
        let owner = reservation.owner();

        let role_name = role_name(owner);
        let role_id = match self
            .provisioner
            .create_role(&role_name, &[owner, reservation.partner()])
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%owner, error = %e, "role creation failed");
                self.store.lock().await.abandon(reservation);
                return Err(e.into());
            }
        };

        let room_name = room_name(reservation.topic());
        let policy = AccessPolicy::role_only(role_id);
        let resource_id = match self.provisioner.create_room(&room_name, &policy).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(%owner, error = %e, "room creation failed, rolling back");
                self.rollback(None, role_id).await;
                self.store.lock().await.abandon(reservation);
                return Err(e.into());
            }
        };

        // Arm and commit under one lock so the expiry cannot be handled
        // before the lease exists.
        let committed = {
            let mut store = self.store.lock().await;
            let timer = self.scheduler.arm(resource_id, reservation.planned());
            store.commit(reservation, RoomGrant { resource_id, role_id }, timer)
        };

        match committed {
            Ok(info) => Ok(info),
            Err(LeaseError::DuplicateResource(id)) => {
                // The room belongs to another lease; only our role goes.
                tracing::warn!(%owner, resource_id = %id, "provisioner returned a leased room");
                self.rollback(None, role_id).await;
                Err(ProvisionError::Conflict(id).into())
            }
            Err(e) => {
                self.rollback(Some(resource_id), role_id).await;
                Err(e.into())
            }
        }
    }

    /// Best-effort removal of resources created by a failed admission.
    async fn rollback(&self, room: Option<ResourceId>, role: RoleId) {
        if let Err(e) = self.provisioner.destroy_role(role, ROLLBACK_REASON).await {
            tracing::warn!(error = %e, "rollback could not remove role");
            self.orphans.lock().await.push(e);
        }
        if let Some(room) = room {
            if let Err(e) = self.provisioner.destroy_room(room, ROLLBACK_REASON).await {
                tracing::warn!(error = %e, "rollback could not remove room");
                self.orphans.lock().await.push(e);
            }
        }
    }

    // -- Release ------------------------------------------------------------

    /// Releases the lease on `resource_id`.
    ///
    /// Returns `None` if there is no such lease, including when another
    /// trigger already released it.
    pub async fn release(
        &self,
        resource_id: ResourceId,
        trigger: ReleaseTrigger,
    ) -> Option<ReleaseOutcome> {
        let lease = self.store.lock().await.remove(resource_id);
        match lease {
            Some(lease) => Some(self.finish(lease, trigger).await),
            None => {
                tracing::debug!(
                    %resource_id,
                    reason = trigger.reason.label(),
                    "release skipped, lease already gone"
                );
                None
            }
        }
    }

    /// Handles a fired timer.
    ///
    /// Only releases if the lease's own timer fired, so a stale expiry
    /// never ends a newer lease on a reused room id.
    pub async fn on_expiry(&self, expiry: Expiry<ResourceId>) -> Option<ReleaseOutcome> {
        let resource_id = expiry.key;
        let lease = self.store.lock().await.remove_expired(resource_id);
        match lease {
            Some(lease) => Some(self.finish(lease, ReleaseTrigger::expired(expiry.planned)).await),
            None => {
                tracing::debug!(%resource_id, "stale expiry ignored");
                None
            }
        }
    }

    /// Ends `owner`'s session early.
    ///
    /// # Errors
    /// [`LeaseError::NoActiveLease`] if the owner holds no active room, or
    /// it was released by another trigger first.
    pub async fn cancel(&self, owner: UserId) -> Result<ReleaseOutcome, RoomError> {
        let resource_id = self
            .store
            .lock()
            .await
            .lease_for_owner(owner)
            .ok_or(LeaseError::NoActiveLease(owner))?;
        self.release(resource_id, ReleaseTrigger::cancelled())
            .await
            .ok_or_else(|| LeaseError::NoActiveLease(owner).into())
    }

    /// Releases every active lease with reason `Shutdown`, then retries
    /// any queued ledger records.
    pub async fn release_all(&self) -> Vec<ReleaseOutcome> {
        let resources = self.store.lock().await.active_resources();
        tracing::info!(count = resources.len(), "releasing all leases");

        let mut outcomes = Vec::with_capacity(resources.len());
        for resource_id in resources {
            if let Some(outcome) = self.release(resource_id, ReleaseTrigger::shutdown()).await {
                outcomes.push(outcome);
            }
        }

        let left = self.flush_pending().await;
        if left > 0 {
            tracing::warn!(count = left, "session records could not be written");
        }
        outcomes
    }

    /// Steps 1-5 for the caller that won the release gate.
    async fn finish(&self, mut lease: Lease, trigger: ReleaseTrigger) -> ReleaseOutcome {
        lease.cancel_timer();
        let info = lease.into_info();

        let duration = trigger
            .actual_duration
            .unwrap_or_else(|| info.elapsed())
            .min(info.planned);
        let record = info.to_record(duration);
        let ledger_row = self.append_record(&record).await;

        let audit = format!("cleanup: {}", trigger.reason);
        let mut teardown_errors = Vec::new();
        if let Err(e) = self.provisioner.destroy_role(info.role_id, &audit).await {
            tracing::warn!(resource_id = %info.resource_id, error = %e, "role teardown failed");
            teardown_errors.push(e);
        }
        if let Err(e) = self.provisioner.destroy_room(info.resource_id, &audit).await {
            tracing::warn!(resource_id = %info.resource_id, error = %e, "room teardown failed");
            teardown_errors.push(e);
        }
        if !teardown_errors.is_empty() {
            self.orphans
                .lock()
                .await
                .extend(teardown_errors.iter().cloned());
        }

        self.store
            .lock()
            .await
            .finish_release(info.owner, info.resource_id);

        tracing::info!(
            resource_id = %info.resource_id,
            owner = %info.owner,
            reason = trigger.reason.label(),
            duration_secs = record.duration_secs,
            "lease released"
        );

        ReleaseOutcome {
            resource_id: info.resource_id,
            role_id: info.role_id,
            reason: trigger.reason,
            record,
            ledger_row,
            teardown_errors,
        }
    }

    // -- Ledger -------------------------------------------------------------

    /// Appends `record` after any queued ones. On failure the record joins
    /// the queue and `None` is returned.
    async fn append_record(&self, record: &SessionRecord) -> Option<u64> {
        let mut pending = self.pending_records.lock().await;
        Self::drain(&self.ledger, &mut pending).await;

        if !pending.is_empty() {
            // Keep append order: the ledger is still failing.
            pending.push_back(record.clone());
            return None;
        }

        match self.ledger.append(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(owner = %record.owner, error = %e, "ledger append failed, record queued");
                pending.push_back(record.clone());
                None
            }
        }
    }

    async fn drain(ledger: &L, pending: &mut VecDeque<SessionRecord>) {
        while let Some(record) = pending.front() {
            match ledger.append(record).await {
                Ok(id) => {
                    tracing::debug!(row = id, "queued session record written");
                    pending.pop_front();
                }
                Err(e) => {
                    tracing::debug!(error = %e, queued = pending.len(), "ledger still failing");
                    break;
                }
            }
        }
    }

    /// Retries queued ledger records. Returns how many are still queued.
    pub async fn flush_pending(&self) -> usize {
        let mut pending = self.pending_records.lock().await;
        Self::drain(&self.ledger, &mut pending).await;
        pending.len()
    }

    // -- Queries ------------------------------------------------------------

    /// Snapshot of the lease on `resource_id`.
    pub async fn lookup(&self, resource_id: ResourceId) -> Option<LeaseInfo> {
        self.store.lock().await.lookup_by_resource(resource_id)
    }

    /// The room `owner` currently holds.
    pub async fn lease_for_owner(&self, owner: UserId) -> Option<ResourceId> {
        self.store.lock().await.lease_for_owner(owner)
    }

    /// Number of active leases.
    pub async fn active_count(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Number of session records waiting for the ledger.
    pub async fn pending_records(&self) -> usize {
        self.pending_records.lock().await.len()
    }

    /// Every teardown that failed so far.
    pub async fn orphaned_resources(&self) -> Vec<TeardownError> {
        self.orphans.lock().await.clone()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }
}
