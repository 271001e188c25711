//! The storage trait every ledger backend implements.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roomlease_protocol::{SessionRecord, UserId};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// One stored row: a session record keyed by a synthetic id.
///
/// Ids are assigned by the ledger in append order, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Synthetic primary key.
    pub id: u64,
    /// The session itself. Flattened so the row reads as one flat object.
    #[serde(flatten)]
    pub record: SessionRecord,
}

/// Append-only storage for completed sessions.
///
/// Implementations must never overwrite or delete an appended record.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because the release coordinator shares the
/// ledger across every task that may release a lease.
pub trait SessionLedger: Send + Sync + 'static {
    /// Durably appends `record` and returns the row id it was stored under.
    fn append(
        &self,
        record: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<u64, LedgerError>> + Send;

    /// Sum of `duration_secs` over every record where `user` is the owner
    /// or the partner.
    fn total_duration(
        &self,
        user: UserId,
    ) -> impl std::future::Future<Output = Result<u64, LedgerError>> + Send;

    /// Every record whose `start_time >= since`. Order is not guaranteed.
    fn records_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<SessionRecord>, LedgerError>> + Send;
}

impl<L: SessionLedger> SessionLedger for Arc<L> {
    async fn append(&self, record: &SessionRecord) -> Result<u64, LedgerError> {
        L::append(self, record).await
    }

    async fn total_duration(&self, user: UserId) -> Result<u64, LedgerError> {
        L::total_duration(self, user).await
    }

    async fn records_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, LedgerError> {
        L::records_since(self, since).await
    }
}

/// Shared query helpers over an in-memory slice of rows.
pub(crate) fn sum_for_user<'a>(
    records: impl IntoIterator<Item = &'a SessionRecord>,
    user: UserId,
) -> u64 {
    records
        .into_iter()
        .filter(|r| r.involves(user))
        .map(|r| r.duration_secs)
        .sum()
}

pub(crate) fn started_since<'a>(
    records: impl IntoIterator<Item = &'a SessionRecord>,
    since: DateTime<Utc>,
) -> Vec<SessionRecord> {
    records
        .into_iter()
        .filter(|r| r.start_time >= since)
        .cloned()
        .collect()
}
