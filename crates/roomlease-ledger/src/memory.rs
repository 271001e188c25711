//! In-process ledger. Nothing survives the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use roomlease_protocol::{SessionRecord, UserId};
use tokio::sync::Mutex;

use crate::ledger::{started_since, sum_for_user};
use crate::{LedgerError, LedgerRow, SessionLedger};

/// A [`SessionLedger`] backed by a `Vec`.
///
/// Clones share the same rows, so a test can hand one clone to the
/// coordinator and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    rows: Arc<Mutex<Vec<LedgerRow>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent append fail with
    /// [`LedgerError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Every row appended so far, in append order.
    pub async fn rows(&self) -> Vec<LedgerRow> {
        self.rows.lock().await.clone()
    }

    /// Number of rows appended so far.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Returns `true` if nothing has been appended.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

impl SessionLedger for MemoryLedger {
    async fn append(&self, record: &SessionRecord) -> Result<u64, LedgerError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(LedgerError::Unavailable("memory ledger switched off".into()));
        }
        let mut rows = self.rows.lock().await;
        let id = rows.len() as u64 + 1;
        rows.push(LedgerRow {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn total_duration(&self, user: UserId) -> Result<u64, LedgerError> {
        let rows = self.rows.lock().await;
        Ok(sum_for_user(rows.iter().map(|row| &row.record), user))
    }

    async fn records_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, LedgerError> {
        let rows = self.rows.lock().await;
        Ok(started_since(rows.iter().map(|row| &row.record), since))
    }
}
