//! `RoomLeaseService` builder and event loops.
//!
//! This is the entry point for embedding roomlease in a bot. It ties the
//! layers together: timer → coordinator ← watcher, with the ledger and the
//! provisioner underneath.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roomlease_lease::LeaseInfo;
use roomlease_ledger::{FileLedger, SessionLedger, StudyTotals, WeeklyReport};
use roomlease_protocol::{BookingRequest, ResourceId, UserId};
use roomlease_room::{
    OccupancyWatcher, ReleaseCoordinator, ReleaseOutcome, RoomProvisioner, VacancyEvent,
};
use roomlease_timer::{Expiry, ExpiryScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::{RoomLeaseError, ServiceConfig};

/// Builder for configuring and starting a roomlease service.
///
/// # Example
///
/// ```rust,ignore
/// let service = RoomLeaseService::builder()
///     .config(ServiceConfig::from_json_file("roomlease.json")?)
///     .build_with_file_ledger(my_provisioner)
///     .await?;
/// ```
pub struct RoomLeaseServiceBuilder {
    config: ServiceConfig,
}

impl RoomLeaseServiceBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the admission limits.
    pub fn lease_config(mut self, lease: roomlease_lease::LeaseConfig) -> Self {
        self.config.lease = lease;
        self
    }

    /// Sets the vacancy channel capacity.
    pub fn vacancy_channel_size(mut self, size: usize) -> Self {
        self.config.vacancy_channel_size = size;
        self
    }

    /// Starts the service with the given ledger.
    ///
    /// Spawns the expiry loop and the occupancy watcher, so it must be
    /// called from inside a Tokio runtime.
    pub fn build<P, L>(self, provisioner: P, ledger: L) -> RoomLeaseService<P, L>
    where
        P: RoomProvisioner,
        L: SessionLedger,
    {
        let (scheduler, expiries) = ExpiryScheduler::new();
        let coordinator = Arc::new(ReleaseCoordinator::new(
            self.config.lease,
            scheduler,
            provisioner,
            ledger,
        ));

        let (stop_expiries, expiries_stopped) = oneshot::channel();
        let expiry_task = tokio::spawn(run_expiries(
            Arc::clone(&coordinator),
            expiries,
            expiries_stopped,
        ));

        let (vacancy_tx, vacancy_rx) = mpsc::channel(self.config.vacancy_channel_size.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();
        let watcher = OccupancyWatcher::new(Arc::clone(&coordinator));
        let watcher_task = tokio::spawn(watcher.run_until(vacancy_rx, stop_rx));

        tracing::info!("roomlease service running");

        RoomLeaseService {
            coordinator,
            vacancy_tx,
            expiry_task,
            stop_expiries,
            watcher_task,
            stop_watcher: stop_tx,
        }
    }

    /// Opens the ledger file named in the config and starts the service
    /// with it.
    ///
    /// # Errors
    /// [`RoomLeaseError::Ledger`] if the ledger file cannot be opened.
    pub async fn build_with_file_ledger<P: RoomProvisioner>(
        self,
        provisioner: P,
    ) -> Result<RoomLeaseService<P, FileLedger>, RoomLeaseError> {
        let ledger = FileLedger::open(&self.config.ledger_path).await?;
        Ok(self.build(provisioner, ledger))
    }
}

impl Default for RoomLeaseServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes fired timers to the coordinator until `stop` fires.
///
/// Each expiry is released on its own task so a slow teardown does not
/// hold up the next one. On stop, releases already started run to the
/// end before this returns.
async fn run_expiries<P, L>(
    coordinator: Arc<ReleaseCoordinator<P, L>>,
    mut expiries: mpsc::UnboundedReceiver<Expiry<ResourceId>>,
    mut stop: oneshot::Receiver<()>,
) where
    P: RoomProvisioner,
    L: SessionLedger,
{
    let mut releases = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            Some(expiry) = expiries.recv() => {
                let coordinator = Arc::clone(&coordinator);
                releases.spawn(async move {
                    coordinator.on_expiry(expiry).await;
                });
            }
            Some(joined) = releases.join_next(), if !releases.is_empty() => {
                log_join_failure(joined);
            }
        }
    }

    if !releases.is_empty() {
        tracing::debug!(count = releases.len(), "waiting for in-flight expiry releases");
    }
    while let Some(joined) = releases.join_next().await {
        log_join_failure(joined);
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::warn!(error = %e, "expiry release task failed");
    }
}

/// A running roomlease service.
///
/// The command surface a bot exposes (`book`, `cancel`, `stats`,
/// `report`) maps onto the methods below. Feed "room became empty"
/// events into [`vacancy_sender`](Self::vacancy_sender).
pub struct RoomLeaseService<P, L> {
    coordinator: Arc<ReleaseCoordinator<P, L>>,
    vacancy_tx: mpsc::Sender<VacancyEvent>,
    expiry_task: JoinHandle<()>,
    stop_expiries: oneshot::Sender<()>,
    watcher_task: JoinHandle<()>,
    stop_watcher: oneshot::Sender<()>,
}

impl RoomLeaseService<(), ()> {
    /// Creates a new builder.
    pub fn builder() -> RoomLeaseServiceBuilder {
        RoomLeaseServiceBuilder::new()
    }
}

impl<P, L> RoomLeaseService<P, L>
where
    P: RoomProvisioner,
    L: SessionLedger,
{
    /// Books a room. See [`ReleaseCoordinator::admit`].
    pub async fn book(&self, request: &BookingRequest) -> Result<LeaseInfo, RoomLeaseError> {
        Ok(self.coordinator.admit(request).await?)
    }

    /// Ends `owner`'s session early and logs the time spent.
    pub async fn cancel(&self, owner: UserId) -> Result<ReleaseOutcome, RoomLeaseError> {
        Ok(self.coordinator.cancel(owner).await?)
    }

    /// Lifetime study time for `user`, as owner or partner.
    pub async fn stats(&self, user: UserId) -> Result<StudyTotals, RoomLeaseError> {
        let secs = self.coordinator.ledger().total_duration(user).await?;
        Ok(StudyTotals::new(secs))
    }

    /// Usage over the last seven days.
    pub async fn weekly_report(&self) -> Result<WeeklyReport, RoomLeaseError> {
        self.weekly_report_at(Utc::now()).await
    }

    /// Usage over the seven days before `now`.
    pub async fn weekly_report_at(&self, now: DateTime<Utc>) -> Result<WeeklyReport, RoomLeaseError> {
        let records = self
            .coordinator
            .ledger()
            .records_since(WeeklyReport::window_start(now))
            .await?;
        Ok(WeeklyReport::build(&records, now))
    }

    /// Where the platform adapter sends vacancy events.
    pub fn vacancy_sender(&self) -> mpsc::Sender<VacancyEvent> {
        self.vacancy_tx.clone()
    }

    /// The coordinator, for queries and direct releases.
    pub fn coordinator(&self) -> &Arc<ReleaseCoordinator<P, L>> {
        &self.coordinator
    }

    /// Stops the background loops, releases every active lease and
    /// writes any queued records.
    ///
    /// Expiry and vacancy releases already in progress finish first.
    pub async fn shutdown(self) -> Vec<ReleaseOutcome> {
        tracing::info!("roomlease service shutting down");
        let _ = self.stop_expiries.send(());
        if let Err(e) = self.expiry_task.await {
            tracing::warn!(error = %e, "expiry loop ended abnormally");
        }
        let _ = self.stop_watcher.send(());
        if let Err(e) = self.watcher_task.await {
            tracing::warn!(error = %e, "occupancy watcher ended abnormally");
        }
        self.coordinator.release_all().await
    }
}
