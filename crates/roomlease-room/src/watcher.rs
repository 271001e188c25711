//! Occupancy watcher: turns "room became empty" into a vacancy release.
//!
//! The platform adapter (gateway listener, test harness) decides when a
//! room has no human occupants left and sends a [`VacancyEvent`]. The
//! watcher runs as an actor over that channel; it never polls.

use std::sync::Arc;

use roomlease_ledger::SessionLedger;
use roomlease_protocol::{ResourceId, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::{ReleaseCoordinator, ReleaseOutcome, ReleaseTrigger, RoomProvisioner};

/// A room lost its last human occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacancyEvent {
    pub resource_id: ResourceId,
    /// Who left last, if the platform knows.
    pub last_member: Option<UserId>,
}

/// Routes vacancy events to the release coordinator.
pub struct OccupancyWatcher<P, L> {
    coordinator: Arc<ReleaseCoordinator<P, L>>,
}

impl<P: RoomProvisioner, L: SessionLedger> OccupancyWatcher<P, L> {
    pub fn new(coordinator: Arc<ReleaseCoordinator<P, L>>) -> Self {
        Self { coordinator }
    }

    /// Handles one event.
    ///
    /// Rooms roomlease does not track are ignored; the platform reports
    /// every channel, not just ours. The realized duration is the time
    /// since admission.
    pub async fn on_vacancy(&self, event: VacancyEvent) -> Option<ReleaseOutcome> {
        let resource_id = event.resource_id;
        if self.coordinator.lookup(resource_id).await.is_none() {
            tracing::debug!(%resource_id, "vacancy for untracked room ignored");
            return None;
        }
        self.coordinator
            .release(resource_id, ReleaseTrigger::vacant(event.last_member))
            .await
    }

    /// Consumes events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<VacancyEvent>) {
        while let Some(event) = events.recv().await {
            self.on_vacancy(event).await;
        }
        tracing::debug!("vacancy channel closed, watcher stopping");
    }

    /// Like [`run`](Self::run), but also stops when `stop` resolves.
    ///
    /// `stop` is only checked between events, so a release that has
    /// started always completes.
    pub async fn run_until(
        self,
        mut events: mpsc::Receiver<VacancyEvent>,
        mut stop: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.on_vacancy(event).await;
                    }
                    None => break,
                },
                _ = &mut stop => break,
            }
        }
        tracing::debug!("occupancy watcher stopped");
    }
}
