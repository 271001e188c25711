use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use roomlease::prelude::*;

// ---------------------------------------------------------------------------
// Console provisioner
// ---------------------------------------------------------------------------

/// Stands in for a chat server: keeps rooms and roles in memory and logs
/// every change.
#[derive(Default)]
struct ConsoleGuild {
    next_id: AtomicU64,
    rooms: Mutex<HashSet<ResourceId>>,
    roles: Mutex<HashSet<RoleId>>,
}

impl ConsoleGuild {
    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl RoomProvisioner for ConsoleGuild {
    async fn create_role(&self, name: &str, members: &[UserId]) -> Result<RoleId, ProvisionError> {
        let role = RoleId(self.id());
        let granted: Vec<String> = members.iter().map(ToString::to_string).collect();
        if let Ok(mut roles) = self.roles.lock() {
            roles.insert(role);
        }
        tracing::info!(%role, name, members = %granted.join(","), "role created");
        Ok(role)
    }

    async fn create_room(
        &self,
        name: &str,
        policy: &AccessPolicy,
    ) -> Result<ResourceId, ProvisionError> {
        let room = ResourceId(self.id());
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.insert(room);
        }
        tracing::info!(%room, name, role = %policy.role, private = policy.private, "room created");
        Ok(room)
    }

    async fn destroy_room(&self, id: ResourceId, reason: &str) -> Result<(), TeardownError> {
        let removed = self.rooms.lock().map(|mut r| r.remove(&id)).unwrap_or(false);
        if !removed {
            return Err(TeardownError::Room {
                id,
                reason: "unknown room".into(),
            });
        }
        tracing::info!(room = %id, reason, "room deleted");
        Ok(())
    }

    async fn destroy_role(&self, id: RoleId, reason: &str) -> Result<(), TeardownError> {
        let removed = self.roles.lock().map(|mut r| r.remove(&id)).unwrap_or(false);
        if !removed {
            return Err(TeardownError::Role {
                id,
                reason: "unknown role".into(),
            });
        }
        tracing::info!(role = %id, reason, "role deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

fn print_booking(info: &LeaseInfo) {
    println!(
        "Study room booked: {} | topic `{}` | {} minutes | partner {} | ends {}",
        info.resource_id,
        info.topic,
        info.planned.as_secs() / 60,
        info.partner,
        info.ends_at().format("%H:%M UTC"),
    );
}

fn print_stats(user: UserId, totals: &StudyTotals) {
    if totals.is_empty() {
        println!("{user} hasn't logged any study sessions yet");
    } else {
        println!("{user} has studied {totals} ({:.2} hours)", totals.hours());
    }
}

/// One row per weekday, one bar per owner, a `#` per six minutes.
fn print_report(report: &WeeklyReport) {
    if report.is_empty() {
        println!("No study sessions in the last 7 days");
        return;
    }
    println!("Study hours since {}", report.since.format("%Y-%m-%d"));
    for day in &report.days {
        for owner in report.owners() {
            let hours = day.hours(owner);
            if hours > 0.0 {
                let bar = "#".repeat(((hours * 10.0).round() as usize).max(1));
                println!("  {:<3} {owner:<6} {bar} {hours:.1}h", day.weekday);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    roomlease::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::from_json_file(path)?,
        None => ServiceConfig::default(),
    };
    let service = RoomLeaseService::builder()
        .config(config)
        .build_with_file_ledger(ConsoleGuild::default())
        .await?;

    let (alice, bob, carol) = (UserId(1), UserId(2), UserId(3));

    // Alice books a one-minute room with Bob.
    let booking = service
        .book(&BookingRequest {
            owner: alice,
            partner: bob,
            topic: "Calculus Review".into(),
            duration_minutes: 1,
        })
        .await?;
    print_booking(&booking);

    // A second booking while the first is active is refused.
    if let Err(e) = service
        .book(&BookingRequest {
            owner: alice,
            partner: carol,
            topic: "Physics".into(),
            duration_minutes: 30,
        })
        .await
    {
        println!("Booking refused: {e}");
    }

    // Carol books with Bob, then everybody leaves the room.
    let physics = service
        .book(&BookingRequest {
            owner: carol,
            partner: bob,
            topic: "Physics".into(),
            duration_minutes: 30,
        })
        .await?;
    print_booking(&physics);
    tokio::time::sleep(Duration::from_secs(2)).await;
    service
        .vacancy_sender()
        .send(VacancyEvent {
            resource_id: physics.resource_id,
            last_member: Some(bob),
        })
        .await?;

    println!("Waiting for Alice's room to expire...");
    tokio::time::sleep(Duration::from_secs(61)).await;

    for user in [alice, bob, carol] {
        print_stats(user, &service.stats(user).await?);
    }
    print_report(&service.weekly_report().await?);

    let outcomes = service.shutdown().await;
    tracing::info!(released = outcomes.len(), "demo finished");
    Ok(())
}
