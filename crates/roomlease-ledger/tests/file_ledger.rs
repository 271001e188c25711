//! Integration tests for the JSON Lines ledger file.

use chrono::{DateTime, TimeZone, Utc};
use roomlease_ledger::{FileLedger, SessionLedger};
use roomlease_protocol::{SessionRecord, UserId};

// =========================================================================
// Helpers
// =========================================================================

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn record(owner: u64, partner: u64, start: i64, secs: u64) -> SessionRecord {
    SessionRecord::new(UserId(owner), UserId(partner), at(start), secs, "Calc")
}

// =========================================================================
// Append and read back
// =========================================================================

#[tokio::test]
async fn test_append_then_rows_returns_records_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = FileLedger::open(dir.path().join("sessions.jsonl")).await.unwrap();

    let first = ledger.append(&record(1, 2, 0, 600)).await.unwrap();
    let second = ledger.append(&record(3, 1, 100, 300)).await.unwrap();

    assert_eq!((first, second), (1, 2));
    let rows = ledger.rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].record, record(1, 2, 0, 600));
    assert_eq!(rows[1].id, 2);
}

#[tokio::test]
async fn test_total_duration_sums_owner_and_partner_rows() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = FileLedger::open(dir.path().join("sessions.jsonl")).await.unwrap();

    ledger.append(&record(1, 2, 0, 600)).await.unwrap();
    ledger.append(&record(3, 1, 100, 300)).await.unwrap();

    assert_eq!(ledger.total_duration(UserId(1)).await.unwrap(), 900);
    assert_eq!(ledger.total_duration(UserId(2)).await.unwrap(), 600);
}

#[tokio::test]
async fn test_records_since_filters_by_start_time() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = FileLedger::open(dir.path().join("sessions.jsonl")).await.unwrap();

    ledger.append(&record(1, 2, 0, 60)).await.unwrap();
    ledger.append(&record(1, 2, 500, 60)).await.unwrap();

    let recent = ledger.records_since(at(500)).await.unwrap();
    assert_eq!(recent, vec![record(1, 2, 500, 60)]);
}

// =========================================================================
// Durability across reopen
// =========================================================================

#[tokio::test]
async fn test_reopen_continues_id_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");

    {
        let ledger = FileLedger::open(&path).await.unwrap();
        ledger.append(&record(1, 2, 0, 60)).await.unwrap();
        ledger.append(&record(1, 2, 10, 60)).await.unwrap();
    }

    let reopened = FileLedger::open(&path).await.unwrap();
    let id = reopened.append(&record(1, 2, 20, 60)).await.unwrap();

    assert_eq!(id, 3);
    assert_eq!(reopened.total_duration(UserId(1)).await.unwrap(), 180);
}

#[tokio::test]
async fn test_open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("nested").join("sessions.jsonl");

    let ledger = FileLedger::open(&path).await.unwrap();
    ledger.append(&record(1, 2, 0, 60)).await.unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn test_rows_are_one_json_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    let ledger = FileLedger::open(&path).await.unwrap();

    ledger.append(&record(1, 2, 0, 600)).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let line = text.lines().next().unwrap();
    let json: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["user_id"], 1);
    assert_eq!(json["partner_id"], 2);
    assert_eq!(json["duration_seconds"], 600);
    assert_eq!(json["start_time"], "1970-01-01T00:00:00Z");
    assert_eq!(json["end_time"], "1970-01-01T00:10:00Z");
}

// =========================================================================
// Damaged files
// =========================================================================

#[tokio::test]
async fn test_unreadable_line_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    {
        let ledger = FileLedger::open(&path).await.unwrap();
        ledger.append(&record(1, 2, 0, 60)).await.unwrap();
    }
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("this is not a row\n");
    std::fs::write(&path, text).unwrap();

    let ledger = FileLedger::open(&path).await.unwrap();

    assert_eq!(ledger.rows().await.unwrap().len(), 1);
    assert_eq!(ledger.total_duration(UserId(1)).await.unwrap(), 60);
}

#[tokio::test]
async fn test_torn_final_row_does_not_corrupt_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    {
        let ledger = FileLedger::open(&path).await.unwrap();
        ledger.append(&record(1, 2, 0, 60)).await.unwrap();
    }
    // Simulate a crash halfway through writing a second row.
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str(r#"{"id":2,"user_id":1,"#);
    std::fs::write(&path, text).unwrap();

    let ledger = FileLedger::open(&path).await.unwrap();
    let id = ledger.append(&record(1, 2, 10, 120)).await.unwrap();

    assert_eq!(id, 2);
    let rows = ledger.rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].record.duration_secs, 120);
}
