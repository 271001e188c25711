//! Core value types shared by every roomlease layer.
//!
//! Nothing here performs I/O or holds locks. These are the plain data
//! structures that move between the lease store, the release coordinator,
//! and the session ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant on the chat platform (owner or partner of a lease).
///
/// This is a "newtype wrapper" around the platform's numeric user id.
/// Wrapping it means a `UserId` can never be passed where a `ResourceId`
/// is expected, even though both are `u64` underneath.
///
/// `#[serde(transparent)]` keeps the wire form a plain number, so a ledger
/// row stores `42`, not `{ "0": 42 }`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Opaque handle to an externally provisioned room (a voice channel).
///
/// This is the unique key of the lease store while the lease is active.
/// Once the lease is released the same value may be handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Opaque handle to the temporary access role created next to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "role-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A validated session topic.
///
/// The raw text is kept as typed (it is what the ledger records). The
/// [`slug`](Self::slug) is the sanitized, externally visible form used in
/// channel names: lower-cased, spaces replaced by `-`, cut to
/// [`Topic::SLUG_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Maximum number of characters of the topic that appear in a
    /// channel name.
    pub const SLUG_LEN: usize = 15;

    /// Validates `raw` against `max_len` characters.
    ///
    /// Leading and trailing whitespace is trimmed first.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidTopic`] if the trimmed topic is empty or
    /// longer than `max_len` characters.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidTopic("topic is empty".into()));
        }
        let len = trimmed.chars().count();
        if len > max_len {
            return Err(ProtocolError::InvalidTopic(format!(
                "topic is {len} characters, maximum is {max_len}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The topic as entered (trimmed).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sanitized form for external names, e.g. `"Calculus Review"` →
    /// `"calculus-review"`.
    ///
    /// Truncation counts characters, so multi-byte text is never split.
    pub fn slug(&self) -> String {
        self.0
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .take(Self::SLUG_LEN)
            .collect()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// BookingRequest
// ---------------------------------------------------------------------------

/// What the command surface hands to the lease layer.
///
/// Values are raw: the topic is not yet validated and the duration is not
/// yet range-checked. The lease store does both before any external
/// resource is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// The user booking the room. At most one active lease per owner.
    pub owner: UserId,
    /// The invited study partner.
    pub partner: UserId,
    /// Free-text label for the session.
    pub topic: String,
    /// Requested lifetime in minutes.
    pub duration_minutes: u32,
}

// ---------------------------------------------------------------------------
// ReleaseReason
// ---------------------------------------------------------------------------

/// Why a lease was released.
///
/// Expiry and vacancy are the two racing triggers; `Cancelled` and
/// `Shutdown` are explicit requests from the owner and the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The planned duration elapsed.
    Expired,
    /// The room became empty of human occupants.
    Vacant {
        /// The member whose departure emptied the room, if known.
        last_member: Option<UserId>,
    },
    /// The owner ended the session early.
    Cancelled,
    /// The service is stopping.
    Shutdown,
}

impl ReleaseReason {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Vacant { .. } => "vacant",
            Self::Cancelled => "cancelled",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "timed session expired"),
            Self::Vacant {
                last_member: Some(member),
            } => write!(f, "room became empty after {member} left"),
            Self::Vacant { last_member: None } => write!(f, "room became empty"),
            Self::Cancelled => write!(f, "cancelled by owner"),
            Self::Shutdown => write!(f, "service shutting down"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// One completed session, appended to the ledger exactly once per lease.
///
/// Field names on the wire follow the ledger's column layout
/// (`user_id`, `partner_id`, ...). Timestamps serialize as RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The lease owner.
    #[serde(rename = "user_id")]
    pub owner: UserId,
    /// The invited partner.
    #[serde(rename = "partner_id")]
    pub partner: UserId,
    /// When the lease was admitted.
    pub start_time: DateTime<Utc>,
    /// `start_time + duration_seconds`.
    pub end_time: DateTime<Utc>,
    /// Realized duration (not necessarily the planned one).
    #[serde(rename = "duration_seconds")]
    pub duration_secs: u64,
    /// The topic as entered.
    pub topic: String,
}

impl SessionRecord {
    /// Builds a record whose `end_time` is derived from the duration.
    ///
    /// A duration past chrono's range saturates `end_time` at
    /// [`DateTime::<Utc>::MAX_UTC`].
    pub fn new(
        owner: UserId,
        partner: UserId,
        start_time: DateTime<Utc>,
        duration_secs: u64,
        topic: impl Into<String>,
    ) -> Self {
        let end_time = i64::try_from(duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|d| start_time.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            owner,
            partner,
            start_time,
            end_time,
            duration_secs,
            topic: topic.into(),
        }
    }

    /// Returns `true` if `user` took part as owner or partner.
    pub fn involves(&self, user: UserId) -> bool {
        self.owner == user || self.partner == user
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
        assert_eq!(ResourceId(9).to_string(), "room-9");
        assert_eq!(RoleId(3).to_string(), "role-3");
    }

    // =====================================================================
    // Topic
    // =====================================================================

    #[test]
    fn test_topic_parse_trims_whitespace() {
        let topic = Topic::parse("  Calc  ", 100).unwrap();
        assert_eq!(topic.as_str(), "Calc");
    }

    #[test]
    fn test_topic_parse_empty_returns_error() {
        let result = Topic::parse("   ", 100);
        assert!(matches!(result, Err(ProtocolError::InvalidTopic(_))));
    }

    #[test]
    fn test_topic_parse_too_long_returns_error() {
        let raw = "x".repeat(101);
        let result = Topic::parse(&raw, 100);
        assert!(matches!(result, Err(ProtocolError::InvalidTopic(_))));
    }

    #[test]
    fn test_topic_parse_counts_characters_not_bytes() {
        // 10 characters, 30 bytes.
        let raw = "日本語日本語日本語日";
        assert!(Topic::parse(raw, 10).is_ok());
    }

    #[test]
    fn test_topic_slug_lowercases_and_hyphenates() {
        let topic = Topic::parse("Calculus Review", 100).unwrap();
        assert_eq!(topic.slug(), "calculus-review");
    }

    #[test]
    fn test_topic_slug_truncates_to_slug_len() {
        let topic = Topic::parse("Linear Algebra Midterm Prep", 100).unwrap();
        let slug = topic.slug();
        assert_eq!(slug.chars().count(), Topic::SLUG_LEN);
        assert_eq!(slug, "linear-algebra-");
    }

    // =====================================================================
    // ReleaseReason
    // =====================================================================

    #[test]
    fn test_release_reason_label() {
        assert_eq!(ReleaseReason::Expired.label(), "expired");
        assert_eq!(
            ReleaseReason::Vacant { last_member: None }.label(),
            "vacant"
        );
    }

    #[test]
    fn test_release_reason_display_names_last_member() {
        let reason = ReleaseReason::Vacant {
            last_member: Some(UserId(5)),
        };
        assert_eq!(reason.to_string(), "room became empty after U-5 left");
    }

    // =====================================================================
    // SessionRecord
    // =====================================================================

    #[test]
    fn test_session_record_new_derives_end_time() {
        let record = SessionRecord::new(UserId(1), UserId(2), at(1_000), 600, "Calc");
        assert_eq!(record.end_time, at(1_600));
        assert_eq!(record.duration_secs, 600);
    }

    #[test]
    fn test_session_record_new_huge_duration_saturates_end_time() {
        let past_u64 = SessionRecord::new(UserId(1), UserId(2), at(0), u64::MAX, "Calc");
        let past_i64 = SessionRecord::new(UserId(1), UserId(2), at(0), i64::MAX as u64, "Calc");

        assert_eq!(past_u64.end_time, DateTime::<Utc>::MAX_UTC);
        assert_eq!(past_i64.end_time, DateTime::<Utc>::MAX_UTC);
        assert_eq!(past_u64.duration_secs, u64::MAX);
    }

    #[test]
    fn test_session_record_involves_owner_and_partner() {
        let record = SessionRecord::new(UserId(1), UserId(2), at(0), 60, "Calc");
        assert!(record.involves(UserId(1)));
        assert!(record.involves(UserId(2)));
        assert!(!record.involves(UserId(3)));
    }

    #[test]
    fn test_session_record_json_uses_column_names() {
        let record = SessionRecord::new(UserId(1), UserId(2), at(0), 60, "Calc");
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["user_id"], 1);
        assert_eq!(json["partner_id"], 2);
        assert_eq!(json["duration_seconds"], 60);
        assert_eq!(json["start_time"], "1970-01-01T00:00:00Z");
        assert_eq!(json["end_time"], "1970-01-01T00:01:00Z");
        assert_eq!(json["topic"], "Calc");
    }
}
