//! Admission limits for leases.

use std::time::Duration;

use roomlease_protocol::{BookingRequest, Topic};
use serde::{Deserialize, Serialize};

use crate::LeaseError;

// ---------------------------------------------------------------------------
// LeaseConfig
// ---------------------------------------------------------------------------

/// Limits applied to every booking before anything external is created.
///
/// Operators can override these when building the service. Missing fields
/// in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Shortest bookable duration, in minutes.
    ///
    /// Default: 1.
    pub min_duration_minutes: u32,

    /// Longest bookable duration, in minutes. This is also the hard upper
    /// bound on a lease's lifetime.
    ///
    /// Default: 360 (six hours).
    pub max_duration_minutes: u32,

    /// Maximum topic length in characters.
    ///
    /// Default: 100.
    pub max_topic_len: usize,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 1,
            max_duration_minutes: 360,
            max_topic_len: 100,
        }
    }
}

impl LeaseConfig {
    /// Checks `request` against the limits and returns the parsed topic
    /// and planned duration.
    ///
    /// # Errors
    /// - [`LeaseError::InvalidDuration`]: minutes outside the range
    /// - [`LeaseError::InvalidTopic`]: topic empty or too long
    pub fn validate(&self, request: &BookingRequest) -> Result<(Topic, Duration), LeaseError> {
        let minutes = request.duration_minutes;
        if !(self.min_duration_minutes..=self.max_duration_minutes).contains(&minutes) {
            return Err(LeaseError::InvalidDuration {
                minutes,
                min: self.min_duration_minutes,
                max: self.max_duration_minutes,
            });
        }
        let topic = Topic::parse(&request.topic, self.max_topic_len)
            .map_err(|e| LeaseError::InvalidTopic(e.to_string()))?;
        Ok((topic, Duration::from_secs(u64::from(minutes) * 60)))
    }
}
