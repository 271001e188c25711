//! Service configuration.

use std::path::{Path, PathBuf};

use roomlease_lease::LeaseConfig;
use serde::{Deserialize, Serialize};

use crate::RoomLeaseError;

/// Everything the service needs besides its provisioner.
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```json
/// { "ledger_path": "/var/lib/roomlease/sessions.jsonl",
///   "lease": { "max_duration_minutes": 120 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Admission limits.
    pub lease: LeaseConfig,

    /// Where [`FileLedger`](roomlease_ledger::FileLedger) keeps session
    /// rows.
    ///
    /// Default: `study_sessions.jsonl` in the working directory.
    pub ledger_path: PathBuf,

    /// Capacity of the vacancy event channel.
    ///
    /// Default: 64.
    pub vacancy_channel_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lease: LeaseConfig::default(),
            ledger_path: PathBuf::from("study_sessions.jsonl"),
            vacancy_channel_size: 64,
        }
    }
}

impl ServiceConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    /// - [`RoomLeaseError::Io`] if the file cannot be read
    /// - [`RoomLeaseError::Config`] if it is not valid JSON for this type
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RoomLeaseError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
