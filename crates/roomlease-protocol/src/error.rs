//! Error types for the protocol layer.
//!
//! Each crate in roomlease defines its own error enum. A `ProtocolError`
//! means the problem is in validating or (de)serializing a value, not in
//! lease bookkeeping or external provisioning.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a record into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a record).
    ///
    /// Common causes: a truncated ledger line, a hand-edited row, or a
    /// row written by an incompatible version.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The booking topic is empty or longer than the configured cap.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
}
