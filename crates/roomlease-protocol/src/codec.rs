//! Codec trait and implementations for ledger rows.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The ledger doesn't care HOW a row is serialized; it just needs
//! something that implements [`Codec`]. One row is one encoded value; the
//! ledger adds the line framing.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// - `Send + Sync` → the ledger holding it can be shared across Tokio
///   worker threads.
/// - `'static` → the codec owns everything it needs.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// Encoded output must not contain a raw newline, because the file
    /// ledger frames rows by line.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses compact JSON (via `serde_json`).
///
/// Compact JSON escapes newlines inside strings, so one value always fits
/// on one line. That makes the ledger file greppable and easy to repair by
/// hand.
///
/// ## Example
///
/// ```rust
/// use chrono::Utc;
/// use roomlease_protocol::{Codec, JsonCodec, SessionRecord, UserId};
///
/// let codec = JsonCodec;
/// let record = SessionRecord::new(UserId(1), UserId(2), Utc::now(), 600, "Calc");
///
/// let bytes = codec.encode(&record).unwrap();
/// let decoded: SessionRecord = codec.decode(&bytes).unwrap();
/// assert_eq!(record, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
