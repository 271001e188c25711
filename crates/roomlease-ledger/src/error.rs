//! Error types for the ledger layer.

use roomlease_protocol::ProtocolError;

/// Errors that can occur while writing or reading the session ledger.
///
/// A failed append is never fatal to a release: the coordinator logs it
/// and keeps the record queued for another attempt.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reading or writing the backing file failed.
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be encoded.
    #[error("ledger row codec failed: {0}")]
    Codec(#[from] ProtocolError),

    /// The backing store refused the operation.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}
