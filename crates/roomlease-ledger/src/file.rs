//! JSON Lines ledger file.
//!
//! One row per line, each row a [`LedgerRow`] encoded by the configured
//! [`Codec`]. The file is only ever opened for appending; rows are never
//! rewritten in place.
//!
//! ```text
//! {"id":1,"user_id":10,"partner_id":20,"start_time":"2026-10-12T18:00:00Z",...}
//! {"id":2,"user_id":30,"partner_id":10,"start_time":"2026-10-13T09:30:00Z",...}
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use roomlease_protocol::{Codec, JsonCodec, SessionRecord, UserId};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::ledger::{started_since, sum_for_user};
use crate::{LedgerError, LedgerRow, SessionLedger};

/// Where encoded rows go. Implemented by [`File`]; tests substitute a
/// sink that fails on demand.
trait RowSink: AsyncWrite + Unpin + Send {
    /// Current length in bytes.
    fn end(&mut self) -> impl Future<Output = io::Result<u64>> + Send;

    /// Flushes written bytes to durable storage.
    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Cuts the sink back to `len` bytes.
    fn truncate(&mut self, len: u64) -> impl Future<Output = io::Result<()>> + Send;
}

impl RowSink for File {
    fn end(&mut self) -> impl Future<Output = io::Result<u64>> + Send {
        async move { Ok(self.metadata().await?.len()) }
    }

    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> impl Future<Output = io::Result<()>> + Send {
        self.set_len(len)
    }
}

struct Writer<W = File> {
    sink: W,
    next_id: u64,
    /// A failed write left bytes that could not be removed. The next row
    /// starts with a newline so it does not share their line.
    needs_newline: bool,
}

impl<W: RowSink> Writer<W> {
    /// Writes one encoded row (without its newline) and syncs it.
    ///
    /// If the write or sync fails, whatever part of the row reached the
    /// sink is cut off again, so a retried append never lands on the same
    /// line as a torn row.
    async fn write_row(&mut self, row: &[u8]) -> io::Result<()> {
        let start = self.sink.end().await?;

        let mut line = Vec::with_capacity(row.len() + 2);
        if self.needs_newline {
            line.push(b'\n');
        }
        line.extend_from_slice(row);
        line.push(b'\n');

        let written = match self.sink.write_all(&line).await {
            Ok(()) => self.sink.sync().await,
            Err(e) => Err(e),
        };
        let Err(e) = written else {
            self.needs_newline = false;
            return Ok(());
        };

        match self.sink.truncate(start).await {
            Ok(()) => tracing::warn!(error = %e, "ledger write failed, partial row removed"),
            Err(cut) => {
                tracing::warn!(
                    error = %e,
                    truncate_error = %cut,
                    "ledger write failed, partial row kept; next row starts a new line"
                );
                self.needs_newline = true;
            }
        }
        Err(e)
    }
}

/// A [`SessionLedger`] persisted to a JSON Lines file.
///
/// Appends are serialized through one lock and `fsync`ed (`sync_data`)
/// before returning, so an acknowledged append survives a crash. A
/// failed append removes its partial row, or if that fails too, makes
/// sure the next row starts on its own line. Reads take the same lock, so
/// they never observe a half-written row.
pub struct FileLedger<C: Codec = JsonCodec> {
    path: PathBuf,
    codec: C,
    writer: Mutex<Writer>,
}

impl FileLedger<JsonCodec> {
    /// Opens (or creates) the ledger at `path` using [`JsonCodec`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_codec(path, JsonCodec).await
    }
}

impl<C: Codec> FileLedger<C> {
    /// Opens (or creates) the ledger at `path` with a custom row codec.
    ///
    /// Existing rows are scanned once to continue the id sequence. If the
    /// file ends in a torn row (no trailing newline, e.g. after a crash
    /// mid-write), a newline is appended so the next row starts cleanly.
    pub async fn open_with_codec(
        path: impl AsRef<Path>,
        codec: C,
    ) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let existing = fs::read(&path).await?;
        let rows = decode_rows(&codec, &path, &existing);
        let next_id = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;

        if existing.last().is_some_and(|b| *b != b'\n') {
            tracing::warn!(path = %path.display(), "ledger ends in a torn row, terminating it");
            file.write_all(b"\n").await?;
            file.sync_data().await?;
        }

        tracing::info!(
            path = %path.display(),
            rows = rows.len(),
            next_id,
            "session ledger opened"
        );

        Ok(Self {
            path,
            codec,
            writer: Mutex::new(Writer {
                sink: file,
                next_id,
                needs_newline: false,
            }),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every decodable row, in file order.
    pub async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError> {
        let _guard = self.writer.lock().await;
        let data = fs::read(&self.path).await?;
        Ok(decode_rows(&self.codec, &self.path, &data))
    }
}

impl<C: Codec> SessionLedger for FileLedger<C> {
    async fn append(&self, record: &SessionRecord) -> Result<u64, LedgerError> {
        let mut writer = self.writer.lock().await;
        let id = writer.next_id;
        let row = LedgerRow {
            id,
            record: record.clone(),
        };

        let encoded = self.codec.encode(&row)?;
        writer.write_row(&encoded).await?;
        writer.next_id += 1;

        tracing::debug!(id, owner = %record.owner, secs = record.duration_secs, "ledger row appended");
        Ok(id)
    }

    async fn total_duration(&self, user: UserId) -> Result<u64, LedgerError> {
        let rows = self.rows().await?;
        Ok(sum_for_user(rows.iter().map(|row| &row.record), user))
    }

    async fn records_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>, LedgerError> {
        let rows = self.rows().await?;
        Ok(started_since(rows.iter().map(|row| &row.record), since))
    }
}

/// Decodes one row per non-empty line. Undecodable lines are logged and
/// skipped rather than failing the whole read.
fn decode_rows<C: Codec>(codec: &C, path: &Path, data: &[u8]) -> Vec<LedgerRow> {
    let mut rows = Vec::new();
    for (index, line) in data.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match codec.decode::<LedgerRow>(line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping unreadable ledger row"
                );
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    //! Failure handling in `Writer::write_row`, driven by a sink that
    //! accepts a set number of bytes and then errors.

    use std::pin::Pin;
    use std::task::{Context, Poll};

    use chrono::TimeZone;

    use super::*;

    #[derive(Default)]
    struct FlakySink {
        data: Vec<u8>,
        /// Bytes still accepted before writes fail. `None` accepts all.
        budget: Option<usize>,
        fail_truncate: bool,
    }

    impl AsyncWrite for FlakySink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let take = match self.budget {
                Some(0) => return Poll::Ready(Err(io::Error::other("disk full"))),
                Some(left) => left.min(buf.len()),
                None => buf.len(),
            };
            self.data.extend_from_slice(&buf[..take]);
            if let Some(left) = self.budget.as_mut() {
                *left -= take;
            }
            Poll::Ready(Ok(take))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl RowSink for FlakySink {
        fn end(&mut self) -> impl Future<Output = io::Result<u64>> + Send {
            std::future::ready(Ok(self.data.len() as u64))
        }

        fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send {
            std::future::ready(Ok(()))
        }

        fn truncate(&mut self, len: u64) -> impl Future<Output = io::Result<()>> + Send {
            let result = if self.fail_truncate {
                Err(io::Error::other("read-only"))
            } else {
                self.data.truncate(len as usize);
                Ok(())
            };
            std::future::ready(result)
        }
    }

    fn encoded(id: u64, secs: u64) -> Vec<u8> {
        let start = Utc.timestamp_opt(0, 0).single().unwrap();
        let row = LedgerRow {
            id,
            record: SessionRecord::new(UserId(1), UserId(2), start, secs, "Calc"),
        };
        JsonCodec.encode(&row).unwrap()
    }

    fn writer(sink: FlakySink) -> Writer<FlakySink> {
        Writer {
            sink,
            next_id: 1,
            needs_newline: false,
        }
    }

    fn decoded_ids(data: &[u8]) -> Vec<u64> {
        decode_rows(&JsonCodec, Path::new("test.jsonl"), data)
            .iter()
            .map(|row| row.id)
            .collect()
    }

    #[tokio::test]
    async fn test_write_row_partial_write_removes_torn_bytes() {
        let mut writer = writer(FlakySink::default());
        writer.write_row(&encoded(1, 600)).await.unwrap();
        let before = writer.sink.data.clone();

        writer.sink.budget = Some(10);
        assert!(writer.write_row(&encoded(2, 300)).await.is_err());
        assert_eq!(writer.sink.data, before, "torn bytes cut off");

        writer.sink.budget = None;
        writer.write_row(&encoded(2, 300)).await.unwrap();
        assert_eq!(decoded_ids(&writer.sink.data), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_write_row_torn_bytes_kept_next_row_starts_new_line() {
        let mut writer = writer(FlakySink {
            fail_truncate: true,
            ..FlakySink::default()
        });
        writer.write_row(&encoded(1, 600)).await.unwrap();

        writer.sink.budget = Some(10);
        assert!(writer.write_row(&encoded(2, 300)).await.is_err());
        assert!(writer.needs_newline);

        writer.sink.budget = None;
        writer.write_row(&encoded(2, 300)).await.unwrap();

        assert!(!writer.needs_newline);
        assert_eq!(decoded_ids(&writer.sink.data), vec![1, 2], "retried row is readable");
    }
}
