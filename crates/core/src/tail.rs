// crates/core/src/tail.rs
//! Offset-based incremental file reads for log tailing.
//!
//! The tailer treats a log as an opaque growing byte sequence: each
//! subscriber tracks its own "last known length" checkpoint and reads only
//! the bytes appended past it, never the whole file again.

use std::io;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Read everything past `offset`, returning the new bytes and the new
/// checkpoint.
///
/// Edge cases:
/// - File shorter than `offset` (should not happen — logs are append-only):
///   the checkpoint resets to the current length and nothing is returned.
/// - File missing: returns empty with the offset unchanged, so a subscriber
///   can connect before the pipeline has produced any log.
pub async fn read_from(path: &Path, offset: u64) -> io::Result<(Vec<u8>, u64)> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), offset)),
        Err(e) => return Err(e),
    };
    let len = file.metadata().await?.len();
    if len <= offset {
        return Ok((Vec::new(), len.min(offset)));
    }

    file.seek(io::SeekFrom::Start(offset)).await?;
    let mut buf = Vec::with_capacity((len - offset) as usize);
    file.read_to_end(&mut buf).await?;
    let new_offset = offset + buf.len() as u64;
    Ok((buf, new_offset))
}

/// Create an empty file if nothing exists at `path` yet.
///
/// Used when a subscriber connects to a job that has been admitted but not
/// yet started, so the tailer has something to watch.
pub async fn ensure_exists(path: &Path) -> io::Result<()> {
    if !path.exists() {
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
    }
    Ok(())
}
