//! Newline-delimited message framing over the process's standard streams.
//!
//! # Wire Format
//!
//! ```text
//! {"query":"member(X,[1,2])"}\n
//! {"status":"success","bindings":{"X":1}}\n
//! ```
//!
//! Each line carries exactly one JSON message. Blank lines are skipped, and
//! surrounding whitespace (including a trailing `\r`) is trimmed.

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum line size (100MB) to prevent OOM from a runaway process.
pub const MAX_LINE_SIZE: usize = 100 * 1024 * 1024;

/// Read the next non-blank line from the stream.
///
/// Returns `Ok(None)` once the stream reaches EOF.
///
/// # Errors
///
/// Returns an error if:
/// - Reading from the stream fails
/// - A line exceeds MAX_LINE_SIZE (100MB)
/// - A line is not valid UTF-8
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut buf = Vec::new();
        let bytes_read = (&mut *reader)
            .take(MAX_LINE_SIZE as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read line")?;

        // EOF - process closed its output
        if bytes_read == 0 {
            return Ok(None);
        }

        if buf.len() > MAX_LINE_SIZE {
            return Err(anyhow!(
                "Line size exceeds maximum {} bytes",
                MAX_LINE_SIZE
            ));
        }

        let line = String::from_utf8(buf).context("Line is not valid UTF-8")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(trimmed.to_string()));
    }
}

/// Write one message followed by a newline, then flush.
///
/// # Errors
///
/// Returns an error if the body contains a newline (it would split into two
/// messages), or if the write or flush fails.
pub async fn write_line<W>(writer: &mut W, body: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if body.contains('\n') {
        bail!("Message body contains a newline");
    }

    writer
        .write_all(body.as_bytes())
        .await
        .context("Failed to write message body")?;

    writer
        .write_all(b"\n")
        .await
        .context("Failed to write message delimiter")?;

    writer.flush().await.context("Failed to flush message")?;

    Ok(())
}

/// Whether a framing error came from the stream itself rather than its content.
pub fn is_io_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>().is_some()
}
