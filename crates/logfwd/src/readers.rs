//! 📖 Readers: gzip bytes in, text lines out, one at a time.
//!
//! 🎬 COLD OPEN / INT. MEMORY ALLOCATOR / PEAK TRAFFIC
//!
//! "The object is 4 GiB uncompressed," said the on-call engineer. "Just read it into a
//! String." The allocator stared back. The OOM killer cracked its knuckles.
//!
//! [`GzipLineReader`] is the answer to that engineer. It pulls compressed bytes from any
//! `AsyncRead` in fixed-size chunks, feeds them to a streaming multi-member gzip decoder,
//! and hands back one line per [`next_line`](GzipLineReader::next_line) call.
//!
//! 🧠 Knowledge graph:
//! - Decoder: `flate2::write::MultiGzDecoder<Vec<u8>>`. We push compressed bytes in with
//!   `write`, it appends decompressed bytes to the inner `Vec`. Each `write` call emits at
//!   most one internal output buffer's worth, so the pending text stays small.
//! - Line splitting: `memchr` over the decoded bytes, resuming where the last scan stopped.
//! - Consumed lines are dropped from the front of the buffer before the next `write`.
//! - End of stream: `try_finish` validates the trailer. A truncated object dies here.
//! - A final line with no `\n` is still a line. A `\r` before `\n` is shaved off.
//! - Drop the reader and the stream handle goes with it, error or not.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::write::MultiGzDecoder;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::errors::ForwardError;

/// 📦 Compressed bytes pulled from the source per read.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// 📖 Lazy, finite, non-restartable line sequence over a gzip stream.
pub struct GzipLineReader<R> {
    source: R,
    decoder: MultiGzDecoder<Vec<u8>>,
    chunk: Vec<u8>,
    // -- compressed bytes in `chunk[fed..filled]` are read but not yet decoded
    fed: usize,
    filled: usize,
    // -- decoded bytes before `line_start` have already been handed out as lines
    line_start: usize,
    // -- no `\n` exists in decoded bytes before this offset
    scan_from: usize,
    source_exhausted: bool,
    drained: bool,
    compressed_bytes_read: u64,
    lines_read: u64,
}

impl<R> std::fmt::Debug for GzipLineReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 the source is usually a boxed trait object with no Debug; skip it
        f.debug_struct("GzipLineReader")
            .field("compressed_bytes_read", &self.compressed_bytes_read)
            .field("lines_read", &self.lines_read)
            .field("source_exhausted", &self.source_exhausted)
            .finish()
    }
}

impl<R: AsyncRead + Unpin> GzipLineReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            decoder: MultiGzDecoder::new(Vec::new()),
            chunk: vec![0; chunk_size.max(1)],
            fed: 0,
            filled: 0,
            line_start: 0,
            scan_from: 0,
            source_exhausted: false,
            drained: false,
            compressed_bytes_read: 0,
            lines_read: 0,
        }
    }

    /// 📄 The next line, without its terminator. `Ok(None)` once the stream is done.
    ///
    /// 💀 Broken gzip framing (including a truncated tail) and invalid UTF-8 are
    /// [`ForwardError::MalformedInput`]. A failing underlying read is
    /// [`ForwardError::Storage`]. After an error, stop calling; the reader is spent.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.take_buffered_line()? {
                return Ok(Some(line));
            }

            if self.source_exhausted {
                return self.take_final_line();
            }

            if self.fed < self.filled {
                self.decode_some()?;
                continue;
            }

            self.refill().await?;
        }
    }

    pub fn compressed_bytes_read(&self) -> u64 {
        self.compressed_bytes_read
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// 🔍 Pops one complete line off the decoded buffer, if there is one.
    fn take_buffered_line(&mut self) -> Result<Option<String>> {
        let the_decoded = self.decoder.get_ref();
        let Some(offset) = memchr::memchr(b'\n', &the_decoded[self.scan_from..]) else {
            self.scan_from = the_decoded.len();
            return Ok(None);
        };

        let the_end = self.scan_from + offset;
        let line = self.decode_line(self.line_start, the_end)?;
        self.line_start = the_end + 1;
        self.scan_from = self.line_start;
        Ok(Some(line))
    }

    /// 🏁 Whatever is left after the trailer checked out is the last, unterminated line.
    fn take_final_line(&mut self) -> Result<Option<String>> {
        let the_len = self.decoder.get_ref().len();
        if self.drained || self.line_start >= the_len {
            self.drained = true;
            return Ok(None);
        }
        let line = self.decode_line(self.line_start, the_len)?;
        self.line_start = the_len;
        self.drained = true;
        Ok(Some(line))
    }

    fn decode_line(&mut self, start: usize, end: usize) -> Result<String> {
        let mut the_bytes = &self.decoder.get_ref()[start..end];
        if let [rest @ .., b'\r'] = the_bytes {
            the_bytes = rest;
        }
        self.lines_read += 1;
        let line_number = self.lines_read;
        String::from_utf8(the_bytes.to_vec()).map_err(|err| {
            ForwardError::MalformedInput(format!("line {line_number} is not valid UTF-8: {err}"))
                .into()
        })
    }

    /// 🗜️ Pushes pending compressed bytes through the decoder. One `write` per call.
    fn decode_some(&mut self) -> Result<()> {
        self.compact_decoded();
        let written = self
            .decoder
            .write(&self.chunk[self.fed..self.filled])
            .context(ForwardError::MalformedInput(
                "gzip stream is corrupt".to_string(),
            ))?;
        if written == 0 {
            return Err(ForwardError::MalformedInput(
                "gzip decoder stopped accepting input (trailing garbage?)".to_string(),
            )
            .into());
        }
        self.fed += written;
        Ok(())
    }

    /// 📡 Reads the next compressed chunk. On EOF, checks the gzip trailer.
    async fn refill(&mut self) -> Result<()> {
        let read = self
            .source
            .read(&mut self.chunk)
            .await
            .context(ForwardError::Storage(
                "reading the compressed stream failed".to_string(),
            ))?;
        trace!("📦 read {read} compressed bytes");

        if read == 0 {
            self.source_exhausted = true;
            // -- 🫥 zero bytes is not an empty gzip stream; there isn't even a header
            if self.compressed_bytes_read == 0 {
                return Err(ForwardError::MalformedInput(
                    "empty object is not a gzip stream".to_string(),
                )
                .into());
            }
            self.compact_decoded();
            self.decoder
                .try_finish()
                .context(ForwardError::MalformedInput(
                    "gzip stream ended early (truncated object?)".to_string(),
                ))?;
            return Ok(());
        }

        self.compressed_bytes_read += read as u64;
        self.fed = 0;
        self.filled = read;
        Ok(())
    }

    /// 🧹 Drops already-returned lines from the front of the decoded buffer.
    fn compact_decoded(&mut self) {
        if self.line_start == 0 {
            return;
        }
        let the_start = self.line_start;
        self.decoder.get_mut().drain(..the_start);
        self.scan_from -= the_start;
        self.line_start = 0;
    }
}
