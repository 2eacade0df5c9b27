//! 📦 Batching: lines pile up, a batch leaves, the pile resets.
//!
//! 🧠 Knowledge graph:
//! - [`BatchAccumulator`] owns exactly one in-progress batch: a `String` buffer of
//!   `line + "\n"` entries and a line counter. Nobody else touches them.
//! - The counter hits `batch_size` → the batch goes to the [`BatchSender`] right there,
//!   inside `append`. So between calls the buffer holds at most `batch_size - 1` lines.
//! - `flush` ships a non-empty remainder and is a no-op on an empty one. Empty payloads
//!   are never sent. The collector has enough problems.
//! - The buffer is handed over by value and the accumulator resets *before* we look at
//!   the send result. A batch that failed to send is never re-sent by a later flush.
//!   No retries. Not even a little one.
//! - `close` is the one-way door: flush, then close the sender, then the accumulator is gone.

use std::mem;

use anyhow::Result;
use tracing::debug;

use crate::backends::BatchSender;
use crate::errors::ForwardError;

/// 📊 What went out the door over an accumulator's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches_sent: u64,
    pub lines_sent: u64,
}

/// 📦 Buffers transformed lines and dispatches them in batches of `batch_size`.
#[derive(Debug)]
pub struct BatchAccumulator<S: BatchSender> {
    batch_size: usize,
    buffer: String,
    buffered_lines: usize,
    stats: BatchStats,
    sender: S,
}

impl<S: BatchSender> BatchAccumulator<S> {
    /// 🚀 A fresh, empty accumulator. A `batch_size` of zero is a config error.
    pub fn new(batch_size: usize, sender: S) -> Result<Self> {
        if batch_size == 0 {
            return Err(ForwardError::Config("batch_size must be greater than zero".into()).into());
        }
        Ok(Self {
            batch_size,
            buffer: String::new(),
            buffered_lines: 0,
            stats: BatchStats::default(),
            sender,
        })
    }

    /// ➕ Adds one line. Sends the batch on the spot if this line filled it.
    pub async fn append(&mut self, line: &str) -> Result<()> {
        self.buffer.push_str(line);
        self.buffer.push('\n');
        self.buffered_lines += 1;
        if self.buffered_lines == self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// 🚽 Sends whatever is buffered. Nothing buffered, nothing sent.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffered_lines == 0 {
            return Ok(());
        }

        // -- 🔄 reset first: the payload leaves by value, the next batch starts clean
        let the_capacity = self.buffer.len();
        let the_payload = mem::replace(&mut self.buffer, String::with_capacity(the_capacity));
        let the_line_count = mem::take(&mut self.buffered_lines);

        debug!(
            "📡 sending batch #{}: {} lines, {} bytes",
            self.stats.batches_sent + 1,
            the_line_count,
            the_payload.len()
        );
        self.sender.send(the_payload).await?;

        self.stats.batches_sent += 1;
        self.stats.lines_sent += the_line_count as u64;
        Ok(())
    }

    /// 🗑️ Terminal teardown: flush, then close the sender. Both always run.
    ///
    /// If the flush fails the sender is still closed; the flush error is the one reported.
    pub async fn close(mut self) -> Result<BatchStats> {
        let the_flush = self.flush().await;
        let the_close = self.sender.close().await;
        the_flush?;
        the_close?;
        Ok(self.stats)
    }

    pub fn buffered_lines(&self) -> usize {
        self.buffered_lines
    }

    pub fn batches_sent(&self) -> u64 {
        self.stats.batches_sent
    }

    pub fn lines_sent(&self) -> u64 {
        self.stats.lines_sent
    }
}
