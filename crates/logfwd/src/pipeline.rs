//! 🚰 Pipeline: one trigger event, start to finish, no detours.
//!
//! 🎬 COLD OPEN / INT. INVOCATION / T+0ms
//!
//! The event lists three objects. We open the first, read it line by line, squish each
//! line, drop it in the batch, and the batch leaves whenever it's full. Then the second
//! object. Then the third. Then one last flush for the stragglers, and the sender is
//! closed. Then we go home.
//!
//! ## Knowledge Graph 🧠
//! ```text
//!   TriggerEvent ─▶ [SourceLocation…] ─▶ ObjectStore::open ─▶ GzipLineReader
//!        ─▶ LineTransform ─▶ BatchAccumulator ─▶ BatchSender
//! ```
//! - Strictly sequential. Sources in event order, lines in read order, batches in fill
//!   order. Nothing is spawned, nothing overlaps.
//! - Each source's stream is dropped before the next one is opened.
//! - Any error aborts the remaining sources. Teardown (flush, then close) still runs,
//!   success or failure. The first error is the one the invocation reports; a teardown
//!   error that comes after it is logged and dropped.
//! - Already-sent batches stay sent. Re-triggering re-sends them. At-least-once, by contract.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backends::{BatchSender, ObjectStore};
use crate::batching::{BatchAccumulator, BatchStats};
use crate::common::{InvocationSummary, SourceLocation, TriggerEvent};
use crate::errors::ForwardError;
use crate::progress::SourceProgress;
use crate::readers::GzipLineReader;
use crate::transforms::{LineTransform, LineTransformer};

// -- 📊 redraw the progress bar every this many lines; redrawing per line is a DoS on your terminal
const PROGRESS_EVERY_LINES: u64 = 4096;

/// 🚰 Wires a store and a transformer to whatever sender each invocation brings.
#[derive(Debug)]
pub struct Pipeline<St: ObjectStore> {
    store: St,
    transformer: LineTransformer,
    batch_size: usize,
    show_progress: bool,
}

impl<St: ObjectStore> Pipeline<St> {
    /// 🏗️ A zero `batch_size` is refused here, before any sender is touched.
    pub fn new(store: St, transformer: LineTransformer, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ForwardError::Config("batch_size must be greater than zero".into()).into());
        }
        Ok(Self {
            store,
            transformer,
            batch_size,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 🚀 Processes every location in `event`, then flushes and closes `sender`.
    ///
    /// The sender is consumed: one sender, one invocation, one close.
    pub async fn run<S: BatchSender>(
        &self,
        event: &TriggerEvent,
        sender: S,
    ) -> Result<InvocationSummary> {
        let the_start = Instant::now();
        let the_locations = event.locations();
        info!("🚀 invocation started: {} source(s)", the_locations.len());

        let mut the_accumulator = BatchAccumulator::new(self.batch_size, sender)?;
        let mut the_summary = InvocationSummary::default();

        let the_outcome = self
            .forward_sources(the_locations, &mut the_accumulator, &mut the_summary)
            .await;

        // -- 🗑️ teardown runs no matter how the sources went
        let the_teardown = the_accumulator
            .close()
            .await
            .context("final flush and sender close failed");

        let the_stats: BatchStats = match (the_outcome, the_teardown) {
            (Ok(()), Ok(stats)) => stats,
            (Ok(()), Err(teardown_err)) => return Err(teardown_err),
            (Err(err), Ok(stats)) => {
                warn!(
                    "💀 invocation failed after {} batch(es) were already sent",
                    stats.batches_sent
                );
                return Err(err);
            }
            (Err(err), Err(teardown_err)) => {
                warn!("⚠️ teardown also failed after the first error: {teardown_err:#}");
                return Err(err);
            }
        };

        the_summary.batches_sent = the_stats.batches_sent;
        the_summary.lines_forwarded = the_stats.lines_sent;
        info!(
            "✅ invocation done in {:?}: {} source(s), {} line(s), {} batch(es)",
            the_start.elapsed(),
            the_summary.sources_processed,
            the_summary.lines_forwarded,
            the_summary.batches_sent
        );
        Ok(the_summary)
    }

    async fn forward_sources<S: BatchSender>(
        &self,
        locations: &[SourceLocation],
        accumulator: &mut BatchAccumulator<S>,
        summary: &mut InvocationSummary,
    ) -> Result<()> {
        let the_total = locations.len();
        for (index, location) in locations.iter().enumerate() {
            let the_bytes = self
                .forward_source(location, accumulator)
                .await
                .with_context(|| format!("source {} of {the_total}: {location}", index + 1))?;
            summary.sources_processed += 1;
            summary.compressed_bytes_read += the_bytes;
        }
        Ok(())
    }

    /// 📖 One source, start to end. Returns compressed bytes read.
    async fn forward_source<S: BatchSender>(
        &self,
        location: &SourceLocation,
        accumulator: &mut BatchAccumulator<S>,
    ) -> Result<u64> {
        let the_stream = self.store.open(location).await?;
        info!("📂 reading {location} ({:?} compressed bytes)", the_stream.size_hint);

        let mut the_progress =
            SourceProgress::new(location.to_string(), the_stream.size_hint, self.show_progress);
        let mut the_reader = GzipLineReader::new(the_stream.reader);

        while let Some(raw_line) = the_reader.next_line().await? {
            let the_line_number = the_reader.lines_read();
            let the_compact = self
                .transformer
                .transform(&raw_line)
                .with_context(|| format!("line {the_line_number}"))?;
            accumulator.append(&the_compact).await?;

            if the_line_number % PROGRESS_EVERY_LINES == 0 {
                the_progress.update(the_reader.compressed_bytes_read(), the_line_number);
            }
        }

        the_progress.update(the_reader.compressed_bytes_read(), the_reader.lines_read());
        the_progress.finish();
        debug!(
            "✅ {location}: {} line(s), {} buffered for the next batch",
            the_reader.lines_read(),
            accumulator.buffered_lines()
        );
        Ok(the_reader.compressed_bytes_read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemorySender, InMemoryStore};
    use crate::errors::classify;
    use crate::transforms::TransformKind;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip_lines(lines: &[&str]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap()
    }

    fn pipeline_over(store: InMemoryStore, batch_size: usize) -> Pipeline<InMemoryStore> {
        Pipeline::new(store, LineTransformer::default(), batch_size).unwrap()
    }

    #[tokio::test]
    async fn the_one_where_three_records_become_one_batch() -> Result<()> {
        let location = SourceLocation::new("bucket", "a.gz");
        let store = InMemoryStore::new().with_object(
            location.clone(),
            gzip_lines(&[
                r#"{"ClientRequestMethod":"GET","RayID":"r1"}"#,
                r#"{"ClientRequestMethod":"PUT","RayID":"r2"}"#,
                r#"{"ClientRequestMethod":"DELETE","RayID":"r3"}"#,
            ]),
        );
        let sender = InMemorySender::new();

        let summary = pipeline_over(store, 100)
            .run(&TriggerEvent::new(vec![location]), sender.clone())
            .await?;

        assert_eq!(
            sender.payloads().await,
            vec![concat!(
                "GET null null null null null null null r1 null null null\n",
                "PUT null null null null null null null r2 null null null\n",
                "DELETE null null null null null null null r3 null null null\n",
            )]
        );
        assert_eq!(summary.lines_forwarded, 3);
        assert_eq!(summary.batches_sent, 1);
        assert_eq!(summary.sources_processed, 1);
        assert_eq!(summary.status_code(), 0);
        assert_eq!(sender.close_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_sources_share_batches_in_event_order() -> Result<()> {
        let first = SourceLocation::new("bucket", "1.gz");
        let second = SourceLocation::new("bucket", "2.gz");
        let store = InMemoryStore::new()
            .with_object(first.clone(), gzip_lines(&["a", "b", "c"]))
            .with_object(second.clone(), gzip_lines(&["d", "e"]));
        let sender = InMemorySender::new();
        let pipeline = Pipeline::new(
            store,
            LineTransformer::from_kind(TransformKind::Passthrough),
            2,
        )?;

        // -- second listed first: event order wins, not key order
        let summary = pipeline
            .run(&TriggerEvent::new(vec![second, first]), sender.clone())
            .await?;

        assert_eq!(sender.payloads().await, vec!["d\ne\n", "a\nb\n", "c\n"]);
        assert_eq!(summary.sources_processed, 2);
        assert_eq!(summary.batches_sent, 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_event_still_closes_the_door() -> Result<()> {
        let sender = InMemorySender::new();

        let summary = pipeline_over(InMemoryStore::new(), 10)
            .run(&TriggerEvent::default(), sender.clone())
            .await?;

        assert!(sender.payloads().await.is_empty());
        assert_eq!(sender.close_count(), 1);
        assert_eq!(summary, InvocationSummary::default());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_line_stops_everything_but_teardown() {
        let first = SourceLocation::new("bucket", "good.gz");
        let second = SourceLocation::new("bucket", "bad.gz");
        let third = SourceLocation::new("bucket", "never-opened.gz");
        let store = InMemoryStore::new()
            .with_object(first.clone(), gzip_lines(&[r#"{"RayID":"ok"}"#]))
            .with_object(second.clone(), gzip_lines(&[r#"{"RayID":"fine"}"#, "{oops"]))
            .with_object(third.clone(), gzip_lines(&[r#"{"RayID":"unseen"}"#]));
        let sender = InMemorySender::new();

        let err = pipeline_over(store, 100)
            .run(&TriggerEvent::new(vec![first, second, third]), sender.clone())
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(ForwardError::MalformedInput(_))));
        let rendered = format!("{err:#}");
        assert!(rendered.contains("source 2 of 3"), "💀 {rendered}");
        assert!(rendered.contains("line 2"), "💀 {rendered}");
        // -- 🚽 the two good lines before the failure still went out in the final flush
        let payloads = sender.payloads().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].lines().count(), 2);
        assert!(!payloads[0].contains("unseen"));
        assert_eq!(sender.close_count(), 1);
    }

    #[tokio::test]
    async fn the_one_where_the_object_is_missing() {
        let sender = InMemorySender::new();

        let err = pipeline_over(InMemoryStore::new(), 10)
            .run(
                &TriggerEvent::new(vec![SourceLocation::new("bucket", "ghost.gz")]),
                sender.clone(),
            )
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(ForwardError::Storage(_))));
        assert_eq!(sender.close_count(), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_rejected_batch_is_not_retried() {
        let location = SourceLocation::new("bucket", "a.gz");
        let store = InMemoryStore::new().with_object(
            location.clone(),
            gzip_lines(&["{}", "{}", "{}", "{}", "{}"]),
        );
        let sender = InMemorySender::new().failing_on(1);

        let err = pipeline_over(store, 2)
            .run(&TriggerEvent::new(vec![location]), sender.clone())
            .await
            .unwrap_err();

        assert!(matches!(classify(&err), Some(ForwardError::Delivery(_))));
        // -- the failed first batch is gone for good, nothing else was buffered yet
        assert!(sender.payloads().await.is_empty());
        assert_eq!(sender.close_count(), 1);
    }

    #[test]
    fn the_one_where_zero_batch_size_never_gets_a_pipeline() {
        let err = Pipeline::new(InMemoryStore::new(), LineTransformer::default(), 0).unwrap_err();
        assert!(matches!(classify(&err), Some(ForwardError::Config(_))));
    }
}
