//! 📬 logfwd: gzip NDJSON access logs in, compact lines out, batched over HTTP.
//!
//! One invocation: a trigger event names some compressed objects, each object is
//! streamed and decompressed line by line, each line is squished by a transform, the
//! squished lines are batched, and the batches are POSTed to a collector. Then a final
//! flush, a close, and a summary.

pub mod app_config;
pub mod backends;
pub mod batching;
pub mod common;
pub mod errors;
pub mod pipeline;
pub mod progress;
pub mod readers;
pub mod transforms;

use anyhow::{Context, Result};

pub use app_config::{AppConfig, load_config};
pub use common::{InvocationSummary, SourceLocation, TriggerEvent};
pub use errors::{ForwardError, classify};
pub use pipeline::Pipeline;

use crate::transforms::LineTransformer;

/// 🚀 Runs one invocation end to end from a loaded config: builds the store, a fresh
/// sender and the pipeline, then processes `event`.
pub async fn run(app_config: &AppConfig, event: &TriggerEvent) -> Result<InvocationSummary> {
    let the_store = app_config
        .store
        .build()
        .await
        .context("building the object store")?;
    let the_sender = app_config
        .sender
        .build()
        .context("building the batch sender")?;
    let the_pipeline = Pipeline::new(
        the_store,
        LineTransformer::from_kind(app_config.transform),
        app_config.batch_size,
    )?
    .with_progress(app_config.show_progress);

    the_pipeline.run(event, the_sender).await
}
