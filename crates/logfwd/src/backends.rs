//! 🔌 Backends: where the real I/O happens.
//!
//! 🪣 Stores pour compressed bytes in. 📡 Senders push finished batches out.
//! Everything between them is pure functions and a buffer.
//!
//! 🎭 This module is the casting agency. Need bytes from S3? From a directory on disk?
//! From a HashMap pretending to be a bucket? We've got a store for that. Need to POST a
//! batch to a collector, or just remember it for a test? We've got a sender for that.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls → backend enum that dispatches with a `match`.
//! - [`ObjectStore`]: `open(location)` → [`ObjectStream`]. Read-only. Shared by reference.
//! - [`BatchSender`]: `send(payload)` + `close()`. Owns its transport. I/O only, no buffering;
//!   buffering is the [`BatchAccumulator`](crate::batching::BatchAccumulator)'s job.
//! - Each backend's config lives next to the backend. No scavenger hunts.
//!
//! 🦆 The duck is here because every file must have one. Do not question the duck.

use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::common::SourceLocation;

pub mod file;
pub mod http;
pub mod in_mem;
pub mod s3;

pub use file::{FileObjectStore, FileStoreConfig};
pub use http::{HttpSender, HttpSenderConfig};
pub use in_mem::{InMemorySender, InMemoryStore};
pub use s3::{S3ObjectStore, S3StoreConfig};

// ===== Store Trait and Backend Enum =====

/// 🌊 An opened object: the compressed byte stream plus its size, if the store knows it.
pub struct ObjectStream {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// 📏 compressed size in bytes; feeds the progress bar, nothing else
    pub size_hint: Option<u64>,
}

impl Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("size_hint", &self.size_hint)
            .finish()
    }
}

/// 🪣 Produces a byte stream for a [`SourceLocation`].
///
/// # Contract 📜
/// - `open` either hands back a readable stream or fails with
///   [`ForwardError::Storage`](crate::errors::ForwardError::Storage). No retries.
/// - The stream is released when the caller drops it. That's the whole lifecycle.
#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    async fn open(&self, location: &SourceLocation) -> Result<ObjectStream>;
}

/// 🎭 The many faces of a store. The pipeline doesn't care which one it got.
#[derive(Debug)]
pub enum StoreBackend {
    S3(S3ObjectStore),
    File(FileObjectStore),
    InMemory(InMemoryStore),
}

#[async_trait]
impl ObjectStore for StoreBackend {
    async fn open(&self, location: &SourceLocation) -> Result<ObjectStream> {
        match self {
            StoreBackend::S3(store) => store.open(location).await,
            StoreBackend::File(store) => store.open(location).await,
            StoreBackend::InMemory(store) => store.open(location).await,
        }
    }
}

// ===== Sender Trait and Backend Enum =====

/// 📡 Transmits finished batch payloads. Pure I/O, zero logic.
///
/// # Contract 📜
/// - `send` transmits one complete payload. Anything short of success is an `Err`
///   tagged [`ForwardError::Delivery`](crate::errors::ForwardError::Delivery).
/// - `close` releases the transport. Called exactly once, after the final flush.
///   Sending after close is an error. Closing twice is an error. Skipping close is a bug.
#[async_trait]
pub trait BatchSender: Debug + Send {
    async fn send(&mut self, payload: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 Mirrors [`StoreBackend`] on the other end of the pipeline.
#[derive(Debug)]
pub enum SenderBackend {
    Http(HttpSender),
    InMemory(InMemorySender),
}

#[async_trait]
impl BatchSender for SenderBackend {
    async fn send(&mut self, payload: String) -> Result<()> {
        match self {
            SenderBackend::Http(sender) => sender.send(payload).await,
            SenderBackend::InMemory(sender) => sender.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SenderBackend::Http(sender) => sender.close().await,
            SenderBackend::InMemory(sender) => sender.close().await,
        }
    }
}
