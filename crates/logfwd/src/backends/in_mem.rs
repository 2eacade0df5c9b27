//! 🧠 In-memory backends: a bucket that is a HashMap and a collector that is a Vec.
//!
//! Tests hand a clone of the [`InMemorySender`] to the pipeline and keep one for
//! themselves. The `Arc` means both clones see the same payloads. Communist data,
//! but in a good way. The borrow checker approved. Barely. It had notes.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::{BatchSender, ObjectStore, ObjectStream};
use crate::common::SourceLocation;
use crate::errors::ForwardError;

// ============================================================
//  🪣 InMemoryStore
// ============================================================

/// 🪣 Objects held as plain byte vectors, keyed by location.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    objects: HashMap<SourceLocation, Arc<Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📥 Puts (or replaces) an object's compressed bytes.
    pub fn insert(&mut self, location: SourceLocation, bytes: Vec<u8>) {
        self.objects.insert(location, Arc::new(bytes));
    }

    pub fn with_object(mut self, location: SourceLocation, bytes: Vec<u8>) -> Self {
        self.insert(location, bytes);
        self
    }
}

/// 🔗 Lets a shared `Arc<Vec<u8>>` be read through a `Cursor` without copying the bytes.
#[derive(Debug, Clone)]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn open(&self, location: &SourceLocation) -> Result<ObjectStream> {
        let the_bytes = self
            .objects
            .get(location)
            .ok_or_else(|| ForwardError::Storage(format!("no such object: {location}")))?;
        trace!("🪣 serving {} in-memory bytes for {location}", the_bytes.len());
        Ok(ObjectStream {
            size_hint: Some(the_bytes.len() as u64),
            reader: Box::new(Cursor::new(SharedBytes(Arc::clone(the_bytes)))),
        })
    }
}

// ============================================================
//  📬 InMemorySender
// ============================================================

/// 📬 A sender that never forgets. Every payload lands in a shared `Vec`.
///
/// `failing_on(n)` makes the n-th send (1-based) fail with a delivery error, so tests
/// can watch the pipeline fall over on cue.
#[derive(Debug, Default, Clone)]
pub struct InMemorySender {
    received: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_on_attempt: Option<usize>,
}

impl InMemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 💣 Arms a failure for the given send attempt (1-based).
    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on_attempt = Some(attempt);
        self
    }

    /// 📋 Successfully delivered payloads, in send order.
    pub async fn payloads(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchSender for InMemorySender {
    async fn send(&mut self, payload: String) -> Result<()> {
        if self.closes.load(Ordering::SeqCst) > 0 {
            return Err(ForwardError::Delivery("send after close".into()).into());
        }
        let the_attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_attempt == Some(the_attempt) {
            return Err(ForwardError::Delivery(format!(
                "in-memory collector rejected batch #{the_attempt}"
            ))
            .into());
        }
        self.received.lock().await.push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closes.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(ForwardError::Delivery("sender closed twice".into()).into());
        }
        Ok(())
    }
}
