//! 📂 Previously, on "Things That Could Go Wrong With A Directory"...
//!
//! Someone synced a bucket to local disk to replay last Tuesday. Now the "bucket" is a
//! folder and the "key" is a relative path. This store serves those objects with the
//! exact same contract as S3, minus the egress bill.
//!
//! Layout: `<root>/<container>/<key>`. The container and key must be plain relative
//! paths: no `..`, no leading `/`, no drive letters. A trigger event is not allowed to
//! read `/etc/shadow`, however politely it asks. 🦆

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tracing::trace;

use crate::backends::{ObjectStore, ObjectStream};
use crate::common::SourceLocation;
use crate::errors::ForwardError;

// -- 📂 config lives next to the store that reads it
#[derive(Debug, Deserialize, Clone)]
pub struct FileStoreConfig {
    /// 🏠 directory holding one sub-directory per container
    pub root: PathBuf,
}

/// 📂 Serves objects from a local directory tree.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    pub fn new(config: &FileStoreConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    /// 🧭 Where a location lives on disk. Rejects anything that would climb out of `root`.
    pub fn resolve(&self, location: &SourceLocation) -> Result<PathBuf> {
        let mut the_path = self.root.clone();
        for part in [location.container.as_str(), location.key.as_str()] {
            let the_part = Path::new(part);
            let is_plain = the_part
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
            if part.is_empty() || !is_plain {
                return Err(ForwardError::Storage(format!(
                    "refusing to resolve {location}: '{part}' is not a plain relative path"
                ))
                .into());
            }
            the_path.push(the_part);
        }
        Ok(the_path)
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn open(&self, location: &SourceLocation) -> Result<ObjectStream> {
        let the_path = self.resolve(location)?;
        let the_file = File::open(&the_path).await.context(ForwardError::Storage(format!(
            "could not open {location} at '{}'",
            the_path.display()
        )))?;

        // -- 📏 size is only for the progress bar; a metadata hiccup just means "unknown"
        let the_size = the_file.metadata().await.ok().map(|meta| meta.len());
        trace!("📂 opened '{}' ({:?} bytes)", the_path.display(), the_size);

        Ok(ObjectStream {
            reader: Box::new(the_file),
            size_hint: the_size,
        })
    }
}
