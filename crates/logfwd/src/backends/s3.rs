//! 🪣📡 S3 store: compressed access logs, straight from the bucket.
//!
//! COLD OPEN / EXT. DATA CENTER / 00:01 UTC
//!
//! The edge dumped a minute of logs into a bucket and the bucket rang the doorbell.
//! This store answers: `GetObject` → `ByteStream::into_async_read()` → a boxed
//! `AsyncRead` the gzip reader can chew on. No HEAD request, no download-to-disk,
//! no buffering the whole object "just in case".
//!
//! 🧠 Knowledge graph:
//! - Credentials and default region come from the usual AWS chain (env, profile, role).
//! - `region` overrides the chain. `endpoint_url` + `force_path_style` point the client
//!   at an S3-compatible store (MinIO, LocalStack) for local runs and integration tests.
//! - `content_length` from the GetObject response becomes the progress-bar total.
//! - Every SDK failure is a [`ForwardError::Storage`] carrying the full SDK error context.

use anyhow::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::{ObjectStore, ObjectStream};
use crate::common::SourceLocation;
use crate::errors::ForwardError;

/// 🔧 Configuration for the S3 store. Every field is optional; the AWS chain fills the gaps.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3StoreConfig {
    /// 🌎 region override, e.g. `"eu-west-1"`
    #[serde(default)]
    pub region: Option<String>,
    /// 🏠 custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 🛣️ `http://host/bucket/key` instead of `http://bucket.host/key`
    #[serde(default)]
    pub force_path_style: bool,
}

/// 🪣 Streams objects out of S3 (or anything that speaks its dialect).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// 🚀 Builds the SDK client from the environment plus whatever the config overrides.
    pub async fn new(config: &S3StoreConfig) -> Result<Self> {
        let mut the_loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            the_loader = the_loader.region(Region::new(region.clone()));
        }
        let the_sdk_config = the_loader.load().await;

        let mut the_builder = aws_sdk_s3::config::Builder::from(&the_sdk_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint_url) = &config.endpoint_url {
            the_builder = the_builder.endpoint_url(endpoint_url);
        }

        debug!(
            "🪣 S3 client ready (region: {:?}, endpoint: {:?})",
            the_sdk_config.region(),
            config.endpoint_url
        );
        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(
            the_builder.build(),
        )))
    }

    /// 🔌 Wraps an already-configured client.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn open(&self, location: &SourceLocation) -> Result<ObjectStream> {
        let the_response = self
            .client
            .get_object()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .map_err(|err| {
                ForwardError::Storage(format!(
                    "GetObject failed for {location}: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let the_size = the_response
            .content_length()
            .and_then(|length| u64::try_from(length).ok());
        trace!("🪣 GetObject {location} → {the_size:?} bytes");

        Ok(ObjectStream {
            reader: Box::new(Box::pin(the_response.body.into_async_read())),
            size_hint: the_size,
        })
    }
}
