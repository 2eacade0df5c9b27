//! 📦 Common data structures: the nouns of the forwarder.
//!
//! 🎬 COLD OPEN / INT. S3 BUCKET / 00:01 UTC
//!
//! A log shipper somewhere finishes a minute of edge traffic, gzips it, and drops it
//! into a bucket. The bucket fires a notification. The notification lands on our
//! doorstep with a list of `(bucket, key)` pairs and absolutely no other manners.
//!
//! This module holds the types that describe that doorstep delivery:
//! - [`SourceLocation`]: one compressed object to read (container + key)
//! - [`TriggerEvent`]: the ordered list of locations for one invocation
//! - [`InvocationSummary`]: what we did about it, counted
//!
//! 🦆 The duck reads the notification. The duck does not understand S3 event v2.1.
//! Neither does anyone else.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::errors::ForwardError;

/// 🪣 Identifies one compressed log object in the external store.
///
/// `container` is the bucket (or a directory, for the local store), `key` is the object
/// key inside it. Displayed as `s3://container/key` because that's what humans grep for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub container: String,
    pub key: String,
}

impl SourceLocation {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.container, self.key)
    }
}

/// 📬 One trigger, N objects. Order matters: sources are processed exactly in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerEvent {
    locations: Vec<SourceLocation>,
}

// -- 🧾 The S3 notification shape, pared down to the two fields we care about.
// -- Everything else in the notification (eventTime, requestParameters, the whole
// -- userIdentity saga) is ignored by serde, which is the only sane response.
#[derive(Debug, Deserialize)]
struct S3Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    #[serde(default)]
    key: Option<String>,
}

impl TriggerEvent {
    pub fn new(locations: Vec<SourceLocation>) -> Self {
        Self { locations }
    }

    /// 🔎 Parses an S3 event-notification JSON document into a trigger event.
    ///
    /// Object keys arrive URL-encoded (`+` for spaces, `%XX` for the rest) and are
    /// decoded here, so downstream code sees the key the uploader actually used.
    ///
    /// 💀 Fails with [`ForwardError::MalformedInput`] if the JSON is broken or a record
    /// is missing its bucket name or object key. A trigger that can't say where the logs
    /// are is not a trigger, it's a riddle.
    pub fn from_s3_notification(json: &str) -> Result<Self> {
        let notification: S3Notification = serde_json::from_str(json).context(
            ForwardError::MalformedInput("trigger event is not a valid S3 notification".into()),
        )?;

        let mut locations = Vec::with_capacity(notification.records.len());
        for (position, record) in notification.records.into_iter().enumerate() {
            let container = record.s3.bucket.name.ok_or_else(|| {
                ForwardError::MalformedInput(format!(
                    "trigger record {position} has no bucket name"
                ))
            })?;
            let raw_key = record.s3.object.key.ok_or_else(|| {
                ForwardError::MalformedInput(format!("trigger record {position} has no object key"))
            })?;
            locations.push(SourceLocation::new(container, decode_object_key(&raw_key)?));
        }

        Ok(Self { locations })
    }

    pub fn locations(&self) -> &[SourceLocation] {
        &self.locations
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

// -- 🔡 S3 form-encodes keys: spaces become `+`, a literal plus becomes `%2B`.
// -- So swap the pluses first, then percent-decode. Order matters. Ask me how I know.
fn decode_object_key(raw_key: &str) -> Result<String> {
    let spaced = raw_key.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).context(ForwardError::MalformedInput(format!(
        "object key '{raw_key}' is not valid percent-encoded UTF-8"
    )))?;
    Ok(decoded.into_owned())
}

/// 📊 What one invocation accomplished. `status_code()` is the completion signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSummary {
    pub sources_processed: usize,
    pub lines_forwarded: u64,
    pub batches_sent: u64,
    pub compressed_bytes_read: u64,
}

impl InvocationSummary {
    /// ✅ `0` means full success. There is no partial-success code: failures are `Err`.
    pub fn status_code(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify;

    fn notification_for(pairs: &[(&str, &str)]) -> String {
        let records: Vec<serde_json::Value> = pairs
            .iter()
            .map(|(bucket, key)| {
                serde_json::json!({
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "s3SchemaVersion": "1.0",
                        "bucket": { "name": bucket, "arn": format!("arn:aws:s3:::{bucket}") },
                        "object": { "key": key, "size": 1024 }
                    }
                })
            })
            .collect();
        serde_json::json!({ "Records": records }).to_string()
    }

    #[test]
    fn the_one_where_records_keep_their_marching_order() -> Result<()> {
        let json = notification_for(&[
            ("cf-logs", "20240101/first.log.gz"),
            ("cf-logs", "20240101/second.log.gz"),
            ("other-bucket", "third.log.gz"),
        ]);

        let event = TriggerEvent::from_s3_notification(&json)?;

        assert_eq!(
            event.locations(),
            &[
                SourceLocation::new("cf-logs", "20240101/first.log.gz"),
                SourceLocation::new("cf-logs", "20240101/second.log.gz"),
                SourceLocation::new("other-bucket", "third.log.gz"),
            ]
        );
        Ok(())
    }

    #[test]
    fn the_one_where_keys_shed_their_percent_encoding() -> Result<()> {
        let json = notification_for(&[("b", "logs/my+file%2B1%3A2.log.gz")]);

        let event = TriggerEvent::from_s3_notification(&json)?;

        assert_eq!(event.locations()[0].key, "logs/my file+1:2.log.gz");
        Ok(())
    }

    #[test]
    fn the_one_where_an_empty_notification_is_an_empty_event() -> Result<()> {
        let event = TriggerEvent::from_s3_notification(r#"{"Records":[]}"#)?;
        assert!(event.is_empty());

        let event = TriggerEvent::from_s3_notification("{}")?;
        assert!(event.is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_a_keyless_record_is_malformed() {
        let json = r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{}}}]}"#;

        let err = TriggerEvent::from_s3_notification(json).unwrap_err();

        assert!(matches!(classify(&err), Some(ForwardError::MalformedInput(_))));
    }

    #[test]
    fn the_one_where_garbage_is_not_a_trigger() {
        let err = TriggerEvent::from_s3_notification("not even json").unwrap_err();
        assert!(matches!(classify(&err), Some(ForwardError::MalformedInput(_))));
    }

    #[test]
    fn the_one_where_locations_display_like_s3_uris() {
        let location = SourceLocation::new("bucket", "a/b.gz");
        assert_eq!(location.to_string(), "s3://bucket/a/b.gz");
    }
}
