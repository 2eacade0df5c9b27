//! 🚶 Passthrough: the line goes out exactly as it came in.
//!
//! "What did you do yesterday?" "Forwarded bytes unchanged." "And today?" "Same."
//!
//! For collectors that want the raw NDJSON rather than the compact projection.
//! No parsing happens here, so a broken line is forwarded broken. That's the deal.

use anyhow::Result;

use super::LineTransform;

/// 🚶 Identity transform. Zero-sized, zero opinions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl LineTransform for Passthrough {
    fn transform(&self, raw: &str) -> Result<String> {
        Ok(raw.to_owned())
    }
}
