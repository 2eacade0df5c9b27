//! 🗜️ Compact transform: forty fields in, twelve words out.
//!
//! The input is one access-log record as a JSON object. The output is the values of
//! twelve well-known fields in a fixed order, joined by a separator, with a marker
//! standing in for anything absent. No quoting, no escaping, no way back. It's lossy
//! on purpose: the consumer is `grep`, not a parser.
//!
//! 🧠 Knowledge graph:
//! - The record is never materialized as a `serde_json::Value`. A hand-written map visitor
//!   walks the object once, keeps a borrowed [`RawValue`] for each recognized key, and
//!   waves every other key through as [`IgnoredAny`]. Unknown keys cost a skim, not an alloc.
//! - Strings render unescaped. Numbers, booleans, objects and arrays render as the exact
//!   JSON text they arrived as, so `1.50` stays `1.50` and nobody's float gets "helped".
//! - `null` and absent both render the missing marker.
//! - Last duplicate key wins, same as every JSON-to-map parser on earth.
//! - ⚠️ Lenient on purpose: an object or array under a recognized key is forwarded as its
//!   raw JSON text. A reader that insists every recognized field is a string would reject
//!   the whole record instead; here only unparseable lines are fatal.

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::value::RawValue;

use super::LineTransform;
use crate::errors::ForwardError;

/// 📋 The projection, in output order. Reordering this reorders every line we ever send.
pub const RECOGNIZED_FIELDS: [&str; 12] = [
    "ClientRequestMethod",
    "ClientRequestHost",
    "ClientRequestURI",
    "ClientIP",
    "ClientCountry",
    "EdgeResponseStatus",
    "EdgeResponseBytes",
    "CacheCacheStatus",
    "RayID",
    "EdgeStartTimestamp",
    "EdgeEndTimestamp",
    "ClientRequestUserAgent",
];

const FIELD_COUNT: usize = RECOGNIZED_FIELDS.len();

// -- ✂️ how much of a bad line we quote back in the error. enough to find it, not enough to flood the log.
const PREVIEW_CHARS: usize = 120;

/// 🎨 How a compact line is rendered: the separator between slots and the marker for
/// a missing value. Built once, handed to the transformer, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactFormat {
    separator: String,
    missing: String,
}

impl CompactFormat {
    pub fn new(separator: impl Into<String>, missing: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            missing: missing.into(),
        }
    }
}

impl Default for CompactFormat {
    /// 🧾 Single space between slots, literal `null` for the gaps.
    fn default() -> Self {
        Self::new(" ", "null")
    }
}

/// 🗜️ Projects an access-log JSON record onto [`RECOGNIZED_FIELDS`].
///
/// ```
/// use logfwd::transforms::{CompactLineTransformer, LineTransform};
///
/// let transformer = CompactLineTransformer::default();
/// let line = transformer
///     .transform(r#"{"ClientRequestMethod":"GET","RayID":"foobar","Noise":[1,2,3]}"#)
///     .unwrap();
/// assert_eq!(line, "GET null null null null null null null foobar null null null");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompactLineTransformer {
    format: CompactFormat,
}

impl CompactLineTransformer {
    pub fn new(format: CompactFormat) -> Self {
        Self { format }
    }
}

impl LineTransform for CompactLineTransformer {
    fn transform(&self, raw: &str) -> Result<String> {
        let the_slots: RecordSlots<'_> = serde_json::from_str(raw).with_context(|| {
            ForwardError::MalformedInput(format!("not a JSON object: {}", preview(raw)))
        })?;

        // -- 📏 rough guess: the compact line is usually a fraction of the record
        let mut the_line = String::with_capacity(raw.len() / 2);
        for (position, slot) in the_slots.0.iter().enumerate() {
            if position > 0 {
                the_line.push_str(&self.format.separator);
            }
            match slot {
                Some(value) => push_rendered(&mut the_line, value, RECOGNIZED_FIELDS[position])?,
                None => the_line.push_str(&self.format.missing),
            }
        }
        Ok(the_line)
    }
}

/// 🖊️ Appends one slot value. Strings lose their quotes (and escapes), everything else
/// is copied verbatim from the source text.
fn push_rendered(out: &mut String, value: &RawValue, field: &str) -> Result<()> {
    let the_text = value.get();
    match the_text
        .strip_prefix('"')
        .and_then(|body| body.strip_suffix('"'))
    {
        // -- 🏎️ no backslash, no escapes, no allocation
        Some(body) if memchr::memchr(b'\\', body.as_bytes()).is_none() => out.push_str(body),
        Some(_) => {
            let the_unescaped: String = serde_json::from_str(the_text).with_context(|| {
                ForwardError::MalformedInput(format!("field {field} holds an unreadable string"))
            })?;
            out.push_str(&the_unescaped);
        }
        None => out.push_str(the_text),
    }
    Ok(())
}

fn preview(raw: &str) -> String {
    let mut the_preview: String = raw.chars().take(PREVIEW_CHARS).collect();
    if the_preview.len() < raw.len() {
        the_preview.push('…');
    }
    the_preview
}

// ============================================================
//  🕵️ The map visitor. One pass, borrowed values, no Value tree.
// ============================================================

/// Index into [`RECOGNIZED_FIELDS`], or `None` for a key we don't care about.
struct FieldSlot(Option<usize>);

impl<'de> Deserialize<'de> for FieldSlot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldSlotVisitor;

        impl<'de> Visitor<'de> for FieldSlotVisitor {
            type Value = FieldSlot;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a field name")
            }

            fn visit_str<E>(self, name: &str) -> Result<FieldSlot, E>
            where
                E: de::Error,
            {
                Ok(FieldSlot(
                    RECOGNIZED_FIELDS.iter().position(|field| *field == name),
                ))
            }
        }

        deserializer.deserialize_identifier(FieldSlotVisitor)
    }
}

/// The twelve slots of one record, each borrowing straight from the input line.
struct RecordSlots<'a>([Option<&'a RawValue>; FIELD_COUNT]);

impl<'de> Deserialize<'de> for RecordSlots<'de> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordSlotsVisitor)
    }
}

struct RecordSlotsVisitor;

impl<'de> Visitor<'de> for RecordSlotsVisitor {
    type Value = RecordSlots<'de>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an access-log record (JSON object)")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut the_slots: [Option<&'de RawValue>; FIELD_COUNT] = [None; FIELD_COUNT];
        while let Some(FieldSlot(slot)) = map.next_key()? {
            match slot {
                // -- 🔁 duplicate key? the later one overwrites. last writer wins.
                Some(index) => the_slots[index] = map.next_value()?,
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(RecordSlots(the_slots))
    }
}
