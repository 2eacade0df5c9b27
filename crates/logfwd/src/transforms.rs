//! 🔄 Transforms: one raw JSON line in, one forwardable line out.
//!
//! 🎬 COLD OPEN / INT. EDGE POP / LOG ROTATION / 00:00:59.999
//!
//! Forty fields per request. Forty. The collector downstream wants twelve, space separated,
//! in a fixed order, greppable by a human with a terminal and a grudge.
//! Somebody has to do the squishing. This module is the somebody.
//!
//! ## Knowledge Graph 🧠
//! - Trait: [`LineTransform`]: `&str` in, `String` out, pure, no I/O
//! - Impls: [`CompactLineTransformer`] (the real one), [`Passthrough`] (the lazy one)
//! - Dispatch: [`LineTransformer`] enum, same casting-agency pattern as the backends
//! - Config: [`TransformKind`] picks the variant, [`CompactFormat`] is handed in once
//!   and never mutated. There is no global codec lurking in a static somewhere.
//!
//! ⚠️ A line that won't parse is fatal. We never skip. Skipping is how logs go missing
//! and nobody notices until the audit. 🦆

use anyhow::Result;
use serde::Deserialize;

pub mod compact;
pub mod passthrough;

pub use compact::{CompactFormat, CompactLineTransformer, RECOGNIZED_FIELDS};
pub use passthrough::Passthrough;

/// 🔄 Turns one raw input line into the line that gets batched and shipped.
///
/// # Contract 📜
/// - Pure: same input, same output, no side effects, no I/O.
/// - Output never carries a trailing newline; the accumulator adds that.
/// - Invalid input is an `Err` tagged [`ForwardError::MalformedInput`](crate::errors::ForwardError).
pub trait LineTransform {
    fn transform(&self, raw: &str) -> Result<String>;
}

/// 🎛️ Which transform an invocation runs. Lives in config as `transform = "compact"`.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// 🗜️ Project the twelve access-log fields into one compact line. The default.
    #[default]
    Compact,
    /// 🚶 Forward each line untouched. Useful when the collector wants raw NDJSON.
    Passthrough,
}

/// 🎭 The many faces of a transform. Enum dispatch, so the hot loop has no vtable.
#[derive(Debug, Clone)]
pub enum LineTransformer {
    Compact(CompactLineTransformer),
    Passthrough(Passthrough),
}

impl LineTransformer {
    /// 🏭 Builds the transformer for a configured kind, with the stock compact format.
    pub fn from_kind(kind: TransformKind) -> Self {
        match kind {
            TransformKind::Compact => {
                LineTransformer::Compact(CompactLineTransformer::new(CompactFormat::default()))
            }
            TransformKind::Passthrough => LineTransformer::Passthrough(Passthrough),
        }
    }
}

impl Default for LineTransformer {
    fn default() -> Self {
        Self::from_kind(TransformKind::Compact)
    }
}

impl LineTransform for LineTransformer {
    fn transform(&self, raw: &str) -> Result<String> {
        match self {
            LineTransformer::Compact(transformer) => transformer.transform(raw),
            LineTransformer::Passthrough(transformer) => transformer.transform(raw),
        }
    }
}
