//! 💀 Errors: the three ways an invocation can die, plus one for bad config.
//!
//! 🧠 Knowledge graph:
//! - Everything in the crate returns `anyhow::Result`. Context strings pile up like
//!   sediment as the error bubbles out.
//! - A `ForwardError` rides somewhere in that chain, either as the root error or as a
//!   `.context(..)` layer wrapping a foreign error (reqwest, aws, io).
//! - [`classify`] digs it back out, so callers can tell "the gzip was cursed" apart
//!   from "the collector said 503" without string matching.
//!
//! None of these are retried. Not here, not anywhere. Re-triggering is the host's job. 🦆

use thiserror::Error;

/// 🏷️ The error taxonomy. Every fatal failure in an invocation belongs to exactly one bucket.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// 🧨 Invalid JSON line, broken gzip framing, invalid UTF-8, or a trigger event
    /// that doesn't say where the logs are.
    #[error("💀 malformed input: {0}")]
    MalformedInput(String),
    /// 🪣 The object store could not produce (or keep producing) a byte stream.
    #[error("💀 storage failure: {0}")]
    Storage(String),
    /// 📡 Non-200 from the collector, or the request never made it there.
    #[error("💀 delivery failure: {0}")]
    Delivery(String),
    /// 🔧 Config that parses but makes no sense (zero batch size, empty endpoint).
    #[error("💀 configuration error: {0}")]
    Config(String),
}

/// 🔍 Finds the [`ForwardError`] riding in an anyhow chain, if there is one.
///
/// anyhow walks both the wrapped error and every context layer, so this works whether
/// the taxonomy value was the root cause or a `.context(ForwardError::..)` on top of
/// a reqwest/io/aws error.
pub fn classify(err: &anyhow::Error) -> Option<&ForwardError> {
    err.downcast_ref::<ForwardError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn the_one_where_a_root_cause_gets_its_label_back() {
        let err: anyhow::Error = ForwardError::Delivery("collector said 503".into()).into();
        let err = err.context("while flushing the last batch");

        assert_eq!(
            classify(&err),
            Some(&ForwardError::Delivery("collector said 503".into()))
        );
    }

    #[test]
    fn the_one_where_a_context_layer_labels_a_foreign_error() {
        let io_result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such object",
        ));
        let err = io_result
            .context(ForwardError::Storage("s3://bucket/key".into()))
            .context("opening source 1 of 1")
            .unwrap_err();

        assert!(matches!(classify(&err), Some(ForwardError::Storage(_))));
        // 🧅 the io error is still in the chain for the humans
        assert!(err.chain().any(|cause| cause.to_string() == "no such object"));
    }

    #[test]
    fn the_one_where_plain_anyhow_has_no_label() {
        let err = anyhow::anyhow!("just vibes");
        assert_eq!(classify(&err), None);
    }
}
