//! 📡 HTTP sender: POSTs each batch to the collector and hopes it says 200.
//!
//! Not 201. Not 204. Not "2xx, close enough". The collector's contract is `200 OK`,
//! so anything else is a delivery failure, carried up with the status and whatever
//! the response body had to say about it.
//!
//! 🧠 Knowledge graph:
//! - One `reqwest::Client` per sender, built once, reused for every batch.
//! - Body: the batch payload verbatim, `text/plain; charset=utf-8`.
//! - Auth: `Authorization: Bearer <credentials>`, header marked sensitive.
//! - Timeouts live on the client. The core pipeline has none of its own.
//! - `close` drops the client. After that, `send` is an error.
//! - 🔄 No retries. Retries are the operator's re-trigger. Good luck.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::BatchSender;
use crate::errors::ForwardError;

const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// 🔧 Where the batches go and how to get in.
#[derive(Deserialize, Clone)]
pub struct HttpSenderConfig {
    /// 📡 collector URL that receives the POSTs
    pub endpoint: String,
    /// 🔒 bearer token. Never logged, never printed, never Debug'd.
    #[serde(default)]
    pub credentials: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// 🔒 hand-rolled so the token never shows up in a log line
impl std::fmt::Debug for HttpSenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSenderConfig")
            .field("endpoint", &self.endpoint)
            .field("credentials", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl HttpSenderConfig {
    pub fn new(endpoint: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: credentials.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📡 Delivers batch payloads to the collector over HTTP.
pub struct HttpSender {
    client: Option<reqwest::Client>,
    endpoint: String,
    authorization: HeaderValue,
    batches_posted: u64,
}

impl std::fmt::Debug for HttpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSender")
            .field("endpoint", &self.endpoint)
            .field("open", &self.client.is_some())
            .field("batches_posted", &self.batches_posted)
            .finish()
    }
}

impl HttpSender {
    /// 🚀 Builds the client. Nothing is sent until the first batch; no warm-up ping.
    pub fn new(config: &HttpSenderConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(ForwardError::Config("http endpoint must not be empty".into()).into());
        }

        let mut the_authorization =
            HeaderValue::from_str(&format!("Bearer {}", config.credentials)).context(
                ForwardError::Config("credentials contain characters not allowed in a header".into()),
            )?;
        the_authorization.set_sensitive(true);

        let the_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context(ForwardError::Config(
                "the HTTP client refused to be born (TLS backend unavailable?)".into(),
            ))?;

        Ok(Self {
            client: Some(the_client),
            endpoint: config.endpoint.clone(),
            authorization: the_authorization,
            batches_posted: 0,
        })
    }
}

#[async_trait]
impl BatchSender for HttpSender {
    async fn send(&mut self, payload: String) -> Result<()> {
        let the_client = self
            .client
            .as_ref()
            .ok_or_else(|| ForwardError::Delivery("send after close".into()))?;

        debug!("📡 POST {} bytes to {}", payload.len(), self.endpoint);
        let the_response = the_client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_TEXT)
            .header(AUTHORIZATION, self.authorization.clone())
            .body(payload)
            .send()
            .await
            .context(ForwardError::Delivery(format!(
                "POST to {} never got an answer",
                self.endpoint
            )))?;

        let the_status = the_response.status();
        if the_status != StatusCode::OK {
            // -- 📜 the body usually says why; best effort, it's going in the error either way
            let the_body = the_response.text().await.unwrap_or_default();
            return Err(ForwardError::Delivery(format!(
                "collector answered {the_status}: {the_body}"
            ))
            .into());
        }

        self.batches_posted += 1;
        trace!("✅ batch #{} accepted", self.batches_posted);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.client.take() {
            Some(_) => {
                debug!(
                    "🗑️ HTTP sender closed after {} batches",
                    self.batches_posted
                );
                Ok(())
            }
            None => Err(ForwardError::Delivery("sender closed twice".into()).into()),
        }
    }
}
