//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." said every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment: `LOGFWD_*` environment variables merged with an optional TOML
//! file, TOML winning ties. Nested keys in env use a double underscore:
//! `LOGFWD_SENDER__HTTP__ENDPOINT=https://collector/ingest`.
//!
//! 🧳 Moving an older deployment over? Its two variables have new names:
//!
//! | old                         | new                                |
//! |-----------------------------|------------------------------------|
//! | `LogForwarderHttpEndpoint`  | `LOGFWD_SENDER__HTTP__ENDPOINT`    |
//! | `LogForwarderCredentials`   | `LOGFWD_SENDER__HTTP__CREDENTIALS` |
//!
//! The old names are not read. Set the new ones.
//!
//! ```toml
//! batch_size = 1000
//! show_progress = false
//! transform = "compact"
//!
//! [sender.http]
//! endpoint = "https://collector.example/ingest"
//! credentials = "token"
//!
//! [store.s3]
//! region = "us-east-1"
//! ```

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{
    FileObjectStore, FileStoreConfig, HttpSender, HttpSenderConfig, S3ObjectStore, S3StoreConfig,
    SenderBackend, StoreBackend,
};
use crate::errors::ForwardError;
use crate::transforms::TransformKind;

// -- 🏷️ every env var we read starts with this. no velvet rope beyond that.
pub const ENV_PREFIX: &str = "LOGFWD_";

/// 📦 One struct to rule them all, one struct to find them, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📏 lines per batch. Zero is rejected by [`AppConfig::validate`].
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 📊 draw per-source progress bars on stderr
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub transform: TransformKind,
    pub sender: SenderConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_batch_size() -> usize {
    1000
}

/// 📡 Which sender delivers the batches. One variant today; the enum is the seam.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum SenderConfig {
    Http(HttpSenderConfig),
}

/// 🪣 Which store the compressed objects come from.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    S3(S3StoreConfig),
    File(FileStoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::S3(S3StoreConfig::default())
    }
}

impl AppConfig {
    /// ✅ Rejects config that parses fine but can't possibly work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            return Err(ForwardError::Config("batch_size must be greater than zero".into()).into());
        }
        match &self.sender {
            SenderConfig::Http(http) if http.endpoint.trim().is_empty() => Err(
                ForwardError::Config("sender.http.endpoint must not be empty".into()).into(),
            ),
            SenderConfig::Http(_) => Ok(()),
        }
    }
}

impl StoreConfig {
    /// 🏭 Builds the configured store. The S3 flavor talks to the AWS config chain.
    pub async fn build(&self) -> anyhow::Result<StoreBackend> {
        Ok(match self {
            StoreConfig::S3(config) => StoreBackend::S3(S3ObjectStore::new(config).await?),
            StoreConfig::File(config) => StoreBackend::File(FileObjectStore::new(config)),
        })
    }
}

impl SenderConfig {
    /// 🏭 Builds a fresh sender. One per invocation; it's closed at the end of each.
    pub fn build(&self) -> anyhow::Result<SenderBackend> {
        Ok(match self {
            SenderConfig::Http(config) => SenderBackend::Http(HttpSender::new(config)?),
        })
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 📐 If `config_file_name` is None → env vars only. If Some → env vars + TOML, TOML wins.
/// The result is validated before it's returned, so a zero batch size dies here and
/// not three gigabytes into an object.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({ENV_PREFIX}*). \
             The file exists in our hearts, but apparently not in a shape serde recognizes.",
            path.display()
        ),
        None => format!(
            "💀 Failed to parse configuration from environment variables ({ENV_PREFIX}*). \
             No file was provided, so this one's all on the environment."
        ),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::classify;
    use figment::Jail;

    #[test]
    fn the_one_where_the_toml_file_has_everything() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "logfwd.toml",
                r#"
                batch_size = 250
                show_progress = true
                transform = "passthrough"

                [sender.http]
                endpoint = "https://collector.example/ingest"
                credentials = "token"
                request_timeout_secs = 5

                [store.file]
                root = "/srv/logs"
                "#,
            )?;

            let config = load_config(Some(Path::new("logfwd.toml")))
                .map_err(|err| format!("{err:#}"))?;

            assert_eq!(config.batch_size, 250);
            assert!(config.show_progress);
            assert_eq!(config.transform, TransformKind::Passthrough);
            let SenderConfig::Http(http) = &config.sender;
            assert_eq!(http.endpoint, "https://collector.example/ingest");
            assert_eq!(http.request_timeout_secs, 5);
            assert_eq!(http.connect_timeout_secs, 10);
            match &config.store {
                StoreConfig::File(file) => assert_eq!(file.root, Path::new("/srv/logs")),
                honestly_who_knows => panic!("💀 expected a file store, serde took us to {honestly_who_knows:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "logfwd.toml",
                r#"
                [sender.http]
                endpoint = "https://collector.example/ingest"
                "#,
            )?;

            let config = load_config(Some(Path::new("logfwd.toml")))
                .map_err(|err| format!("{err:#}"))?;

            assert_eq!(config.batch_size, 1000);
            assert!(!config.show_progress);
            assert_eq!(config.transform, TransformKind::Compact);
            assert!(matches!(config.store, StoreConfig::S3(_)));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_environment_does_all_the_talking() {
        Jail::expect_with(|jail| {
            jail.set_env("LOGFWD_BATCH_SIZE", "42");
            jail.set_env("LOGFWD_SENDER__HTTP__ENDPOINT", "http://env-collector/ingest");
            jail.set_env("LOGFWD_SENDER__HTTP__CREDENTIALS", "from-env");
            jail.set_env("LOGFWD_STORE__S3__REGION", "eu-west-1");

            let config = load_config(None).map_err(|err| format!("{err:#}"))?;

            assert_eq!(config.batch_size, 42);
            let SenderConfig::Http(http) = &config.sender;
            assert_eq!(http.endpoint, "http://env-collector/ingest");
            assert_eq!(http.credentials, "from-env");
            match &config.store {
                StoreConfig::S3(s3) => assert_eq!(s3.region.as_deref(), Some("eu-west-1")),
                honestly_who_knows => panic!("💀 expected an s3 store, got {honestly_who_knows:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_file_outvotes_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("LOGFWD_BATCH_SIZE", "42");
            jail.create_file(
                "logfwd.toml",
                r#"
                batch_size = 7
                [sender.http]
                endpoint = "https://collector.example/ingest"
                "#,
            )?;

            let config = load_config(Some(Path::new("logfwd.toml")))
                .map_err(|err| format!("{err:#}"))?;

            assert_eq!(config.batch_size, 7);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_zero_lines_per_batch_is_refused() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "logfwd.toml",
                r#"
                batch_size = 0
                [sender.http]
                endpoint = "https://collector.example/ingest"
                "#,
            )?;

            let err = load_config(Some(Path::new("logfwd.toml"))).unwrap_err();

            assert!(matches!(classify(&err), Some(ForwardError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_there_is_nowhere_to_send_anything() {
        Jail::expect_with(|jail| {
            jail.create_file("logfwd.toml", "batch_size = 10")?;

            let err = load_config(Some(Path::new("logfwd.toml"))).unwrap_err();

            assert!(format!("{err:#}").contains("Failed to parse configuration"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_old_variable_names_are_left_on_read() {
        Jail::expect_with(|jail| {
            jail.set_env("LogForwarderHttpEndpoint", "http://old-collector/ingest");
            jail.set_env("LogForwarderCredentials", "old-token");

            // -- 🧳 without the LOGFWD_ names there is still no sender
            assert!(load_config(None).is_err());

            jail.set_env("LOGFWD_SENDER__HTTP__ENDPOINT", "http://old-collector/ingest");
            jail.set_env("LOGFWD_SENDER__HTTP__CREDENTIALS", "old-token");
            let config = load_config(None).map_err(|err| format!("{err:#}"))?;

            let SenderConfig::Http(http) = &config.sender;
            assert_eq!(http.endpoint, "http://old-collector/ingest");
            assert_eq!(http.credentials, "old-token");
            Ok(())
        });
    }
}
