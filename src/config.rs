//! Service configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults (the `Default` impls below)
//! 2. an optional TOML file
//! 3. `BOOKSHELF__*` environment variables, `__` separating nested keys
//!    (`BOOKSHELF__STORE__URI`, `BOOKSHELF__UPLOADS__MAX_FILE_BYTES`)

use std::path::{Path, PathBuf};

use serde::Deserialize;

const ENV_PREFIX: &str = "BOOKSHELF";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub uploads: UploadConfig,
    pub downloads: DownloadConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    pub addr: String,
    /// Largest request body collected before a handler runs.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9090".to_owned(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Where the book collection lives.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/".to_owned(),
            database: "quickstart".to_owned(),
            collection: "book".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub dir: PathBuf,
    /// Per-file ceiling. A file of exactly this size is accepted.
    pub max_file_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./uploads"),
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub dir: PathBuf,
    pub max_redirects: usize,
    /// Honour `HTTP_PROXY`-style environment variables for outbound fetches.
    pub system_proxy: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./downloads"),
            max_redirects: 10,
            system_proxy: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_owned() }
    }
}

impl Config {
    /// Layers the optional file at `path` and the environment over the defaults.
    ///
    /// A `path` that does not exist is an error; leave it `None` to run on
    /// defaults and environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
