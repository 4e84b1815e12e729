//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::{Config, DownloadConfig, UploadConfig};
use crate::download;
use crate::error::Error;
use crate::store::BookStore;

/// Everything a handler needs. Immutable once built; shared behind an `Arc`.
pub struct AppState {
    pub store: Arc<dyn BookStore>,
    pub uploads: UploadConfig,
    pub downloads: DownloadConfig,
    /// Client for `/download-book`, reused across requests for pooling.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(store: Arc<dyn BookStore>, config: &Config) -> Result<Self, Error> {
        Ok(Self {
            store,
            uploads: config.uploads.clone(),
            downloads: config.downloads.clone(),
            http: download::client(&config.downloads)?,
        })
    }
}
