//! `GET /download-book`: fetch a remote file into the downloads directory.
//!
//! The body is streamed into a uniquely named `.part` file next to the target
//! and renamed over it once complete. Two downloads racing for the same name
//! each write their own temp file, so the survivor is always one whole copy.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::DownloadConfig;
use crate::error::ApiError;
use crate::request::Request;
use crate::response::Response;
use crate::state::AppState;

#[derive(Deserialize)]
struct DownloadRequest {
    #[serde(rename = "fullURLFile")]
    full_url_file: String,
}

#[derive(Serialize)]
struct Downloaded {
    message: &'static str,
    file: String,
    bytes: u64,
}

/// Builds the outbound client shared by every download.
///
/// Redirects are followed up to `max_redirects` hops. The `Location` target is
/// requested as sent; its path is not re-escaped.
pub(crate) fn client(config: &DownloadConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .user_agent(concat!("bookshelf/", env!("CARGO_PKG_VERSION")));
    if !config.system_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}

pub async fn download_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let DownloadRequest { full_url_file } = req.json()?;
    let url = Url::parse(&full_url_file)
        .map_err(|e| ApiError::InvalidUrl(format!("`{full_url_file}`: {e}")))?;
    let file_name = file_name_from_url(&url)?;

    let dir = &state.downloads.dir;
    tokio::fs::create_dir_all(dir).await?;

    let response = state.http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ApiError::RemoteFetch(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::RemoteFetch(format!("{url} answered {status}")));
    }

    let bytes = save(response, dir, &file_name).await?;
    info!(file = %file_name, bytes, "downloaded file");

    Ok(Response::json(&Downloaded { message: "Download successful", file: file_name, bytes }))
}

/// The percent-decoded last path segment of `url`.
fn file_name_from_url(url: &Url) -> Result<String, ApiError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidUrl(format!("unsupported scheme `{}`", url.scheme())));
    }

    let segment = url.path_segments().and_then(|segments| segments.last()).unwrap_or_default();
    let name = percent_decode_str(segment).decode_utf8_lossy();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ApiError::InvalidUrl(format!("{url} does not name a file")));
    }
    Ok(name.into_owned())
}

async fn save(response: reqwest::Response, dir: &Path, file_name: &str) -> Result<u64, ApiError> {
    let part = dir.join(format!(".{file_name}.{}.part", Uuid::new_v4().simple()));
    let mut file = OpenOptions::new().write(true).create_new(true).open(&part).await?;

    let copied = copy_body(response, &mut file).await;
    drop(file);

    let result = match copied {
        Ok(bytes) => tokio::fs::rename(&part, dir.join(file_name))
            .await
            .map(|()| bytes)
            .map_err(ApiError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(rm) = tokio::fs::remove_file(&part).await {
            warn!(path = %part.display(), error = %rm, "failed to remove partial download");
        }
    }
    result
}

async fn copy_body(response: reqwest::Response, file: &mut File) -> Result<u64, ApiError> {
    let mut body = response.bytes_stream();
    let mut size = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ApiError::RemoteFetch(e.to_string()))?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(size)
}
