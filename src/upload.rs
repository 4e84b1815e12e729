//! `POST /upload-book`: multipart image upload.
//!
//! Every part named `file` is sniffed, size-checked and written chunk by chunk
//! to the uploads directory as `<unix-nanos><original extension>`. The first
//! bad part fails the whole request; parts stored before it stay on disk.
//!
//! The server has already collected the request body in memory, bounded by
//! `server.max_body_bytes`, before the handler runs. Parsing and writing work
//! from that buffer, not from the socket.

use std::convert::Infallible;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream;
use multer::{Field, Multipart};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::ApiError;
use crate::request::Request;
use crate::response::Response;
use crate::sniff::{self, SNIFF_LEN};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
struct StoredFile {
    original: String,
    stored: String,
    bytes: u64,
}

#[derive(Serialize)]
struct Uploaded {
    message: &'static str,
    files: Vec<StoredFile>,
}

pub async fn upload_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let boundary = req
        .header("content-type")
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or(ApiError::InvalidRequest)?;

    let body = req.body().clone();
    let mut multipart = Multipart::new(
        stream::once(async move { Ok::<_, Infallible>(body) }),
        boundary,
    );

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let stored = store_file(field, &state.uploads).await?;
        info!(original = %stored.original, stored = %stored.stored, bytes = stored.bytes, "upload stored");
        files.push(stored);
    }

    if files.is_empty() {
        return Err(ApiError::MissingFile);
    }
    Ok(Response::json(&Uploaded { message: "Upload successful", files }))
}

/// Sniffs the head of one part, then copies the rest of its in-memory
/// chunks into a fresh file under the per-file limit.
async fn store_file(mut field: Field<'_>, settings: &UploadConfig) -> Result<StoredFile, ApiError> {
    let original = field.file_name().unwrap_or_default().to_owned();
    let limit = settings.max_file_bytes;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    while head.len() < SNIFF_LEN {
        let Some(chunk) = field.chunk().await? else { break };
        head.extend_from_slice(&chunk);
        if head.len() as u64 > limit {
            return Err(ApiError::FileTooLarge { file_name: original, limit });
        }
    }

    let detected = sniff::detect(&head);
    if !sniff::is_allowed_image(detected) {
        debug!(file = %original, detected, "unsupported upload type");
        return Err(ApiError::UnsupportedFileType { detected });
    }

    tokio::fs::create_dir_all(&settings.dir).await?;
    let (path, mut file) = create_unique(&settings.dir, &extension_of(&original)).await?;

    match copy_field(&mut field, &mut file, &head, limit, &original).await {
        Ok(bytes) => Ok(StoredFile {
            original,
            stored: file_name_of(&path),
            bytes,
        }),
        Err(e) => {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %rm, "failed to remove partial upload");
            }
            Err(e)
        }
    }
}

/// Writes the sniffed head, then the rest of the part, enforcing `limit`.
async fn copy_field(
    field: &mut Field<'_>,
    file: &mut File,
    head: &[u8],
    limit: u64,
    original: &str,
) -> Result<u64, ApiError> {
    let mut size = head.len() as u64;
    file.write_all(head).await?;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(ApiError::FileTooLarge { file_name: original.to_owned(), limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(size)
}

/// Opens a fresh file named after the current time. A name already taken
/// (two parts within the same nanosecond) just takes a new timestamp.
async fn create_unique(dir: &Path, extension: &str) -> Result<(PathBuf, File), ApiError> {
    loop {
        let path = dir.join(stored_file_name(Utc::now(), extension));
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn stored_file_name(now: DateTime<Utc>, extension: &str) -> String {
    // `None` only past the year 2262.
    let nanos = now.timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos}{extension}")
}

/// `".png"` for `"cover.png"`, empty when there is none.
fn extension_of(original: &str) -> String {
    Path::new(original)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
