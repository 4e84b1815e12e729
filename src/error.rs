//! Error types.
//!
//! [`Error`] covers infrastructure failures: binding a port, loading
//! configuration, reaching the record store at startup. [`ApiError`] covers
//! everything that can go wrong inside one request. It converts into a
//! response, so every route answers failures with the same contract:
//! a status code and a `{"error": "..."}` JSON body.

use serde::Serialize;
use tracing::{debug, error};

use crate::method::Method;
use crate::response::{IntoResponse, Response};
use crate::status::Status;
use crate::store::StoreError;

const MIB: u64 = 1024 * 1024;

/// The error type returned by bookshelf's startup and serving operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A failure while handling one request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    MalformedPath(&'static str),

    /// Malformed body, missing or blank `name`, wrong content type.
    #[error("Invalid request")]
    InvalidRequest,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("{0}")]
    StoreQuery(#[source] StoreError),

    #[error("{0}")]
    StoreWrite(#[source] StoreError),

    #[error(
        "The uploaded image is too big: {file_name}. Please use an image less than {} MiB in size",
        .limit / MIB
    )]
    FileTooLarge { file_name: String, limit: u64 },

    #[error("The provided file format is not allowed. Please upload a JPEG or PNG image")]
    UnsupportedFileType { detected: &'static str },

    #[error("missing form field `file`")]
    MissingFile,

    #[error("invalid multipart body: {0}")]
    InvalidMultipart(#[from] multer::Error),

    #[error("invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),

    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            Self::MethodNotAllowed { .. } => Status::MethodNotAllowed,
            Self::NotFound => Status::NotFound,
            Self::MalformedPath(_)
            | Self::InvalidRequest
            | Self::BodyTooLarge { .. }
            | Self::StoreQuery(_)
            | Self::StoreWrite(_)
            | Self::FileTooLarge { .. }
            | Self::UnsupportedFileType { .. }
            | Self::MissingFile
            | Self::InvalidMultipart(_)
            | Self::InvalidUrl(_) => Status::BadRequest,
            Self::Filesystem(_) => Status::InternalServerError,
            Self::RemoteFetch(_) => Status::BadGateway,
            Self::Unavailable(_) => Status::ServiceUnavailable,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }

        let mut builder = Response::builder().status(status);
        if let Self::MethodNotAllowed { allowed } = &self {
            let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
            builder = builder.header("allow", &allow);
        }
        builder.json(&ErrorBody { error: self.to_string() })
    }
}
