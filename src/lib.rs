//! # bookshelf
//!
//! Book records over HTTP, kept in MongoDB, plus image upload and
//! download-by-URL.
//!
//! ## Routes
//!
//! | Route | Method | Success |
//! |---|---|---|
//! | `/add-book` | POST | 202 `{"message": ...}` |
//! | `/get-book/{name}` | GET | 200 `[Book, ...]` |
//! | `/delete-book` | DELETE | 200 `{"message": ...}` |
//! | `/update-book` | PUT | 200 `{"message": ...}` |
//! | `/download-book` | GET | 200 `{"message", "file", "bytes"}` |
//! | `/upload-book` | POST | 200 `{"message", "files"}` |
//! | `/healthz`, `/readyz` | GET | 200 text |
//!
//! Every failure, on every route, is a status code with a
//! `{"error": "..."}` body. See [`ApiError`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bookshelf::{AppState, Config, MongoStore, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let store = MongoStore::connect(&config.store).await?;
//!     let state = AppState::new(Arc::new(store), &config)?;
//!
//!     Server::bind(&config.server.addr)
//!         .await?
//!         .serve(bookshelf::app(state))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod book;
mod config;
mod error;
mod handler;
mod method;
mod middleware;
mod request;
mod response;
mod router;
mod server;
mod state;
mod status;
mod store;

pub mod books;
pub mod download;
pub mod health;
pub mod sniff;
pub mod upload;

pub use book::Book;
pub use crate::config::{Config, DownloadConfig, LoggingConfig, ServerConfig, StoreConfig, UploadConfig};
pub use error::{ApiError, Error};
pub use handler::Handler;
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use state::AppState;
pub use status::Status;
pub use store::{BookStore, MemoryStore, MongoStore, StoreError};

/// The bookshelf route table.
pub fn app(state: AppState) -> Router<AppState> {
    Router::new(state)
        .on(Method::Post,   "/add-book",         books::add_book)
        .on(Method::Get,    "/get-book/{name}",  books::get_book)
        .on(Method::Get,    "/get-book/",        books::get_book)
        .on(Method::Get,    "/get-book",         books::get_book)
        .on(Method::Delete, "/delete-book",      books::delete_book)
        .on(Method::Put,    "/update-book",      books::update_book)
        .on(Method::Get,    "/download-book",    download::download_book)
        .on(Method::Post,   "/upload-book",      upload::upload_book)
        .on(Method::Get,    "/healthz",          health::liveness)
        .on(Method::Get,    "/readyz",           health::readiness)
}
