//! CRUD handlers for book records.
//!
//! Each handler parses its input, makes one store call and answers with JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::book::Book;
use crate::error::ApiError;
use crate::request::Request;
use crate::response::Response;
use crate::state::AppState;
use crate::status::Status;

/// Confirmation body for write routes.
#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

/// `POST /add-book`, 202 once stored.
///
/// Store failures are logged and reported with the generic
/// `"Invalid request"` message.
pub async fn add_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let book: Book = req.json()?;
    book.validate()?;

    if let Err(e) = state.store.insert(&book).await {
        warn!(name = %book.name, error = %e, "insert failed");
        return Err(ApiError::InvalidRequest);
    }
    info!(name = %book.name, "book inserted");

    Ok(Response::builder()
        .status(Status::Accepted)
        .json(&Message { message: "Record inserted successfully" }))
}

/// `GET /get-book/{name}`: every book with that name, possibly none.
///
/// Also bound on `/get-book/` and `/get-book`. A missing or blank name is
/// answered with 400.
pub async fn get_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let name = req
        .param("name")
        .filter(|name| !name.trim().is_empty())
        .ok_or(ApiError::MalformedPath("missing book name in path"))?;

    let books = state.store.find_by_name(name).await.map_err(ApiError::StoreQuery)?;
    Ok(Response::json(&books))
}

/// `DELETE /delete-book` with `{"name": ...}`. 200 even when nothing matched.
pub async fn delete_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let NameRequest { name } = req.json()?;
    if name.trim().is_empty() {
        return Err(ApiError::InvalidRequest);
    }

    let deleted = state.store.delete_by_name(&name).await.map_err(ApiError::StoreWrite)?;
    info!(%name, deleted, "books deleted");

    Ok(Response::json(&Message { message: "Record deleted successfully" }))
}

/// `PUT /update-book`: sets the given fields on every book with the body's name.
pub async fn update_book(state: Arc<AppState>, req: Request) -> Result<Response, ApiError> {
    let book: Book = req.json()?;
    book.validate()?;

    let matched = state.store
        .update_by_name(&book.name, &book)
        .await
        .map_err(ApiError::StoreWrite)?;
    info!(name = %book.name, matched, "books updated");

    Ok(Response::json(&Message { message: "Record updated successfully" }))
}
