//! Record store client.
//!
//! [`BookStore`] is the seam between the HTTP handlers and the document
//! database. [`MongoStore`] talks to MongoDB; [`MemoryStore`] keeps records in
//! process and backs the tests and local runs without a database.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, to_document, Bson, Document};
use mongodb::{Client, Collection, Database};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::book::Book;
use crate::config::StoreConfig;

/// Failure reported by a [`BookStore`].
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// Book persistence keyed by name.
///
/// Names are not unique: lookups may return several books and deletes and
/// updates touch every match.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// All books called `name`. No match is an empty list, not an error.
    async fn find_by_name(&self, name: &str) -> Result<Vec<Book>, StoreError>;

    /// Stores `book` as a new record. No duplicate check.
    async fn insert(&self, book: &Book) -> Result<(), StoreError>;

    /// Removes every book called `name` and returns how many went.
    async fn delete_by_name(&self, name: &str) -> Result<u64, StoreError>;

    /// Sets the fields present on `book` on every book called `name`.
    /// Returns the number of matched records.
    async fn update_by_name(&self, name: &str, book: &Book) -> Result<u64, StoreError>;

    /// Round trip to the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ── MongoDB ───────────────────────────────────────────────────────────────────

/// [`BookStore`] backed by one MongoDB collection.
pub struct MongoStore {
    database: Database,
    books: Collection<Book>,
}

impl MongoStore {
    /// Connects to `config.uri` and checks the server answers a ping.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        let database = client.database(&config.database);
        let books = database.collection::<Book>(&config.collection);
        let store = Self { database, books };

        store.ping().await.map_err(|e| StoreError::Connect(e.to_string()))?;
        info!(
            database = %config.database,
            collection = %config.collection,
            "connected to record store"
        );
        Ok(store)
    }
}

fn by_name(name: &str) -> Document {
    doc! { "name": name }
}

/// `{"$set": {...}}` with `name` and only the optional fields `book` carries,
/// so a partial update never clears what it leaves out.
fn set_fields(book: &Book) -> Result<Document, StoreError> {
    let fields: Document = to_document(book)
        .map_err(|e| StoreError::Write(e.to_string()))?
        .into_iter()
        .filter(|(_, value)| *value != Bson::Null)
        .collect();
    Ok(doc! { "$set": fields })
}

#[async_trait]
impl BookStore for MongoStore {
    async fn find_by_name(&self, name: &str) -> Result<Vec<Book>, StoreError> {
        let query = |e: mongodb::error::Error| StoreError::Query(e.to_string());
        let cursor = self.books.find(by_name(name)).await.map_err(query)?;
        cursor.try_collect().await.map_err(query)
    }

    async fn insert(&self, book: &Book) -> Result<(), StoreError> {
        self.books
            .insert_one(book)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<u64, StoreError> {
        let result = self.books
            .delete_many(by_name(name))
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        debug!(name, deleted = result.deleted_count, "deleted books");
        Ok(result.deleted_count)
    }

    async fn update_by_name(&self, name: &str, book: &Book) -> Result<u64, StoreError> {
        let result = self.books
            .update_many(by_name(name), set_fields(book)?)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        debug!(name, matched = result.matched_count, "updated books");
        Ok(result.matched_count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

// ── In memory ─────────────────────────────────────────────────────────────────

/// [`BookStore`] holding records in a `Vec` behind an async lock.
#[derive(Default)]
pub struct MemoryStore {
    books: RwLock<Vec<Book>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Vec<Book>, StoreError> {
        let books = self.books.read().await;
        Ok(books.iter().filter(|b| b.name == name).cloned().collect())
    }

    async fn insert(&self, book: &Book) -> Result<(), StoreError> {
        self.books.write().await.push(book.clone());
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<u64, StoreError> {
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|b| b.name != name);
        Ok((before - books.len()) as u64)
    }

    async fn update_by_name(&self, name: &str, book: &Book) -> Result<u64, StoreError> {
        let mut books = self.books.write().await;
        let mut matched = 0;
        for stored in books.iter_mut().filter(|b| b.name == name) {
            stored.merge_from(book);
            matched += 1;
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
