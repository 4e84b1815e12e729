//! Shared harness: a real bookshelf server on an ephemeral port, plus a tiny
//! file server standing in for remote download sources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bookshelf::{
    ApiError, AppState, Book, BookStore, Config, ContentType, MemoryStore, Method, Request,
    Response, Router, Server, StoreError,
};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub uploads: TempDir,
    pub downloads: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn BookStore>) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.uploads.dir = uploads.path().join("uploads");
        config.downloads.dir = downloads.path().join("downloads");
        config.downloads.system_proxy = false;

        let state = AppState::new(store, &config).unwrap();
        let server = Server::bind("127.0.0.1:0")
            .await
            .unwrap()
            .max_body_bytes(config.server.max_body_bytes);
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            server
                .serve_with_shutdown(bookshelf::app(state), async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self { addr, client, uploads, downloads, shutdown: Some(tx) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        self.uploads.path().join("uploads")
    }

    pub fn downloads_dir(&self) -> std::path::PathBuf {
        self.downloads.path().join("downloads")
    }

    pub async fn add(&self, book: &serde_json::Value) -> reqwest::Response {
        self.client.post(self.url("/add-book")).json(book).send().await.unwrap()
    }

    pub async fn get(&self, name: &str) -> Vec<Book> {
        let res = self.client.get(self.url(&format!("/get-book/{name}"))).send().await.unwrap();
        assert_eq!(res.status(), 200);
        res.json().await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// File names in `dir`, sorted. A missing directory reads as empty.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Remote file source ────────────────────────────────────────────────────────

/// Serves the given `path → bytes` table; anything else is 404.
pub struct FileSource {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

async fn serve_file(files: Arc<HashMap<String, Vec<u8>>>, req: Request) -> Result<Response, ApiError> {
    let path = req.param("path").unwrap_or_default();
    let body = files.get(path).ok_or(ApiError::NotFound)?;
    Ok(Response::bytes(ContentType::OctetStream, body.clone()))
}

impl FileSource {
    pub async fn spawn(files: Vec<(&str, Vec<u8>)>) -> Self {
        let files: HashMap<String, Vec<u8>> =
            files.into_iter().map(|(path, body)| (path.to_owned(), body)).collect();
        let router = Router::new(files).on(Method::Get, "/{*path}", serve_file);

        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            server
                .serve_with_shutdown(router, async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self { addr, shutdown: Some(tx) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ── Failing store ─────────────────────────────────────────────────────────────

/// Every operation fails, as if the database were down.
pub struct FailingStore;

#[async_trait]
impl BookStore for FailingStore {
    async fn find_by_name(&self, _name: &str) -> Result<Vec<Book>, StoreError> {
        Err(StoreError::Query("connection reset".into()))
    }

    async fn insert(&self, _book: &Book) -> Result<(), StoreError> {
        Err(StoreError::Write("connection reset".into()))
    }

    async fn delete_by_name(&self, _name: &str) -> Result<u64, StoreError> {
        Err(StoreError::Write("connection reset".into()))
    }

    async fn update_by_name(&self, _name: &str, _book: &Book) -> Result<u64, StoreError> {
        Err(StoreError::Write("connection reset".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Connect("connection refused".into()))
    }
}

// ── Raw upstream ──────────────────────────────────────────────────────────────

/// A bare TCP server answering one request per connection with whatever
/// `respond` builds from the request target. Records every request line.
pub struct RawUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl RawUpstream {
    pub async fn spawn(respond: fn(&str) -> String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { return };
                let Ok(head) = read_head(&mut stream).await else { continue };
                let line = head.lines().next().unwrap_or_default().to_owned();
                let target = line.split(' ').nth(1).unwrap_or_default().to_owned();
                seen.lock().unwrap().push(line);

                let _ = stream.write_all(respond(&target).as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { addr, requests, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for RawUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

pub fn redirect_to(location: &str) -> String {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
}

pub fn ok_body(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

pub fn not_found() -> String {
    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_owned()
}
