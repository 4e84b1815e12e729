mod common;

use common::{list_dir, not_found, ok_body, redirect_to, FileSource, RawUpstream, TestApp};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1A\n\x00\x00\x00\x0DIHDR";
const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00";
const MIB: usize = 1024 * 1024;

fn image(magic: &[u8], len: usize) -> Vec<u8> {
    let mut data = magic.to_vec();
    data.resize(len, 0x42);
    data
}

fn file_form(name: &str, data: Vec<u8>) -> Form {
    Form::new().part("file", Part::bytes(data).file_name(name.to_owned()))
}

async fn upload(app: &TestApp, form: Form) -> reqwest::Response {
    app.client.post(app.url("/upload-book")).multipart(form).send().await.unwrap()
}

async fn download(app: &TestApp, url: &str) -> reqwest::Response {
    app.client
        .get(app.url("/download-book"))
        .json(&json!({"fullURLFile": url}))
        .send()
        .await
        .unwrap()
}

// ── Upload ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn png_is_stored_under_a_timestamp_name() {
    let app = TestApp::spawn().await;
    let data = image(PNG_MAGIC, 4096);

    let res = upload(&app, file_form("cover.png", data.clone())).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Upload successful");
    assert_eq!(body["files"][0]["original"], "cover.png");
    assert_eq!(body["files"][0]["bytes"], 4096);

    let stored = list_dir(&app.uploads_dir());
    assert_eq!(stored.len(), 1);
    let (stem, ext) = stored[0].split_once('.').unwrap();
    assert!(stem.chars().all(|c| c.is_ascii_digit()), "{}", stored[0]);
    assert_eq!(ext, "png");
    assert_eq!(body["files"][0]["stored"], stored[0]);
    assert_eq!(std::fs::read(app.uploads_dir().join(&stored[0])).unwrap(), data);
}

#[tokio::test]
async fn jpeg_is_accepted_whatever_the_declared_type() {
    let app = TestApp::spawn().await;
    let part = Part::bytes(image(JPEG_MAGIC, 2048))
        .file_name("scan.jpg")
        .mime_str("text/plain")
        .unwrap();

    let res = upload(&app, Form::new().part("file", part)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(list_dir(&app.uploads_dir()).len(), 1);
}

#[tokio::test]
async fn every_file_part_is_stored() {
    let app = TestApp::spawn().await;
    let form = Form::new()
        .part("file", Part::bytes(image(PNG_MAGIC, 100)).file_name("a.png"))
        .text("comment", "ignored")
        .part("file", Part::bytes(image(JPEG_MAGIC, 100)).file_name("b.jpeg"));

    let res = upload(&app, form).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    assert_eq!(list_dir(&app.uploads_dir()).len(), 2);
}

#[tokio::test]
async fn text_file_is_rejected() {
    let app = TestApp::spawn().await;
    let part = Part::bytes(b"just some notes about a book".to_vec())
        .file_name("notes.png")
        .mime_str("image/png")
        .unwrap();

    let res = upload(&app, Form::new().part("file", part)).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "The provided file format is not allowed. Please upload a JPEG or PNG image"
    );
    assert!(list_dir(&app.uploads_dir()).is_empty());
}

#[tokio::test]
async fn other_images_are_rejected() {
    let app = TestApp::spawn().await;
    let res = upload(&app, file_form("anim.gif", image(b"GIF89a", 256))).await;
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn image_over_the_limit_is_rejected_and_removed() {
    let app = TestApp::spawn().await;
    let res = upload(&app, file_form("huge.png", image(PNG_MAGIC, 10 * MIB + 1))).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "The uploaded image is too big: huge.png. Please use an image less than 10 MiB in size"
    );
    assert!(list_dir(&app.uploads_dir()).is_empty());
}

#[tokio::test]
async fn anything_over_the_limit_is_rejected() {
    let app = TestApp::spawn().await;
    let res = upload(&app, file_form("novel.txt", vec![b'w'; 11 * MIB])).await;
    assert_eq!(res.status(), 400);
    assert!(list_dir(&app.uploads_dir()).is_empty());
}

#[tokio::test]
async fn image_at_the_limit_is_accepted() {
    let app = TestApp::spawn().await;
    let res = upload(&app, file_form("edge.png", image(PNG_MAGIC, 10 * MIB))).await;
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn form_without_file_field_is_rejected() {
    let app = TestApp::spawn().await;
    let form = Form::new().part("image", Part::bytes(image(PNG_MAGIC, 64)).file_name("a.png"));
    let res = upload(&app, form).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing form field `file`");
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let app = TestApp::spawn().await;
    let res = app
        .client
        .post(app.url("/upload-book"))
        .json(&json!({"file": "cover.png"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid request");
}

// ── Download ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_file_is_saved_under_its_url_name() {
    let content = b"%PDF-1.4 a very short book".to_vec();
    let source = FileSource::spawn(vec![("public/pdf/gobook.pdf", content.clone())]).await;
    let app = TestApp::spawn().await;

    let res = download(&app, &source.url("public/pdf/gobook.pdf")).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Download successful");
    assert_eq!(body["file"], "gobook.pdf");
    assert_eq!(body["bytes"], content.len());

    assert_eq!(list_dir(&app.downloads_dir()), vec!["gobook.pdf"]);
    assert_eq!(std::fs::read(app.downloads_dir().join("gobook.pdf")).unwrap(), content);
}

#[tokio::test]
async fn second_download_replaces_the_first() {
    let source = FileSource::spawn(vec![
        ("v1/book.txt", b"first edition".to_vec()),
        ("v2/book.txt", b"second".to_vec()),
    ])
    .await;
    let app = TestApp::spawn().await;

    assert_eq!(download(&app, &source.url("v1/book.txt")).await.status(), 200);
    assert_eq!(download(&app, &source.url("v2/book.txt")).await.status(), 200);
    assert_eq!(std::fs::read(app.downloads_dir().join("book.txt")).unwrap(), b"second");
}

#[tokio::test]
async fn failing_source_is_a_bad_gateway_and_server_survives() {
    let source = FileSource::spawn(vec![]).await;
    let app = TestApp::spawn().await;

    let res = download(&app, &source.url("missing.pdf")).await;
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("404"));
    assert!(list_dir(&app.downloads_dir()).is_empty());

    let res = app.client.get(app.url("/healthz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn unreachable_source_is_a_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = TestApp::spawn().await;
    let res = download(&app, &format!("http://{addr}/book.pdf")).await;
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn bad_urls_are_rejected() {
    let app = TestApp::spawn().await;

    for url in ["not a url", "ftp://example.com/book.pdf", "http://example.com/"] {
        let res = download(&app, url).await;
        assert_eq!(res.status(), 400, "{url}");
    }

    let res = app
        .client
        .get(app.url("/download-book"))
        .json(&json!({"url": "http://example.com/book.pdf"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn concurrent_downloads_of_one_name_leave_a_whole_file() {
    let a = vec![b'a'; 256 * 1024];
    let b = vec![b'b'; 384 * 1024];
    let source = FileSource::spawn(vec![("a/book.bin", a.clone()), ("b/book.bin", b.clone())]).await;
    let app = TestApp::spawn().await;

    let urls: Vec<String> = (0..8)
        .map(|i| source.url(if i % 2 == 0 { "a/book.bin" } else { "b/book.bin" }))
        .collect();
    let responses = futures_util::future::join_all(urls.iter().map(|url| download(&app, url))).await;
    assert!(responses.iter().all(|res| res.status() == 200));

    let saved = std::fs::read(app.downloads_dir().join("book.bin")).unwrap();
    assert!(saved == a || saved == b, "mixed file of {} bytes", saved.len());
    assert_eq!(list_dir(&app.downloads_dir()), vec!["book.bin"]);
}

fn escaped_redirect(target: &str) -> String {
    match target {
        "/start/book.bin" => redirect_to("/files/a%20b%2Fc.bin"),
        "/files/a%20b%2Fc.bin" => ok_body("whole book"),
        _ => not_found(),
    }
}

#[tokio::test]
async fn redirect_location_is_requested_exactly_as_sent() {
    let upstream = RawUpstream::spawn(escaped_redirect).await;
    let app = TestApp::spawn().await;

    let res = download(&app, &upstream.url("/start/book.bin")).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["file"], "book.bin");

    assert_eq!(
        upstream.request_lines(),
        ["GET /start/book.bin HTTP/1.1", "GET /files/a%20b%2Fc.bin HTTP/1.1"]
    );
    assert_eq!(std::fs::read(app.downloads_dir().join("book.bin")).unwrap(), b"whole book");
}

fn endless_redirect(target: &str) -> String {
    let hop: u32 = target
        .strip_prefix("/loop/")
        .and_then(|n| n.parse().ok())
        .unwrap_or_default();
    redirect_to(&format!("/loop/{}", hop + 1))
}

#[tokio::test]
async fn too_many_redirects_is_a_bad_gateway() {
    let upstream = RawUpstream::spawn(endless_redirect).await;
    let app = TestApp::spawn().await;

    let res = download(&app, &upstream.url("/loop/0")).await;
    assert_eq!(res.status(), 502);
    assert!(list_dir(&app.downloads_dir()).is_empty());

    // The original request, then the ten hops `downloads.max_redirects` allows.
    assert_eq!(upstream.request_lines().len(), 11);

    let res = app.client.get(app.url("/healthz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}
