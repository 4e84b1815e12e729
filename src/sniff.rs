//! Content-type sniffing from leading bytes.
//!
//! A reduced version of the WHATWG MIME sniffing signatures: enough to tell
//! the images we accept from the things people upload by mistake. Client
//! supplied content types are never trusted.

/// Bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

pub const JPEG: &str = "image/jpeg";
pub const PNG: &str = "image/png";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// (mask, pattern, mime). A byte matches when `data & mask == pattern`.
const SIGNATURES: &[(&[u8], &[u8], &str)] = &[
    (b"\xFF\xFF\xFF", b"\xFF\xD8\xFF", JPEG),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF", b"\x89PNG\r\n\x1A\n", PNG),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF", b"GIF87a", "image/gif"),
    (b"\xFF\xFF\xFF\xFF\xFF\xFF", b"GIF89a", "image/gif"),
    (
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        b"RIFF\x00\x00\x00\x00WEBPVP",
        "image/webp",
    ),
    (b"\xFF\xFF", b"BM", "image/bmp"),
    (b"\xFF\xFF\xFF\xFF\xFF", b"%PDF-", "application/pdf"),
    (b"\xFF\xFF\xFF\xFF", b"PK\x03\x04", "application/zip"),
    (b"\xFF\xFF\xFF", b"\x1F\x8B\x08", "application/x-gzip"),
];

/// Best guess at the content type of `data`. Only the first [`SNIFF_LEN`]
/// bytes are considered. Never fails: unknown binary is
/// `application/octet-stream`.
pub fn detect(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let signature = SIGNATURES.iter().find(|(mask, pattern, _)| {
        data.len() >= pattern.len()
            && data.iter().zip(mask.iter()).zip(pattern.iter()).all(|((d, m), p)| d & m == *p)
    });
    if let Some((_, _, mime)) = signature {
        return mime;
    }

    if data.iter().any(|&b| is_binary(b)) {
        OCTET_STREAM
    } else {
        TEXT
    }
}

/// Types `/upload-book` stores.
pub fn is_allowed_image(mime: &str) -> bool {
    mime == JPEG || mime == PNG
}

// Control bytes that never appear in text.
fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
