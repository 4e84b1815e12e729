//! HTTP status codes as a typed enum.
//!
//! Only the codes this service answers with are listed. Use [`Status`] with
//! `Response::status()` or `Response::builder().status()`.
//!
//! ```rust
//! use bookshelf::{Response, Status};
//!
//! Response::builder()
//!     .status(Status::Accepted)
//!     .json(&serde_json::json!({ "message": "Record inserted successfully" }));
//! ```

/// The HTTP status codes bookshelf produces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Accepted,            // 202

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    NotFound,            // 404
    MethodNotAllowed,    // 405

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
    BadGateway,          // 502
    ServiceUnavailable,  // 503
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::Accepted            => 202,
            Status::BadRequest          => 400,
            Status::NotFound            => 404,
            Status::MethodNotAllowed    => 405,
            Status::InternalServerError => 500,
            Status::BadGateway          => 502,
            Status::ServiceUnavailable  => 503,
        }
    }
}

impl From<Status> for http::StatusCode {
    fn from(s: Status) -> http::StatusCode {
        http::StatusCode::from_u16(s.into()).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Status {
    /// `true` for 5xx codes.
    pub fn is_server_error(self) -> bool {
        u16::from(self) >= 500
    }
}
