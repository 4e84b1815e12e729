//! Middleware layer.
//!
//! Cross-cutting concerns applied to every request by the server, around the
//! routed handler.
//!
//! - [`trace`]: per-request span with method and path, plus one access event
//!   carrying status, peer and latency

pub(crate) mod trace;
