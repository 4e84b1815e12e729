//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the record store be reached? Failure → pulled from load-balancer. |

use std::sync::Arc;

use crate::error::ApiError;
use crate::request::Request;
use crate::response::Response;
use crate::state::AppState;

/// Always `200 OK` with body `"ok"`. If the process can respond to HTTP at
/// all, it is alive.
pub async fn liveness(_state: Arc<AppState>, _req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"` once the record store answers a ping,
/// `503` with the store error otherwise.
pub async fn readiness(state: Arc<AppState>, _req: Request) -> Result<Response, ApiError> {
    state.store
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Response::text("ready"))
}
