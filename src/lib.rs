//! Request-path resolution and admission gate for static file serving.
//!
//! [`StaticGate`] turns `(root, options, request)` into one of: deliver the
//! file at a path proven to sit under `root`, fall through to the next stage,
//! or reject with `400 Could not decode path`. [`serve_static`] plugs the gate
//! into an axum pipeline as middleware.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub mod config;
pub mod delivery;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod options;
pub mod utils;

pub use delivery::{Deliver, Delivery, DeliveryRequest, FsDelivery};
pub use error::{ConfigError, DecodeError};
pub use gate::{Admission, GateOutcome, StaticGate};
pub use middleware::{LogSettings, log_requests_mw, serve_static, static_router};
pub use options::{DeliveryOptions, Options};

// ============ Helpers ============
pub(crate) fn http_not_found(msg: &str) -> Response {
    let body = json!({"detail": msg});
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub(crate) fn http_error(status: StatusCode, msg: &str) -> Response {
    let body = json!({"detail": msg});
    (status, Json(body)).into_response()
}
