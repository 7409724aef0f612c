//! Admission gate in front of static delivery.
//!
//! Per request:
//! ```text
//! method check -> percent-decode -> index rule -> containment -> hidden check -> deliver
//! ```
//! Every rejection except a decode failure falls through to the next stage,
//! so a probe for `../../etc/passwd` or `/.git/config` looks exactly like a
//! request for a file that does not exist.

use std::path::{Path, PathBuf};

use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use tracing::{debug, info};

use crate::delivery::{Deliver, Delivery, DeliveryRequest, FsDelivery};
use crate::error::{ConfigError, DecodeError};
use crate::options::{DeliveryOptions, Options};
use crate::utils::paths::{decode_path, is_hidden, normalize_root, resolve_path, strip_path_root};

/// Verdict of the pure, I/O-free part of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Not a GET or HEAD.
    Ineligible,
    /// The decoded path would leave the root.
    Escaped,
    /// A segment below the root starts with `.` and hidden files are off.
    Hidden,
    /// Safe to hand to delivery.
    Admitted(PathBuf),
}

/// Result of running one request through the gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// Delivery wrote a response; the pipeline stops here.
    Handled(Response),
    /// Not ours; call the next stage.
    Fallthrough,
    /// Abort the request with this status and message.
    Rejected(StatusCode, &'static str),
}

/// Static file gate bound to one root directory.
#[derive(Debug)]
pub struct StaticGate<D = FsDelivery> {
    root: PathBuf,
    options: Options,
    delivery_opts: DeliveryOptions,
    delivery: D,
}

impl StaticGate<FsDelivery> {
    pub fn new(root: impl AsRef<Path>, options: Options) -> Result<Self, ConfigError> {
        Self::with_delivery(root, options, FsDelivery)
    }
}

impl<D: Deliver> StaticGate<D> {
    /// Build a gate around a custom delivery collaborator. The root is made
    /// absolute and normalized once, here.
    pub fn with_delivery(
        root: impl AsRef<Path>,
        options: Options,
        delivery: D,
    ) -> Result<Self, ConfigError> {
        let raw = root.as_ref();
        if raw.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot);
        }
        let root = normalize_root(raw).map_err(|source| ConfigError::Root {
            path: raw.to_path_buf(),
            source,
        })?;
        info!(
            target: "static_gate",
            "static {} {}",
            root.display(),
            serde_json::to_string(&options).unwrap_or_default()
        );
        let delivery_opts = options.delivery();
        Ok(Self {
            root,
            options,
            delivery_opts,
            delivery,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Decide whether `raw_path` (as seen by the handler, mount prefix
    /// already stripped, still percent-encoded) may be delivered.
    pub fn admit(&self, method: &Method, raw_path: &str) -> Result<Admission, DecodeError> {
        if method != Method::GET && method != Method::HEAD {
            return Ok(Admission::Ineligible);
        }
        let mut path = decode_path(strip_path_root(raw_path))?;
        if let Some(index) = &self.delivery_opts.index {
            if raw_path.ends_with('/') {
                path.push_str(index);
            }
        }
        let Some(resolved) = resolve_path(&self.root, &path) else {
            return Ok(Admission::Escaped);
        };
        if !self.options.hidden && is_hidden(&self.root, &resolved) {
            return Ok(Admission::Hidden);
        }
        Ok(Admission::Admitted(resolved))
    }

    /// Run the full state machine. Takes the request head only, so the body
    /// stays with the caller for the fallthrough path.
    pub async fn handle(&self, req: &Parts) -> GateOutcome {
        let raw_path = req.uri.path();
        let resolved = match self.admit(&req.method, raw_path) {
            Ok(Admission::Admitted(p)) => p,
            Ok(verdict) => {
                debug!(target: "static_gate", "{} {} -> {:?}", req.method, raw_path, verdict);
                return GateOutcome::Fallthrough;
            }
            Err(e) => {
                debug!(target: "static_gate", "{} {} -> {}", req.method, raw_path, e);
                return GateOutcome::Rejected(StatusCode::BAD_REQUEST, "Could not decode path");
            }
        };
        let dreq = DeliveryRequest::new(&req.method, &req.headers);
        match self.delivery.deliver(dreq, &resolved, &self.delivery_opts).await {
            Delivery::Handled(resp) => GateOutcome::Handled(resp),
            Delivery::NotFound => GateOutcome::Fallthrough,
        }
    }
}
