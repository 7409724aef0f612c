use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Setup-time failures. These never surface while serving requests.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("root directory is required to serve files")]
    MissingRoot,
    #[error("could not resolve root directory {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raised when a request path carries a malformed percent-escape or
/// decodes to bytes that are not UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Could not decode path")]
pub struct DecodeError;
