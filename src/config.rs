use std::env;
use std::path::PathBuf;

use clap::Parser;

use crate::middleware::LogSettings;
use crate::options::Options;

#[derive(Parser, Debug)]
#[command(
    name = "static-gate",
    about = "Serve a directory over HTTP, falling through to 404 for anything outside it"
)]
pub struct Cli {
    /// Directory to serve (default: env STATIC_ROOT or ./public)
    pub root: Option<PathBuf>,

    /// File served for request paths ending in '/', e.g. 'index.html'
    #[arg(long = "index")]
    pub index: Option<String>,

    /// Allow dot-prefixed files and directories
    #[arg(long = "hidden")]
    pub hidden: bool,

    /// Cache-Control max-age, in milliseconds
    #[arg(long = "maxage-ms", default_value_t = 0)]
    pub maxage_ms: u64,

    /// Ignore If-Modified-Since and always send the full file
    #[arg(long = "no-if-modified-since")]
    pub no_if_modified_since: bool,

    /// Only resolve the index for paths with a trailing '/'
    #[arg(long = "no-format")]
    pub no_format: bool,

    /// Serve precompressed '<file>.gz' siblings to gzip-capable clients
    #[arg(long = "gzip")]
    pub gzip: bool,

    #[arg(long = "host", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short = 'p', long = "port", default_value_t = 8000)]
    pub port: u16,

    /// Mount prefix, e.g. '/static'
    #[arg(long = "mount")]
    pub mount: Option<String>,
}

impl Cli {
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(env_default_root)
    }

    pub fn options(&self) -> Options {
        Options {
            index: self.index.clone(),
            hidden: self.hidden,
            maxage: self.maxage_ms,
            if_modified_since_support: !self.no_if_modified_since,
            format: !self.no_format,
            gzip: self.gzip,
        }
    }

    // "/static/" and "static" both become "/static"; "/" means no mount.
    pub fn mount_prefix(&self) -> Option<String> {
        let m = self.mount.as_deref()?.trim().trim_matches('/');
        if m.is_empty() {
            None
        } else {
            Some(format!("/{m}"))
        }
    }
}

fn env_default_root() -> PathBuf {
    PathBuf::from(env::var("STATIC_ROOT").unwrap_or_else(|_| "public".to_string()))
}

fn env_flag(name: &str) -> bool {
    !matches!(
        env::var(name).as_deref(),
        Ok("0") | Ok("false") | Ok("False")
    )
}

pub fn log_settings_from_env() -> LogSettings {
    LogSettings {
        log_requests: env_flag("LOG_REQUESTS"),
        log_resp_headers: env_flag("LOG_RESP_HEADERS"),
        log_redact: env_flag("LOG_REDACT"),
    }
}
