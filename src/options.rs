use serde::{Deserialize, Serialize};

/// Immutable per-handler configuration, captured when the gate is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// File name appended when the request path ends in a separator.
    pub index: Option<String>,
    /// Serve dot-prefixed segments. Off by default.
    pub hidden: bool,
    /// Cache lifetime in milliseconds, emitted as `Cache-Control: max-age`.
    pub maxage: u64,
    pub if_modified_since_support: bool,
    /// Treat `/dir` like `/dir/` when resolving the index file.
    pub format: bool,
    /// Prefer a sibling `.gz` file when the client accepts gzip.
    pub gzip: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            index: None,
            hidden: false,
            maxage: 0,
            if_modified_since_support: true,
            format: true,
            gzip: false,
        }
    }
}

impl Options {
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_maxage(mut self, maxage_ms: u64) -> Self {
        self.maxage = maxage_ms;
        self
    }

    pub fn with_if_modified_since_support(mut self, enabled: bool) -> Self {
        self.if_modified_since_support = enabled;
        self
    }

    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// The subset handed to the delivery collaborator.
    pub fn delivery(&self) -> DeliveryOptions {
        DeliveryOptions {
            index: self.index.clone().filter(|s| !s.is_empty()),
            maxage: self.maxage,
            if_modified_since_support: self.if_modified_since_support,
            format: self.format,
            gzip: self.gzip,
        }
    }
}

/// Options forwarded past the gate. `hidden` stays behind: by the time a
/// path reaches delivery it has already passed the hidden check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub index: Option<String>,
    pub maxage: u64,
    pub if_modified_since_support: bool,
    pub format: bool,
    pub gzip: bool,
}

impl DeliveryOptions {
    pub fn max_age_secs(&self) -> u64 {
        self.maxage / 1000
    }
}
