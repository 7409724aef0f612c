use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, NaiveDateTime, Utc};

const HTTP_DATE_FMT: &str = "%a, %d %b %Y %H:%M:%S GMT";

// Content type from the file extension. Text-like types get an explicit utf-8 charset.
pub fn content_type_for(path: &Path) -> HeaderValue {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let wants_charset = guessed.type_() == mime::TEXT
        || guessed.subtype() == mime::JAVASCRIPT
        || guessed.subtype() == mime::JSON;
    let value = if wants_charset && guessed.get_param(mime::CHARSET).is_none() {
        format!("{}; charset=utf-8", guessed.essence_str())
    } else {
        guessed.to_string()
    };
    HeaderValue::from_str(&value)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"))
}

// Whole seconds since the epoch; sub-second precision is dropped on purpose
// so Last-Modified round-trips through If-Modified-Since.
pub fn mtime_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn http_date(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format(HTTP_DATE_FMT).to_string())
}

// Parse an HTTP date into epoch seconds. IMF-fixdate first, then RFC 2822,
// RFC 850 and asctime.
pub fn parse_http_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, HTTP_DATE_FMT) {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%a %b %e %H:%M:%S %Y") {
        return Some(dt.and_utc().timestamp());
    }
    None
}

// Headers shared by 200/206/304 file responses.
// Caller sets size to bytes in body (full size for GET, length for 206, total for HEAD).
pub fn file_headers_common(
    content_type: HeaderValue,
    size: u64,
    modified_secs: i64,
    max_age_secs: u64,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    set_validators(&mut headers, modified_secs, max_age_secs);
    headers
}

pub fn set_validators(headers: &mut HeaderMap, modified_secs: i64, max_age_secs: u64) {
    if let Some(lm) = http_date(modified_secs).and_then(|s| HeaderValue::from_str(&s).ok()) {
        headers.insert(header::LAST_MODIFIED, lm);
    }
    if let Ok(cc) = HeaderValue::from_str(&format!("max-age={max_age_secs}")) {
        headers.insert(header::CACHE_CONTROL, cc);
    }
}

pub fn set_content_range(headers: &mut HeaderMap, start: u64, end: u64, total: u64) {
    if let Ok(v) = HeaderValue::from_str(&format!("bytes {start}-{end}/{total}")) {
        headers.insert(header::CONTENT_RANGE, v);
    }
}
