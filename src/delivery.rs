use std::io;
use std::path::{Path, PathBuf};

use async_stream::stream;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error};

use crate::options::DeliveryOptions;
use crate::utils::headers::{
    content_type_for, file_headers_common, mtime_secs, parse_http_date, set_content_range,
    set_validators,
};

pub(crate) const CHUNK_SIZE: usize = 262_144; // 256 KiB per read chunk

/// The parts of an inbound request the delivery collaborator may look at.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
}

impl<'a> DeliveryRequest<'a> {
    pub fn new(method: &'a Method, headers: &'a HeaderMap) -> Self {
        Self { method, headers }
    }

    fn header_str(&self, name: header::HeaderName) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Outcome of a delivery attempt.
#[derive(Debug)]
pub enum Delivery {
    /// A complete response was produced (200, 206, 304, 416).
    Handled(Response),
    /// Nothing servable at this path; the pipeline continues.
    NotFound,
}

/// Boundary to whatever actually reads files and writes responses.
///
/// The path handed in is already contained in the root and has passed the
/// hidden check.
#[async_trait]
pub trait Deliver: Send + Sync + 'static {
    async fn deliver(
        &self,
        req: DeliveryRequest<'_>,
        path: &Path,
        opts: &DeliveryOptions,
    ) -> Delivery;
}

/// Serves files straight from disk with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDelivery;

struct Target {
    path: PathBuf,
    size: u64,
    modified: i64,
}

#[async_trait]
impl Deliver for FsDelivery {
    async fn deliver(
        &self,
        req: DeliveryRequest<'_>,
        path: &Path,
        opts: &DeliveryOptions,
    ) -> Delivery {
        let Some(target) = locate(path, opts).await else {
            debug!(target: "static_gate", "delivery miss: {}", path.display());
            return Delivery::NotFound;
        };
        let content_type = content_type_for(&target.path);
        let max_age = opts.max_age_secs();

        if opts.if_modified_since_support && not_modified(&req, target.modified) {
            let mut headers = HeaderMap::new();
            set_validators(&mut headers, target.modified, max_age);
            return Delivery::Handled((StatusCode::NOT_MODIFIED, headers).into_response());
        }

        if opts.gzip && accepts_gzip(&req) {
            if let Some(gz) = gzip_sibling(&target).await {
                return match full_file_response(&req, &gz, content_type, max_age, true).await {
                    Some(resp) => Delivery::Handled(resp),
                    None => Delivery::NotFound,
                };
            }
        }

        if *req.method == Method::GET {
            if let Some(rh) = req.header_str(header::RANGE) {
                match parse_range(rh, target.size) {
                    RangeParse::Invalid => {}
                    RangeParse::Unsatisfiable => {
                        return Delivery::Handled(unsatisfiable(target.size));
                    }
                    RangeParse::Ok(start, end) => {
                        return Delivery::Handled(partial_response(
                            &target,
                            start,
                            end,
                            content_type,
                            max_age,
                        ));
                    }
                }
            }
        }

        match full_file_response(&req, &target, content_type, max_age, false).await {
            Some(resp) => Delivery::Handled(resp),
            None => Delivery::NotFound,
        }
    }
}

// Stat the path; a directory resolves to its index only when `format` is on.
async fn locate(path: &Path, opts: &DeliveryOptions) -> Option<Target> {
    let mut path = path.to_path_buf();
    let mut md = fs::metadata(&path).await.ok()?;
    if md.is_dir() {
        let index = opts.index.as_deref().filter(|_| opts.format)?;
        path.push(index);
        md = fs::metadata(&path).await.ok()?;
    }
    if !md.is_file() {
        return None;
    }
    let modified = md.modified().map(mtime_secs).unwrap_or(0);
    Some(Target {
        path,
        size: md.len(),
        modified,
    })
}

fn not_modified(req: &DeliveryRequest<'_>, modified: i64) -> bool {
    req.header_str(header::IF_MODIFIED_SINCE)
        .and_then(parse_http_date)
        .is_some_and(|since| modified <= since)
}

fn accepts_gzip(req: &DeliveryRequest<'_>) -> bool {
    req.header_str(header::ACCEPT_ENCODING).is_some_and(|v| {
        v.split(',').any(|part| {
            let mut it = part.trim().splitn(2, ';');
            let coding = it.next().unwrap_or("").trim();
            let rejected = it
                .next()
                .is_some_and(|q| q.trim().trim_start_matches("q=").trim() == "0");
            coding.eq_ignore_ascii_case("gzip") && !rejected
        })
    })
}

async fn gzip_sibling(target: &Target) -> Option<Target> {
    let mut name = target.path.as_os_str().to_owned();
    name.push(".gz");
    let path = PathBuf::from(name);
    let md = fs::metadata(&path).await.ok()?;
    if !md.is_file() {
        return None;
    }
    Some(Target {
        path,
        size: md.len(),
        modified: target.modified,
    })
}

async fn full_file_response(
    req: &DeliveryRequest<'_>,
    target: &Target,
    content_type: HeaderValue,
    max_age: u64,
    gzipped: bool,
) -> Option<Response> {
    let mut headers = file_headers_common(content_type, target.size, target.modified, max_age);
    if gzipped {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.remove(header::ACCEPT_RANGES);
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    }
    if *req.method == Method::HEAD {
        return Some((StatusCode::OK, headers).into_response());
    }
    let file = match fs::File::open(&target.path).await {
        Ok(f) => f,
        Err(e) => {
            debug!(target: "static_gate", "open {} failed: {}", target.path.display(), e);
            return None;
        }
    };
    let stream = tokio_util::io::ReaderStream::with_capacity(file, CHUNK_SIZE);
    Some((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
}

fn partial_response(
    target: &Target,
    start: u64,
    end: u64,
    content_type: HeaderValue,
    max_age: u64,
) -> Response {
    let length = end - start + 1;
    let fp_for_stream = target.path.clone();
    let stream = stream! {
        let mut f = match fs::File::open(&fp_for_stream).await {
            Ok(f) => f,
            Err(e) => { error!("open {}: {}", fp_for_stream.display(), e); return; }
        };
        if let Err(e) = f.seek(std::io::SeekFrom::Start(start)).await {
            error!("seek: {}", e);
            return;
        }
        let mut remaining = length;
        let mut buf = vec![0u8; CHUNK_SIZE];
        while remaining > 0 {
            let cap = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
            match f.read(&mut buf[..cap]).await {
                Ok(0) => break,
                Ok(n) => {
                    yield Ok::<Bytes, io::Error>(Bytes::copy_from_slice(&buf[..n]));
                    remaining -= n as u64;
                }
                Err(e) => { error!("read: {}", e); break; }
            }
        }
    };
    let mut headers = file_headers_common(content_type, length, target.modified, max_age);
    set_content_range(&mut headers, start, end, target.size);
    (StatusCode::PARTIAL_CONTENT, headers, Body::from_stream(stream)).into_response()
}

fn unsatisfiable(total: u64) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format!("bytes */{total}")) {
        headers.insert(header::CONTENT_RANGE, v);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
}

#[derive(Debug)]
enum RangeParse {
    Invalid,
    Unsatisfiable,
    Ok(u64, u64),
}

// Only the first range of a multi-range request is honored.
fn parse_range(h: &str, total: u64) -> RangeParse {
    let s = h.trim();
    let mut it = s.splitn(2, '=');
    let unit = it.next().unwrap_or("");
    let rest = it.next().unwrap_or("");
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return RangeParse::Invalid;
    }
    let first = rest.split(',').next().unwrap_or("").trim();
    let Some((a, b)) = first.split_once('-') else {
        return RangeParse::Invalid;
    };
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() {
        // suffix: bytes=-N
        let Ok(n) = b.parse::<u64>() else {
            return RangeParse::Invalid;
        };
        if n == 0 || total == 0 {
            return RangeParse::Unsatisfiable;
        }
        return RangeParse::Ok(total.saturating_sub(n), total - 1);
    }
    let Ok(start) = a.parse::<u64>() else {
        return RangeParse::Invalid;
    };
    let mut end = if b.is_empty() {
        total.saturating_sub(1)
    } else {
        match b.parse::<u64>() {
            Ok(v) => v,
            Err(_) => return RangeParse::Invalid,
        }
    };
    if start >= total {
        return RangeParse::Unsatisfiable;
    }
    if end >= total {
        end = total - 1;
    }
    if end < start {
        return RangeParse::Unsatisfiable;
    }
    RangeParse::Ok(start, end)
}
