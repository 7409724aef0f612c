use std::sync::Arc;

use axum::Router;
use axum::extract::{Request as AxRequest, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::delivery::Deliver;
use crate::gate::{GateOutcome, StaticGate};
use crate::{http_error, http_not_found};

// Static gate as a pipeline stage: answer from disk or hand the request on.
pub async fn serve_static<D: Deliver>(
    State(gate): State<Arc<StaticGate<D>>>,
    req: AxRequest,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    match gate.handle(&parts).await {
        GateOutcome::Handled(resp) => resp,
        GateOutcome::Rejected(status, msg) => http_error(status, msg),
        GateOutcome::Fallthrough => next.run(AxRequest::from_parts(parts, body)).await,
    }
}

/// Router that serves `gate` and answers everything else with a JSON 404.
/// Nest it with `Router::nest_service` to mount under a prefix.
pub fn static_router<D: Deliver>(gate: StaticGate<D>) -> Router {
    Router::new()
        .fallback(|| async { http_not_found("Not Found") })
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(gate),
            serve_static::<D>,
        ))
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub log_requests: bool,
    pub log_resp_headers: bool,
    pub log_redact: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_requests: true,
            log_resp_headers: false,
            log_redact: true,
        }
    }
}

// Request logging middleware with header redaction.
pub async fn log_requests_mw(
    State(settings): State<LogSettings>,
    req: AxRequest,
    next: Next,
) -> Response {
    if !settings.log_requests {
        return next.run(req).await;
    }

    let req_id = Uuid::new_v4().simple().to_string()[..12].to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();

    info!(target: "static_gate", "[{}] HTTP {} {}", req_id, method, uri);

    let started = std::time::Instant::now();
    let mut resp = next.run(req).await;
    let dur_ms = started.elapsed().as_millis();
    let status = resp.status();
    // attach X-Request-ID before logging to avoid borrow conflicts
    let _ = resp.headers_mut().insert(
        "X-Request-ID",
        HeaderValue::from_str(&req_id).unwrap_or_else(|_| HeaderValue::from_static("-")),
    );

    let resp_ct = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let resp_len = resp
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    info!(
        target: "static_gate",
        "[{}] Response {} -> {} ({} ms) ct={} len={}",
        req_id,
        method,
        status.as_u16(),
        dur_ms,
        resp_ct,
        resp_len
    );
    if settings.log_resp_headers {
        let mut hdrs = serde_json::Map::new();
        for (k, v) in resp.headers().iter() {
            let val = v.to_str().unwrap_or("");
            hdrs.insert(
                k.to_string(),
                json!(redact_header(k.as_str(), val, settings.log_redact)),
            );
        }
        info!(target: "static_gate", "[{}] Response headers: {}", req_id, serde_json::to_string(&hdrs).unwrap_or_default());
    }
    if status == StatusCode::NOT_MODIFIED {
        info!(target: "static_gate", "[{}] not modified: {}", req_id, uri.path());
    }

    resp
}

fn redact_header(key: &str, val: &str, redact: bool) -> String {
    if !redact {
        return val.to_string();
    }
    let k = key.to_ascii_lowercase();
    if [
        "authorization",
        "cookie",
        "set-cookie",
        "proxy-authorization",
        "x-api-key",
    ]
    .contains(&k.as_str())
    {
        "***".to_string()
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::FsDelivery;
    use crate::options::Options;
    use axum::body::Body;
    use axum::http::{Method, header};
    use axum::routing::get;
    use std::path::PathBuf;
    use tower::util::ServiceExt;

    fn fixtures() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    fn fixture_app(opts: Options) -> Router {
        static_router(StaticGate::new(fixtures(), opts).unwrap())
    }

    async fn call(app: &Router, method: Method, uri: &str) -> Response {
        let req = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn serves_a_valid_path() {
        let app = fixture_app(Options::default());
        let resp = call(&app, Method::GET, "/hello.txt").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "world");
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let app = fixture_app(Options::default());
        let resp = call(&app, Method::GET, "/something").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn gate_answers_before_downstream_routes() {
        let gate = Arc::new(StaticGate::new(fixtures(), Options::default()).unwrap());
        let app = Router::new()
            .route("/hello.txt", get(|| async { "hey" }))
            .layer(axum::middleware::from_fn_with_state(
                gate,
                serve_static::<FsDelivery>,
            ));
        let resp = call(&app, Method::GET, "/hello.txt").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "world");
    }

    #[tokio::test]
    async fn custom_index_file() {
        let app = fixture_app(Options::default().with_index("index.txt"));
        let resp = call(&app, Method::GET, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_string(resp).await, "text index");
    }

    #[tokio::test]
    async fn html_index_when_configured() {
        let app = fixture_app(Options::default().with_index("index.html"));
        let resp = call(&app, Method::GET, "/world/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body_string(resp).await, "html index");
    }

    #[tokio::test]
    async fn no_index_by_default() {
        let app = fixture_app(Options::default());
        assert_eq!(call(&app, Method::GET, "/world/").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            call(&app, Method::GET, "/no-index-here/").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn non_get_methods_fall_through() {
        let app = fixture_app(Options::default());
        for m in [Method::POST, Method::PUT, Method::DELETE] {
            assert_eq!(call(&app, m, "/hello.txt").await.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(call(&app, Method::HEAD, "/hello.txt").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn format_option() {
        let off = fixture_app(Options::default().with_index("index.html").with_format(false));
        assert_eq!(call(&off, Method::GET, "/world").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(call(&off, Method::GET, "/world/").await.status(), StatusCode::OK);

        let on = fixture_app(Options::default().with_index("index.html").with_format(true));
        assert_eq!(call(&on, Method::GET, "/world").await.status(), StatusCode::OK);
        assert_eq!(call(&on, Method::GET, "/world/").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn if_modified_since() {
        let app = fixture_app(Options::default());
        let first = call(&app, Method::GET, "/world/index.html").await;
        assert_eq!(first.status(), StatusCode::OK);
        let last_modified = first.headers()[header::LAST_MODIFIED].clone();

        let req = axum::http::Request::builder()
            .uri("/world/index.html")
            .header(header::IF_MODIFIED_SINCE, last_modified)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(body_string(resp).await, "");

        for stale in ["Tue, 18 Jan 2011 23:04:34 GMT", "Mon Jan 18 2011 23:04:34 GMT-0600"] {
            let req = axum::http::Request::builder()
                .uri("/world/index.html")
                .header(header::IF_MODIFIED_SINCE, stale)
                .body(Body::empty())
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{stale}");
        }
    }

    #[tokio::test]
    async fn hidden_files_fall_through() {
        let app = fixture_app(Options::default());
        assert_eq!(call(&app, Method::GET, "/.env").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            call(&app, Method::GET, "/.hidden/secret.txt").await.status(),
            StatusCode::NOT_FOUND
        );

        let open = fixture_app(Options::default().with_hidden(true));
        let resp = call(&open, Method::GET, "/.env").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "SECRET=1");
    }

    #[tokio::test]
    async fn traversal_looks_like_a_miss() {
        let app = fixture_app(Options::default());
        for uri in ["/../Cargo.toml", "/%2e%2e/Cargo.toml", "/..%2fCargo.toml", "/..%5cCargo.toml"] {
            let resp = call(&app, Method::GET, uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_string(resp).await, r#"{"detail":"Not Found"}"#);
        }
    }

    #[tokio::test]
    async fn bad_escape_is_400() {
        let app = fixture_app(Options::default());
        let resp = call(&app, Method::GET, "/%E4").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(resp).await, r#"{"detail":"Could not decode path"}"#);
    }

    #[tokio::test]
    async fn works_under_a_mount_prefix() {
        let app = Router::new().nest_service("/fixtures", fixture_app(Options::default()));
        let resp = call(&app, Method::GET, "/fixtures/hello.txt").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "world");
    }

    #[tokio::test]
    async fn logging_sets_request_id() {
        let app = fixture_app(Options::default()).layer(axum::middleware::from_fn_with_state(
            LogSettings::default(),
            log_requests_mw,
        ));
        let resp = call(&app, Method::GET, "/hello.txt").await;
        assert_eq!(resp.headers()["x-request-id"].len(), 12);
    }

    #[test]
    fn redacts_sensitive_headers() {
        assert_eq!(redact_header("Authorization", "Bearer x", true), "***");
        assert_eq!(redact_header("Authorization", "Bearer x", false), "Bearer x");
        assert_eq!(redact_header("content-type", "text/plain", true), "text/plain");
    }
}
