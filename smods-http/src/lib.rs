//! Minimal HTML page fetcher with safe logging.
//!
//! - Request options: headers, query params, timeout
//! - One attempt per call: no retries, no caching
//! - Redirect probing (`location`) for hosting services that answer with `302`
//! - Optional *raw* request/response logging via `SMODS_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), smods_http::HttpError> {
//! let client = smods_http::HttpClient::new("https://smods.ru")?;
//! let html = client
//!     .get_text("archives/12345", smods_http::RequestOpts::default())
//!     .await?;
//! assert!(!html.is_empty());
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), final errors, and (optionally)
//! raw request/response lines (target `http.raw`) when `SMODS_HTTP_RAW=1`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("smods/", env!("CARGO_PKG_VERSION"));

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "SMODS_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with cookies redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, form: Option<&Form>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(form) = form {
        for (k, v) in form {
            parts.push(format!("--data-urlencode '{}={}'", k, v.replace('\'', r"'\''")));
        }
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if matches!(
                key.to_ascii_lowercase().as_str(),
                "authorization" | "cookie" | "set-cookie"
            ) {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

/// Everything that can go wrong while fetching a page.
///
/// Every variant raised after the URL is known carries it, so callers can
/// report which request failed.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },
    #[error("timed out fetching {url}")]
    Timeout { url: String },
    #[error("server returned {status} for {url}")]
    Status {
        url: String,
        status: StatusCode,
        body_snippet: String,
    },
    #[error("no redirect location in response from {url} (status {status})")]
    MissingLocation { url: String, status: StatusCode },
}

impl HttpError {
    /// The URL of the failed request, when one had been resolved.
    pub fn url(&self) -> Option<&str> {
        match self {
            HttpError::Url(_) | HttpError::Build(_) => None,
            HttpError::Network { url, .. }
            | HttpError::Timeout { url }
            | HttpError::Status { url, .. }
            | HttpError::MissingLocation { url, .. } => Some(url),
        }
    }

    /// HTTP status for server-side failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } | HttpError::MissingLocation { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    fn from_send(url: &Url, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else {
            HttpError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

// ==============================
// Request options
// ==============================

/// Url-encoded form body: ordered `(name, value)` pairs.
pub type Form = [(&'static str, String)];

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use smods_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     query: Some(vec![("s", Cow::Borrowed("roads"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>, // e.g. [("s", "term".into())]
}

// ==============================
// Transport seam
// ==============================

/// What the catalogue needs from the network.
///
/// [`HttpClient`] is the production implementation; tests can provide an
/// in-memory one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body text of a successful response.
    async fn fetch_text(&self, url: &Url) -> Result<String, HttpError>;

    /// Request `url` without following redirects and return the `Location`
    /// header, resolved against `url`. A form turns the request into a POST.
    async fn fetch_location(&self, url: &Url, form: Option<&Form>) -> Result<Url, HttpError>;
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    no_redirect: Client,
    pub default_timeout: Duration,
    pub user_agent: String,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use smods_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://smods.ru")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let no_redirect = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .redirect(Policy::none())
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            no_redirect,
            default_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use smods_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://smods.ru")?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the `User-Agent` sent with every request.
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the base; absolute URLs are used as-is.
    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        match Url::parse(path) {
            Ok(abs) => Ok(abs),
            Err(_) => self
                .base
                .join(path)
                .map_err(|e| HttpError::Url(e.to_string())),
        }
    }

    /// GET a page and return its body as text.
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let url = self.resolve(path)?;
        let (status, _headers, bytes) = self
            .send(&self.inner, Method::GET, &url, None, &opts)
            .await?;
        if status.is_success() {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        Err(self.status_error(&url, status, &bytes))
    }

    /// Send without following redirects and return the resolved `Location`.
    pub async fn location(
        &self,
        path: &str,
        form: Option<&Form>,
        opts: RequestOpts<'_>,
    ) -> Result<Url, HttpError> {
        let url = self.resolve(path)?;
        let method = if form.is_some() {
            Method::POST
        } else {
            Method::GET
        };
        let (status, headers, bytes) = self
            .send(&self.no_redirect, method, &url, form, &opts)
            .await?;

        if !status.is_success() && !status.is_redirection() {
            return Err(self.status_error(&url, status, &bytes));
        }

        let location = headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| HttpError::MissingLocation {
                url: url.to_string(),
                status,
            })?;
        let target = url
            .join(location)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        tracing::debug!(from=%url, to=%target, %status, "http.redirect.location");
        Ok(target)
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn send(
        &self,
        client: &Client,
        method: Method,
        url: &Url,
        form: Option<&Form>,
        opts: &RequestOpts<'_>,
    ) -> Result<(StatusCode, HeaderMap, Vec<u8>), HttpError> {
        let mut rb = client.request(method.clone(), url.clone());

        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        rb = rb.timeout(timeout).header(USER_AGENT, self.user_agent.as_str());

        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }
        if let Some(form) = form {
            rb = rb.form(form);
        }

        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?opts.query,
            timeout_ms=timeout.as_millis() as u64,
            has_form=%form.is_some(),
            "http.request.start"
        );

        if raw_enabled() {
            let headers = opts.headers.clone().unwrap_or_default();
            let curl = make_curl(&method, url, &headers, form);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let err = HttpError::from_send(url, err);
            tracing::warn!(req_id=%req_id, error=%err, "http.network_error.send");
            err
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            let err = HttpError::from_send(url, err);
            tracing::warn!(req_id=%req_id, error=%err, "http.network_error.body");
            err
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let truncated = bytes.len() > RAW_MAX_BODY;
            let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        tracing::trace!(
            req_id=%req_id,
            body_snippet=%snip_body(&bytes),
            "http.response.body_snippet"
        );

        Ok((status, headers, bytes.to_vec()))
    }

    fn status_error(&self, url: &Url, status: StatusCode, body: &[u8]) -> HttpError {
        let body_snippet = snip_body(body);
        tracing::warn!(
            %status,
            url=%url,
            body_snippet=%body_snippet,
            "http.error"
        );
        HttpError::Status {
            url: url.to_string(),
            status,
            body_snippet,
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn fetch_text(&self, url: &Url) -> Result<String, HttpError> {
        self.get_text(url.as_str(), RequestOpts::default()).await
    }

    async fn fetch_location(&self, url: &Url, form: Option<&Form>) -> Result<Url, HttpError> {
        self.location(url.as_str(), form, RequestOpts::default())
            .await
    }
}

// ==============================
// Helpers
// ==============================

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{COOKIE, HeaderValue};

    #[test]
    fn snip_body_truncates_on_char_boundary() {
        let body = "é".repeat(400);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert!(snip.len() <= 503);
    }

    #[test]
    fn short_bodies_are_kept_whole() {
        assert_eq!(snip_body(b"<html></html>"), "<html></html>");
    }

    #[test]
    fn curl_redacts_cookies_and_lists_form() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("cf_clearance=secret"));
        let url = Url::parse("https://modsbase.com/abc/file.zip.html").unwrap();
        let form = [("op", "download2".to_string())];
        let curl = make_curl(&Method::POST, &url, &headers, Some(&form[..]));
        assert!(curl.contains("<redacted>"));
        assert!(!curl.contains("secret"));
        assert!(curl.contains("op=download2"));
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let client = HttpClient::new("https://smods.ru").unwrap();
        let abs = client.resolve("https://modsbase.com/x/y.html").unwrap();
        assert_eq!(abs.host_str(), Some("modsbase.com"));
        let rel = client.resolve("archives/42").unwrap();
        assert_eq!(rel.as_str(), "https://smods.ru/archives/42");
    }

    #[test]
    fn error_exposes_url_and_status() {
        let err = HttpError::Status {
            url: "https://smods.ru/archives/1".into(),
            status: StatusCode::NOT_FOUND,
            body_snippet: String::new(),
        };
        assert_eq!(err.url(), Some("https://smods.ru/archives/1"));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(HttpError::Url("bad".into()).url().is_none());
    }
}
