//! The upstream S3-compatible object store client: URL composition, header
//! forwarding, and response reconstruction. One `reqwest::Client` shared
//! across all requests, the same way the original wraps a single
//! `aiohttp.ClientSession` in application state.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use thiserror::Error;

const WHITELISTED_RESPONSE_HEADERS: &[&str] = &[
    "cookie",
    "host",
    "referer",
    "user-agent",
    "accept",
    "accept-language",
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
}

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct UpstreamClient {
    client: reqwest::Client,
    host: String,
    port: u16,
    ssl_enabled: bool,
}

impl UpstreamClient {
    pub fn new(host: String, port: u16, ssl_enabled: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            host,
            port,
            ssl_enabled,
        }
    }

    fn compose_url(&self, uri: &Uri) -> String {
        let scheme = if self.ssl_enabled { "https" } else { "http" };
        let path = uri.path().trim_start_matches('/');
        let mut url = format!("{scheme}://{}:{}/{path}", self.host, self.port);
        if let Some(query) = uri.query() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Forward `method`/`uri` upstream with a copy of the caller's headers.
    /// When `body` is `Some`, `Content-Length` is overridden to its length.
    /// A 4xx/5xx upstream status surfaces as `UpstreamError::Status`.
    pub async fn forward(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.compose_url(uri);
        let mut forwarded_headers = headers.clone();

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            forwarded_headers.insert(
                http::header::CONTENT_LENGTH,
                HeaderValue::from_str(&body.len().to_string()).expect("digits are valid header bytes"),
            );
            request = request.body(body);
        }
        request = request.headers(forwarded_headers);

        let response = request.send().await?;
        let status = response.status();
        let response_headers = whitelist_headers(response.headers());
        let body = response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(UpstreamError::Status {
                status,
                headers: response_headers,
                body,
            });
        }

        Ok(UpstreamResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// Keep only `Cookie, Host, Referer, User-Agent, Accept, Accept-Language`
/// from an upstream response, the way the original selects
/// `interesting_headers` before reconstructing the server response.
pub fn whitelist_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in WHITELISTED_RESPONSE_HEADERS {
        if let Some(value) = headers.get(*name) {
            if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
                out.insert(header_name, value.clone());
            }
        }
    }
    out
}
