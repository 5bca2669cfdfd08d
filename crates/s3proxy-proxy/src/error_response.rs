//! Builds the diagnostic response for a failed hook gate or a rejected
//! request. The wire body is always empty; the diagnostic goes out as a
//! header, since neither HTTP/1.1 through axum/hyper nor HTTP/2 expose a
//! way to set an arbitrary response reason phrase the way the original
//! `web.Response(reason=...)` did.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use s3proxy_hooks::HookResult;

const REASON_HEADER: &str = "x-error-reason";

/// Compose `"<general>. <name1> : <msg1>, <name2> : <msg2>."` from the
/// failing entries in `results`, or just `"<general>."` when none failed.
pub fn reason_line(results: &[HookResult], general: &str) -> String {
    let failures: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            let message = r
                .value
                .as_ref()
                .and_then(|v| v.as_text())
                .unwrap_or_default();
            format!("{} : {}", r.name, message)
        })
        .collect();

    if failures.is_empty() {
        format!("{general}.")
    } else {
        format!("{general}. {}.", failures.join(", "))
    }
}

/// Build an empty-bodied response carrying the composed reason in a header.
pub fn format(results: &[HookResult], general: &str, status: StatusCode) -> Response {
    plain(status, &reason_line(results, general))
}

/// Build an empty-bodied response for rejections that have no hook results
/// to report (disallowed method, malformed upload path, and the like).
pub fn plain(status: StatusCode, reason: &str) -> Response {
    let mut response = Response::builder().status(status);
    let sanitized: String = reason
        .chars()
        .map(|c| if c.is_ascii() && c != '\r' && c != '\n' { c } else { '?' })
        .collect();
    if let Ok(value) = HeaderValue::from_str(&sanitized) {
        response = response.header(REASON_HEADER, value);
    }
    response.body(Body::empty()).expect("well-formed response")
}
