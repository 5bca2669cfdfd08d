//! The axum listener and the GET/PUT/pass-through request-transform
//! pipeline that wires routing, body buffering, and hook orchestration to
//! the upstream proxy call (spec.md §4.2).

use crate::default_hooks::{HOOK_DECRYPT_DATA, HOOK_ENCRYPT_DATA};
use crate::error_response;
use crate::object_props::S3Object;
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamResponse};
use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use s3proxy_hooks::{EventRegistry, HookRequest, HookResult, HookValue};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bodies are buffered whole before hooks run (spec.md §1: "No streaming
/// transformation"); this bounds that buffer to S3's own single-PUT limit
/// rather than leaving it unbounded.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024 * 1024;

/// Shared state handed to every request: the hook registry, the upstream
/// client, and the configured allowed-method set.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventRegistry>,
    pub upstream: Arc<UpstreamClient>,
    pub allowed_methods: Arc<HashSet<Method>>,
}

/// A single catch-all route for every path and method, mirroring the
/// original's `@routes.view(r"/{tail:.*}")`.
pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();

    if !state.allowed_methods.contains(&method) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let uri = request.uri().clone();
    let headers = request.headers().clone();

    match method {
        Method::GET => handle_get(&state, &method, &uri, &headers).await,
        Method::PUT => match buffer_body(request).await {
            Ok(body) => handle_put(&state, &method, &uri, &headers, body).await,
            Err(response) => response,
        },
        _ => match buffer_body(request).await {
            // The original's `proxy_pass(request)` call for every method but
            // PUT takes no `data` argument at all: the client body is read
            // (so the connection drains cleanly) and then dropped, never
            // forwarded upstream.
            Ok(_) => handle_passthrough(&state, &method, &uri, &headers).await,
            Err(response) => response,
        },
    }
}

async fn buffer_body(request: Request) -> Result<Bytes, Response> {
    to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| error_response::plain(StatusCode::BAD_REQUEST, "Failed to read request body."))
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

fn from_upstream(upstream: UpstreamResponse) -> Response {
    build_response(upstream.status, upstream.headers, upstream.body)
}

fn find_value<'a>(results: &'a [HookResult], name: &str) -> Option<&'a HookValue> {
    results
        .iter()
        .find(|r| r.success && r.name == name)
        .and_then(|r| r.value.as_ref())
}

/// GET: fetch upstream, then run `post_retrieve_data` over the body when the
/// path names an object. A vetoing hook yields 400; `hook_decrypt_data`'s
/// value (if present) replaces the body.
async fn handle_get(state: &AppState, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
    let upstream = match state.upstream.forward(method, uri, headers, None).await {
        Ok(response) => response,
        Err(err) => return propagate_upstream_status(err),
    };

    let object = S3Object::extract(uri.path());
    if upstream.body.is_empty() || object.is_none() {
        return from_upstream(upstream);
    }
    let object = object.expect("checked above");

    let hook_request = HookRequest {
        method: method.clone(),
        uri: uri.clone(),
        headers: headers.clone(),
        object_name: Some(object.name.clone()),
    };

    let results = state
        .events
        .post_retrieve_data
        .invoke(&hook_request, Some(&upstream.body))
        .await;

    if results.iter().any(|r| !r.success) {
        return error_response::format(&results, "Retrieve hook failed", StatusCode::BAD_REQUEST);
    }

    let body = find_value(&results, HOOK_DECRYPT_DATA)
        .and_then(|v| v.as_bytes())
        .map(Bytes::copy_from_slice)
        .unwrap_or(upstream.body);

    build_response(upstream.status, upstream.headers, body)
}

/// PUT: requires `{bucket, name}` in the path, buffers the body, runs
/// `pre_upload_before_check` (may substitute `hook_encrypt_data`'s value as
/// the wire payload), then `pre_upload_unsafe` over the *original* bytes,
/// forwards the encrypted body upstream, and fires `post_upload` on success.
async fn handle_put(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let Some(object) = S3Object::extract(uri.path()) else {
        return error_response::plain(
            StatusCode::BAD_REQUEST,
            "Failed to get bucket and object-id from upload request.",
        );
    };

    let hook_request = HookRequest {
        method: method.clone(),
        uri: uri.clone(),
        headers: headers.clone(),
        object_name: Some(object.name.clone()),
    };

    let before_check = state
        .events
        .pre_upload_before_check
        .invoke(&hook_request, Some(&body))
        .await;

    if before_check.iter().any(|r| !r.success) {
        return error_response::format(&before_check, "Pre-upload hook failed", StatusCode::BAD_REQUEST);
    }

    let encrypted_body = find_value(&before_check, HOOK_ENCRYPT_DATA)
        .and_then(|v| v.as_bytes())
        .map(Bytes::copy_from_slice)
        .unwrap_or_else(|| body.clone());

    // Deliberately the *original* bytes, not `encrypted_body`: sanity-check
    // hooks need plaintext to inspect.
    let unsafe_results = state
        .events
        .pre_upload_unsafe
        .invoke(&hook_request, Some(&body))
        .await;

    if unsafe_results.iter().any(|r| !r.success) {
        return error_response::format(
            &unsafe_results,
            "Upload failed sanity checks.",
            StatusCode::BAD_REQUEST,
        );
    }

    let upstream = match state
        .upstream
        .forward(method, uri, headers, Some(encrypted_body))
        .await
    {
        Ok(response) => response,
        Err(err) => return propagate_upstream_status(err),
    };

    debug!(object = %object.name, "upload accepted upstream, firing post_upload");
    state.events.post_upload.invoke(&hook_request, None).await;

    from_upstream(upstream)
}

/// Every other method: forward unchanged, with no body (spec.md §4.3: a
/// body is supplied to the upstream call "PUT only in the current design").
/// A 4xx/5xx upstream status becomes a diagnostic 400 response.
async fn handle_passthrough(state: &AppState, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
    match state.upstream.forward(method, uri, headers, None).await {
        Ok(response) => from_upstream(response),
        Err(err) => upstream_error_response(err),
    }
}

/// GET and PUT see the upstream's actual 4xx/5xx status reconstructed
/// byte-for-byte (spec.md §4.3: "for GET and PUT it propagates to the
/// caller which sees a 4xx/5xx response"). Only a transport-level failure
/// (no response at all) becomes a synthesized 502.
fn propagate_upstream_status(err: UpstreamError) -> Response {
    match err {
        UpstreamError::Status { status, headers, body } => build_response(status, headers, body),
        UpstreamError::Request(e) => {
            warn!(error = %e, "upstream request failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Pass-through methods (anything but GET/PUT) turn an upstream 4xx/5xx
/// into a diagnostic 400 carrying the original status as context, rather
/// than forwarding it verbatim (spec.md §4.2, §7).
fn upstream_error_response(err: UpstreamError) -> Response {
    match err {
        UpstreamError::Status { status, body, .. } => {
            let diagnostic = String::from_utf8_lossy(&body);
            error_response::plain(
                StatusCode::BAD_REQUEST,
                &format!("Upstream request failed: {status} {diagnostic}"),
            )
        }
        UpstreamError::Request(e) => {
            warn!(error = %e, "upstream request failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_hooks;
    use axum::http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use s3proxy_hooks::{Hook, HookValue};
    use tower::ServiceExt;
    use wiremock::matchers::{method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "a-very-long-process-secret-value";

    async fn test_state(mock_server: &MockServer) -> AppState {
        let events = Arc::new(EventRegistry::new());
        default_hooks::register(&events, SECRET).unwrap();

        let uri: Uri = mock_server.uri().parse().unwrap();
        let host = uri.host().unwrap().to_string();
        let port = uri.port_u16().unwrap();

        AppState {
            events,
            upstream: Arc::new(UpstreamClient::new(host, port, false)),
            allowed_methods: Arc::new(
                [Method::GET, Method::PUT, Method::POST].into_iter().collect(),
            ),
        }
    }

    async fn body_of(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn happy_put_forwards_encrypted_body_and_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(http_method("PUT"))
            .and(path("/bucket/some-id-before_Sample_file.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("PUT")
            .uri("/bucket/some-id-before_Sample_file.pdf?X-param-1=param-1")
            .header(CONTENT_TYPE, "text/plain")
            .header("X-Foo", "bar")
            .body(Body::from("You can read binary?"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn put_missing_object_does_not_reach_upstream() {
        let mock_server = MockServer::start().await;
        // No mock registered: any request reaching upstream fails the test.
        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("PUT")
            .uri("/bucket")
            .body(Body::from("data"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn disallowed_method_returns_405() {
        let mock_server = MockServer::start().await;
        let mut state = test_state(&mock_server).await;
        state.allowed_methods = Arc::new([Method::GET, Method::PUT].into_iter().collect());
        let app = router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn get_decrypts_a_matching_token() {
        let object_name = "some-id-before_Sample_file.pdf";
        let plaintext = b"You can read binary?";
        let key = s3proxy_crypto::generate_key(SECRET, object_name);
        let token = s3proxy_crypto::encrypt(&key, plaintext).unwrap();

        let mock_server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path(format!("/bucket/{object_name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(token.into_bytes()))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/bucket/{object_name}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, plaintext);
    }

    #[tokio::test]
    async fn get_rejects_an_undecryptable_body() {
        let object_name = "some-id-before_Sample_file.pdf";

        let mock_server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path(format!("/bucket/{object_name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"something else".to_vec()))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/bucket/{object_name}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn get_on_a_nested_path_bypasses_the_transform_pipeline() {
        let mock_server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/bucket/folder/key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw bytes".to_vec()))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("GET")
            .uri("/bucket/folder/key")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, b"raw bytes");
    }

    #[tokio::test]
    async fn sanity_check_veto_blocks_the_upload() {
        let mock_server = MockServer::start().await;
        // No mock registered: the sanity-check hook must veto before upstream is called.
        let mut state = test_state(&mock_server).await;

        struct AlwaysReject;
        impl Hook for AlwaysReject {
            fn call(&self, _req: &HookRequest, _data: Option<&[u8]>) -> (bool, Option<HookValue>) {
                (false, Some(HookValue::Text("looked unsafe".to_string())))
            }
        }
        state
            .events
            .pre_upload_unsafe
            .register(Arc::new(AlwaysReject), "reject_everything", Some(0))
            .unwrap();

        let app = router(state);
        let request = Request::builder()
            .method("PUT")
            .uri("/bucket/key")
            .body(Body::from("data"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_client_error_on_put_propagates_status() {
        let mock_server = MockServer::start().await;
        Mock::given(http_method("PUT"))
            .and(path("/bucket/key"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let state = test_state(&mock_server).await;
        let app = router(state);

        let request = Request::builder()
            .method("PUT")
            .uri("/bucket/key")
            .body(Body::from("data"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
