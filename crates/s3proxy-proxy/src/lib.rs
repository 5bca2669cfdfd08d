//! s3proxy-proxy: the axum listener, the upstream S3 client, and the
//! request-transform pipeline that wires GET/PUT handlers to the hook
//! pipeline and the upstream proxy call.

pub mod default_hooks;
pub mod error_response;
pub mod object_props;
pub mod proxy;
pub mod upstream;

pub use default_hooks::{register as register_default_hooks, HOOK_DECRYPT_DATA, HOOK_ENCRYPT_DATA};
pub use object_props::S3Object;
pub use proxy::{router, AppState};
pub use upstream::{whitelist_headers, UpstreamClient, UpstreamError, UpstreamResponse};
