//! The hook signature and the values hooks may return.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// Everything a hook is allowed to see about the in-flight request.
///
/// Deliberately thinner than the full HTTP request: hooks see method, URI,
/// headers, and (when the path parsed as one) the object name they're
/// scoped to. `Clone` so a non-blocking dispatch can hand an owned copy to
/// each `spawn_blocking` task.
#[derive(Debug, Clone)]
pub struct HookRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub object_name: Option<String>,
}

/// The payload a hook may substitute for the original body.
#[derive(Debug, Clone)]
pub enum HookValue {
    Bytes(Bytes),
    Text(String),
}

impl HookValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HookValue::Bytes(b) => Some(b.as_ref()),
            HookValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HookValue::Text(s) => Some(s.as_str()),
            HookValue::Bytes(_) => None,
        }
    }
}

/// The `(name, success, value)` triple a dispatched hook produces.
#[derive(Debug, Clone)]
pub struct HookResult {
    pub name: String,
    pub success: bool,
    pub value: Option<HookValue>,
}

/// A registered hook. Hooks are pure with respect to the registry: calling
/// one must never register another hook. A hook may block or do CPU-bound
/// work; the dispatcher is responsible for isolating that (see `executor`).
pub trait Hook: Send + Sync {
    fn call(&self, request: &HookRequest, data: Option<&[u8]>) -> (bool, Option<HookValue>);
}

impl<F> Hook for F
where
    F: Fn(&HookRequest, Option<&[u8]>) -> (bool, Option<HookValue>) + Send + Sync,
{
    fn call(&self, request: &HookRequest, data: Option<&[u8]>) -> (bool, Option<HookValue>) {
        self(request, data)
    }
}
