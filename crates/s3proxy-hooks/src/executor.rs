//! Runs a sorted hook list either serially (blocking Events) or fanned out
//! onto the blocking-task pool (non-blocking Events), in the style of the
//! one-method-per-kind executor this crate started from — collapsed here to
//! the single hook kind the spec calls for.

use crate::hooks::{HookRequest, HookResult, HookValue};
use crate::registry::RegisteredHook;
use bytes::Bytes;
use tracing::{trace, warn};

/// Serial invocation in sorted-position order, on the caller's task. A
/// panicking hook propagates out of `invoke`, matching blocking mode's
/// "exceptions are not caught" contract.
pub(crate) fn invoke_blocking(
    event: &str,
    hooks: &[RegisteredHook],
    request: &HookRequest,
    data: Option<&[u8]>,
) -> Vec<HookResult> {
    let mut results = Vec::with_capacity(hooks.len());
    for h in hooks {
        trace!(event, hook = %h.name, "invoking hook (blocking)");
        let (success, value) = h.hook.call(request, data);
        results.push(HookResult {
            name: h.name.clone(),
            success,
            value,
        });
    }
    results
}

/// Fans each hook out onto `tokio::task::spawn_blocking` and gathers the
/// results back in sorted-position order, independent of completion order.
/// A hook that panics is reported as a failed result rather than cancelling
/// its siblings.
pub(crate) async fn invoke_parallel(
    event: &str,
    hooks: &[RegisteredHook],
    request: &HookRequest,
    data: Option<&[u8]>,
) -> Vec<HookResult> {
    let owned_data = data.map(Bytes::copy_from_slice);

    let tasks = hooks.iter().cloned().map(|h| {
        let request = request.clone();
        let owned_data = owned_data.clone();
        tokio::task::spawn_blocking(move || {
            trace!(hook = %h.name, "invoking hook (non-blocking)");
            let (success, value) = h.hook.call(&request, owned_data.as_deref());
            HookResult {
                name: h.name,
                success,
                value,
            }
        })
    });

    let joined = futures::future::join_all(tasks).await;

    joined
        .into_iter()
        .zip(hooks.iter())
        .map(|(outcome, h)| match outcome {
            Ok(result) => result,
            Err(join_err) => {
                warn!(event, hook = %h.name, error = %join_err, "hook caused an error");
                HookResult {
                    name: h.name.clone(),
                    success: false,
                    value: Some(HookValue::Text("Hook caused an error.".to_string())),
                }
            }
        })
        .collect()
}
