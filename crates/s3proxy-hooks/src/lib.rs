//! s3proxy-hooks: the Event/Hook registry and dispatcher.
//!
//! Four named dispatch points, each an ordered, uniquely-positioned,
//! uniquely-named sequence of hooks run either serially ("blocking") or
//! fanned out to the blocking-task pool ("non-blocking").

pub mod error;
mod executor;
pub mod hooks;
pub mod registry;

pub use error::{RegistryError, Result};
pub use hooks::{Hook, HookRequest, HookResult, HookValue};
pub use registry::{Event, EventRegistry};
