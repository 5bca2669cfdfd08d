//! s3proxy-config: flat, environment-variable process configuration.
//!
//! Loaded once at startup from variables prefixed `PROXY_`; no file
//! watching or hot reload — that's explicitly out of scope.

pub mod config;

pub use config::{ConfigError, ProxyConfig, Result};
