//! Flat process configuration, read once from `PROXY_`-prefixed environment
//! variables.

use http::Method;
use std::collections::HashSet;
use thiserror::Error;

const ENV_PREFIX: &str = "PROXY_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingRequired(String),

    #[error("environment variable {var} has an invalid boolean value: {value}")]
    InvalidBool { var: String, value: String },

    #[error("environment variable {var} has an invalid integer value: {value}")]
    InvalidInt { var: String, value: String },

    #[error("environment variable {var} lists an unknown HTTP method: {value}")]
    InvalidMethod { var: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn default_allowed_methods() -> HashSet<Method> {
    [
        Method::GET,
        Method::PUT,
        Method::DELETE,
        Method::POST,
        Method::OPTIONS,
        Method::HEAD,
        Method::PATCH,
    ]
    .into_iter()
    .collect()
}

/// Process-wide configuration. Constructed once at startup via
/// [`ProxyConfig::from_env`] and shared read-only for the life of the
/// process.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub object_store_host: String,
    pub object_store_port: u16,
    pub object_store_ssl_enabled: bool,
    pub secret: String,
    pub log_level: String,
    pub environment: String,
    pub debug_session: bool,
    pub allowed_methods: HashSet<Method>,
}

impl ProxyConfig {
    /// Read configuration from `PROXY_`-prefixed environment variables.
    /// `PROXY_SECRET` is required; everything else has a documented default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            object_store_host: var_or("OBJECT_STORE_HOST", "minio"),
            object_store_port: int_var_or("OBJECT_STORE_PORT", 9000)?,
            object_store_ssl_enabled: bool_var_or("OBJECT_STORE_SSL_ENABLED", true)?,
            secret: required_var("SECRET")?,
            log_level: var_or("LOG_LEVEL", "info"),
            environment: var_or("ENVIRONMENT", "development"),
            debug_session: bool_var_or("DEBUG_SESSION", false)?,
            allowed_methods: methods_var_or("ALLOWED_METHODS", default_allowed_methods())?,
        })
    }
}

fn env_name(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

fn var_or(suffix: &str, default: &str) -> String {
    std::env::var(env_name(suffix)).unwrap_or_else(|_| default.to_string())
}

fn required_var(suffix: &str) -> Result<String> {
    std::env::var(env_name(suffix)).map_err(|_| ConfigError::MissingRequired(env_name(suffix)))
}

fn bool_var_or(suffix: &str, default: bool) -> Result<bool> {
    let name = env_name(suffix);
    match std::env::var(&name) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var: name, value }),
        },
    }
}

fn int_var_or(suffix: &str, default: u16) -> Result<u16> {
    let name = env_name(suffix);
    match std::env::var(&name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidInt { var: name, value }),
    }
}

fn methods_var_or(suffix: &str, default: HashSet<Method>) -> Result<HashSet<Method>> {
    let name = env_name(suffix);
    match std::env::var(&name) {
        Err(_) => Ok(default),
        Ok(value) => value
            .split(',')
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(|m| {
                m.parse::<Method>().map_err(|_| ConfigError::InvalidMethod {
                    var: name.clone(),
                    value: m.to_string(),
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        for suffix in [
            "OBJECT_STORE_HOST",
            "OBJECT_STORE_PORT",
            "OBJECT_STORE_SSL_ENABLED",
            "SECRET",
            "LOG_LEVEL",
            "ENVIRONMENT",
            "DEBUG_SESSION",
            "ALLOWED_METHODS",
        ] {
            std::env::remove_var(env_name(suffix));
        }
    }

    #[test]
    fn missing_secret_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        assert!(matches!(
            ProxyConfig::from_env(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var(env_name("SECRET"), "topsecret");
        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.object_store_host, "minio");
        assert_eq!(config.object_store_port, 9000);
        assert!(config.object_store_ssl_enabled);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.environment, "development");
        assert!(!config.debug_session);
        assert_eq!(config.allowed_methods.len(), 7);
        clear();
    }

    #[test]
    fn allowed_methods_can_be_restricted() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var(env_name("SECRET"), "topsecret");
        std::env::set_var(env_name("ALLOWED_METHODS"), "GET,PUT");
        let config = ProxyConfig::from_env().unwrap();
        assert_eq!(config.allowed_methods.len(), 2);
        assert!(config.allowed_methods.contains(&Method::GET));
        assert!(config.allowed_methods.contains(&Method::PUT));
        assert!(!config.allowed_methods.contains(&Method::POST));
        clear();
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var(env_name("SECRET"), "topsecret");
        std::env::set_var(env_name("DEBUG_SESSION"), "maybe");
        assert!(matches!(
            ProxyConfig::from_env(),
            Err(ConfigError::InvalidBool { .. })
        ));
        clear();
    }
}
