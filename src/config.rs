//! Gateway configuration.
//!
//! Values come from environment variables with defaults; command-line flags
//! override the environment. Base URLs are validated at load time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::guard::DEFAULT_REFRESH_THRESHOLD;
use crate::relay::feedback::{DEFAULT_LOGIN_PATH, DEFAULT_REDIRECT_DELAY};
use crate::server::page_guard::is_protected;

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SESSION_COOKIE: &str = "sb-access-token";
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/chat", "/patient-dashboard", "/therapist-dashboard"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid { name: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub backend_url: String,
    pub identity_url: String,
    pub identity_anon_key: String,
    pub refresh_threshold: Duration,
    pub redirect_delay: Duration,
    pub request_timeout: Duration,
    pub login_path: String,
    pub session_cookie: String,
    pub static_dir: Option<PathBuf>,
    pub protected_prefixes: Vec<String>,
}

impl GatewayConfig {
    /// Minimal configuration with defaults for everything but the remote endpoints.
    pub fn new(backend_url: &str, identity_url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http_port: DEFAULT_HTTP_PORT,
            backend_url: validate_url("BACKEND_URL", backend_url)?,
            identity_url: validate_url("SUPABASE_URL", identity_url)?,
            identity_anon_key: anon_key.to_string(),
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            static_dir: None,
            protected_prefixes: DEFAULT_PROTECTED_PREFIXES.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map (the process environment in production).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|s| s.trim()).filter(|s| !s.is_empty());

        let backend = get("BACKEND_URL").or_else(|| get("NEXT_PUBLIC_BACKEND_URL")).ok_or(ConfigError::Missing("BACKEND_URL"))?;
        let identity = get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL")).ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let anon = get("SUPABASE_ANON_KEY")
            .or_else(|| get("NEXT_PUBLIC_SUPABASE_ANON_KEY"))
            .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        let mut cfg = Self::new(backend, identity, anon)?;

        if let Some(v) = get("PSICOGATE_HTTP_PORT") {
            cfg.http_port = parse_num("PSICOGATE_HTTP_PORT", v)?;
        }
        if let Some(v) = get("PSICOGATE_REFRESH_THRESHOLD_SECS") {
            cfg.refresh_threshold = Duration::from_secs(parse_num("PSICOGATE_REFRESH_THRESHOLD_SECS", v)?);
        }
        if let Some(v) = get("PSICOGATE_REDIRECT_DELAY_MS") {
            cfg.redirect_delay = Duration::from_millis(parse_num("PSICOGATE_REDIRECT_DELAY_MS", v)?);
        }
        if let Some(v) = get("PSICOGATE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_num("PSICOGATE_REQUEST_TIMEOUT_SECS", v)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: "PSICOGATE_REQUEST_TIMEOUT_SECS",
                    value: v.to_string(),
                    reason: "must be greater than zero".into(),
                });
            }
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("PSICOGATE_LOGIN_PATH") {
            cfg.login_path = validate_path("PSICOGATE_LOGIN_PATH", v)?;
        }
        if let Some(v) = get("PSICOGATE_SESSION_COOKIE") {
            cfg.session_cookie = v.to_string();
        }
        if let Some(v) = get("PSICOGATE_STATIC_DIR") {
            cfg.static_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PSICOGATE_PROTECTED_PREFIXES") {
            cfg.protected_prefixes = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| validate_path("PSICOGATE_PROTECTED_PREFIXES", p))
                .collect::<Result<_, _>>()?;
        }
        if is_protected(&cfg.login_path, &cfg.protected_prefixes) {
            return Err(ConfigError::Invalid {
                name: "PSICOGATE_PROTECTED_PREFIXES",
                value: cfg.protected_prefixes.join(","),
                reason: format!("covers the login path {}", cfg.login_path),
            });
        }
        Ok(cfg)
    }

    /// Apply command-line overrides: `--http-port N`, `--backend-url URL`, `--static-dir PATH`.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(v) = arg_value(args, "--http-port") {
            self.http_port = parse_num("--http-port", v)?;
        }
        if let Some(v) = arg_value(args, "--backend-url") {
            self.backend_url = validate_url("--backend-url", v)?;
        }
        if let Some(v) = arg_value(args, "--static-dir") {
            self.static_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(|s| s.as_str())
}

fn parse_num<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid { name, value: value.to_string(), reason: e.to_string() })
}

/// Parse and normalize a base URL (no trailing slash).
fn validate_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid { name, value: value.to_string(), reason: e.to_string() })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid { name, value: value.to_string(), reason: "scheme must be http or https".into() });
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn validate_path(name: &'static str, value: &str) -> Result<String, ConfigError> {
    if value.starts_with('/') {
        Ok(value.to_string())
    } else {
        Err(ConfigError::Invalid { name, value: value.to_string(), reason: "must start with '/'".into() })
    }
}
