use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::dispatcher::{FailurePolicy, RemovalMode};
use crate::supervisor::CompanionConfig;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;
const DEFAULT_COMPANION: &str = "server.js";
const DEFAULT_COMPANION_RUNTIME: &str = "node";
const DEFAULT_COMPANION_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("base directory is unusable: {0}")]
    BaseDir(String),
    #[error("could not determine the working directory")]
    WorkingDir(#[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub debug: bool,
    /// Listen on every interface instead of loopback only.
    pub expose: bool,
    pub root: PathBuf,
    pub on_failure: FailurePolicy,
    pub remove_mode: RemovalMode,
    pub max_body: usize,
    pub companion: String,
    pub companion_runtime: String,
    pub companion_delay: Duration,
    pub tls: Option<TlsPaths>,
}

impl ServerConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let cwd = env::current_dir().map_err(ConfigError::WorkingDir)?;
        Self::from_lookup(|key| env::var(key).ok(), cwd)
    }

    pub fn from_lookup<F>(lookup: F, cwd: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_number("FILE_SERVER_PORT", var("FILE_SERVER_PORT"), DEFAULT_PORT)?;
        let max_body = parse_number("FILE_SERVER_MAX_BODY", var("FILE_SERVER_MAX_BODY"), DEFAULT_MAX_BODY)?;
        let delay_ms = parse_number(
            "FILE_SERVER_COMPANION_DELAY_MS",
            var("FILE_SERVER_COMPANION_DELAY_MS"),
            DEFAULT_COMPANION_DELAY_MS,
        )?;

        let on_failure = match var("FILE_SERVER_ON_FAILURE") {
            None => FailurePolicy::default(),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "report" => FailurePolicy::Report,
                "log" => FailurePolicy::Log,
                _ => return Err(invalid("FILE_SERVER_ON_FAILURE", v, "expected 'report' or 'log'")),
            },
        };
        let remove_mode = match var("FILE_SERVER_REMOVE_MODE") {
            None => RemovalMode::default(),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "await" => RemovalMode::Await,
                "detached" => RemovalMode::Detached,
                _ => {
                    return Err(invalid(
                        "FILE_SERVER_REMOVE_MODE",
                        v,
                        "expected 'await' or 'detached'",
                    ))
                }
            },
        };

        let root = var("FILE_SERVER_ROOT")
            .map(|r| cwd.join(r))
            .unwrap_or(cwd);

        let tls = match (var("CERT_PATH"), var("KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            _ => None,
        };

        Ok(ServerConfig {
            port,
            debug: var("FILE_SERVER_DEBUG").is_some_and(|v| is_truthy(&v)),
            expose: var("FILE_SERVER_EXPOSE").is_some_and(|v| is_truthy(&v)),
            root,
            on_failure,
            remove_mode,
            max_body,
            companion: var("FILE_SERVER_COMPANION").unwrap_or_else(|| DEFAULT_COMPANION.to_string()),
            companion_runtime: var("FILE_SERVER_COMPANION_RUNTIME")
                .unwrap_or_else(|| DEFAULT_COMPANION_RUNTIME.to_string()),
            companion_delay: Duration::from_millis(delay_ms),
            tls,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.expose {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        SocketAddr::new(ip, self.port)
    }

    /// Default filter for `env_logger` when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn companion_config(&self, working_dir: PathBuf) -> CompanionConfig {
        CompanionConfig {
            script: self.companion.clone(),
            runtime: self.companion_runtime.clone(),
            working_dir,
            startup_delay: self.companion_delay,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn invalid(key: &'static str, value: String, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { key, value, reason }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| invalid(key, v, "expected a non-negative integer")),
    }
}
