// src/config.rs
use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::bail;
use log::warn;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

/// What the image client does when the upstream call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Return the error; the handler answers with a generic 500.
    #[default]
    Propagate,
    /// Log the error and answer with `{created: now, data: []}`.
    EmptyResult,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "propagate" => Ok(FailurePolicy::Propagate),
            "empty" | "empty-result" => Ok(FailurePolicy::EmptyResult),
            other => bail!("unknown upstream failure policy: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_addr: SocketAddr,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub failure_policy: FailurePolicy,
    pub redis_url: Option<String>,
    pub static_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_addr = match non_empty("SERVER_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid SERVER_ADDR {raw:?}, using {DEFAULT_SERVER_ADDR}");
                default_server_addr()
            }),
            None => default_server_addr(),
        };

        let failure_policy = match non_empty("UPSTREAM_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => FailurePolicy::default(),
        };

        let openai_base_url = non_empty("OPENAI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            server_addr,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url,
            failure_policy,
            redis_url: non_empty("REDIS_URL"),
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
        })
    }
}

fn default_server_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
