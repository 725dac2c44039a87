//! Configuration loading for overseerr-mcp.
//!
//! Every option can be given as a CLI flag or through the environment:
//!
//! | Flag                | Environment         | Required | Default |
//! |---------------------|---------------------|----------|---------|
//! | `--url`             | `OVERSEERR_URL`     | yes      |         |
//! | `--api-key`         | `OVERSEERR_API_KEY` | yes      |         |
//! | `--request-user-id` | `REQUEST_USER_ID`   | no       | `1`     |
//! | `--log-level`       | `OVERSEERR_MCP_LOG` | no       | `info`  |
//!
//! `RUST_LOG`, when set, overrides `--log-level`.

use clap::Parser;

use crate::defaults;

/// CLI arguments parsed by `clap`.
#[derive(Parser, Debug)]
#[command(
    name = "overseerr-mcp",
    version,
    about = "MCP server for searching and requesting media through Overseerr"
)]
pub struct Cli {
    /// Overseerr base URL, e.g. http://overseerr:5055
    #[arg(long, env = "OVERSEERR_URL")]
    pub url: Option<String>,

    /// Overseerr API key (Settings → General)
    #[arg(long, env = "OVERSEERR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// User id requests are made as when a tool call does not name one
    #[arg(long, env = "REQUEST_USER_ID")]
    pub request_user_id: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, env = "OVERSEERR_MCP_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Effective tracing filter: `RUST_LOG` wins over `--log-level`.
    pub fn log_filter(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.log_level.clone())
    }
}

/// Connection settings for the Overseerr instance. Built once at startup and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_key: String,
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Parsed `REQUEST_USER_ID`, if set to an integer.
    pub request_user_id: Option<i64>,
}

impl BackendConfig {
    /// Validate CLI/env input.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let url = cli
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing("OVERSEERR_URL"))?;
        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("OVERSEERR_API_KEY"))?;

        let base_url = url.trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: base_url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            api_key: api_key.to_string(),
            base_url,
            request_user_id: defaults::parse_user_id(cli.request_user_id.as_deref()),
        })
    }

    /// User id applied when a tool call names none.
    pub fn default_user_id(&self) -> i64 {
        defaults::resolve_user_id(None, self.request_user_id).value
    }
}

/// Fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required (set the environment variable or pass the matching flag)")]
    Missing(&'static str),
    #[error("invalid Overseerr URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
