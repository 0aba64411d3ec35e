// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::command::Command;
use crate::identity::EndpointPaths;

/// Connection settings for the agentdesk API.
#[derive(Debug, Clone, clap::Args)]
pub struct ApiConfig {
    /// Base URL of the agentdesk API.
    #[arg(long, env = "AGENTDESK_API_URL", default_value = "http://localhost:8000/api")]
    pub api_url: String,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 10000, env = "AGENTDESK_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Path of the login endpoint.
    #[arg(long, default_value = "/auth/login", env = "AGENTDESK_LOGIN_PATH")]
    pub login_path: String,

    /// Path of the token refresh endpoint.
    #[arg(long, default_value = "/auth/refresh", env = "AGENTDESK_REFRESH_PATH")]
    pub refresh_path: String,

    /// Path of the profile endpoint.
    #[arg(long, default_value = "/users/profile", env = "AGENTDESK_PROFILE_PATH")]
    pub profile_path: String,

    /// Directory holding the persisted token pair.
    #[arg(long, env = "AGENTDESK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn endpoint_paths(&self) -> EndpointPaths {
        EndpointPaths {
            login: self.login_path.clone(),
            refresh: self.refresh_path.clone(),
            profile: self.profile_path.clone(),
        }
    }

    /// Resolve the token state directory.
    ///
    /// Uses `--state-dir` / `AGENTDESK_STATE_DIR`, then
    /// `$XDG_RUNTIME_DIR/agentdesk`, then the system temp dir. The runtime
    /// dir is preferred because it does not outlive the login session.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
            return PathBuf::from(runtime).join("agentdesk");
        }
        std::env::temp_dir().join("agentdesk")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http:// or https:// URL, got {}", self.api_url);
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        for (flag, path) in [
            ("--login-path", &self.login_path),
            ("--refresh-path", &self.refresh_path),
            ("--profile-path", &self.profile_path),
        ] {
            if !path.starts_with('/') {
                anyhow::bail!("{flag} must start with '/', got {path:?}");
            }
        }
        Ok(())
    }
}

/// Session client for the agentdesk API.
#[derive(Debug, Parser)]
#[command(name = "agentdesk", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub api: ApiConfig,

    /// Log format (json or text).
    #[arg(long, env = "AGENTDESK_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AGENTDESK_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.api.validate()?;
        if let Command::Get { ref path } = self.command {
            if !path.starts_with('/') {
                anyhow::bail!("get path must start with '/', got {path:?}");
            }
        }
        match self.log_format.as_str() {
            "json" | "text" => Ok(()),
            other => anyhow::bail!("invalid log format: {other}"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
