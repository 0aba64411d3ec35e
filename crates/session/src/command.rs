// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agentdesk` subcommands.

use std::io::BufRead;
use std::sync::Arc;

use clap::Subcommand;
use serde::Serialize;
use tracing::debug;

use crate::config::Cli;
use crate::manager::{RefreshOutcome, SessionManager};
use crate::profile::UserProfile;
use crate::store::FileStore;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and persist the token pair
    Login {
        /// Username or email
        #[arg(long, env = "AGENTDESK_IDENTIFIER")]
        identifier: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "AGENTDESK_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Renew the access token
    Refresh,
    /// Print the signed-in user's profile
    Whoami,
    /// Print the session state as JSON
    Status,
    /// Send an authenticated GET to an API path and print the body
    Get {
        /// Path relative to the API URL (e.g. /agents)
        path: String,
    },
}

#[derive(Serialize)]
struct StatusReport<'a> {
    authenticated: bool,
    has_refresh_token: bool,
    user: Option<&'a UserProfile>,
    state_dir: String,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let state_dir = cli.api.state_dir();
    debug!(state_dir = %state_dir.display(), "using token store");
    let store = Arc::new(FileStore::in_dir(&state_dir));
    let manager = SessionManager::from_config(&cli.api, store);

    if let Some(validation) = manager.initialize() {
        validation.await?;
    }

    match cli.command {
        Command::Login { identifier, secret } => {
            let secret = match secret {
                Some(s) => s,
                None => read_secret()?,
            };
            let profile = manager.login(&identifier, &secret).await?;
            println!("Signed in as {} ({})", profile.display_name, profile.id);
        }

        Command::Logout => {
            manager.logout();
            println!("Signed out");
        }

        Command::Refresh => match manager.refresh().await {
            RefreshOutcome::Refreshed | RefreshOutcome::Superseded => println!("Session refreshed"),
            RefreshOutcome::Skipped => anyhow::bail!("not signed in"),
            RefreshOutcome::SignedOut => anyhow::bail!("refresh rejected, signed out"),
        },

        Command::Whoami => {
            let user = manager.user().ok_or_else(|| anyhow::anyhow!("not signed in"))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Command::Status => {
            let session = manager.snapshot();
            let report = StatusReport {
                authenticated: session.is_authenticated(),
                has_refresh_token: session.refresh_token.is_some(),
                user: session.user.as_ref(),
                state_dir: state_dir.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Get { path } => {
            let resp = manager.send(manager.api().get(&path)).await?;
            let status = resp.status();
            let body = resp.text().await?;
            if !status.is_success() {
                anyhow::bail!("server returned {status}: {body}");
            }
            println!("{body}");
        }
    }
    Ok(())
}

fn read_secret() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
