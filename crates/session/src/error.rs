// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity API call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Login,
    Refresh,
    Profile,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Refresh => "refresh",
            Self::Profile => "profile",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes for session failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    CredentialsRejected,
    SessionExpired,
    ProfileUnavailable,
    Transport,
    MalformedResponse,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialsRejected => "CREDENTIALS_REJECTED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::ProfileUnavailable => "PROFILE_UNAVAILABLE",
            Self::Transport => "TRANSPORT",
            Self::MalformedResponse => "MALFORMED_RESPONSE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single Identity API call.
///
/// Carried inside `anyhow::Error` by the session manager; recover it with
/// `err.downcast_ref::<IdentityError>()`.
#[derive(Debug)]
pub enum IdentityError {
    /// The server answered with a non-2xx status.
    Rejected { operation: Operation, status: u16, detail: String },
    /// The request never produced a response (DNS, connect, timeout).
    Transport { operation: Operation, source: reqwest::Error },
    /// The server answered 2xx with a body we could not use.
    Malformed { operation: Operation, detail: String },
}

impl IdentityError {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Rejected { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Malformed { operation, .. } => *operation,
        }
    }

    /// HTTP status for rejections, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected { operation: Operation::Login, .. } => ErrorCode::CredentialsRejected,
            Self::Rejected { operation: Operation::Refresh, .. } => ErrorCode::SessionExpired,
            Self::Rejected { operation: Operation::Profile, .. } => ErrorCode::ProfileUnavailable,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Malformed { .. } => ErrorCode::MalformedResponse,
        }
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { operation, status, detail } if detail.is_empty() => {
                write!(f, "{operation} rejected ({status})")
            }
            Self::Rejected { operation, status, detail } => {
                write!(f, "{operation} rejected ({status}): {detail}")
            }
            Self::Transport { operation, source } => {
                write!(f, "{operation} request failed: {source}")
            }
            Self::Malformed { operation, detail } => {
                write!(f, "{operation} returned an invalid response: {detail}")
            }
        }
    }
}

impl std::error::Error for IdentityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
