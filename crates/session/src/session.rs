// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session value and the events observers receive when it changes.

use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;
use crate::store::StoredTokens;

/// Credentials and identity of the signed-in user.
///
/// `user` is only ever set while `access_token` is present; both are
/// cleared together.
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    /// Take over a token pair. The profile is dropped until re-fetched.
    pub(crate) fn adopt(&mut self, tokens: StoredTokens) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
        self.user = None;
    }

    /// Replace the token pair of the same identity, keeping the profile.
    pub(crate) fn rotate(&mut self, tokens: StoredTokens) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("Session")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("user", &self.user)
            .finish()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    /// `logout()` was called.
    Requested,
    /// The refresh token was rejected or the refresh could not complete.
    RefreshFailed,
    /// Tokens restored from the store did not yield a profile.
    HydrationFailed,
    /// A login attempt failed and the session it replaced is gone.
    LoginFailed,
}

/// Session changes broadcast to observers (e.g. a router that redirects to
/// sign-in on `SignedOut`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn { user_id: String },
    Refreshed,
    ProfileUpdated { user_id: String },
    SignedOut { reason: SignOutReason },
}
