// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed calls to the Identity API.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Operation};
use crate::http::ApiClient;

/// Identity endpoint paths, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub login: String,
    pub refresh: String,
    pub profile: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_owned(),
            refresh: "/auth/refresh".to_owned(),
            profile: "/users/profile".to_owned(),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

/// Tokens returned by a successful login.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Tokens returned by a successful refresh. The refresh token is present
/// only when the server rotates it.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Client for the login, refresh and profile endpoints.
pub struct IdentityClient {
    api: Arc<ApiClient>,
    paths: EndpointPaths,
}

impl IdentityClient {
    pub fn new(api: Arc<ApiClient>, paths: EndpointPaths) -> Self {
        Self { api, paths }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Exchange credentials for a token pair. Inputs are forwarded as-is.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<LoginResponse, IdentityError> {
        let op = Operation::Login;
        let req = self.api.post(&self.paths.login).json(&LoginRequest { identifier, secret });
        let resp = self.api.send(req).await.map_err(|e| transport(op, e))?;
        let tokens: LoginResponse = read_json(ensure_success(resp, op).await?, op).await?;
        require_token(op, "access_token", &tokens.access_token)?;
        require_token(op, "refresh_token", &tokens.refresh_token)?;
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, IdentityError> {
        let op = Operation::Refresh;
        let req = self.api.post(&self.paths.refresh).json(&RefreshRequest { refresh_token });
        let resp = self.api.send(req).await.map_err(|e| transport(op, e))?;
        let mut tokens: RefreshResponse = read_json(ensure_success(resp, op).await?, op).await?;
        require_token(op, "access_token", &tokens.access_token)?;
        // An empty rotated refresh token means "not rotated".
        tokens.refresh_token = tokens.refresh_token.filter(|t| !t.is_empty());
        Ok(tokens)
    }

    /// Fetch the raw profile, with `token_override` in place of the hook's token.
    pub async fn profile(
        &self,
        token_override: Option<&str>,
    ) -> Result<serde_json::Value, IdentityError> {
        let op = Operation::Profile;
        let req = self.api.get(&self.paths.profile);
        let resp = match token_override {
            Some(token) => self.api.send_with_token(req, token).await,
            None => self.api.send(req).await,
        }
        .map_err(|e| transport(op, e))?;
        read_json(ensure_success(resp, op).await?, op).await
    }
}

fn require_token(operation: Operation, field: &str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::Malformed { operation, detail: format!("empty {field}") });
    }
    Ok(())
}

fn transport(operation: Operation, source: reqwest::Error) -> IdentityError {
    IdentityError::Transport { operation, source }
}

async fn ensure_success(
    resp: reqwest::Response,
    operation: Operation,
) -> Result<reqwest::Response, IdentityError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let detail = resp.text().await.unwrap_or_default();
    Err(IdentityError::Rejected { operation, status, detail })
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    operation: Operation,
) -> Result<T, IdentityError> {
    let bytes = resp.bytes().await.map_err(|e| transport(operation, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| IdentityError::Malformed { operation, detail: e.to_string() })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
