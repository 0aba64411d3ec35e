// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the agentdesk API with a per-request credential hook.
//!
//! The client never stores a token itself. Each request is finalized by
//! asking the installed [`CredentialProvider`] for the token current at
//! dispatch time, so a rotated token is picked up by the very next request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, RequestBuilder, Response};

use crate::config::ApiConfig;

/// Source of the bearer token attached to outbound requests.
///
/// Called synchronously on every dispatch; implementations must only read
/// already-resolved state.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Handle for an installed credential hook, used to remove exactly that hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct InstalledHook {
    id: HookId,
    provider: Arc<dyn CredentialProvider>,
}

/// Install the process-wide rustls crypto provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// HTTP client wrapper for the agentdesk API.
pub struct ApiClient {
    base_url: String,
    client: Client,
    hook: RwLock<Option<InstalledHook>>,
    next_hook_id: AtomicU64,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        install_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, client, hook: RwLock::new(None), next_hook_id: AtomicU64::new(1) }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.api_url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Install `provider` as the credential hook, replacing any previous one.
    pub fn install_hook(&self, provider: Arc<dyn CredentialProvider>) -> HookId {
        let id = HookId(self.next_hook_id.fetch_add(1, Ordering::Relaxed));
        let previous = self.hook.write().replace(InstalledHook { id, provider });
        if let Some(previous) = previous {
            tracing::debug!(replaced = previous.id.0, installed = id.0, "credential hook replaced");
        }
        id
    }

    /// Remove the hook identified by `id`. Returns false if it was already replaced.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut hook = self.hook.write();
        if hook.as_ref().is_some_and(|h| h.id == id) {
            *hook = None;
            return true;
        }
        false
    }

    pub fn has_hook(&self) -> bool {
        self.hook.read().is_some()
    }

    /// Token the hook would attach right now.
    pub fn current_token(&self) -> Option<String> {
        self.hook.read().as_ref().and_then(|h| h.provider.bearer_token())
    }

    /// Set the `Authorization` header of `req` from the hook's current token.
    pub fn apply_credentials(&self, req: &mut Request) {
        let token = self.current_token();
        set_bearer(req.headers_mut(), token.as_deref());
    }

    /// Build `builder` into a request with credentials applied, without sending it.
    pub fn prepare(&self, builder: RequestBuilder) -> reqwest::Result<Request> {
        let mut req = builder.build()?;
        self.apply_credentials(&mut req);
        Ok(req)
    }

    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let req = self.prepare(builder)?;
        self.client.execute(req).await
    }

    /// Send with an explicit token in place of the hook's.
    pub async fn send_with_token(
        &self,
        builder: RequestBuilder,
        token: &str,
    ) -> reqwest::Result<Response> {
        let mut req = builder.build()?;
        set_bearer(req.headers_mut(), Some(token));
        self.client.execute(req).await
    }
}

/// Replace the bearer credential in `headers`. `None` or an empty token
/// leaves no header at all.
pub fn set_bearer(headers: &mut HeaderMap, token: Option<&str>) {
    headers.remove(AUTHORIZATION);
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return;
    };
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => tracing::warn!("access token is not a valid header value, sending without it"),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
