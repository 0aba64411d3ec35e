// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: single owner of "who is signed in" and of the credential
//! attached to outgoing requests.
//!
//! Every token change bumps a generation counter stored under the same lock
//! as the session. Async steps remember the generation they started from and
//! only apply their result if it is unchanged, so a late response can never
//! resurrect a session that was replaced or signed out meanwhile. Store
//! writes are serialized by a separate mutex taken before the session lock,
//! so they land in generation order while the credential hook never waits
//! on disk I/O.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::http::{ApiClient, CredentialProvider, HookId};
use crate::identity::{EndpointPaths, IdentityClient};
use crate::profile::UserProfile;
use crate::session::{Session, SessionEvent, SignOutReason};
use crate::store::{StoredTokens, TokenStore};

/// Broadcast capacity for session events.
const EVENT_CAPACITY: usize = 32;

#[derive(Default)]
struct SessionCell {
    session: Session,
    /// Bumped on every token change.
    generation: u64,
}

impl SessionCell {
    fn clear(&mut self) {
        self.session.clear();
        self.generation += 1;
    }
}

type SharedCell = Arc<RwLock<SessionCell>>;

/// Credential hook backed by the live session.
struct SessionCredentials {
    cell: SharedCell,
}

impl CredentialProvider for SessionCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.cell.read().session.access_token.clone()
    }
}

/// Result of [`SessionManager::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No refresh token was held; nothing was sent.
    Skipped,
    /// The tokens changed underneath this refresh (another refresh, a login
    /// or a logout); the newer state was left alone.
    Superseded,
    Refreshed,
    /// The refresh failed and the session was signed out.
    SignedOut,
}

pub struct SessionManager {
    identity: IdentityClient,
    store: Arc<dyn TokenStore>,
    cell: SharedCell,
    hook: Mutex<Option<HookId>>,
    /// Held across a session swap and the store write that mirrors it.
    persist_lock: Mutex<()>,
    refresh_lock: tokio::sync::Mutex<()>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        api: Arc<ApiClient>,
        paths: EndpointPaths,
        store: Arc<dyn TokenStore>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            identity: IdentityClient::new(api, paths),
            store,
            cell: Arc::new(RwLock::new(SessionCell::default())),
            hook: Mutex::new(None),
            persist_lock: Mutex::new(()),
            refresh_lock: tokio::sync::Mutex::new(()),
            event_tx,
        })
    }

    pub fn from_config(config: &ApiConfig, store: Arc<dyn TokenStore>) -> Arc<Self> {
        Self::new(Arc::new(ApiClient::from_config(config)), config.endpoint_paths(), store)
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        self.identity.api()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.cell.read().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.read().session.is_authenticated()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.cell.read().session.user.clone()
    }

    fn generation(&self) -> u64 {
        self.cell.read().generation
    }

    fn access_token(&self) -> Option<String> {
        self.cell.read().session.access_token.clone()
    }

    /// Install the credential hook and restore any stored session.
    ///
    /// Returns the background validation task when tokens were restored.
    /// Validation failure signs out silently. Validation runs on the current
    /// tokio runtime; without one the stored session is left unrestored.
    pub fn initialize(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.install_hook();

        let Some(tokens) = self.store.load() else {
            debug!("no stored session");
            return None;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime to validate the stored session, starting signed out");
            return None;
        };

        let generation = {
            let mut cell = self.cell.write();
            cell.session.adopt(tokens.clone());
            cell.generation += 1;
            cell.generation
        };
        debug!("restored tokens from store, validating");

        let this = Arc::clone(self);
        Some(runtime.spawn(async move {
            this.validate_restored(tokens.access_token, generation).await;
        }))
    }

    async fn validate_restored(&self, token: String, generation: u64) {
        match self.fetch_profile_at(Some(&token), generation).await {
            Ok(profile) => info!(user_id = %profile.id, "restored session"),
            Err(e) => {
                warn!(err = %e, "stored session failed validation, starting signed out");
                self.sign_out_if(generation, SignOutReason::HydrationFailed);
            }
        }
    }

    /// Install this manager's credential hook, replacing whatever hook the
    /// API client held.
    fn install_hook(&self) {
        let provider = Arc::new(SessionCredentials { cell: Arc::clone(&self.cell) });
        let id = self.api().install_hook(provider);
        *self.hook.lock() = Some(id);
    }

    /// Remove this manager's credential hook from the API client.
    pub fn detach(&self) {
        if let Some(id) = self.hook.lock().take() {
            self.api().remove_hook(id);
        }
    }

    /// Sign in with `identifier` and `secret`.
    ///
    /// Resolves once the profile is loaded. On any failure the session and
    /// the store are left empty and the error is returned.
    pub async fn login(&self, identifier: &str, secret: &str) -> anyhow::Result<UserProfile> {
        let (mut owned, had_session) = {
            let cell = self.cell.read();
            (cell.generation, cell.session.access_token.is_some())
        };
        match self.try_login(identifier, secret, &mut owned).await {
            Ok(profile) => {
                info!(user_id = %profile.id, "signed in");
                let _ = self.event_tx.send(SessionEvent::SignedIn { user_id: profile.id.clone() });
                Ok(profile)
            }
            Err(e) => {
                warn!(err = %e, "login failed");
                if self.clear_if(owned) && had_session {
                    info!(reason = ?SignOutReason::LoginFailed, "signed out");
                    let _ = self
                        .event_tx
                        .send(SessionEvent::SignedOut { reason: SignOutReason::LoginFailed });
                }
                Err(e)
            }
        }
    }

    async fn try_login(
        &self,
        identifier: &str,
        secret: &str,
        owned: &mut u64,
    ) -> anyhow::Result<UserProfile> {
        let resp = self.identity.login(identifier, secret).await?;
        let tokens =
            StoredTokens { access_token: resp.access_token, refresh_token: resp.refresh_token };
        let saved = {
            let _persist = self.persist_lock.lock();
            *owned = {
                let mut cell = self.cell.write();
                cell.session.adopt(tokens.clone());
                cell.generation += 1;
                cell.generation
            };
            self.store.save(&tokens)
        };
        saved?;
        self.fetch_profile_at(None, *owned).await
    }

    /// Renew the access token with the refresh token.
    ///
    /// Never fails: a rejected refresh (or a profile that cannot be reloaded
    /// afterwards) signs the session out.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some((refresh_token, seen)) = self.refresh_token_at() else {
            debug!("no refresh token, skipping refresh");
            return RefreshOutcome::Skipped;
        };

        let _guard = self.refresh_lock.lock().await;
        if self.generation() != seen {
            debug!("tokens changed while waiting to refresh");
            return RefreshOutcome::Superseded;
        }

        let mut owned = seen;
        match self.try_refresh(&refresh_token, &mut owned).await {
            Ok(()) => {
                info!("session refreshed");
                let _ = self.event_tx.send(SessionEvent::Refreshed);
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                if self.sign_out_if(owned, SignOutReason::RefreshFailed) {
                    warn!(err = %e, "refresh failed, signed out");
                    RefreshOutcome::SignedOut
                } else {
                    debug!(err = %e, "refresh failed after the session changed");
                    RefreshOutcome::Superseded
                }
            }
        }
    }

    fn refresh_token_at(&self) -> Option<(String, u64)> {
        let cell = self.cell.read();
        let token = cell.session.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        Some((token.to_owned(), cell.generation))
    }

    async fn try_refresh(&self, refresh_token: &str, owned: &mut u64) -> anyhow::Result<()> {
        let resp = self.identity.refresh(refresh_token).await?;
        let tokens = StoredTokens {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.unwrap_or_else(|| refresh_token.to_owned()),
        };
        let saved = {
            let _persist = self.persist_lock.lock();
            *owned = {
                let mut cell = self.cell.write();
                if cell.generation != *owned {
                    anyhow::bail!("session changed during refresh");
                }
                cell.session.rotate(tokens.clone());
                cell.generation += 1;
                cell.generation
            };
            self.store.save(&tokens)
        };
        saved?;
        self.fetch_profile_at(None, *owned).await?;
        Ok(())
    }

    /// Sign out: clear tokens and profile in memory and in the store.
    pub fn logout(&self) {
        self.sign_out(SignOutReason::Requested);
    }

    fn sign_out(&self, reason: SignOutReason) {
        {
            let _persist = self.persist_lock.lock();
            self.cell.write().clear();
            self.clear_store();
        }
        info!(?reason, "signed out");
        let _ = self.event_tx.send(SessionEvent::SignedOut { reason });
    }

    /// Sign out only if no token change happened since `expected`.
    fn sign_out_if(&self, expected: u64, reason: SignOutReason) -> bool {
        if !self.clear_if(expected) {
            return false;
        }
        info!(?reason, "signed out");
        let _ = self.event_tx.send(SessionEvent::SignedOut { reason });
        true
    }

    fn clear_if(&self, expected: u64) -> bool {
        let _persist = self.persist_lock.lock();
        {
            let mut cell = self.cell.write();
            if cell.generation != expected {
                debug!("session superseded, leaving it in place");
                return false;
            }
            cell.clear();
        }
        self.clear_store();
        true
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(err = %e, "failed to clear token store");
        }
    }

    /// Fetch and normalize the profile, using `token_override` for this one
    /// call if given.
    ///
    /// On failure the profile is cleared but the tokens are kept.
    pub async fn fetch_profile(&self, token_override: Option<&str>) -> anyhow::Result<UserProfile> {
        let generation = self.generation();
        self.fetch_profile_at(token_override, generation).await
    }

    async fn fetch_profile_at(
        &self,
        token_override: Option<&str>,
        generation: u64,
    ) -> anyhow::Result<UserProfile> {
        let result = self.identity.profile(token_override).await.and_then(UserProfile::from_raw);

        let profile = {
            let mut cell = self.cell.write();
            if cell.generation != generation {
                anyhow::bail!("session changed while fetching profile");
            }
            match result {
                Ok(profile) if cell.session.access_token.is_some() => {
                    cell.session.user = Some(profile.clone());
                    profile
                }
                Ok(_) => anyhow::bail!("no active session"),
                Err(e) => {
                    cell.session.user = None;
                    return Err(e.into());
                }
            }
        };

        debug!(user_id = %profile.id, "profile loaded");
        let _ = self.event_tx.send(SessionEvent::ProfileUpdated { user_id: profile.id.clone() });
        Ok(profile)
    }

    /// Send an API request with the current credential.
    ///
    /// A 401 triggers one refresh; if that produced a new access token the
    /// request is replayed once. Bodies that cannot be cloned are not replayed.
    pub async fn send(&self, builder: RequestBuilder) -> anyhow::Result<Response> {
        let replay = builder.try_clone();
        let sent_with = self.access_token();
        let resp = self.api().send(builder).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        let Some(replay) = replay else {
            return Ok(resp);
        };

        match self.refresh().await {
            RefreshOutcome::Skipped | RefreshOutcome::SignedOut => return Ok(resp),
            RefreshOutcome::Refreshed | RefreshOutcome::Superseded => {}
        }
        match self.access_token() {
            Some(token) if sent_with.as_deref() != Some(token.as_str()) => {
                debug!("replaying request with refreshed token");
                Ok(self.api().send(replay).await?)
            }
            _ => Ok(resp),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(id) = self.hook.get_mut().take() {
            self.api().remove_hook(id);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
